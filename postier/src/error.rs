/// JSend-style response envelopes
///
/// <https://github.com/omniti-labs/jsend>
///
/// Every body the intake surface returns carries a `status` string next to a
/// human readable `message`; error bodies may add `error_details` for
/// infrastructure failures.
pub mod jsend {
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    pub struct ErrorResponse {
        status: &'static str,
        pub message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub error_details: Option<String>,
    }

    impl ErrorResponse {
        pub fn new(message: impl Into<String>) -> Self {
            ErrorResponse {
                status: "error",
                message: message.into(),
                error_details: None,
            }
        }

        pub fn with_details(mut self, details: impl Into<String>) -> Self {
            self.error_details = Some(details.into());
            self
        }
    }

    #[derive(Debug, Serialize)]
    pub struct StatusResponse<'a> {
        pub status: &'a str,
        pub message: &'a str,
    }

}
