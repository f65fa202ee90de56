use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::Message;
use serde::{Deserialize, Serialize};

use super::{DeliveryError, DeliveryErrorKind};

/// Plain-text part sent alongside styled bodies for clients without HTML rendering.
pub const HTML_FALLBACK_TEXT: &str = "Veuillez activer l'affichage HTML pour voir ce message.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Plain,
    Styled,
}

/// A single message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub kind: ContentKind,
}

impl OutgoingMail {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        kind: ContentKind,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            kind,
        }
    }

    /// Build the wire message. Styled bodies become `multipart/alternative`
    /// with [`HTML_FALLBACK_TEXT`] as the plain part.
    pub fn to_message(&self, sender: &str) -> Result<Message, DeliveryError> {
        let from: Mailbox = sender.parse().map_err(|_| {
            DeliveryError::new(
                DeliveryErrorKind::InvalidAddress,
                format!("invalid sender address: {sender}"),
            )
        })?;
        let to: Mailbox = self.recipient.parse().map_err(|_| {
            DeliveryError::new(
                DeliveryErrorKind::InvalidAddress,
                format!("invalid recipient address: {}", self.recipient),
            )
        })?;

        let builder = Message::builder().from(from).to(to).subject(self.subject.clone());

        let message = match self.kind {
            ContentKind::Plain => builder.singlepart(SinglePart::plain(self.body.clone())),
            ContentKind::Styled => builder.multipart(MultiPart::alternative_plain_html(
                HTML_FALLBACK_TEXT.to_string(),
                self.body.clone(),
            )),
        };

        message.map_err(|e| {
            DeliveryError::new(DeliveryErrorKind::Other, format!("failed to build message: {e}"))
        })
    }
}
