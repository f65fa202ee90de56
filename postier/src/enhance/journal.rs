//! Diagnostic record of every generation call that got an upstream response.
//!
//! One file per call, named `gemini_response_{YYYYMMDD_HHMMSS_ffffff}.txt`
//! (UTC). Files are opened with `create_new`; a name collision gets a
//! numeric suffix instead of overwriting.

use std::io;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one record. Failures are logged and swallowed.
    pub async fn record(&self, prompt: &str, response: &str, processed: &str) -> Option<PathBuf> {
        match self.write(prompt, response, processed).await {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "generation response journaled");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "failed to journal generation response");
                None
            }
        }
    }

    async fn write(&self, prompt: &str, response: &str, processed: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stamp = timestamp(OffsetDateTime::now_utc())?;
        let contents = format!(
            "--- Prompt ---\n{prompt}\n\n--- Raw Response ---\n{response}\n\n--- Processed HTML ---\n{processed}"
        );

        let mut suffix = 0u32;
        loop {
            let name = if suffix == 0 {
                format!("gemini_response_{stamp}.txt")
            } else {
                format!("gemini_response_{stamp}_{suffix}.txt")
            };
            let path = self.dir.join(name);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(contents.as_bytes()).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

fn timestamp(at: OffsetDateTime) -> io::Result<String> {
    at.format(format_description!(
        "[year][month][day]_[hour][minute][second]_[subsecond digits:6]"
    ))
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
