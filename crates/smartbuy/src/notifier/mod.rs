mod gmail;
mod message;

pub use gmail::GmailMailer;
pub use message::{OutgoingMessage, RawMessage, compose_body, compose_message, compose_subject};

use crate::auth::AuthError;
use crate::types::MatchSet;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Authentication failed: {0}")]
    AuthError(#[from] AuthError),
    #[error("Mail request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub trait Mailer {
    fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The failure was recorded in the error log and is not propagated.
    Failed,
}

/// Append-only record of failed deliveries.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, error: &dyn std::error::Error) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(
            file,
            "****  {}  ****\n\
             An error has occurred trying to login to Gmail or send the response mail.\n\
             {:?}\n\n",
            Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            error
        )
    }
}

pub struct Notifier<M> {
    mailer: M,
    from: String,
    to: String,
    error_log: ErrorLog,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(
        mailer: M,
        from: impl Into<String>,
        to: impl Into<String>,
        error_log: ErrorLog,
    ) -> Self {
        Self {
            mailer,
            from: from.into(),
            to: to.into(),
            error_log,
        }
    }

    /// Mails a summary of `matches`. Delivery is best effort: a failure is logged
    /// to the error log and reported as `Delivery::Failed`, never returned as an error.
    pub fn alert(&self, matches: &MatchSet) -> Delivery {
        let message = compose_message(matches, &self.from, &self.to);

        match self.mailer.send(&message) {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                if let Err(log_err) = self.error_log.record(&e) {
                    log::error!(
                        "Failed to write error log {}: {}",
                        self.error_log.path().display(),
                        log_err
                    );
                }
                println!("An error has occurred!\n{e}");
                log::warn!("Alert was not delivered: {e}");
                Delivery::Failed
            }
        }
    }
}
