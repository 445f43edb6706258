use super::message::OutgoingMessage;
use super::{Mailer, NotifyError};
use crate::auth::{Authenticator, CredentialStore, OAuthFlow};

use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Sends mail through the Gmail REST API as the account the cached credentials belong to.
#[derive(Debug)]
pub struct GmailMailer<S, F> {
    client: Client,
    authenticator: Authenticator<S, F>,
}

impl<S: CredentialStore, F: OAuthFlow> GmailMailer<S, F> {
    pub fn new(authenticator: Authenticator<S, F>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            authenticator,
        })
    }
}

impl<S: CredentialStore, F: OAuthFlow> Mailer for GmailMailer<S, F> {
    fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let credentials = self.authenticator.credentials()?;

        log::info!("Sending alert to {}...", message.to);
        let sent: SentMessage = self
            .client
            .post(SEND_URL)
            .bearer_auth(&credentials.access_token)
            .json(&message.to_raw())
            .send()
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .json()?;

        log::info!("Alert sent, message id {}", sent.id);
        Ok(())
    }
}
