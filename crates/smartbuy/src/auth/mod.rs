mod flow;
mod store;

pub use flow::{ClientSecrets, InstalledAppFlow, OAuthFlow};
pub use store::{CredentialStore, FileCredentialStore};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

// Tokens this close to expiry are treated as expired.
fn expiry_skew() -> TimeDelta {
    TimeDelta::seconds(10)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Token request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Corrupt credential cache: {0}")]
    CorruptCache(serde_json::Error),
    #[error("Invalid client secrets: {0}")]
    InvalidClientSecrets(String),
    #[error("Authorization redirect failed: {0}")]
    Redirect(String),
    #[error("Consent was not granted: {0}")]
    ConsentDenied(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

impl Credentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry - expiry_skew() <= now)
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now)
    }

    pub fn can_refresh(&self, now: DateTime<Utc>) -> bool {
        self.is_expired(now) && self.refresh_token.is_some()
    }
}

/// Where one authentication attempt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    Unloaded,
    LoadedValid(Credentials),
    LoadedExpired(Credentials),
    Authenticated(Credentials),
}

impl CredentialState {
    /// Moves one transition forward. `Authenticated` is terminal.
    pub fn advance(
        self,
        store: &impl CredentialStore,
        flow: &impl OAuthFlow,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        Ok(match self {
            CredentialState::Unloaded => match store.load()? {
                Some(credentials) if credentials.is_valid(now) => {
                    CredentialState::LoadedValid(credentials)
                }
                Some(credentials) => CredentialState::LoadedExpired(credentials),
                None => {
                    log::info!("No cached credentials, asking for consent");
                    CredentialState::Authenticated(flow.authorize()?)
                }
            },
            CredentialState::LoadedValid(credentials) => {
                CredentialState::Authenticated(credentials)
            }
            CredentialState::LoadedExpired(credentials) if credentials.can_refresh(now) => {
                log::info!("Cached access token expired, refreshing");
                CredentialState::Authenticated(flow.refresh(&credentials)?)
            }
            CredentialState::LoadedExpired(_) => {
                log::warn!("Cached credentials cannot be refreshed, asking for consent");
                CredentialState::Authenticated(flow.authorize()?)
            }
            CredentialState::Authenticated(credentials) => {
                CredentialState::Authenticated(credentials)
            }
        })
    }
}

/// Produces usable credentials from the cache, refreshing or asking for consent
/// as needed, and writes the result back to the cache before handing it out.
#[derive(Debug)]
pub struct Authenticator<S, F> {
    store: S,
    flow: F,
}

impl<S: CredentialStore, F: OAuthFlow> Authenticator<S, F> {
    pub fn new(store: S, flow: F) -> Self {
        Self { store, flow }
    }

    pub fn credentials(&self) -> Result<Credentials, AuthError> {
        let mut state = CredentialState::Unloaded;
        loop {
            state = match state {
                CredentialState::Authenticated(credentials) => {
                    self.store.save(&credentials)?;
                    return Ok(credentials);
                }
                other => other.advance(&self.store, &self.flow, Utc::now())?,
            };
        }
    }
}
