use super::{AuthError, Credentials};

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub trait OAuthFlow {
    /// Exchanges the refresh token for a new access token.
    fn refresh(&self, credentials: &Credentials) -> Result<Credentials, AuthError>;
    /// Runs the interactive consent flow from scratch.
    fn authorize(&self) -> Result<Credentials, AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    #[serde(alias = "web")]
    installed: ClientSecrets,
}

impl ClientSecrets {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }
}

impl std::str::FromStr for ClientSecrets {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let file: ClientSecretsFile =
            serde_json::from_str(s).map_err(|e| AuthError::InvalidClientSecrets(e.to_string()))?;
        Ok(file.installed)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    /// Folds a token response into `base`, keeping the old refresh token when
    /// the server does not rotate it.
    fn into_credentials(self, base: Credentials, now: DateTime<Utc>) -> Credentials {
        let expiry = self
            .expires_in
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl));
        let scopes = match self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => base.scopes,
        };
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(base.refresh_token),
            expiry,
            scopes,
            ..base
        }
    }
}

/// Google's installed-application flow: the consent page redirects back to a
/// one-shot HTTP listener on the loopback interface.
#[derive(Debug, Clone)]
pub struct InstalledAppFlow {
    client: Client,
    secrets_path: PathBuf,
    scopes: Vec<String>,
}

impl InstalledAppFlow {
    pub fn new(secrets_path: impl Into<PathBuf>, scopes: &[&str]) -> Result<Self, AuthError> {
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
            secrets_path: secrets_path.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn request_token(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        Ok(self
            .client
            .post(token_uri)
            .form(form)
            .send()
            .inspect_err(|e| log::error!("Token endpoint error: {e:?}"))?
            .error_for_status()?
            .json()?)
    }
}

impl OAuthFlow for InstalledAppFlow {
    fn refresh(&self, credentials: &Credentials) -> Result<Credentials, AuthError> {
        let refresh_token = credentials.refresh_token.as_deref().ok_or_else(|| {
            AuthError::ConsentDenied("cached credentials have no refresh token".to_string())
        })?;

        let response = self.request_token(
            &credentials.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ],
        )?;

        Ok(response.into_credentials(credentials.clone(), Utc::now()))
    }

    fn authorize(&self) -> Result<Credentials, AuthError> {
        let secrets = ClientSecrets::from_file(&self.secrets_path)?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .map_err(|e| AuthError::Redirect(format!("cannot listen on loopback: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Redirect(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");
        let state = random_state();

        let url = consent_url(&secrets, &redirect_uri, &self.scopes, &state)?;
        println!("Please visit this URL to authorize this application: {url}");
        log::info!("Waiting for the consent redirect on port {port}...");

        let code = wait_for_code(&listener, &state)?;

        let response = self.request_token(
            &secrets.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ],
        )?;

        let base = Credentials {
            access_token: String::new(),
            refresh_token: None,
            expiry: None,
            token_uri: secrets.token_uri,
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            scopes: self.scopes.clone(),
        };
        Ok(response.into_credentials(base, Utc::now()))
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

fn consent_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scopes.join(" ").as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| {
        AuthError::InvalidClientSecrets(format!("auth_uri '{}': {e}", secrets.auth_uri))
    })
}

fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    let (mut stream, _) = listener
        .accept()
        .map_err(|e| AuthError::Redirect(e.to_string()))?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .map_err(|e| AuthError::Redirect(e.to_string()))?;

    let body = "The authentication flow has completed. You may close this window.";
    let reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(reply.as_bytes()) {
        log::warn!("Failed to answer the consent redirect: {e}");
    }

    parse_redirect(&request_line, expected_state)
}

/// Pulls the authorization code out of a redirect request line such as
/// `GET /?state=..&code=.. HTTP/1.1`.
fn parse_redirect(request_line: &str, expected_state: &str) -> Result<String, AuthError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AuthError::Redirect(format!("malformed request: {request_line:?}")))?;
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        return Err(AuthError::ConsentDenied(error.clone()));
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::ConsentDenied("state mismatch".to_string()));
    }
    params
        .get("code")
        .cloned()
        .ok_or_else(|| AuthError::ConsentDenied("no authorization code".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRETS: &str = r#"{
        "installed": {
            "client_id": "1234.apps.googleusercontent.com",
            "project_id": "smartbuy-alert",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_secret": "shh",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    #[test]
    fn test_parse_installed_client_secrets() {
        let secrets: ClientSecrets = SECRETS.parse().expect("Failed to parse secrets");
        assert_eq!(secrets.client_id, "1234.apps.googleusercontent.com");
        assert_eq!(secrets.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_parse_web_client_secrets() {
        let secrets: ClientSecrets = SECRETS
            .replace("installed", "web")
            .parse()
            .expect("Failed to parse secrets");
        assert_eq!(secrets.client_secret, "shh");
    }

    #[test]
    fn test_consent_url_carries_scope_and_state() {
        let secrets: ClientSecrets = SECRETS.parse().expect("Failed to parse secrets");
        let url = consent_url(
            &secrets,
            "http://127.0.0.1:8080/",
            &[crate::auth::GMAIL_SEND_SCOPE.to_string()],
            "xyz",
        )
        .expect("Failed to build url");

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["scope"], "https://www.googleapis.com/auth/gmail.send");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:8080/");
        assert_eq!(params["access_type"], "offline");
    }

    #[test]
    fn test_parse_redirect() {
        let code = parse_redirect("GET /?state=abc&code=4%2F0Ab&scope=x HTTP/1.1\r\n", "abc")
            .expect("Failed to parse redirect");
        assert_eq!(code, "4/0Ab");

        let err = parse_redirect("GET /?state=other&code=1 HTTP/1.1", "abc")
            .expect_err("Should reject");
        assert!(matches!(err, AuthError::ConsentDenied(_)));

        let err = parse_redirect("GET /?error=access_denied&state=abc HTTP/1.1", "abc")
            .expect_err("Should reject");
        assert!(matches!(err, AuthError::ConsentDenied(ref e) if e == "access_denied"));
    }

    #[test]
    fn test_token_response_keeps_refresh_token() {
        let now = Utc::now();
        let base = Credentials {
            access_token: "old".to_string(),
            refresh_token: Some("keep".to_string()),
            expiry: None,
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec!["a".to_string()],
        };
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","expires_in":3599,"token_type":"Bearer"}"#)
                .expect("Failed to parse response");

        let credentials = response.into_credentials(base, now);

        assert_eq!(credentials.access_token, "new");
        assert_eq!(credentials.refresh_token.as_deref(), Some("keep"));
        assert_eq!(credentials.expiry, Some(now + TimeDelta::seconds(3599)));
        assert_eq!(credentials.scopes, vec!["a"]);
    }
}
