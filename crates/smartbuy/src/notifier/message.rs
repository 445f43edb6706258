use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::Serialize;

use crate::types::MatchSet;
use crate::utils::title_case;

// RFC 2045 caps encoded lines at 76 characters.
const BASE64_LINE_LEN: usize = 76;

/// A plaintext alert ready to hand to a mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Payload accepted by the Gmail `messages.send` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMessage {
    pub raw: String,
}

impl OutgoingMessage {
    /// Renders the message as RFC 2822 text with a base64 body.
    pub fn to_mime(&self) -> String {
        let mut mime = format!(
            "Content-Type: text/plain; charset=\"utf-8\"\r\n\
             MIME-Version: 1.0\r\n\
             Content-Transfer-Encoding: base64\r\n\
             to: {}\r\n\
             from: {}\r\n\
             subject: {}\r\n\r\n",
            self.to,
            self.from,
            encode_header(&self.subject)
        );

        let encoded = STANDARD.encode(self.body.as_bytes());
        for line in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
            // base64 output is ASCII, so every chunk is valid UTF-8.
            mime.push_str(&String::from_utf8_lossy(line));
            mime.push_str("\r\n");
        }
        mime
    }

    pub fn to_raw(&self) -> RawMessage {
        RawMessage {
            raw: URL_SAFE.encode(self.to_mime().as_bytes()),
        }
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

pub fn compose_subject(matches: &MatchSet) -> String {
    let keywords = matches.keywords().collect::<Vec<_>>().join(", ");
    format!("Alert! ({})", title_case(&keywords))
}

pub fn compose_body(matches: &MatchSet) -> String {
    let mut body = String::from("Great success!\n\n");
    for product in matches {
        body.push_str(&format!(
            "The product responding to keyword \"{}\" has been found in {}.\n",
            product.keyword,
            crate::SITE_NAME
        ));
        body.push_str(&format!(
            "Click here to find out more: {}\n\n",
            product.links.join(" , ")
        ));
    }
    body
}

pub fn compose_message(matches: &MatchSet, from: &str, to: &str) -> OutgoingMessage {
    OutgoingMessage {
        to: to.to_string(),
        from: from.to_string(),
        subject: compose_subject(matches),
        body: compose_body(matches),
    }
}
