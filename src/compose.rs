//! Reply composition and wire encoding

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ResponderError, Result};
use crate::models::MessageHeaders;

/// Fixed reply body
pub const REPLY_BODY: &str =
    "Thank you for your email! \r\n\r\nI'm currently on vacation and will get back to you soon.";

/// Prefix marking a subject as a reply. Matched case-sensitively.
const REPLY_PREFIX: &str = "Re:";

/// Longest UTF-8 run per encoded word, keeping each word within 75 chars
const ENCODED_WORD_BYTES: usize = 45;

/// Angle-bracketed address in a `Display Name <address>` header
static ANGLE_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>]+)>").expect("static regex is valid"));

/// A reply ready to be serialized and sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub in_reply_to: String,
    pub references: String,
    pub body: String,
    /// Gmail thread to file the reply under
    pub thread_id: Option<String>,
}

impl ReplyDraft {
    /// Render as RFC 5322 text with CRLF line endings
    ///
    /// A non-ASCII subject is written as RFC 2047 encoded words.
    pub fn to_rfc822(&self) -> String {
        [
            format!("From: {}", self.from),
            format!("To: {}", self.to),
            format!("Subject: {}", encode_header_text(&self.subject)),
            format!("In-Reply-To: {}", self.in_reply_to),
            format!("References: {}", self.references),
            String::new(),
            self.body.clone(),
        ]
        .join("\r\n")
    }

    /// Encode for the `raw` field of a Gmail send request
    pub fn encode(&self) -> String {
        encode_raw(self.to_rfc822().as_bytes())
    }
}

/// URL-safe base64 without padding
pub fn encode_raw(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Reverse of [`encode_raw`]
pub fn decode_raw(encoded: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| ResponderError::InvalidArgument(format!("Invalid base64url payload: {}", e)))
}

/// Builds replies on behalf of one account
#[derive(Debug, Clone)]
pub struct MessageComposer {
    from: String,
}

impl MessageComposer {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: sanitize_header_value(&from.into()),
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Compose the vacation reply to `original`
    ///
    /// Fails with `MalformedHeader` when `From` has no `<address>` part.
    pub fn compose(&self, original: &MessageHeaders) -> Result<ReplyDraft> {
        let from_header = original.from.as_deref().ok_or_else(|| {
            ResponderError::MalformedHeader(format!("Message {} has no From header", original.id))
        })?;
        let to = extract_address(from_header)?;

        let subject = reply_subject(original.subject.as_deref().unwrap_or(""));

        let thread_ref = original
            .message_id
            .as_deref()
            .map(|id| sanitize_header_value(id).trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| sanitize_header_value(&original.id));

        Ok(ReplyDraft {
            from: self.from.clone(),
            to,
            subject,
            in_reply_to: thread_ref.clone(),
            references: thread_ref,
            body: REPLY_BODY.to_string(),
            thread_id: original.thread_id.clone(),
        })
    }
}

/// Extract `address` from `Display Name <address>`
///
/// The last bracketed group wins, so a display name that itself contains
/// `<...>` does not hide the real address.
pub fn extract_address(from_header: &str) -> Result<String> {
    ANGLE_ADDRESS
        .captures_iter(from_header)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| sanitize_header_value(m.as_str()).trim().to_string())
        .filter(|address| !address.is_empty())
        .ok_or_else(|| {
            ResponderError::MalformedHeader(format!(
                "No <address> in From header '{}'",
                from_header
            ))
        })
}

/// Prefix `Re: ` unless the subject already starts with `Re:`
pub fn reply_subject(subject: &str) -> String {
    let subject = sanitize_header_value(subject);
    if subject.starts_with(REPLY_PREFIX) {
        subject
    } else {
        format!("{} {}", REPLY_PREFIX, subject)
    }
}

/// Base64 `=?UTF-8?B?...?=` words for non-ASCII header text
///
/// ASCII text passes through unchanged. Words never split a character and
/// are joined by folding whitespace.
pub fn encode_header_text(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (offset, ch) in text.char_indices() {
        let next = offset + ch.len_utf8();
        if next - start > ENCODED_WORD_BYTES {
            words.push(&text[start..end]);
            start = end;
        }
        end = next;
    }
    words.push(&text[start..end]);

    words
        .iter()
        .map(|chunk| format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk)))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Collapse CR/LF so a header value cannot inject extra headers
fn sanitize_header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
