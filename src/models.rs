use serde::{Deserialize, Serialize};

/// Gmail system label for the inbox
pub const INBOX_LABEL: &str = "INBOX";

/// A message returned by a candidate listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

/// Headers fetched for a single message, never cached across cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeaders {
    pub id: String,
    pub thread_id: Option<String>,
    pub subject: Option<String>,
    pub from: Option<String>,
    /// RFC 5322 `Message-ID`, used for reply threading
    pub message_id: Option<String>,
}

/// Label info returned from Gmail API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
    pub label_list_visibility: Option<String>,
    pub message_list_visibility: Option<String>,
}

/// Result of a label creation attempt
///
/// A name collision is an expected outcome rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelCreation {
    Created(String),
    AlreadyExists,
}

/// Acknowledgement for a sent message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
    pub thread_id: Option<String>,
}
