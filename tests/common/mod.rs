//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;
use vacation_responder::client::MailClient;
use vacation_responder::compose::decode_raw;
use vacation_responder::config::Config;
use vacation_responder::error::{ResponderError, Result};
use vacation_responder::models::{
    LabelCreation, LabelInfo, MessageHeaders, MessageRef, SendReceipt, INBOX_LABEL,
};

pub const ACCOUNT: &str = "me@example.com";

mock! {
    pub MailClient {}

    #[async_trait]
    impl MailClient for MailClient {
        async fn list_candidates(&self, query: &str) -> Result<Vec<MessageRef>>;
        async fn get_headers(&self, id: &str) -> Result<MessageHeaders>;
        async fn send(&self, raw: &str, thread_id: Option<String>) -> Result<SendReceipt>;
        async fn create_label(&self, name: &str) -> Result<LabelCreation>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;
        async fn account_address(&self) -> Result<String>;
    }
}

/// A message stored in the fake mailbox
#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub subject: Option<String>,
    pub label_ids: Vec<String>,
    pub sent_by_me: bool,
    pub is_chat: bool,
}

impl FakeMessage {
    pub fn inbox(id: &str, from: &str, subject: &str) -> Self {
        Self {
            id: id.to_string(),
            thread_id: format!("thread_{}", id),
            from: from.to_string(),
            subject: Some(subject.to_string()),
            label_ids: vec![INBOX_LABEL.to_string(), "UNREAD".to_string()],
            sent_by_me: false,
            is_chat: false,
        }
    }

    fn has_user_label(&self) -> bool {
        self.label_ids.iter().any(|l| l.starts_with("Label_"))
    }
}

/// A reply captured by the fake mailbox, decoded back to text
#[derive(Debug, Clone)]
pub struct SentReply {
    pub raw_text: String,
    pub thread_id: Option<String>,
}

/// Start and end of one `list_candidates` call
#[derive(Debug, Clone, Copy)]
pub struct ListWindow {
    pub start: Instant,
    pub end: Instant,
}

#[derive(Default)]
struct MailboxState {
    messages: Vec<FakeMessage>,
    labels: Vec<LabelInfo>,
    next_label: u32,
    sent: Vec<SentReply>,
    modifies: Vec<(String, Vec<String>, Vec<String>)>,
    list_windows: Vec<ListWindow>,
    vanished: HashSet<String>,
    fail_modify: bool,
    list_delay: Duration,
}

/// In-memory mailbox that evaluates the candidate query the way Gmail does
#[derive(Clone, Default)]
pub struct FakeMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<FakeMessage>) -> Self {
        let mailbox = Self::new();
        for message in messages {
            mailbox.deliver(message);
        }
        mailbox
    }

    pub fn deliver(&self, message: FakeMessage) {
        self.state.lock().unwrap().messages.push(message);
    }

    /// Keep the id in listings but answer `get_headers` with NotFound
    pub fn vanish(&self, id: &str) {
        self.state.lock().unwrap().vanished.insert(id.to_string());
    }

    pub fn set_fail_modify(&self, fail: bool) {
        self.state.lock().unwrap().fail_modify = fail;
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.state.lock().unwrap().list_delay = delay;
    }

    pub fn sent(&self) -> Vec<SentReply> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn modifies(&self) -> Vec<(String, Vec<String>, Vec<String>)> {
        self.state.lock().unwrap().modifies.clone()
    }

    pub fn labels(&self) -> Vec<LabelInfo> {
        self.state.lock().unwrap().labels.clone()
    }

    pub fn list_windows(&self) -> Vec<ListWindow> {
        self.state.lock().unwrap().list_windows.clone()
    }

    pub fn message(&self, id: &str) -> Option<FakeMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }
}

#[async_trait]
impl MailClient for FakeMailbox {
    async fn list_candidates(&self, query: &str) -> Result<Vec<MessageRef>> {
        let start = Instant::now();
        let delay = self.state.lock().unwrap().list_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        let refs = state
            .messages
            .iter()
            .filter(|m| !(query.contains("-in:chats") && m.is_chat))
            .filter(|m| !(query.contains("-from:me") && m.sent_by_me))
            .filter(|m| !(query.contains("-has:userlabels") && m.has_user_label()))
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: Some(m.thread_id.clone()),
            })
            .collect();

        state.list_windows.push(ListWindow {
            start,
            end: Instant::now(),
        });
        Ok(refs)
    }

    async fn get_headers(&self, id: &str) -> Result<MessageHeaders> {
        let state = self.state.lock().unwrap();
        if state.vanished.contains(id) {
            return Err(ResponderError::NotFound(format!("Message {} not found", id)));
        }

        state
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| MessageHeaders {
                id: m.id.clone(),
                thread_id: Some(m.thread_id.clone()),
                subject: m.subject.clone(),
                from: Some(m.from.clone()),
                message_id: Some(format!("<{}@mail.example.com>", m.id)),
            })
            .ok_or_else(|| ResponderError::NotFound(format!("Message {} not found", id)))
    }

    async fn send(&self, raw: &str, thread_id: Option<String>) -> Result<SendReceipt> {
        let bytes = decode_raw(raw)?;
        let raw_text = String::from_utf8(bytes)
            .map_err(|e| ResponderError::InvalidArgument(e.to_string()))?;

        let mut state = self.state.lock().unwrap();
        state.sent.push(SentReply {
            raw_text,
            thread_id: thread_id.clone(),
        });
        Ok(SendReceipt {
            id: format!("sent_{}", state.sent.len()),
            thread_id,
        })
    }

    async fn create_label(&self, name: &str) -> Result<LabelCreation> {
        let mut state = self.state.lock().unwrap();
        let lower = name.to_lowercase();
        if state.labels.iter().any(|l| l.name.to_lowercase() == lower) {
            return Ok(LabelCreation::AlreadyExists);
        }

        state.next_label += 1;
        let id = format!("Label_{}", state.next_label);
        state.labels.push(LabelInfo {
            id: id.clone(),
            name: name.to_string(),
            label_list_visibility: Some("labelShow".to_string()),
            message_list_visibility: Some("show".to_string()),
        });
        Ok(LabelCreation::Created(id))
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        let mut labels = vec![LabelInfo {
            id: INBOX_LABEL.to_string(),
            name: INBOX_LABEL.to_string(),
            label_list_visibility: None,
            message_list_visibility: None,
        }];
        labels.extend(self.labels());
        Ok(labels)
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_modify {
            return Err(ResponderError::ServerError {
                status: 503,
                message: "Backend Error".to_string(),
            });
        }

        state
            .modifies
            .push((id.to_string(), add.to_vec(), remove.to_vec()));

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ResponderError::NotFound(format!("Message {} not found", id)))?;
        message.label_ids.retain(|l| !remove.contains(l));
        for label in add {
            if !message.label_ids.contains(label) {
                message.label_ids.push(label.clone());
            }
        }
        Ok(())
    }

    async fn account_address(&self) -> Result<String> {
        Ok(ACCOUNT.to_string())
    }
}

/// Config with the default label and a short polling window
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.schedule.min_interval_secs = 1;
    config.schedule.max_interval_secs = 2;
    config
}

/// Gmail `users.messages.get` response in metadata format
pub fn mock_gmail_message_response(
    id: &str,
    thread_id: &str,
    from: &str,
    subject: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "threadId": thread_id,
        "labelIds": ["INBOX", "UNREAD"],
        "payload": {
            "headers": [
                {"name": "From", "value": from},
                {"name": "Subject", "value": subject},
                {"name": "Message-ID", "value": format!("<{}@mail.example.com>", id)}
            ]
        }
    })
}

/// Gmail `users.messages.list` response
pub fn mock_gmail_list_response(
    message_ids: Vec<&str>,
    next_page_token: Option<&str>,
) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = message_ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "threadId": format!("thread_{}", id)
            })
        })
        .collect();

    let mut response = json!({
        "messages": messages,
        "resultSizeEstimate": messages.len()
    });

    if let Some(token) = next_page_token {
        response["nextPageToken"] = json!(token);
    }

    response
}

/// Gmail JSON error envelope
pub fn mock_gmail_error(code: u16, message: &str) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{"message": message, "domain": "global"}]
        }
    })
}

/// Tracing layer that keeps every event as a `name=value` line
#[derive(Clone, Default)]
pub struct CapturedEvents {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CapturedEvents {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// First captured line containing `needle`
    pub fn find(&self, needle: &str) -> Option<String> {
        self.lines().into_iter().find(|line| line.contains(needle))
    }
}

struct FieldRecorder(String);

impl Visit for FieldRecorder {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push_str(&format!("{}={:?}", field.name(), value));
    }
}

impl<S: tracing::Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = FieldRecorder(String::new());
        event.record(&mut recorder);
        self.lines.lock().unwrap().push(recorder.0);
    }
}
