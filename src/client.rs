//! Gmail API client with retry logic

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use google_gmail1::api::{Label, Message, ModifyMessageRequest};
use google_gmail1::common::{self, GetToken};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::config::ClientConfig;
use crate::error::{ResponderError, Result};
use crate::models::{LabelCreation, LabelInfo, MessageHeaders, MessageRef, SendReceipt};

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";
const SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

/// Headers requested when fetching a message
pub const METADATA_HEADERS: &[&str] = &["Subject", "From", "Message-ID"];

/// Narrow view of the mail provider used by the responder
#[async_trait]
pub trait MailClient: Send + Sync {
    /// List all message refs matching a server-side query
    async fn list_candidates(&self, query: &str) -> Result<Vec<MessageRef>>;

    /// Fetch the reply-relevant headers of a message
    async fn get_headers(&self, id: &str) -> Result<MessageHeaders>;

    /// Send a URL-safe base64 encoded RFC 5322 message
    async fn send(&self, raw: &str, thread_id: Option<String>) -> Result<SendReceipt>;

    /// Create a label, reporting a name collision as `AlreadyExists`
    async fn create_label(&self, name: &str) -> Result<LabelCreation>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Add and remove labels on a single message
    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;

    /// Email address of the authenticated account
    async fn account_address(&self) -> Result<String>;
}

#[async_trait]
impl<T: MailClient + ?Sized> MailClient for Arc<T> {
    async fn list_candidates(&self, query: &str) -> Result<Vec<MessageRef>> {
        (**self).list_candidates(query).await
    }

    async fn get_headers(&self, id: &str) -> Result<MessageHeaders> {
        (**self).get_headers(id).await
    }

    async fn send(&self, raw: &str, thread_id: Option<String>) -> Result<SendReceipt> {
        (**self).send(raw, thread_id).await
    }

    async fn create_label(&self, name: &str) -> Result<LabelCreation> {
        (**self).create_label(name).await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        (**self).list_labels().await
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        (**self).modify_labels(id, add, remove).await
    }

    async fn account_address(&self) -> Result<String> {
        (**self).account_address().await
    }
}

/// Production Gmail client
///
/// Idempotent calls are retried with exponential backoff and every call is
/// bounded by the configured timeout. `send` runs exactly once per call.
pub struct GmailMailClient {
    hub: GmailHub,
    base_url: String,
    max_retries: u32,
    timeout: Duration,
}

impl GmailMailClient {
    pub fn new(mut hub: GmailHub, config: &ClientConfig) -> Self {
        // The hub only exposes its base URL through the setter
        let base_url = hub.base_url(String::new());
        hub.base_url(base_url.clone());

        Self {
            hub,
            base_url,
            max_retries: config.max_retries,
            timeout: config.request_timeout(),
        }
    }

    /// POST `{"raw": ..., "threadId": ...}` to `users.messages.send`
    ///
    /// The generated builder for this method only offers media upload, so the
    /// JSON request goes through the hub's HTTP client and authenticator.
    async fn post_raw_message(&self, raw: &str, thread_id: Option<String>) -> Result<Message> {
        let token = self
            .hub
            .auth
            .get_token(&[SEND_SCOPE])
            .await
            .map_err(|e| ResponderError::AuthError(format!("Could not obtain access token: {}", e)))?
            .ok_or_else(|| ResponderError::AuthError("No access token available".to_string()))?;

        let mut payload = json!({ "raw": raw });
        if let Some(thread_id) = thread_id {
            payload["threadId"] = json!(thread_id);
        }

        let request = hyper::Request::builder()
            .method(hyper::Method::POST)
            .uri(format!(
                "{}gmail/v1/users/me/messages/send?alt=json",
                self.base_url
            ))
            .header(hyper::header::AUTHORIZATION, format!("Bearer {}", token))
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(common::to_body(Some(serde_json::to_vec(&payload)?)))
            .map_err(|e| ResponderError::InvalidArgument(format!("Invalid send request: {}", e)))?;

        let response = self
            .hub
            .client
            .request(request)
            .await
            .map_err(|e| ResponderError::NetworkError(format!("Connection error: {}", e)))?;

        let (parts, body) = response.into_parts();
        let bytes = common::to_bytes(body).await.unwrap_or_default();

        if !parts.status.is_success() {
            return Err(ResponderError::from_http_parts(
                parts.status,
                &parts.headers,
                &bytes,
            ));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Check if an error is retryable
    fn should_retry(error: &ResponderError) -> bool {
        error.is_transient()
    }

    /// Run a call under the client timeout
    async fn with_timeout<T, Fut>(&self, operation_name: &str, call: Fut) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} timed out after {:?}", operation_name, self.timeout);
                Err(ResponderError::NetworkError(format!(
                    "{} timed out after {:?}",
                    operation_name, self.timeout
                )))
            }
        }
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name,
                        attempts,
                        max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Pull the reply-relevant headers out of a metadata-format message
fn parse_message_headers(msg: Message) -> Result<MessageHeaders> {
    let id = msg
        .id
        .ok_or_else(|| ResponderError::ApiError("Missing message ID".to_string()))?;

    let mut subject = None;
    let mut from = None;
    let mut message_id = None;

    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default();

    for header in headers {
        if let (Some(name), Some(value)) = (header.name, header.value) {
            // Header names are case-insensitive; keep the first occurrence
            match name.to_lowercase().as_str() {
                "subject" if subject.is_none() => subject = Some(value),
                "from" if from.is_none() => from = Some(value),
                "message-id" if message_id.is_none() => message_id = Some(value),
                _ => {}
            }
        }
    }

    Ok(MessageHeaders {
        id,
        thread_id: msg.thread_id,
        subject,
        from,
        message_id,
    })
}

#[async_trait]
impl MailClient for GmailMailClient {
    async fn list_candidates(&self, query: &str) -> Result<Vec<MessageRef>> {
        let mut all_refs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let response = Self::with_retry("list_candidates", self.max_retries, || {
                let token = token.clone();
                self.with_timeout("list_candidates", async move {
                    let mut call = self
                        .hub
                        .users()
                        .messages_list("me")
                        .q(query)
                        .max_results(100);

                    if let Some(token) = token.as_ref() {
                        call = call.page_token(token);
                    }

                    let (_, response) = call.add_scope(MODIFY_SCOPE).doit().await?;
                    Ok::<_, ResponderError>(response)
                })
            })
            .await?;

            for msg in response.messages.unwrap_or_default() {
                if let Some(id) = msg.id {
                    all_refs.push(MessageRef {
                        id,
                        thread_id: msg.thread_id,
                    });
                }
            }

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!("Query '{}' matched {} messages", query, all_refs.len());
        Ok(all_refs)
    }

    async fn get_headers(&self, id: &str) -> Result<MessageHeaders> {
        let msg = Self::with_retry("get_headers", self.max_retries, || {
            self.with_timeout("get_headers", async {
                let mut call = self.hub.users().messages_get("me", id).format("metadata");
                for header in METADATA_HEADERS {
                    call = call.add_metadata_headers(header);
                }

                let (_, msg) = call.add_scope(MODIFY_SCOPE).doit().await?;
                Ok::<_, ResponderError>(msg)
            })
        })
        .await?;

        parse_message_headers(msg)
    }

    async fn send(&self, raw: &str, thread_id: Option<String>) -> Result<SendReceipt> {
        // Sent as-is in the `raw` field once it is known to be base64url
        URL_SAFE_NO_PAD.decode(raw).map_err(|e| {
            ResponderError::InvalidArgument(format!("Raw message is not base64url: {}", e))
        })?;

        // Not retried: a send that timed out may still have been delivered
        let sent = self
            .with_timeout("send", self.post_raw_message(raw, thread_id))
            .await?;

        let id = sent
            .id
            .ok_or_else(|| ResponderError::ApiError("Sent message has no ID".to_string()))?;

        Ok(SendReceipt {
            id,
            thread_id: sent.thread_id,
        })
    }

    async fn create_label(&self, name: &str) -> Result<LabelCreation> {
        let result = Self::with_retry("create_label", self.max_retries, || {
            self.with_timeout("create_label", async {
                let label = Label {
                    name: Some(name.to_string()),
                    message_list_visibility: Some("show".to_string()),
                    label_list_visibility: Some("labelShow".to_string()),
                    ..Default::default()
                };

                let (_, created) = self
                    .hub
                    .users()
                    .labels_create(label, "me")
                    .add_scope(LABELS_SCOPE)
                    .doit()
                    .await?;

                created
                    .id
                    .ok_or_else(|| ResponderError::LabelError("Created label has no ID".to_string()))
            })
        })
        .await;

        match result {
            Ok(id) => Ok(LabelCreation::Created(id)),
            Err(ResponderError::Conflict(message)) => {
                debug!("Label '{}' already exists: {}", name, message);
                Ok(LabelCreation::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Self::with_retry("list_labels", self.max_retries, || {
            self.with_timeout("list_labels", async {
                let (_, response) = self
                    .hub
                    .users()
                    .labels_list("me")
                    .add_scope(LABELS_SCOPE)
                    .doit()
                    .await?;

                let labels: Vec<LabelInfo> = response
                    .labels
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|label| match (label.id, label.name) {
                        (Some(id), Some(name)) => Some(LabelInfo {
                            id,
                            name,
                            label_list_visibility: label.label_list_visibility,
                            message_list_visibility: label.message_list_visibility,
                        }),
                        _ => None,
                    })
                    .collect();

                debug!("Successfully parsed {} labels", labels.len());
                Ok::<_, ResponderError>(labels)
            })
        })
        .await
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        Self::with_retry("modify_labels", self.max_retries, || {
            self.with_timeout("modify_labels", async {
                let request = ModifyMessageRequest {
                    add_label_ids: (!add.is_empty()).then(|| add.to_vec()),
                    remove_label_ids: (!remove.is_empty()).then(|| remove.to_vec()),
                };

                self.hub
                    .users()
                    .messages_modify(request, "me", id)
                    .add_scope(MODIFY_SCOPE)
                    .doit()
                    .await?;

                Ok::<_, ResponderError>(())
            })
        })
        .await
    }

    async fn account_address(&self) -> Result<String> {
        Self::with_retry("account_address", self.max_retries, || {
            self.with_timeout("account_address", async {
                let (_, profile) = self
                    .hub
                    .users()
                    .get_profile("me")
                    .add_scope(MODIFY_SCOPE)
                    .doit()
                    .await?;

                profile
                    .email_address
                    .ok_or_else(|| ResponderError::AuthError("Profile has no email address".to_string()))
            })
        })
        .await
    }
}
