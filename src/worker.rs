//! Per-message reply pipeline
//!
//! Each candidate moves through `Listed -> HeadersFetched -> Replied ->
//! Labeled -> Done`. Anything that fails before the send leaves the message
//! untouched in the inbox, so the next cycle will pick it up again.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{ResponderError, Result};
use crate::models::{MessageRef, INBOX_LABEL};
use crate::scheduler::ResponderContext;

/// Pipeline position of a message, used in log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStage {
    Listed,
    HeadersFetched,
    Replied,
    Labeled,
    Done,
}

impl fmt::Display for ReplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyStage::Listed => "listed",
            ReplyStage::HeadersFetched => "headers_fetched",
            ReplyStage::Replied => "replied",
            ReplyStage::Labeled => "labeled",
            ReplyStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Final state of one message within a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Replied, labeled and archived
    Done,
    /// Not replied to; the reason is message-specific
    Skipped(String),
    /// Reply sent but the label could not be applied
    ///
    /// The message stays in the candidate set and may be replied to again
    /// next cycle.
    ReconciliationGap(String),
    /// Dry run: reply composed but nothing sent or modified
    Previewed,
}

/// Runs the reply pipeline for single messages
pub struct ReplyWorker {
    ctx: Arc<ResponderContext>,
}

impl ReplyWorker {
    pub fn new(ctx: Arc<ResponderContext>) -> Self {
        Self { ctx }
    }

    /// Process one candidate
    ///
    /// Message-scoped failures become `Skipped`. Auth and transient errors
    /// before the send are returned so the caller can abort the cycle.
    pub async fn process(&self, message: &MessageRef) -> Result<ReplyOutcome> {
        let id = message.id.as_str();
        debug!(message_id = id, stage = %ReplyStage::Listed, "Processing message");

        let headers = match self.ctx.client.get_headers(id).await {
            Ok(headers) => headers,
            Err(e) => return skip_or_abort(id, ReplyStage::Listed, e),
        };
        debug!(message_id = id, stage = %ReplyStage::HeadersFetched, "Fetched headers");

        let draft = match self.ctx.composer.compose(&headers) {
            Ok(draft) => draft,
            Err(e) => return skip_or_abort(id, ReplyStage::HeadersFetched, e),
        };

        if self.ctx.dry_run {
            info!(
                message_id = id,
                to = %draft.to,
                subject = %draft.subject,
                "[DRY RUN] Would reply and label message"
            );
            return Ok(ReplyOutcome::Previewed);
        }

        let thread_id = draft.thread_id.clone().or_else(|| message.thread_id.clone());
        let receipt = match self.ctx.client.send(&draft.encode(), thread_id).await {
            Ok(receipt) => receipt,
            Err(e) => return skip_or_abort(id, ReplyStage::HeadersFetched, e),
        };
        info!(
            message_id = id,
            stage = %ReplyStage::Replied,
            reply_id = %receipt.id,
            "Sent reply to {}",
            draft.to
        );

        let add = [self.ctx.label_id.clone()];
        let remove = [INBOX_LABEL.to_string()];
        if let Err(e) = self.ctx.client.modify_labels(id, &add, &remove).await {
            error!(
                message_id = id,
                reply_id = %receipt.id,
                "Reconciliation gap: reply sent but labeling failed: {}",
                e
            );
            return Ok(ReplyOutcome::ReconciliationGap(e.to_string()));
        }
        debug!(message_id = id, stage = %ReplyStage::Labeled, "Labeled and archived");

        info!(message_id = id, stage = %ReplyStage::Done, "Message handled");
        Ok(ReplyOutcome::Done)
    }
}

fn skip_or_abort(id: &str, stage: ReplyStage, e: ResponderError) -> Result<ReplyOutcome> {
    if e.is_message_scoped() {
        warn!(message_id = id, stage = %stage, "Skipping message: {}", e);
        Ok(ReplyOutcome::Skipped(e.to_string()))
    } else {
        Err(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MailClient;
    use crate::compose::{decode_raw, MessageComposer};
    use crate::models::{LabelCreation, LabelInfo, MessageHeaders, SendReceipt};
    use async_trait::async_trait;

    mockall::mock! {
        TestMailClient {}

        #[async_trait]
        impl MailClient for TestMailClient {
            async fn list_candidates(&self, query: &str) -> Result<Vec<MessageRef>>;
            async fn get_headers(&self, id: &str) -> Result<MessageHeaders>;
            async fn send(&self, raw: &str, thread_id: Option<String>) -> Result<SendReceipt>;
            async fn create_label(&self, name: &str) -> Result<LabelCreation>;
            async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
            async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;
            async fn account_address(&self) -> Result<String>;
        }
    }

    fn headers(id: &str, from: &str) -> MessageHeaders {
        MessageHeaders {
            id: id.to_string(),
            thread_id: Some(format!("t-{}", id)),
            subject: Some("Hi".to_string()),
            from: Some(from.to_string()),
            message_id: None,
        }
    }

    fn worker(mock: MockTestMailClient, dry_run: bool) -> ReplyWorker {
        let ctx = ResponderContext {
            client: Arc::new(mock),
            label_id: "Label_7".to_string(),
            composer: MessageComposer::new("me@example.com"),
            dry_run,
        };
        ReplyWorker::new(Arc::new(ctx))
    }

    #[tokio::test]
    async fn test_process_happy_path() {
        let mut mock = MockTestMailClient::new();
        mock.expect_get_headers()
            .withf(|id| id == "m1")
            .times(1)
            .returning(|id| Ok(headers(id, "Jane <jane@x.com>")));
        mock.expect_send()
            .withf(|raw, thread_id| {
                let text = String::from_utf8(decode_raw(raw).unwrap()).unwrap();
                text.contains("To: jane@x.com\r\n") && thread_id.as_deref() == Some("t-m1")
            })
            .times(1)
            .returning(|_, _| {
                Ok(SendReceipt {
                    id: "r1".to_string(),
                    thread_id: Some("t-m1".to_string()),
                })
            });
        mock.expect_modify_labels()
            .withf(|id, add, remove| {
                id == "m1" && add == ["Label_7".to_string()] && remove == ["INBOX".to_string()]
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outcome = worker(mock, false).process(&MessageRef::new("m1")).await.unwrap();
        assert_eq!(outcome, ReplyOutcome::Done);
    }

    #[tokio::test]
    async fn test_process_not_found_is_skipped() {
        let mut mock = MockTestMailClient::new();
        mock.expect_get_headers()
            .returning(|_| Err(ResponderError::NotFound("deleted".to_string())));
        mock.expect_send().never();
        mock.expect_modify_labels().never();

        let outcome = worker(mock, false).process(&MessageRef::new("m1")).await.unwrap();
        assert!(matches!(outcome, ReplyOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_process_malformed_from_is_skipped() {
        let mut mock = MockTestMailClient::new();
        mock.expect_get_headers()
            .returning(|id| Ok(headers(id, "jane@x.com")));
        mock.expect_send().never();
        mock.expect_modify_labels().never();

        let outcome = worker(mock, false).process(&MessageRef::new("m1")).await.unwrap();
        assert!(matches!(outcome, ReplyOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_process_rejected_send_is_skipped() {
        let mut mock = MockTestMailClient::new();
        mock.expect_get_headers()
            .returning(|id| Ok(headers(id, "Jane <jane@x.com>")));
        mock.expect_send()
            .returning(|_, _| Err(ResponderError::InvalidArgument("bad raw".to_string())));
        mock.expect_modify_labels().never();

        let outcome = worker(mock, false).process(&MessageRef::new("m1")).await.unwrap();
        assert!(matches!(outcome, ReplyOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_process_auth_error_aborts() {
        let mut mock = MockTestMailClient::new();
        mock.expect_get_headers()
            .returning(|_| Err(ResponderError::AuthError("expired".to_string())));
        mock.expect_send().never();

        let result = worker(mock, false).process(&MessageRef::new("m1")).await;
        assert!(matches!(result, Err(ResponderError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_process_modify_failure_is_reconciliation_gap() {
        let mut mock = MockTestMailClient::new();
        mock.expect_get_headers()
            .returning(|id| Ok(headers(id, "Jane <jane@x.com>")));
        mock.expect_send().times(1).returning(|_, _| {
            Ok(SendReceipt {
                id: "r1".to_string(),
                thread_id: None,
            })
        });
        mock.expect_modify_labels().times(1).returning(|_, _, _| {
            Err(ResponderError::ServerError {
                status: 503,
                message: "unavailable".to_string(),
            })
        });

        let outcome = worker(mock, false).process(&MessageRef::new("m1")).await.unwrap();
        assert!(matches!(outcome, ReplyOutcome::ReconciliationGap(_)));
    }

    #[tokio::test]
    async fn test_process_dry_run_sends_nothing() {
        let mut mock = MockTestMailClient::new();
        mock.expect_get_headers()
            .returning(|id| Ok(headers(id, "Jane <jane@x.com>")));
        mock.expect_send().never();
        mock.expect_modify_labels().never();

        let outcome = worker(mock, true).process(&MessageRef::new("m1")).await.unwrap();
        assert_eq!(outcome, ReplyOutcome::Previewed);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ReplyStage::HeadersFetched.to_string(), "headers_fetched");
        assert_eq!(ReplyStage::Done.to_string(), "done");
    }
}
