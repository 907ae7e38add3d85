//! Email-per-new-task flow.
//!
//! When a vault file changes, every open task line that passes the filters and
//! has not been emailed before is composed into a message and sent. Sent line
//! indexes are remembered per file so later edits do not resend them.

use super::debounce::Debouncer;
use super::state::{StateStore, SyncedLines};
use super::SyncError;
use crate::compose::{EmailConfig, EmailSender, compose_outbound_message};
use crate::task::{TaskFilter, parse_syncable_tasks};
use crate::vault::FileStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of processing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundReport {
    pub sent: Vec<String>,
    pub errors: Vec<String>,
}

pub struct OutboundSync {
    store: Arc<dyn FileStore>,
    sender: Arc<dyn EmailSender>,
    state: Arc<dyn StateStore>,
    email: EmailConfig,
    filter: TaskFilter,
    synced: Mutex<SyncedLines>,
    debouncer: Debouncer<String>,
}

impl OutboundSync {
    /// Builds the flow, loading the synced-lines cache from `state`.
    pub async fn load(
        store: Arc<dyn FileStore>,
        sender: Arc<dyn EmailSender>,
        state: Arc<dyn StateStore>,
        email: EmailConfig,
        filter: TaskFilter,
        debounce: Duration,
    ) -> Result<Self, SyncError> {
        let synced = state.load().await?.synced_lines;
        Ok(Self {
            store,
            sender,
            state,
            email,
            filter,
            synced: Mutex::new(synced),
            debouncer: Debouncer::new(debounce),
        })
    }

    pub async fn synced_lines(&self) -> SyncedLines {
        self.synced.lock().await.clone()
    }

    /// Debounced entry point for file-modified events.
    pub fn notify_modified(self: &Arc<Self>, path: &str) -> JoinHandle<bool> {
        let this = Arc::clone(self);
        let owned = path.to_string();
        self.debouncer.trigger(path.to_string(), async move {
            match this.handle_file_change(&owned).await {
                Ok(report) if !report.sent.is_empty() => {
                    info!("Sent {} task(s) from {}", report.sent.len(), owned)
                }
                Ok(_) => debug!("No new tasks in {}", owned),
                Err(e) => warn!("Failed to process {}: {}", owned, e),
            }
        })
    }

    /// Sends every not-yet-sent task of one file.
    ///
    /// A failed send is recorded in the report and the line stays unsent so a
    /// later change retries it. The cache is persisted once if anything was sent.
    pub async fn handle_file_change(&self, path: &str) -> Result<OutboundReport, SyncError> {
        if self.email.to.trim().is_empty() {
            return Err(SyncError::Validation(
                "no destination email address configured".to_string(),
            ));
        }

        let content = self.store.read_file(path).await?;
        let lines: Vec<&str> = content.split('\n').collect();
        let tasks = parse_syncable_tasks(&lines, &self.filter);

        let mut synced = self.synced.lock().await;
        let mut report = OutboundReport::default();

        for task in &tasks {
            if !task.should_sync || synced.contains(path, task.line_number) {
                continue;
            }
            let message = match compose_outbound_message(task, &self.email) {
                Ok(message) => message,
                Err(e) => {
                    report.errors.push(format!("{}:{}: {}", path, task.line_number + 1, e));
                    continue;
                }
            };

            match self.sender.send(&message).await {
                Ok(()) => {
                    debug!("Sent {:?} via {}", message.subject, self.sender.sender_name());
                    synced.mark(path, task.line_number);
                    report.sent.push(message.subject);
                }
                Err(e) => {
                    warn!("Sending {:?} failed: {}", message.subject, e);
                    report
                        .errors
                        .push(format!("{}:{}: {}", path, task.line_number + 1, e));
                }
            }
        }

        if !report.sent.is_empty() {
            self.state.save_synced_lines(&synced).await?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::RecordingSender;
    use crate::sync::state::MemoryStateStore;
    use crate::vault::MemoryVault;

    async fn setup(
        content: &str,
    ) -> (Arc<MemoryVault>, Arc<RecordingSender>, Arc<MemoryStateStore>, OutboundSync) {
        let vault = Arc::new(MemoryVault::new());
        vault.insert("Inbox.md", content, None).await;
        let sender = Arc::new(RecordingSender::new());
        let state = Arc::new(MemoryStateStore::new());
        let outbound = OutboundSync::load(
            vault.clone(),
            sender.clone(),
            state.clone(),
            EmailConfig {
                to: "in@scheduler.example".to_string(),
                ..Default::default()
            },
            TaskFilter {
                global_task_filter: "#task".to_string(),
                ..Default::default()
            },
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        (vault, sender, state, outbound)
    }

    #[tokio::test]
    async fn test_sends_each_line_once() {
        let (vault, sender, state, outbound) =
            setup("- [ ] #task One 📅 2025-01-02\n- [ ] Not tagged\n").await;

        let report = outbound.handle_file_change("Inbox.md").await.unwrap();
        assert_eq!(report.sent, vec!["One"]);

        vault
            .insert(
                "Inbox.md",
                "- [ ] #task One 📅 2025-01-02\n- [ ] Not tagged\n- [ ] #task Two\n",
                None,
            )
            .await;
        let report = outbound.handle_file_change("Inbox.md").await.unwrap();
        assert_eq!(report.sent, vec!["Two"]);

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, "due 2025-01-02");
        assert_eq!(state.snapshot().await.synced_lines.lines("Inbox.md"), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_later() {
        let (_vault, sender, state, outbound) = setup("- [ ] #task Flaky\n").await;
        sender.fail_on("Flaky").await;

        let report = outbound.handle_file_change("Inbox.md").await.unwrap();
        assert!(report.sent.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(state.snapshot().await.synced_lines.is_empty());
    }

    #[tokio::test]
    async fn test_marks_every_sent_line_in_one_pass() {
        let (_vault, sender, state, outbound) =
            setup("- [ ] #task A\n- [ ] #task B\n- [ ] #task C\n").await;
        sender.fail_on("B").await;

        let report = outbound.handle_file_change("Inbox.md").await.unwrap();
        assert_eq!(report.sent, vec!["A", "C"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(outbound.synced_lines().await.lines("Inbox.md"), vec![0, 2]);
        assert_eq!(state.snapshot().await.synced_lines.lines("Inbox.md"), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_missing_recipient_is_validation_error() {
        let vault = Arc::new(MemoryVault::new());
        let outbound = OutboundSync::load(
            vault,
            Arc::new(RecordingSender::new()),
            Arc::new(MemoryStateStore::new()),
            EmailConfig::default(),
            TaskFilter::default(),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert!(matches!(
            outbound.handle_file_change("Inbox.md").await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_notify_modified_debounces() {
        let (_vault, sender, _state, outbound) = setup("- [ ] #task Once\n").await;
        let outbound = Arc::new(outbound);

        let first = outbound.notify_modified("Inbox.md");
        let second = outbound.notify_modified("Inbox.md");
        assert!(!first.await.unwrap());
        assert!(second.await.unwrap());
        assert_eq!(sender.sent().await.len(), 1);
    }
}
