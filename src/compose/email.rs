use super::{ComposeError, EmailConfig, OutboundMessage};
use crate::task::{ParsedTask, collapse_whitespace};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs as async_fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Builds the email for one parsed task.
///
/// Subject is the task title verbatim. The body lists the start date, the due
/// date prefixed with `due`, then the trailing annotations, separated by
/// single spaces.
pub fn compose_outbound_message(
    task: &ParsedTask,
    config: &EmailConfig,
) -> Result<OutboundMessage, ComposeError> {
    let to = config.to.trim();
    if to.is_empty() {
        return Err(ComposeError::MissingRecipient);
    }

    let mut parts: Vec<String> = Vec::new();
    if let Some(start) = &task.start_date {
        parts.push(start.clone());
    }
    if let Some(due) = &task.due_date {
        parts.push(format!("due {}", due));
    }
    if !task.body_extras.is_empty() {
        parts.push(task.body_extras.clone());
    }

    Ok(OutboundMessage {
        to: to.to_string(),
        subject: task.subject.clone(),
        body: collapse_whitespace(&parts.join(" ")),
    })
}

/// Renders a minimal MIME text message with CRLF line endings.
pub fn create_mime_email(message: &OutboundMessage) -> String {
    [
        format!("To: {}", message.to),
        format!("Subject: {}", message.subject),
        "Content-Type: text/plain; charset=\"UTF-8\"".to_string(),
        String::new(),
        message.body.clone(),
    ]
    .join("\r\n")
}

/// Email transport.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ComposeError>;

    fn sender_name(&self) -> &str;
}

/// Writes each message as an `.eml` file for pickup by an external mailer.
pub struct OutboxSender {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl OutboxSender {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl EmailSender for OutboxSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ComposeError> {
        async_fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ComposeError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);
        let name = format!(
            "{}-{:04}.eml",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
            sequence
        );
        let path = self.dir.join(name);

        async_fs::write(&path, create_mime_email(message))
            .await
            .map_err(|source| ComposeError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Queued email {:?} in {:?}", message.subject, path);
        Ok(())
    }

    fn sender_name(&self) -> &str {
        "outbox"
    }
}

/// Keeps sent messages in memory; can be told to fail.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
    fail_subjects: Mutex<Vec<String>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_on(&self, subject: &str) {
        self.fail_subjects.lock().await.push(subject.to_string());
    }

    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ComposeError> {
        if self.fail_subjects.lock().await.contains(&message.subject) {
            return Err(ComposeError::Transport(format!(
                "refused message {:?}",
                message.subject
            )));
        }
        debug!("Recorded email {:?}", message.subject);
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    fn sender_name(&self) -> &str {
        "recording"
    }
}
