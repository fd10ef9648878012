//! Outbound notification seam.
//!
//! SMS delivery itself lives outside the engine. The engine only needs
//! a yes/no answer before it commits a submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send {
    fn send(&self, phone_number: &str, message: &str) -> Result<(), NotifyError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, phone_number: &str, message: &str) -> Result<(), NotifyError> {
        log::info!("sms to {phone_number}: {message}");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone_number: String,
    pub message: String,
}

/// Keeps every message in memory. Clones share the same outbox, and
/// `set_failing(true)` makes every send report a delivery failure.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    outbox: Arc<Mutex<Vec<SentMessage>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<SentMessage> {
        self.sent().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, phone_number: &str, message: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError(format!("gateway rejected message to {phone_number}")));
        }
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentMessage {
                phone_number: phone_number.to_string(),
                message: message.to_string(),
            });
        Ok(())
    }
}
