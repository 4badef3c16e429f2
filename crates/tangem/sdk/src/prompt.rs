//! User interaction surface
//!
//! The executor asks for user codes and reports security delays through
//! [`PromptService`]. [`ChannelPrompt`] forwards those requests over tokio
//! channels so any front end can answer them from its own task.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::types::UserCodeKind;

/// Callbacks the executor needs from the user interface
#[async_trait]
pub trait PromptService: Send + Sync + fmt::Debug {
    /// Show the remaining security delay; must not block
    fn report_security_delay(&self, remaining_ms: u32);

    /// Ask for the access code, `None` when the user declines
    async fn request_primary_credential(&self) -> Option<String>;

    /// Ask for the passcode or CVC, `None` when the user declines
    async fn request_secondary_credential(&self) -> Option<String>;

    /// Ask for the code of `kind`
    async fn request_credential(&self, kind: UserCodeKind) -> Option<String> {
        match kind {
            UserCodeKind::AccessCode => self.request_primary_credential().await,
            UserCodeKind::Passcode => self.request_secondary_credential().await,
        }
    }
}

/// A request waiting for the user
#[derive(Debug)]
pub enum PromptRequest {
    /// Enter the access code
    AccessCode(oneshot::Sender<Option<String>>),
    /// Enter the passcode or CVC
    Passcode(oneshot::Sender<Option<String>>),
}

impl PromptRequest {
    /// Slot being asked for
    pub const fn kind(&self) -> UserCodeKind {
        match self {
            Self::AccessCode(_) => UserCodeKind::AccessCode,
            Self::Passcode(_) => UserCodeKind::Passcode,
        }
    }

    /// Answer the request; `None` declines it
    pub fn respond(self, code: Option<String>) {
        let sender = match self {
            Self::AccessCode(sender) | Self::Passcode(sender) => sender,
        };
        // The executor may have gone away already
        let _ = sender.send(code);
    }
}

/// Informational events that need no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptEvent {
    /// The card is counting down a security delay
    SecurityDelay {
        /// Milliseconds left
        remaining_ms: u32,
    },
}

/// [`PromptService`] backed by channels
#[derive(Debug, Clone)]
pub struct ChannelPrompt {
    requests: mpsc::Sender<PromptRequest>,
    events: mpsc::Sender<PromptEvent>,
}

/// Receiving ends handed to the user interface
#[derive(Debug)]
pub struct PromptReceivers {
    /// Code requests
    pub requests: mpsc::Receiver<PromptRequest>,
    /// Delay notifications
    pub events: mpsc::Receiver<PromptEvent>,
}

impl ChannelPrompt {
    /// Create a prompt and the receivers for the user interface
    pub fn new(buffer: usize) -> (Self, PromptReceivers) {
        let (request_sender, request_receiver) = mpsc::channel(buffer);
        let (event_sender, event_receiver) = mpsc::channel(buffer);
        (
            Self {
                requests: request_sender,
                events: event_sender,
            },
            PromptReceivers {
                requests: request_receiver,
                events: event_receiver,
            },
        )
    }

    async fn ask(&self, request: PromptRequest, receiver: oneshot::Receiver<Option<String>>) -> Option<String> {
        let kind = request.kind();
        debug!(%kind, "Requesting user code");
        if self.requests.send(request).await.is_err() {
            warn!(%kind, "Prompt receiver dropped, treating as cancelled");
            return None;
        }
        // A dropped reply sender is a cancellation
        receiver.await.ok().flatten()
    }
}

#[async_trait]
impl PromptService for ChannelPrompt {
    fn report_security_delay(&self, remaining_ms: u32) {
        if let Err(e) = self
            .events
            .try_send(PromptEvent::SecurityDelay { remaining_ms })
        {
            debug!(error = %e, "Dropped security delay notification");
        }
    }

    async fn request_primary_credential(&self) -> Option<String> {
        let (sender, receiver) = oneshot::channel();
        self.ask(PromptRequest::AccessCode(sender), receiver).await
    }

    async fn request_secondary_credential(&self) -> Option<String> {
        let (sender, receiver) = oneshot::channel();
        self.ask(PromptRequest::Passcode(sender), receiver).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_prompt_answers() {
        let (prompt, mut receivers) = ChannelPrompt::new(4);

        let ui = tokio::spawn(async move {
            let request = receivers.requests.recv().await.unwrap();
            assert_eq!(request.kind(), UserCodeKind::AccessCode);
            request.respond(Some("123456".to_string()));
            receivers
        });

        assert_eq!(
            prompt.request_primary_credential().await,
            Some("123456".to_string())
        );
        let mut receivers = ui.await.unwrap();

        prompt.report_security_delay(1500);
        assert_eq!(
            receivers.events.recv().await,
            Some(PromptEvent::SecurityDelay { remaining_ms: 1500 })
        );
    }

    #[tokio::test]
    async fn test_dropped_reply_is_cancellation() {
        let (prompt, mut receivers) = ChannelPrompt::new(1);

        let ui = tokio::spawn(async move {
            let request = receivers.requests.recv().await.unwrap();
            assert_eq!(request.kind(), UserCodeKind::Passcode);
            drop(request);
        });

        assert_eq!(prompt.request_secondary_credential().await, None);
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_channel_is_cancellation() {
        let (prompt, receivers) = ChannelPrompt::new(1);
        drop(receivers);
        assert_eq!(prompt.request_primary_credential().await, None);
        // Notifications never block even with nobody listening
        prompt.report_security_delay(100);
    }
}
