use futures_util::StreamExt;
use log::{debug, warn};

use crate::{
    FolioRelay, RelayError,
    message::{Message, to_history},
    transcript::apply_delta,
};

/// A conversation with the chat relay.
///
/// The user's message is shown immediately. If the relay fails before any
/// reply text arrived, that message is taken back out again; text that did
/// arrive is never removed.
#[derive(Debug, Clone)]
pub struct ChatSession {
    relay: FolioRelay,
    messages: Vec<Message>,
}

impl ChatSession {
    /// Start an empty conversation
    pub fn new(relay: FolioRelay) -> Self {
        Self {
            relay,
            messages: Vec::new(),
        }
    }

    /// Resume a conversation
    pub fn with_messages(relay: FolioRelay, messages: Vec<Message>) -> Self {
        Self { relay, messages }
    }

    /// Transcript so far
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Take the transcript, e.g. to resume it later with [`ChatSession::with_messages`]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Forget the conversation
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Send `input` and stream the reply into the transcript.
    ///
    /// `on_update` sees the transcript after the optimistic append, after
    /// every delta, and after a rollback.
    pub async fn send<F>(&mut self, input: &str, mut on_update: F) -> Result<(), RelayError>
    where
        F: FnMut(&[Message]),
    {
        let input = input.trim();
        if input.is_empty() {
            return Err(RelayError::validation("message", "is empty"));
        }

        let rollback_len = self.messages.len();
        self.messages.push(Message::user(input));
        on_update(&self.messages);

        let history = to_history(&self.messages);
        let mut deltas = self.relay.stream_chat(&history);
        let mut received = 0usize;

        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(delta) => {
                    received += 1;
                    self.messages = apply_delta(std::mem::take(&mut self.messages), &delta);
                    on_update(&self.messages);
                }
                Err(err) => {
                    if received == 0 {
                        warn!("Chat request failed, removing unsent message: {err}");
                        self.messages.truncate(rollback_len);
                        on_update(&self.messages);
                    } else {
                        warn!("Chat stream failed after {received} deltas: {err}");
                    }
                    return Err(err);
                }
            }
        }

        debug!("Reply finished after {received} deltas");
        Ok(())
    }
}
