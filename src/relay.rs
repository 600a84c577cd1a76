use std::sync::Arc;

use tracing::error;

use crate::llm::{CompletionClient, CompletionRequest};
use crate::platform::{IncomingMessage, OutgoingReply};

const START_GREETING: &str = "Hi! I'm your ChatGPT bot 🤖. Send me a message!";

const EMPTY_TEXT_REPLY: &str = "Send me some text and I'll ask the model about it.";

/// Fixed reply for a recognized bot command, if any.
pub fn command_reply(text: &str) -> Option<&'static str> {
    match text {
        "/start" => Some(START_GREETING),
        _ => None,
    }
}

/// The core relay: one incoming message in, exactly one reply out.
/// Platform-agnostic — receives IncomingMessage, returns OutgoingReply.
pub struct Relay {
    llm: Arc<dyn CompletionClient>,
    model: String,
}

impl Relay {
    pub fn new(llm: Arc<dyn CompletionClient>, model: String) -> Self {
        Self { llm, model }
    }

    /// Relay one message through the completion provider. Always produces a
    /// reply: completion failures become a diagnostic reply, never silence.
    pub async fn handle(&self, incoming: &IncomingMessage) -> OutgoingReply {
        let chat_id = incoming.chat_id.clone();

        // Commands never reach the completion provider.
        if let Some(reply) = command_reply(&incoming.text) {
            return OutgoingReply {
                chat_id,
                text: reply.to_string(),
            };
        }

        if incoming.text.trim().is_empty() {
            return OutgoingReply {
                chat_id,
                text: EMPTY_TEXT_REPLY.to_string(),
            };
        }

        let request = CompletionRequest::single_turn(&self.model, &incoming.text);

        let text = match self.llm.complete(&request).await {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!("Completion failed for chat {}: {}", chat_id, e);
                format!("⚠️ Error: {}", e)
            }
        };

        OutgoingReply { chat_id, text }
    }
}
