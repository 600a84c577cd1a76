pub mod telegram;

/// A message received from the chat platform, normalized for the relay
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform-specific chat ID as string
    pub chat_id: String,
    /// The message text
    pub text: String,
}

/// The reply to send back to the originating chat
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingReply {
    pub chat_id: String,
    pub text: String,
}
