use crate::error::ProtocolError;

/// A frame received from or destined for the WebSocket
/// Can be Text or Binary data
#[derive(Debug, Clone, PartialEq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }
}

/// Trait for turning raw frames into typed protocol messages
///
/// Parsing is synchronous and runs on the session's single execution
/// context, so messages are handled strictly in delivery order.
pub trait MessageParser: Send + Sync {
    /// The parsed message type
    type Message: Send + std::fmt::Debug;

    /// Parse a received WebSocket frame
    ///
    /// # Returns
    /// * `Ok(message)` - Frame parsed successfully
    /// * `Err(ProtocolError)` - Frame is malformed and must be dropped
    fn parse(&self, message: &WsMessage) -> Result<Self::Message, ProtocolError>;
}
