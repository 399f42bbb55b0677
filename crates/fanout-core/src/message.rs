//! Message type for Fanout.
//!
//! A message is published once and shared by every subscriber that receives
//! it, so the hub hands it around as `Arc<Message>`.

use bytes::Bytes;

/// An opaque, read-only payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
}

impl Message {
    /// Create a new message.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Get the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Get the payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

impl From<Bytes> for Message {
    fn from(payload: Bytes) -> Self {
        Self::new(payload)
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<&'static str> for Message {
    fn from(payload: &'static str) -> Self {
        Self::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_message_creation() {
        let msg = Message::new(b"hello".to_vec());
        assert_eq!(&msg.payload()[..], b"hello");
        assert_eq!(msg.payload_size(), 5);
    }

    #[test]
    fn test_message_shared_payload() {
        let msg = Arc::new(Message::from("test01"));
        let other = Arc::clone(&msg);
        assert_eq!(other.payload(), &Bytes::from_static(b"test01"));
        assert_eq!(Arc::strong_count(&msg), 2);
    }
}
