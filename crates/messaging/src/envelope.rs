use crate::carrier::MessageHeaders;

/// A message as delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub topic: String,
    /// Routing key. Empty when the producer sent none.
    pub key: String,
    pub value: Vec<u8>,
    pub headers: MessageHeaders,
    pub partition: i32,
    pub offset: i64,
}

/// A message ready to be written. Partition and offset are assigned by the
/// broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub key: String,
    pub value: Vec<u8>,
    pub headers: MessageHeaders,
}

impl OutgoingMessage {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
            headers: MessageHeaders::new(),
        }
    }

    pub fn with_headers(mut self, headers: MessageHeaders) -> Self {
        self.headers = headers;
        self
    }
}

impl From<&Envelope> for OutgoingMessage {
    fn from(envelope: &Envelope) -> Self {
        Self {
            key: envelope.key.clone(),
            value: envelope.value.clone(),
            headers: envelope.headers.clone(),
        }
    }
}
