//! DNS message construction and wire (de)serialization via `hickory-proto`.

use danse_domain::DomainError;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};

/// Builds and (de)serializes DNS messages
pub struct MessageBuilder;

impl MessageBuilder {
    /// Recursive query for `name` with a random transaction ID and a single question.
    pub fn build_query(name: Name, record_type: RecordType) -> Message {
        let mut message = Message::new();
        message
            .set_id(fastrand::u16(..))
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(name, record_type));
        message
    }

    pub fn encode(message: &Message) -> Result<Vec<u8>, DomainError> {
        message
            .to_vec()
            .map_err(|e| DomainError::InvalidDnsMessage(format!("Failed to serialize: {}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, DomainError> {
        Message::from_vec(bytes)
            .map_err(|e| DomainError::InvalidDnsMessage(format!("Failed to parse: {}", e)))
    }
}
