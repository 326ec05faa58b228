use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

pub const ANSWER_V4: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);
pub const ANSWER_V6: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
pub const ANSWER_TTL: u32 = 300;

pub fn query(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

/// A response to `query` with one A or AAAA answer per question.
pub fn answer(query: &Message) -> Message {
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true);

    for question in query.queries() {
        response.add_query(question.clone());
        let rdata = match question.query_type() {
            RecordType::AAAA => RData::AAAA(AAAA::from(ANSWER_V6)),
            _ => RData::A(A::from(ANSWER_V4)),
        };
        response.add_answer(Record::from_rdata(question.name().clone(), ANSWER_TTL, rdata));
    }
    response
}

/// Answers raw query bytes, or returns `None` for undecodable input.
pub fn answer_bytes(query_bytes: &[u8]) -> Option<Vec<u8>> {
    let query = Message::from_vec(query_bytes).ok()?;
    answer(&query).to_vec().ok()
}

/// A REFUSED reply to raw query bytes carrying only the ID, with no question section.
pub fn refused_bytes(query_bytes: &[u8]) -> Option<Vec<u8>> {
    let query = Message::from_vec(query_bytes).ok()?;
    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_response_code(ResponseCode::Refused);
    response.to_vec().ok()
}
