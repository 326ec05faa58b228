use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use std::str::FromStr;

pub fn query_for(id: u16, name: &str, record_type: RecordType) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

pub fn query_without_question(id: u16) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query);
    message
}

/// Response to `query` with one A record per TTL in `ttls`.
pub fn a_response(query: &Message, id: u16, ttls: &[u32]) -> Message {
    let mut response = Message::new();
    response
        .set_id(id)
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .set_recursion_available(true);

    if let Some(question) = query.queries().first() {
        response.add_query(question.clone());
        for (i, ttl) in ttls.iter().enumerate() {
            response.add_answer(Record::from_rdata(
                question.name().clone(),
                *ttl,
                RData::A(A::from(Ipv4Addr::new(192, 0, 2, i as u8 + 1))),
            ));
        }
    }
    response
}
