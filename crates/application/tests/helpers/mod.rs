#![allow(dead_code)]

mod messages;
mod mock_ports;

pub use messages::{a_response, query_for, query_without_question};
pub use mock_ports::{InMemoryResponseCache, MockClock, MockUpstreamClient};
