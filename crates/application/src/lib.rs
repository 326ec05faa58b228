//! danse application layer: ports, pure services and the query use case.
pub mod ports;
pub mod services;
pub mod use_cases;
