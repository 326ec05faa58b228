//! danse infrastructure layer: upstream transports, caches and the DNS server handler.
pub mod dns;
pub mod system;
