use hickory_proto::op::{Message, Query};
use std::fmt;
use std::sync::Arc;

/// Canonical text of a single question: lower-cased FQDN, record type and class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn from_query(query: &Query) -> Self {
        let mut name = query.name().to_lowercase().to_string();
        if !name.ends_with('.') {
            name.push('.');
        }
        Self(format!("{} {} {}", name, query.query_type(), query.query_class()).into())
    }

    /// Key of the first question, if the message carries one.
    pub fn for_message(message: &Message) -> Option<Self> {
        message.queries().first().map(Self::from_query)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
