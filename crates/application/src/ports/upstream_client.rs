use async_trait::async_trait;
use danse_domain::DomainError;
use hickory_proto::op::Message;

/// A secure upstream able to answer one DNS query.
///
/// Implementations must bound every attempt with a timeout and report failures of
/// the path to the upstream as transport errors, distinct from malformed messages.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn resolve(&self, query: &Message) -> Result<Message, DomainError>;

    fn protocol_name(&self) -> &'static str;
}
