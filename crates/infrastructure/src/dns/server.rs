use crate::dns::forwarding::MessageBuilder;
use danse_application::use_cases::HandleDnsQueryUseCase;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decodes raw DNS requests from the listeners and encodes the replies.
pub struct DnsServerHandler {
    use_case: Arc<HandleDnsQueryUseCase>,
}

impl DnsServerHandler {
    pub fn new(use_case: Arc<HandleDnsQueryUseCase>) -> Self {
        Self { use_case }
    }

    /// Returns the encoded reply, or `None` when nothing should be sent back.
    pub async fn handle_raw(&self, request: &[u8]) -> Option<Vec<u8>> {
        let query = match MessageBuilder::decode(request) {
            Ok(query) => query,
            Err(e) => {
                debug!(error = %e, bytes = request.len(), "Dropping undecodable request");
                return None;
            }
        };

        let response = match self.use_case.execute(&query).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                debug!(id = query.id(), "Request without question, no reply");
                return None;
            }
            Err(e) => {
                let name = query
                    .queries()
                    .first()
                    .map(|q| q.name().to_string())
                    .unwrap_or_default();
                warn!(domain = %name, id = query.id(), error = %e, "Query resolution failed");
                return None;
            }
        };

        match MessageBuilder::encode(&response) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "Failed to encode response");
                None
            }
        }
    }
}
