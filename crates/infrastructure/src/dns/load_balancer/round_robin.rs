use danse_domain::DomainError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed, ordered upstream endpoints shared by all callers of one client.
///
/// The only way to pick an endpoint is [`EndpointSet::next`], which reads the
/// cursor and advances it in one atomic step, so concurrent callers rotate
/// fairly and never observe the same pre-increment position.
pub struct EndpointSet<T> {
    endpoints: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> EndpointSet<T> {
    pub fn new(endpoints: Vec<T>) -> Result<Self, DomainError> {
        if endpoints.is_empty() {
            return Err(DomainError::InvalidEndpoint(
                "No upstream servers configured".into(),
            ));
        }
        Ok(Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Selects the endpoint under the cursor and advances it, wrapping at the end.
    pub fn next(&self) -> &T {
        let len = self.endpoints.len();
        let index = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        };
        &self.endpoints[index]
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
