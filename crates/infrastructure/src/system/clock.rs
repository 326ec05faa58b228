use chrono::{DateTime, Utc};
use danse_application::ports::Clock;

/// Wall clock backing cache timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
