//! TTL arithmetic for cached responses.
//!
//! Cached messages keep the TTLs the upstream sent. The remaining lifetime is
//! derived at read time from the time elapsed since the entry was stored.

use chrono::{DateTime, Utc};
use hickory_proto::op::Message;
use std::time::Duration;

/// Smallest TTL among the answer records, zero when there are none.
pub fn min_ttl(response: &Message) -> Duration {
    response
        .answers()
        .iter()
        .map(|record| record.ttl())
        .min()
        .map(|ttl| Duration::from_secs(u64::from(ttl)))
        .unwrap_or(Duration::ZERO)
}

/// An entry expires once `min_ttl` has fully elapsed since it was stored.
pub fn is_expired(response: &Message, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    elapsed(created_at, now) >= min_ttl(response)
}

/// Copy of `response` whose answer TTLs count down from `created_at` to `now`,
/// rounded to the nearest second and floored at zero.
pub fn adjust_ttl(response: &Message, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Message {
    let elapsed_ms = elapsed(created_at, now).as_millis() as i128;
    let mut adjusted = response.clone();

    for record in adjusted.answers_mut().iter_mut() {
        let remaining_ms = i128::from(record.ttl()) * 1000 - elapsed_ms;
        record.set_ttl(round_to_secs(remaining_ms));
    }

    adjusted
}

fn elapsed(created_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    // A clock stepping backwards counts as no time elapsed.
    (now - created_at).to_std().unwrap_or(Duration::ZERO)
}

fn round_to_secs(remaining_ms: i128) -> u32 {
    if remaining_ms <= 0 {
        return 0;
    }
    ((remaining_ms + 500) / 1000).min(i128::from(u32::MAX)) as u32
}
