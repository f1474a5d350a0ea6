//! # Identifiers and Clock
//!
//! Every ledger row carries a UUID v4 id and an `updated_at` millisecond
//! stamp. Sync uses `updated_at` for last-write-wins and to detect a row that
//! changed while its upload was in flight, so two writes in the same process
//! must never share a stamp, even when the wall clock stalls or steps back.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Last stamp handed out by [`now_millis`].
static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Generates a new collision-resistant record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns a strictly increasing millisecond timestamp.
///
/// Follows the wall clock; if the wall clock has not advanced (or went
/// backwards) since the previous call, returns previous + 1.
pub fn now_millis() -> i64 {
    let wall = Utc::now().timestamp_millis();
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = if wall > last { wall } else { last + 1 };
        match LAST_MILLIS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Converts a millisecond stamp back into a UTC datetime for display.
pub fn to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_strictly_increasing() {
        let mut previous = now_millis();
        for _ in 0..10_000 {
            let next = now_millis();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_new_id_is_uuid() {
        let id = new_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, new_id());
    }

    #[test]
    fn test_to_datetime() {
        let dt = to_datetime(0).unwrap();
        assert_eq!(dt.timestamp(), 0);
    }
}
