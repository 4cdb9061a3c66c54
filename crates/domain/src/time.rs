//! Time and timestamp helpers.

use chrono::Utc;

/// Milliseconds since the Unix epoch, used for `updated_at`, TTLs and guard windows.
pub type Millis = i64;

/// Return the current UTC time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

/// Whether a write stamped at `updated_at` with the given TTL has expired at `now`.
///
/// A variable is logically gone once strictly more than `ttl` milliseconds
/// have elapsed; at exactly `ttl` it is still visible.
#[must_use]
pub fn is_expired(updated_at: Millis, ttl: Option<Millis>, now: Millis) -> bool {
    ttl.is_some_and(|ttl| now.saturating_sub(updated_at) > ttl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now().timestamp_millis();
        let ts = now_millis();
        let after = Utc::now().timestamp_millis();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_never_expire_without_ttl() {
        assert!(!is_expired(0, None, i64::MAX));
    }

    #[test]
    fn should_expire_only_after_ttl_elapsed() {
        assert!(!is_expired(1_000, Some(100), 1_050));
        assert!(!is_expired(1_000, Some(100), 1_100));
        assert!(is_expired(1_000, Some(100), 1_101));
        assert!(is_expired(1_000, Some(100), 1_150));
    }
}
