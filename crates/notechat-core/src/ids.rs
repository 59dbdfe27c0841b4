//! Identifier generation for chats, notes and attachments.
//!
//! An id is a base-36 millisecond timestamp followed by a random suffix.
//! The time component never goes backwards within a process, so two ids
//! generated in the same millisecond still differ in their prefix.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::{distributions::Alphanumeric, Rng};

const SUFFIX_LEN: usize = 8;

static LAST_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique identifier.
pub fn new_id() -> String {
    let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let millis = next_millis(now);

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("{}{}", to_base36(millis), suffix)
}

/// Returns `now`, or one past the last issued value if the clock hasn't moved.
fn next_millis(now: u64) -> u64 {
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_MILLIS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// True if `id` is safe to use as a single path component.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn ids_are_path_safe() {
        for _ in 0..100 {
            assert!(is_valid_id(&new_id()));
        }
    }

    #[test]
    fn time_component_is_monotonic() {
        let a = next_millis(5);
        let b = next_millis(5);
        assert!(b > a);
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn rejects_path_components() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id("a/b"));
        assert!(is_valid_id("1700000000000"));
    }
}
