//! Visitor identifiers of the form `<millis>.<entropy>.<random>`.

use std::sync::OnceLock;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;

/// Smallest timestamp accepted as the leading part of an ID (Sept 2001).
const MIN_TIMESTAMP_MS: i64 = 1_000_000_000_000;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Generate a fresh client ID.
///
/// The entropy part is the process uptime in microseconds, so two IDs minted
/// in the same millisecond by different processes still differ; the random
/// part is a base36 rendering of a random `u64`.
pub fn generate_client_id() -> String {
    let timestamp = Utc::now().timestamp_millis();
    let entropy = PROCESS_START.get_or_init(Instant::now).elapsed().as_micros();
    let random = to_base36(rand::thread_rng().gen::<u64>());
    format!("{timestamp}.{entropy}.{random}")
}

/// Loose shape check: at least two dot-separated parts, the first a
/// millisecond timestamp after 2001.
pub fn is_valid_client_id(client_id: &str) -> bool {
    let mut parts = client_id.split('.');
    let Some(first) = parts.next() else {
        return false;
    };
    if parts.next().is_none() {
        return false;
    }
    first
        .parse::<i64>()
        .is_ok_and(|timestamp| timestamp >= MIN_TIMESTAMP_MS)
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_three_parts() {
        let id = generate_client_id();
        let parts: Vec<&str> = id.split('.').collect();
        assert_eq!(parts.len(), 3, "{id}");
        assert!(parts[0].parse::<i64>().is_ok());
        assert!(parts[1].parse::<u128>().is_ok());
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert!(is_valid_client_id(&id));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(generate_client_id(), generate_client_id());
    }

    #[test]
    fn validation() {
        assert!(is_valid_client_id("1700000000000.123"));
        assert!(is_valid_client_id("1700000000000.123.abc"));
        assert!(!is_valid_client_id("1700000000000"));
        assert!(!is_valid_client_id("999999999999.1.a"));
        assert!(!is_valid_client_id("abc.def"));
        assert!(!is_valid_client_id(""));
    }

    #[test]
    fn base36_rendering() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(u64::MAX), "3w5e11264sgsf");
    }
}
