//! MAC address and fragment grammar.
//!
//! The same grammar gates write admission and fragment search: one to six
//! colon-separated 2-hex-digit octets, optionally with a bare leading or
//! trailing colon marking a fragment edge. A string qualifies only if it is
//! at least 3 and at most 17 characters, is never exactly 4 characters, and
//! either touches a colon at one end or is a full 17-character address.

use regex::Regex;
use std::sync::OnceLock;

/// Length of a full six-octet MAC address rendering.
const FULL_MAC_LEN: usize = 17;

fn octet_body() -> &'static Regex {
    static BODY: OnceLock<Regex> = OnceLock::new();
    BODY.get_or_init(|| {
        Regex::new(r"^:?[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2})*:?$").expect("static pattern compiles")
    })
}

/// Whether `raw` is a valid MAC address or MAC fragment.
pub fn is_valid_mac(raw: &str) -> bool {
    let len = raw.len();
    if !(3..=FULL_MAC_LEN).contains(&len) || len == 4 {
        return false;
    }
    if !(raw.starts_with(':') || raw.ends_with(':') || len == FULL_MAC_LEN) {
        return false;
    }
    octet_body().is_match(raw)
}
