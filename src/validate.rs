//! Named value validators.
//!
//! Grammar words annotated with `VALUE_CHECK_METHOD:<name>` only capture a
//! token when the named check accepts it; otherwise the word is skipped and
//! the token is left for the next candidate. A leading `!` on the method
//! name negates the check.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static MAC_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    // Pairs separated consistently by `:`, `-` or nothing at all.
    Regex::new(r"^(?:(?:[0-9a-f]{2}:){5}|(?:[0-9a-f]{2}-){5}|(?:[0-9a-f]{2}){5})[0-9a-f]{2}$")
        .unwrap_or_else(|e| panic!("invalid MAC address pattern: {e}"))
});

const INTERFACE_PREFIXES: &[&str] = &[
    "Ethernet",
    "PortChannel",
    "Vlan",
    "Loopback",
    "Management",
    "Tunnel",
    "vxlan",
];

/// Runs the named check against a candidate token.
///
/// Unknown method names accept everything, so a grammar referencing a check
/// this build does not know degrades to an unvalidated capture.
pub fn check(method: &str, value: &str) -> bool {
    let (name, negate) = match method.strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (method, false),
    };

    let accepted = match name {
        "bool" => matches!(value.to_ascii_lowercase().as_str(), "true" | "false"),
        "integer" => value.parse::<i64>().is_ok(),
        "interface" => INTERFACE_PREFIXES
            .iter()
            .any(|prefix| value.starts_with(prefix)),
        "macaddress" => MAC_ADDRESS.is_match(&value.to_ascii_lowercase()),
        other => {
            warn!(method = other, "unknown value check method, accepting value");
            true
        }
    };

    accepted != negate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_check() {
        assert!(check("bool", "true"));
        assert!(check("bool", "False"));
        assert!(!check("bool", "maybe"));
    }

    #[test]
    fn integer_check() {
        assert!(check("integer", "42"));
        assert!(check("integer", "-7"));
        assert!(!check("integer", "4.2"));
        assert!(!check("integer", "ten"));
    }

    #[test]
    fn interface_check_knows_platform_prefixes() {
        assert!(check("interface", "Ethernet0"));
        assert!(check("interface", "PortChannel10"));
        assert!(check("interface", "vxlan"));
        assert!(!check("interface", "eth0"));
    }

    #[test]
    fn macaddress_check_accepts_common_separators() {
        assert!(check("macaddress", "00:11:22:aa:bb:cc"));
        assert!(check("macaddress", "00-11-22-AA-BB-CC"));
        assert!(check("macaddress", "001122aabbcc"));
        assert!(!check("macaddress", "00:11:22:aa:bb"));
        assert!(!check("macaddress", "00:11-22:aa:bb:cc"));
    }

    #[test]
    fn bang_negates_the_result() {
        assert!(check("!integer", "Ethernet0"));
        assert!(!check("!integer", "42"));
    }

    #[test]
    fn unknown_method_accepts() {
        assert!(check("shinynew", "anything"));
        assert!(!check("!shinynew", "anything"));
    }
}
