//! Named value translators.
//!
//! Grammar words annotated with `TRANSLATE_METHOD:<name>` run their captured
//! value through one of these methods. Each method is bidirectional: device
//! text to facts during extraction, facts to device text during synthesis.
//! An unknown method name or an unmapped value leaves the value unchanged.

use serde_json::Value;
use tracing::debug;

/// Which way a value is being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device text token into a fact value.
    ConfigToFacts,
    /// Fact value into a device text token.
    FactsToConfig,
}

/// Applies the named translator to `value`.
///
/// Returns `None` when the method is unknown or the value has no mapping;
/// callers keep the original value in that case.
pub fn translate(method: &str, direction: Direction, value: &Value) -> Option<Value> {
    match method {
        "bool_to_enable_disable" => bool_keyword(direction, value, "enable", "disable"),
        "bool_to_enabled_disabled" => bool_keyword(direction, value, "enabled", "disabled"),
        "bool_to_on_off" => bool_keyword(direction, value, "on", "off"),
        "lower_to_upper" => case_shift(direction, value),
        "translate_snmp_access" => snmp_access(direction, value),
        "translate_qos_ecn" => qos_ecn(direction, value),
        other => {
            debug!(method = other, "unknown translate method, value kept as-is");
            None
        }
    }
}

/// Boolean facts rendered as a keyword pair on the device.
fn bool_keyword(direction: Direction, value: &Value, on: &str, off: &str) -> Option<Value> {
    match direction {
        Direction::ConfigToFacts => match value.as_str()? {
            s if s == on => Some(Value::Bool(true)),
            s if s == off => Some(Value::Bool(false)),
            _ => None,
        },
        Direction::FactsToConfig => match truthy(value)? {
            true => Some(Value::String(on.to_string())),
            false => Some(Value::String(off.to_string())),
        },
    }
}

/// Facts hold the lowercase form, the device prints uppercase.
fn case_shift(direction: Direction, value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    let shifted = match direction {
        Direction::ConfigToFacts => s.to_lowercase(),
        Direction::FactsToConfig => s.to_uppercase(),
    };
    Some(Value::String(shifted))
}

/// SNMP community access: facts `RO`/`RW`, device `read-only`/`read-write`.
fn snmp_access(direction: Direction, value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    let mapped = match direction {
        Direction::ConfigToFacts => match s {
            "read-only" => "RO",
            "read-write" => "RW",
            _ => return None,
        },
        Direction::FactsToConfig => match s {
            "RO" => "read-only",
            "RW" => "read-write",
            _ => return None,
        },
    };
    Some(Value::String(mapped.to_string()))
}

/// QoS ECN color keywords carry an `ecn_` prefix on the facts side.
fn qos_ecn(direction: Direction, value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    let mapped = match direction {
        Direction::ConfigToFacts => format!("ecn_{s}"),
        Direction::FactsToConfig => s.strip_prefix("ecn_")?.to_string(),
    };
    Some(Value::String(mapped))
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enable_disable_round_trips() {
        let facts = translate(
            "bool_to_enable_disable",
            Direction::ConfigToFacts,
            &json!("enable"),
        );
        assert_eq!(facts, Some(Value::Bool(true)));

        let config = translate(
            "bool_to_enable_disable",
            Direction::FactsToConfig,
            &json!(false),
        );
        assert_eq!(config, Some(json!("disable")));
    }

    #[test]
    fn on_off_accepts_string_bools() {
        let config = translate("bool_to_on_off", Direction::FactsToConfig, &json!("true"));
        assert_eq!(config, Some(json!("on")));
    }

    #[test]
    fn lower_to_upper_shifts_case_both_ways() {
        assert_eq!(
            translate("lower_to_upper", Direction::ConfigToFacts, &json!("CS0")),
            Some(json!("cs0"))
        );
        assert_eq!(
            translate("lower_to_upper", Direction::FactsToConfig, &json!("cs0")),
            Some(json!("CS0"))
        );
    }

    #[test]
    fn snmp_access_maps_known_values_only() {
        assert_eq!(
            translate(
                "translate_snmp_access",
                Direction::ConfigToFacts,
                &json!("read-only")
            ),
            Some(json!("RO"))
        );
        assert_eq!(
            translate(
                "translate_snmp_access",
                Direction::FactsToConfig,
                &json!("RX")
            ),
            None
        );
    }

    #[test]
    fn qos_ecn_adds_and_strips_prefix() {
        assert_eq!(
            translate("translate_qos_ecn", Direction::ConfigToFacts, &json!("green")),
            Some(json!("ecn_green"))
        );
        assert_eq!(
            translate(
                "translate_qos_ecn",
                Direction::FactsToConfig,
                &json!("ecn_green")
            ),
            Some(json!("green"))
        );
    }

    #[test]
    fn unknown_method_returns_none() {
        assert_eq!(
            translate("no_such_method", Direction::ConfigToFacts, &json!("x")),
            None
        );
    }
}
