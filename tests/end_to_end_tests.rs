//! End-to-end pipeline tests for Cliconf
//!
//! These tests drive the full pipeline against one "campus switch" grammar:
//! - Grammar compilation (flat lists, mode blocks, submodes, grouped lists)
//! - Fact extraction from `show running-config` text
//! - Command synthesis for all four states
//! - Idempotence: a device that already matches want emits nothing
//! - Rebuild: synthesizing against an empty device reproduces the config

use serde_json::{json, Value};

use cliconf::prelude::*;

// ============================================================================
// Fixtures
// ============================================================================

/// One grammar covering every node shape: a flat keyed list (vlans), a mode
/// block with a submode (interface/switchport), and a grouped list (ntp).
const CAMPUS_GRAMMAR: &str = r#"
vlans:
  subcommands:
    - "vlan=LIST:vlan&KEYS:$id $id=NAME:name mtu $m=NAME:mtu&OPTIONAL"
interface:
  command: "interface=LIST:interfaces&KEYS:$name Ethernet $name=NAME:name"
  subcommands:
    - "mtu $m=NAME:mtu"
    - "shutdown=NAME:shutdown&VALUE:true&NEGATE_CMD:ALLOW"
  switchport:
    command: "switchport=NAME:switchport"
    subcommands:
      - "access vlan $v=NAME:access_vlan"
ntp:
  subcommands:
    - "ntp=LIST_GROUP:servers&KEYS:$host server $host=NAME:host ver $v=NAME:version&OPTIONAL"
    - "ntp=LIST_GROUP:servers&KEYS:$host server $host=NAME:host prefer=NAME:prefer&VALUE:true&OPTIONAL"
"#;

const RUNNING_CONFIG: &str = "\
!
vlan 10 mtu 1500
vlan 20
!
interface Ethernet 0
 mtu 1500
 shutdown
 switchport
  access vlan 10
!
interface Ethernet 4
 mtu 9100
!
ntp server 10.0.0.1 ver 4
";

fn campus_tree() -> Tree {
    let grammar = Grammar::from_yaml_str(CAMPUS_GRAMMAR).unwrap();
    compile(&grammar).unwrap()
}

fn campus_facts(device: &str) -> (Tree, Value) {
    let tree = campus_tree();
    let facts = extract(&tree, &DeviceConfig::parse(device)).unwrap();
    (tree, facts)
}

fn run(want: Value, device: &str, state: State) -> Vec<String> {
    let (tree, have) = campus_facts(device);
    synthesize(&tree, &want, &have, state).unwrap()
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn extraction_reads_the_whole_device() {
    let (_, facts) = campus_facts(RUNNING_CONFIG);
    assert_eq!(
        facts,
        json!({
            "vlan": [
                {"name": "10", "mtu": 1500},
                {"name": "20"},
            ],
            "interfaces": [
                {
                    "name": "0",
                    "mtu": 1500,
                    "shutdown": true,
                    "switchport": {"access": {"access_vlan": 10}},
                },
                {"name": "4", "mtu": 9100},
            ],
            "servers": [
                {"host": "10.0.0.1", "version": 4},
            ],
        })
    );
}

#[test]
fn extraction_of_empty_text_is_an_empty_document() {
    let (_, facts) = campus_facts("");
    assert_eq!(facts, json!({}));
}

// ============================================================================
// Convergence and idempotence
// ============================================================================

#[test]
fn matching_documents_emit_nothing() {
    let (tree, have) = campus_facts(RUNNING_CONFIG);
    for state in [State::Merged, State::Replaced, State::Overridden] {
        let out = synthesize(&tree, &have, &have, state).unwrap();
        assert!(out.is_empty(), "{state} emitted {out:?} on equal documents");
    }
}

#[test]
fn merged_touches_only_what_differs() {
    let out = run(
        json!({
            "vlan": [{"name": "10", "mtu": 9000}],
            "interfaces": [{"name": "0", "shutdown": false}],
        }),
        RUNNING_CONFIG,
        State::Merged,
    );
    assert_eq!(
        out,
        vec![
            "vlan 10 mtu 9000".to_string(),
            "interface Ethernet 0".to_string(),
            "no shutdown".to_string(),
        ]
    );
}

#[test]
fn merged_enters_the_submode_chain() {
    let out = run(
        json!({
            "interfaces": [{"name": "0", "switchport": {"access": {"access_vlan": 20}}}],
        }),
        RUNNING_CONFIG,
        State::Merged,
    );
    assert_eq!(
        out,
        vec![
            "interface Ethernet 0".to_string(),
            "switchport".to_string(),
            "access vlan 20".to_string(),
        ]
    );
}

#[test]
fn rebuild_from_an_empty_device_reproduces_the_config() {
    let (tree, want) = campus_facts(RUNNING_CONFIG);
    let have = extract(&tree, &DeviceConfig::parse("")).unwrap();
    let out = synthesize(&tree, &want, &have, State::Merged).unwrap();
    assert_eq!(
        out,
        vec![
            "vlan 10 mtu 1500".to_string(),
            "vlan 20".to_string(),
            "interface Ethernet 0".to_string(),
            "mtu 1500".to_string(),
            "shutdown".to_string(),
            "switchport".to_string(),
            "access vlan 10".to_string(),
            "interface Ethernet 4".to_string(),
            "mtu 9100".to_string(),
            "ntp server 10.0.0.1 ver 4".to_string(),
        ]
    );
}

// ============================================================================
// Grouped lists
// ============================================================================

#[test]
fn group_merge_emits_one_command_per_populated_field() {
    let out = run(
        json!({"servers": [{"host": "10.0.0.1", "version": 5, "prefer": true}]}),
        RUNNING_CONFIG,
        State::Merged,
    );
    assert_eq!(
        out,
        vec![
            "ntp server 10.0.0.1 ver 5".to_string(),
            "ntp server 10.0.0.1 prefer".to_string(),
        ]
    );
}

#[test]
fn group_delete_restates_device_values() {
    let out = run(
        json!({"servers": [{"host": "10.0.0.1"}]}),
        RUNNING_CONFIG,
        State::Deleted,
    );
    assert_eq!(out, vec!["no ntp server 10.0.0.1 ver 4".to_string()]);
}

// ============================================================================
// Deleted, replaced, overridden
// ============================================================================

#[test]
fn deleted_removes_a_whole_interface() {
    let out = run(
        json!({"interfaces": [{"name": "4"}]}),
        RUNNING_CONFIG,
        State::Deleted,
    );
    assert_eq!(out, vec!["no interface Ethernet 4".to_string()]);
}

#[test]
fn replaced_rewrites_only_named_entries() {
    let out = run(
        json!({"vlan": [{"name": "10", "mtu": 9000}]}),
        RUNNING_CONFIG,
        State::Replaced,
    );
    assert_eq!(
        out,
        vec![
            "no vlan 10 mtu 1500".to_string(),
            "vlan 10 mtu 9000".to_string(),
        ]
    );
}

#[test]
fn overridden_removes_entries_want_never_names() {
    let (tree, have) = campus_facts(RUNNING_CONFIG);
    // Keep the interfaces and ntp servers as they are; rewrite the vlans.
    let mut want = have.clone();
    want["vlan"] = json!([{"name": "10", "mtu": 9000}]);

    let out = synthesize(&tree, &want, &have, State::Overridden).unwrap();
    assert_eq!(
        out,
        vec![
            "no vlan 10 mtu 1500".to_string(),
            "no vlan 20".to_string(),
            "vlan 10 mtu 9000".to_string(),
        ]
    );
}
