//! Grammar annotation feature tests
//!
//! Each test drives one annotation keyword through the full pipeline: a
//! small grammar, extraction from device text, and synthesis back into
//! commands. The campus-wide scenarios live in `end_to_end_tests.rs`; this
//! suite pins down the behaviour of the individual annotations.

use serde_json::{json, Value};

use cliconf::prelude::*;

// ============================================================================
// Helpers
// ============================================================================

fn extracted(grammar: &str, device: &str) -> Value {
    let tree = compile(&Grammar::from_yaml_str(grammar).unwrap()).unwrap();
    extract(&tree, &DeviceConfig::parse(device)).unwrap()
}

fn pipeline(grammar: &str, want: Value, device: &str, state: State) -> Vec<String> {
    let tree = compile(&Grammar::from_yaml_str(grammar).unwrap()).unwrap();
    let have = extract(&tree, &DeviceConfig::parse(device)).unwrap();
    synthesize(&tree, &want, &have, state).unwrap()
}

// ============================================================================
// EXIT_CMD
// ============================================================================

const EXIT_GRAMMAR: &str = r#"
interface:
  command: "interface=LIST:interfaces&KEYS:$name&EXIT_CMD:exit Ethernet $name=NAME:name"
  subcommands:
    - "mtu $m=NAME:mtu"
"#;

#[test]
fn exit_command_closes_a_populated_mode_block() {
    let out = pipeline(
        EXIT_GRAMMAR,
        json!({"interfaces": [{"name": "0", "mtu": 9000}]}),
        "interface Ethernet 0\n mtu 1500\n",
        State::Merged,
    );
    assert_eq!(
        out,
        vec![
            "interface Ethernet 0".to_string(),
            "mtu 9000".to_string(),
            "exit".to_string(),
        ]
    );
}

#[test]
fn exit_command_is_withheld_when_the_block_stays_untouched() {
    let out = pipeline(
        EXIT_GRAMMAR,
        json!({"interfaces": [{"name": "0", "mtu": 1500}]}),
        "interface Ethernet 0\n mtu 1500\n",
        State::Merged,
    );
    assert!(out.is_empty(), "untouched block emitted {out:?}");
}

// ============================================================================
// MERGE_AS_REPLACE
// ============================================================================

const SPEED_MTU_GRAMMAR: &str = r#"
interface:
  command: "interface=LIST:interfaces&KEYS:$name Ethernet $name=NAME:name"
  subcommands:
    - "speed $s=NAME:speed&MERGE_AS_REPLACE"
    - "mtu $m=NAME:mtu"
"#;

#[test]
fn merge_as_replace_skips_the_delete_half_of_a_rewrite() {
    let out = pipeline(
        SPEED_MTU_GRAMMAR,
        json!({"interfaces": [{"name": "0", "speed": 25000, "mtu": 9000}]}),
        "interface Ethernet 0\n speed 10000\n mtu 1500\n",
        State::Replaced,
    );
    // The annotated field is rewritten in place; the plain field is
    // negated first the way replace normally works.
    assert_eq!(
        out,
        vec![
            "interface Ethernet 0".to_string(),
            "speed 25000".to_string(),
            "no mtu 1500".to_string(),
            "mtu 9000".to_string(),
        ]
    );
}

// ============================================================================
// IGN_VAL_FOR_DEL
// ============================================================================

const DESCRIPTION_GRAMMAR: &str = r#"
vlans:
  subcommands:
    - "vlan=LIST:vlan&KEYS:$id $id=NAME:name desc $d=NAME:description&IGN_VAL_FOR_DEL"
"#;

#[test]
fn value_is_left_out_of_the_negated_form() {
    let out = pipeline(
        DESCRIPTION_GRAMMAR,
        json!({"vlan": [{"name": "10", "description": "office"}]}),
        "vlan 10 desc office\n",
        State::Deleted,
    );
    assert_eq!(out, vec!["no vlan 10 desc".to_string()]);
}

#[test]
fn value_still_appears_on_the_merge_side() {
    let out = pipeline(
        DESCRIPTION_GRAMMAR,
        json!({"vlan": [{"name": "10", "description": "office"}]}),
        "",
        State::Merged,
    );
    assert_eq!(out, vec!["vlan 10 desc office".to_string()]);
}

// ============================================================================
// IGN_WORD_FOR_DEL
// ============================================================================

const NAME_SERVER_GRAMMAR: &str = r#"
dns:
  subcommands:
    - "ip=LIST:name_servers&KEYS:$addr name-server=IGN_WORD_FOR_DEL $addr=NAME:address"
"#;

#[test]
fn fixed_word_is_left_out_of_the_negated_form() {
    let facts = extracted(NAME_SERVER_GRAMMAR, "ip name-server 10.0.0.53\n");
    assert_eq!(facts, json!({"name_servers": [{"address": "10.0.0.53"}]}));

    let out = pipeline(
        NAME_SERVER_GRAMMAR,
        json!({"name_servers": [{"address": "10.0.0.53"}]}),
        "ip name-server 10.0.0.53\n",
        State::Deleted,
    );
    assert_eq!(out, vec!["no ip 10.0.0.53".to_string()]);

    let out = pipeline(
        NAME_SERVER_GRAMMAR,
        json!({"name_servers": [{"address": "10.0.0.53"}]}),
        "",
        State::Merged,
    );
    assert_eq!(out, vec!["ip name-server 10.0.0.53".to_string()]);
}

// ============================================================================
// PARENT_NAME
// ============================================================================

const ACL_GRAMMAR: &str = r#"
acl:
  subcommands:
    - "access-list=LIST:rules&KEYS:$seq $seq=NAME:seq action $a=NAME:action remark $r=NAME:remark&PARENT_NAME:action"
"#;

#[test]
fn reparented_word_rides_on_its_named_parent() {
    let facts = extracted(ACL_GRAMMAR, "access-list 10 action permit remark allow-web\n");
    assert_eq!(
        facts,
        json!({"rules": [{"seq": "10", "action": "permit", "remark": "allow-web"}]})
    );

    let out = pipeline(
        ACL_GRAMMAR,
        json!({"rules": [{"seq": "10", "action": "permit", "remark": "allow-web"}]}),
        "",
        State::Merged,
    );
    assert_eq!(
        out,
        vec!["access-list 10 action permit remark allow-web".to_string()]
    );
}

// ============================================================================
// IF_PARENT_VAL
// ============================================================================

const SPEED_GRAMMAR: &str = r#"
port:
  subcommands:
    - "speed $s=NAME:speed duplex $d=NAME:duplex&IF_PARENT_VAL:auto"
"#;

#[test]
fn parent_value_guard_gates_the_dependent_word() {
    let facts = extracted(SPEED_GRAMMAR, "speed auto duplex full\n");
    assert_eq!(facts, json!({"speed": "auto", "duplex": "full"}));

    // A different parent value drops the guarded tail.
    let facts = extracted(SPEED_GRAMMAR, "speed 1000 duplex full\n");
    assert_eq!(facts, json!({"speed": 1000}));

    let out = pipeline(
        SPEED_GRAMMAR,
        json!({"speed": "auto", "duplex": "full"}),
        "",
        State::Merged,
    );
    assert_eq!(out, vec!["speed auto duplex full".to_string()]);
}

// ============================================================================
// IF_FACTS_PRESENT
// ============================================================================

const MTU_PAIR_GRAMMAR: &str = r#"
vlans:
  subcommands:
    - "vlan=LIST:vlan&KEYS:$id $id=NAME:name mtu $m=NAME:mtu ip-mtu $j=NAME:ip_mtu&IF_FACTS_PRESENT:mtu"
"#;

#[test]
fn facts_presence_guard_gates_extraction() {
    let facts = extracted(MTU_PAIR_GRAMMAR, "vlan 10 mtu 9000 ip-mtu 9000\n");
    assert_eq!(
        facts,
        json!({"vlan": [{"name": "10", "mtu": 9000, "ip_mtu": 9000}]})
    );

    // Without the prerequisite field the guarded word never captures.
    let facts = extracted(MTU_PAIR_GRAMMAR, "vlan 10 ip-mtu 9000\n");
    assert_eq!(facts, json!({"vlan": [{"name": "10"}]}));
}

#[test]
fn facts_presence_guard_gates_synthesis() {
    let out = pipeline(
        MTU_PAIR_GRAMMAR,
        json!({"vlan": [{"name": "10", "mtu": 9000, "ip_mtu": 9000}]}),
        "",
        State::Merged,
    );
    assert_eq!(out, vec!["vlan 10 mtu 9000 ip-mtu 9000".to_string()]);

    let out = pipeline(
        MTU_PAIR_GRAMMAR,
        json!({"vlan": [{"name": "10", "ip_mtu": 9000}]}),
        "",
        State::Merged,
    );
    assert_eq!(out, vec!["vlan 10".to_string()]);
}

// ============================================================================
// TRANSLATE_METHOD
// ============================================================================

const RELAY_GRAMMAR: &str = r#"
features:
  subcommands:
    - "dhcp-relay $s=NAME:dhcp_relay&TRANSLATE_METHOD:bool_to_enable_disable"
"#;

#[test]
fn translation_runs_in_both_directions() {
    let facts = extracted(RELAY_GRAMMAR, "dhcp-relay enable\n");
    assert_eq!(facts, json!({"dhcp_relay": true}));

    let out = pipeline(
        RELAY_GRAMMAR,
        json!({"dhcp_relay": false}),
        "dhcp-relay enable\n",
        State::Merged,
    );
    assert_eq!(out, vec!["dhcp-relay disable".to_string()]);
}

// ============================================================================
// INTERFACE_PARAM
// ============================================================================

const MIRROR_GRAMMAR: &str = r#"
mirror:
  subcommands:
    - "monitor-port $p=NAME:monitor_port&INTERFACE_PARAM"
"#;

#[test]
fn interface_reference_joins_and_splits_across_directions() {
    let facts = extracted(MIRROR_GRAMMAR, "monitor-port Ethernet 4\n");
    assert_eq!(facts, json!({"monitor_port": "Ethernet4"}));

    let out = pipeline(
        MIRROR_GRAMMAR,
        json!({"monitor_port": "Ethernet4"}),
        "",
        State::Merged,
    );
    assert_eq!(out, vec!["monitor-port Ethernet 4".to_string()]);
}

// ============================================================================
// INTERFACE_LIST
// ============================================================================

const PHYS_INTERFACE_GRAMMAR: &str = r#"
interface:
  command: "interface=INTERFACE_LIST&LIST:interfaces&KEYS:$id Ethernet $id=NAME:name"
  subcommands:
    - "mtu $m=NAME:mtu"
"#;

const VTEP_GRAMMAR: &str = r#"
vtep:
  command: "interface=INTERFACE_LIST&LIST:vteps&KEYS:$id vxlan $id=NAME:name"
  subcommands:
    - "source-ip $i=NAME:source_ip"
"#;

#[test]
fn interface_list_key_round_trips_through_both_directions() {
    let out = pipeline(
        PHYS_INTERFACE_GRAMMAR,
        json!({"interfaces": [{"name": "Ethernet4", "mtu": 9000}]}),
        "interface Ethernet 4\n mtu 9100\n",
        State::Merged,
    );
    assert_eq!(
        out,
        vec!["interface Ethernet 4".to_string(), "mtu 9000".to_string()]
    );
}

#[test]
fn physical_interface_blocks_delete_fields_not_the_block() {
    let out = pipeline(
        PHYS_INTERFACE_GRAMMAR,
        json!({"interfaces": [{"name": "Ethernet4"}]}),
        "interface Ethernet 4\n mtu 9100\n",
        State::Deleted,
    );
    // A port cannot be negated away, so the delete recurses into the block.
    assert_eq!(
        out,
        vec!["interface Ethernet 4".to_string(), "no mtu 9100".to_string()]
    );
}

#[test]
fn vxlan_endpoints_keep_their_vtep_name_whole() {
    let facts = extracted(VTEP_GRAMMAR, "interface vxlan vtep1\n source-ip 1.1.1.1\n");
    assert_eq!(
        facts,
        json!({"vteps": [{"name": "vtep1", "source_ip": "1.1.1.1"}]})
    );

    let out = pipeline(
        VTEP_GRAMMAR,
        json!({"vteps": [{"name": "vtep1", "source_ip": "1.1.1.1"}]}),
        "",
        State::Merged,
    );
    assert_eq!(
        out,
        vec![
            "interface vxlan vtep1".to_string(),
            "source-ip 1.1.1.1".to_string(),
        ]
    );
}
