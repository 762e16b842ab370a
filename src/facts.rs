//! Fact extraction.
//!
//! Walks the compiled tree over parsed device text and builds a fact
//! document. Mode blocks are matched by their entry command prefix on token
//! boundaries; inside a block, childless lines dispatch to subcommands and
//! nested blocks dispatch to submodes.
//!
//! A line that matches no node, or trailing words no child consumes, are
//! dropped with a warning; structural mismatch is not an error.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::device::{starts_with_token, Block, DeviceConfig};
use crate::error::Result;
use crate::grammar::annotation::NextValueGuard;
use crate::paths::scalar_text;
use crate::translate::{translate, Direction};
use crate::tree::{NodeId, NodeKind, Tree};
use crate::validate;

/// The interface type whose list keys keep their device spelling.
pub(crate) const VXLAN_INTERFACE: &str = "vxlan";
/// Prefix of vxlan tunnel endpoints.
pub(crate) const VTEP_PREFIX: &str = "vtep";
/// The negation keyword.
pub(crate) const NEGATE_KEYWORD: &str = "no";

/// Extracts a fact document from parsed device text.
pub fn extract(tree: &Tree, device: &DeviceConfig) -> Result<Value> {
    let mut extractor = Extractor {
        tree,
        facts: Value::Object(Map::new()),
        cache: IndexMap::new(),
    };
    let modes: Vec<NodeId> = tree.modes().map(|(_, id)| id).collect();
    for mode in modes {
        extractor.extract_mode(mode, device);
    }
    Ok(extractor.facts)
}

/// A step into the fact document under construction.
#[derive(Debug, Clone)]
enum Step {
    Key(String),
    Index(usize),
}

type Path = Vec<Step>;

struct Extractor<'t> {
    tree: &'t Tree,
    facts: Value,
    /// Collection entries reachable again by identity, per mode. Group
    /// entries and nested list parents accumulate fields across lines.
    cache: IndexMap<String, Path>,
}

impl<'t> Extractor<'t> {
    // ------------------------------------------------------------------
    // Document access
    // ------------------------------------------------------------------

    fn value_at_mut(&mut self, path: &[Step]) -> Option<&mut Value> {
        let mut current = &mut self.facts;
        for step in path {
            current = match step {
                Step::Key(key) => current.get_mut(key.as_str())?,
                Step::Index(index) => current.get_mut(*index)?,
            };
        }
        Some(current)
    }

    fn value_at(&self, path: &[Step]) -> Option<&Value> {
        let mut current = &self.facts;
        for step in path {
            current = match step {
                Step::Key(key) => current.get(key.as_str())?,
                Step::Index(index) => current.get(*index)?,
            };
        }
        Some(current)
    }

    fn field_present(&self, at: &[Step], name: &str) -> bool {
        self.value_at(at)
            .and_then(|v| v.get(name))
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    fn set_field(&mut self, at: &[Step], name: &str, value: Value) {
        if let Some(Value::Object(object)) = self.value_at_mut(at) {
            object.insert(name.to_string(), value);
        }
    }

    fn ensure_object(&mut self, at: &[Step], name: &str) -> Path {
        if let Some(Value::Object(object)) = self.value_at_mut(at) {
            object
                .entry(name.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let mut path = at.to_vec();
        path.push(Step::Key(name.to_string()));
        path
    }

    fn ensure_array(&mut self, at: &[Step], name: &str) -> Path {
        if let Some(Value::Object(object)) = self.value_at_mut(at) {
            object
                .entry(name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
        }
        let mut path = at.to_vec();
        path.push(Step::Key(name.to_string()));
        path
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    fn extract_mode(&mut self, mode_id: NodeId, device: &DeviceConfig) {
        self.cache.clear();
        let tree = self.tree;
        let mode = tree.node(mode_id);

        match mode.cmd_node {
            Some(cmd) => {
                let search = mode.cmd_to_search.clone().unwrap_or_default();
                let block_indices: Vec<usize> = device
                    .blocks
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| starts_with_token(&b.text, &search))
                    .map(|(i, _)| i)
                    .collect();
                for index in block_indices {
                    let block = &device.blocks[index];
                    let (left, created) = self.node_facts(cmd, &block.text, &[]);
                    self.warn_leftover(&block.text, &left);
                    if let Some(entry) = created {
                        self.extract_block(mode_id, block, &entry);
                    }
                }
            }
            None => {
                // A flat mode: its subcommands are top-level lines.
                let keys: Vec<(String, NodeId)> = mode
                    .children
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect();
                for (key, child) in keys {
                    for index in 0..device.blocks.len() {
                        let text = device.blocks[index].text.clone();
                        if starts_with_token(&text, &key) {
                            let (left, _) = self.node_facts(child, &text, &[]);
                            self.warn_leftover(&text, &left);
                        }
                    }
                }
            }
        }
    }

    fn extract_block(&mut self, mode_id: NodeId, block: &Block, at: &[Step]) {
        for line in &block.children {
            if line.has_children() {
                self.extract_submode(mode_id, line, at);
            } else if let Some(child) = self.match_subcommand(mode_id, &line.text) {
                let (left, _) = self.node_facts(child, &line.text, at);
                self.warn_leftover(&line.text, &left);
            } else {
                warn!(line = %line.text, "no subcommand matches device line");
            }
        }
    }

    fn extract_submode(&mut self, mode_id: NodeId, block: &Block, at: &[Step]) {
        let tree = self.tree;
        let submodes: Vec<NodeId> = tree.node(mode_id).submodes.values().copied().collect();
        for sub_id in submodes {
            let submode = tree.node(sub_id);
            let Some(search) = submode.cmd_to_search.as_deref() else {
                continue;
            };
            if !starts_with_token(&block.text, search) {
                continue;
            }
            let Some(cmd) = submode.cmd_node else {
                continue;
            };
            let (left, created) = self.node_facts(cmd, &block.text, at);
            self.warn_leftover(&block.text, &left);
            if let Some(entry) = created {
                self.extract_block(sub_id, block, &entry);
            }
            return;
        }
        warn!(line = %block.text, "no submode matches device block");
    }

    /// The subcommand a line dispatches to: the longest matching child key.
    /// A negated line dispatches to the node of its positive form.
    fn match_subcommand(&self, mode_id: NodeId, line: &str) -> Option<NodeId> {
        let direct = self
            .tree
            .node(mode_id)
            .children
            .iter()
            .filter(|(key, _)| starts_with_token(line, key))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, id)| *id);
        match (direct, strip_negation(line)) {
            (Some(id), _) => Some(id),
            (None, Some(positive)) => self.match_subcommand(mode_id, positive),
            (None, None) => None,
        }
    }

    // ------------------------------------------------------------------
    // Node dispatch
    // ------------------------------------------------------------------

    /// Runs one node over a line. Returns the unconsumed remainder and the
    /// path of the facts node it created (`None` when nothing matched).
    fn node_facts(&mut self, id: NodeId, line: &str, at: &[Step]) -> (String, Option<Path>) {
        match self.tree.node(id).kind {
            NodeKind::Literal => self.literal_facts(id, line, at),
            NodeKind::Skip => self.skip_facts(id, line, at),
            NodeKind::FixedValue => self.fixed_facts(id, line, at, false),
            NodeKind::Param | NodeKind::InterfaceParam => self.param_facts(id, line, at, false),
            NodeKind::InterfaceKey => self.param_facts(id, line, at, true),
            NodeKind::List | NodeKind::InterfaceList => self.list_facts(id, line, at),
            NodeKind::ListGroup => self.group_facts(id, line, at),
            NodeKind::Root | NodeKind::Mode => (line.to_string(), None),
        }
    }

    fn literal_facts(&mut self, id: NodeId, line: &str, at: &[Step]) -> (String, Option<Path>) {
        let tree = self.tree;
        let node = tree.node(id);
        let Some(rest) = consume_literal(line, node.cli_name.as_deref()) else {
            return (line.to_string(), None);
        };
        let fact = node.fact_name.clone().unwrap_or_default();
        let next = node.next;
        let dict = self.ensure_object(at, &fact);
        let mut left = self.match_children(id, rest.to_string(), &dict);
        if let Some(next_id) = next {
            let (after, _) = self.node_facts(next_id, &left, &dict);
            left = after;
        }
        (left, Some(dict))
    }

    fn skip_facts(&mut self, id: NodeId, line: &str, at: &[Step]) -> (String, Option<Path>) {
        let node = self.tree.node(id);
        let next = node.next;
        let Some(rest) = consume_literal(line, node.cli_name.as_deref()) else {
            return (line.to_string(), None);
        };
        let mut left = self.match_children(id, rest.to_string(), at);
        if let Some(next_id) = next {
            let (after, _) = self.node_facts(next_id, &left, at);
            left = after;
        }
        (left, Some(at.to_vec()))
    }

    fn fixed_facts(
        &mut self,
        id: NodeId,
        line: &str,
        at: &[Step],
        negated: bool,
    ) -> (String, Option<Path>) {
        let tree = self.tree;
        let node = tree.node(id);
        let (line, negated) = match strip_negation(line) {
            Some(rest) => (rest, true),
            None => (line, negated),
        };
        let Some(rest) = consume_literal(line, node.cli_name.as_deref()) else {
            return (line.to_string(), None);
        };
        let fact = node.fact_name.clone().unwrap_or_default();
        let value = match fixed_value_of(node.fixed_value.as_deref().unwrap_or_default()) {
            Value::Bool(b) if negated => Value::Bool(!b),
            other => other,
        };
        self.set_field(at, &fact, value);
        let left = self.match_children(id, rest.to_string(), at);
        (left, Some(at.to_vec()))
    }

    fn param_facts(
        &mut self,
        id: NodeId,
        line: &str,
        at: &[Step],
        as_key: bool,
    ) -> (String, Option<Path>) {
        let tree = self.tree;
        let node = tree.node(id);

        let mut rest = match &node.cli_name {
            Some(_) => match consume_literal(line, node.cli_name.as_deref()) {
                Some(rest) => rest.to_string(),
                None => return (line.to_string(), None),
            },
            None => line.to_string(),
        };

        // Capture the value: a quoted phrase, an interface pair, or one token.
        let value = match node.kind {
            NodeKind::InterfaceParam => {
                let Some((kind, after)) = split_first(&rest) else {
                    return (line.to_string(), None);
                };
                let Some((ident, after)) = split_first(after) else {
                    return (line.to_string(), None);
                };
                let joined = format!("{kind}{ident}");
                rest = after.to_string();
                Value::String(joined)
            }
            NodeKind::InterfaceKey => {
                let Some((token, after)) = split_first(&rest) else {
                    return (line.to_string(), None);
                };
                let iface = node.interface_name.as_deref().unwrap_or_default();
                let value = if iface == VXLAN_INTERFACE && token.starts_with(VTEP_PREFIX) {
                    token.to_string()
                } else {
                    format!("{iface}{token}")
                };
                rest = after.to_string();
                Value::String(value)
            }
            _ => {
                let Some((token, after)) = take_value(&rest) else {
                    return (line.to_string(), None);
                };
                rest = after.to_string();
                if as_key {
                    Value::String(token)
                } else {
                    coerce_token(token)
                }
            }
        };

        let value = match &node.translate_method {
            Some(method) => translate(method, Direction::ConfigToFacts, &value).unwrap_or(value),
            None => value,
        };

        if let Some(method) = &node.value_check_method {
            if !validate::check(method, &scalar_text(&value)) {
                trace!(field = ?node.fact_name, "value check rejected token");
                return (line.to_string(), None);
            }
        }

        let fact = node.fact_name.clone().unwrap_or_default();
        let next = node.next;
        self.set_field(at, &fact, value);

        let mut left = self.match_children(id, rest, at);
        if let Some(next_id) = next {
            let (after, _) = self.node_facts(next_id, &left, at);
            left = after;
        }
        (left, Some(at.to_vec()))
    }

    fn list_facts(&mut self, id: NodeId, line: &str, at: &[Step]) -> (String, Option<Path>) {
        let tree = self.tree;
        let node = tree.node(id);

        let rest = match &node.cli_name {
            Some(_) => match consume_literal(line, node.cli_name.as_deref()) {
                Some(rest) => rest.to_string(),
                None => return (line.to_string(), None),
            },
            None => line.to_string(),
        };
        let Some(rest) = self.consume_fixed_words(id, &rest) else {
            return (line.to_string(), None);
        };

        let list_name = node.fact_name.clone().unwrap_or_default();
        let key_nodes = node.key_nodes.clone();
        let next = node.next;

        let array_path = self.ensure_array(at, &list_name);
        let entry_path = self.append_entry(&array_path);

        let mut left = rest;
        for key in key_nodes {
            let (after, _) = self.key_facts(key, &left, &entry_path);
            left = after;
        }

        if let Some(next_id) = next {
            // Nested list: re-attach to the parent entry seen earlier with
            // the same identity, so child entries accumulate.
            let entry_path = self.dedupe_entry(&array_path, entry_path, &list_name);
            let (after, _) = self.node_facts(next_id, &left, &entry_path);
            return (after, Some(entry_path));
        }

        left = self.list_children_facts(id, left, &entry_path);
        (left, Some(entry_path))
    }

    fn group_facts(&mut self, id: NodeId, line: &str, at: &[Step]) -> (String, Option<Path>) {
        let tree = self.tree;
        let node = tree.node(id);

        let (line, negated) = match strip_negation(line) {
            Some(rest) => (rest.to_string(), true),
            None => (line.to_string(), false),
        };
        let rest = match &node.cli_name {
            Some(_) => match consume_literal(&line, node.cli_name.as_deref()) {
                Some(rest) => rest.to_string(),
                None => return (line, None),
            },
            None => line.clone(),
        };
        let Some(rest) = self.consume_fixed_words(id, &rest) else {
            return (line, None);
        };

        let list_name = node.fact_name.clone().unwrap_or_default();
        let key_nodes = node.key_nodes.clone();

        let array_path = self.ensure_array(at, &list_name);
        let entry_path = self.append_entry(&array_path);

        let mut left = rest;
        for key in key_nodes {
            let (after, _) = self.key_facts(key, &left, &entry_path);
            left = after;
        }
        let entry_path = self.dedupe_entry(&array_path, entry_path, &list_name);

        left = self.group_children_facts(id, left, &entry_path, negated);
        (left, Some(entry_path))
    }

    // ------------------------------------------------------------------
    // List plumbing
    // ------------------------------------------------------------------

    /// Runs a list key node. Key values always stay text, so entry
    /// identities render stably.
    fn key_facts(&mut self, id: NodeId, line: &str, at: &[Step]) -> (String, Option<Path>) {
        match self.tree.node(id).kind {
            NodeKind::Param | NodeKind::InterfaceParam | NodeKind::InterfaceKey => {
                self.param_facts(id, line, at, true)
            }
            _ => self.node_facts(id, line, at),
        }
    }

    fn consume_fixed_words(&self, id: NodeId, line: &str) -> Option<String> {
        let node = self.tree.node(id);
        let mut left = line;
        for expected in &node.fixed_words {
            let (token, rest) = split_first(left)?;
            if token != expected {
                return None;
            }
            left = rest;
        }
        Some(left.to_string())
    }

    fn append_entry(&mut self, array_path: &[Step]) -> Path {
        let index = match self.value_at_mut(array_path) {
            Some(Value::Array(entries)) => {
                entries.push(Value::Object(Map::new()));
                entries.len() - 1
            }
            _ => 0,
        };
        let mut path = array_path.to_vec();
        path.push(Step::Index(index));
        path
    }

    /// Replaces a freshly appended entry with a cached one of the same
    /// identity, dropping the fresh entry.
    fn dedupe_entry(&mut self, array_path: &[Step], entry_path: Path, list_name: &str) -> Path {
        let identity = self
            .value_at(&entry_path)
            .and_then(Value::as_object)
            .map(|o| {
                o.iter()
                    .map(|(k, v)| format!("{k}={}", scalar_text(v)))
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .unwrap_or_default();
        let cache_key = format!("{list_name}:{identity}");

        if let Some(cached) = self.cache.get(&cache_key).cloned() {
            if let Some(Value::Array(entries)) = self.value_at_mut(array_path) {
                entries.pop();
            }
            cached
        } else {
            self.cache.insert(cache_key, entry_path.clone());
            entry_path
        }
    }

    /// Runs list children in declared order; optional children that match
    /// nothing are skipped.
    fn list_children_facts(&mut self, id: NodeId, line: String, at: &[Step]) -> String {
        let children: Vec<NodeId> = self.tree.node(id).children.values().copied().collect();
        let mut left = line;
        for child in children {
            if left.is_empty() {
                break;
            }
            if !self.guards_pass(child, &left, at) {
                continue;
            }
            let (after, _) = self.node_facts(child, &left, at);
            left = after;
        }
        left
    }

    fn group_children_facts(
        &mut self,
        id: NodeId,
        line: String,
        at: &[Step],
        negated: bool,
    ) -> String {
        let tree = self.tree;
        let children: Vec<NodeId> = tree.node(id).children.values().copied().collect();
        let mut left = line;
        for child in children {
            let before = left.clone();
            let (after, created) = match tree.node(child).kind {
                NodeKind::FixedValue => self.fixed_facts(child, &left, at, negated),
                _ => self.node_facts(child, &left, at),
            };
            left = after;
            if created.is_none() {
                left = before;
            } else if left.is_empty() {
                break;
            }
        }
        left
    }

    // ------------------------------------------------------------------
    // Child matching
    // ------------------------------------------------------------------

    /// Matches children repeatedly against the remaining line, consuming
    /// what they capture. Guard precedence: next-token value, then facts
    /// presence, then parent value, then the literal word.
    fn match_children(&mut self, id: NodeId, line: String, at: &[Step]) -> String {
        let tree = self.tree;
        let mut visited: Vec<NodeId> = Vec::new();
        let mut left = line;
        loop {
            if left.is_empty() {
                return left;
            }
            let children: Vec<NodeId> = tree.node(id).children.values().copied().collect();
            let mut advanced = false;
            for child_id in children {
                if visited.contains(&child_id) {
                    continue;
                }
                let child = tree.node(child_id);
                if let Some(fact) = &child.fact_name {
                    if self.field_present(at, fact) && !child.is_list() {
                        continue;
                    }
                }
                if !self.guards_pass(child_id, &left, at) {
                    continue;
                }
                let (after, created) = self.node_facts(child_id, &left, at);
                if created.is_some() {
                    visited.push(child_id);
                    left = after;
                    advanced = true;
                    break;
                }
            }
            if !advanced {
                return left;
            }
        }
    }

    fn guards_pass(&self, id: NodeId, line: &str, at: &[Step]) -> bool {
        let node = self.tree.node(id);
        if let Some(guard) = &node.if_next_value {
            if !next_value_satisfied(guard, line) {
                return false;
            }
        }
        if let Some(field) = &node.if_facts_present {
            let (name, negate) = match field.strip_prefix('!') {
                Some(rest) => (rest, true),
                None => (field.as_str(), false),
            };
            if self.field_present(at, name) == negate {
                return false;
            }
        }
        if let Some(expected) = &node.if_parent_value {
            // The parent's captured value must match, and this field must
            // not be captured yet.
            if let Some(fact) = &node.fact_name {
                if self.field_present(at, fact) {
                    return false;
                }
            }
            let parent_fact = node
                .parent
                .and_then(|p| self.tree.node(p).fact_name.clone())
                .unwrap_or_default();
            let actual = self
                .value_at(at)
                .and_then(|v| v.get(&parent_fact))
                .map(scalar_text)
                .unwrap_or_default();
            if &actual != expected {
                return false;
            }
        }
        true
    }

    fn warn_leftover(&self, line: &str, left: &str) {
        if !left.trim().is_empty() {
            warn!(line = %line, dropped = %left, "unmatched trailing device text");
        }
    }
}

// ----------------------------------------------------------------------
// Line tokenization
// ----------------------------------------------------------------------

fn split_first(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once(' ') {
        Some((token, rest)) => Some((token, rest.trim_start())),
        None => Some((trimmed, "")),
    }
}

/// Consumes a literal token; `None` when the line does not start with it.
fn consume_literal<'a>(line: &'a str, cli_name: Option<&str>) -> Option<&'a str> {
    let cli = cli_name?;
    let (token, rest) = split_first(line)?;
    if token == cli {
        Some(rest)
    } else {
        None
    }
}

/// Strips a leading negation keyword.
fn strip_negation(line: &str) -> Option<&str> {
    let (token, rest) = split_first(line)?;
    if token == NEGATE_KEYWORD {
        Some(rest)
    } else {
        None
    }
}

/// Takes one value from the line: a quoted phrase or a single token.
fn take_value(line: &str) -> Option<(String, &str)> {
    let trimmed = line.trim_start();
    if let Some(inner) = trimmed.strip_prefix('"') {
        let end = inner.find('"')?;
        let value = inner[..end].to_string();
        let rest = inner[end + 1..].trim_start();
        return Some((value, rest));
    }
    split_first(trimmed).map(|(token, rest)| (token.to_string(), rest))
}

/// Digit-only tokens become numbers, everything else stays text.
fn coerce_token(token: String) -> Value {
    let all_digits = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
    let canonical = token.len() == 1 || !token.starts_with('0');
    if all_digits && canonical {
        if let Ok(number) = token.parse::<i64>() {
            return Value::Number(number.into());
        }
    }
    Value::String(token)
}

fn fixed_value_of(text: &str) -> Value {
    match text.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

fn next_value_satisfied(guard: &NextValueGuard, line: &str) -> bool {
    let token = line.split_whitespace().nth(guard.position.saturating_sub(1));
    match guard.expected.as_str() {
        NextValueGuard::EMPTY => token.is_none(),
        NextValueGuard::NOT_EMPTY => token.is_some(),
        expected => token == Some(expected),
    }
}
