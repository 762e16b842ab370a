//! Grammar-to-tree compilation.
//!
//! Each mode compiles into a [`NodeKind::Mode`] node under the root; its
//! entry command and subcommand lines compile into chains of nodes. One
//! grammar word usually becomes one node, except the literal-plus-parameter
//! pair (`mtu $m=NAME:mtu`), which becomes a single named parameter.
//!
//! Word precedence: `SKIP` wins over the collection annotations, which win
//! over `VALUE:`, `NO_PARAM`, bare parameters, named parameters and finally
//! plain literals. A list word pulls the following literals in as fixed
//! words and the following parameters in as its declared keys, and registers
//! its bracketed key path in the tree's list-path table.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::Result;
use crate::grammar::annotation::{Annotation, Word, KEY_SEPARATOR};
use crate::grammar::{Grammar, ModeSpec};
use crate::tree::{Node, NodeId, NodeKind, Tree};

/// Separator between the segments of a list path.
const PATH_SEPARATOR: char = '/';
/// Brackets around the key names of a list path segment.
const KEY_OPEN: char = '[';
const KEY_CLOSE: char = ']';

/// Compiles a grammar into a node tree.
pub fn compile(grammar: &Grammar) -> Result<Tree> {
    let mut tree = Tree::new();
    let root = tree.root;
    for (name, spec) in &grammar.modes {
        let mode = build_mode(&mut tree, name, spec, root)?;
        tree.node_mut(root).children.insert(name.clone(), mode);
    }
    debug!(
        modes = grammar.modes.len(),
        list_paths = tree.list_paths.len(),
        "compiled grammar"
    );
    Ok(tree)
}

fn build_mode(tree: &mut Tree, name: &str, spec: &ModeSpec, parent: NodeId) -> Result<NodeId> {
    let mut mode = Node::new(NodeKind::Mode);
    mode.parent = Some(parent);
    let mode_id = tree.alloc(mode);

    if let Some(command) = &spec.command {
        let mut cursor = Cursor::new(command);
        let search = sub_cmd_key(&cursor.words);
        let cmd = create_node(tree, &mut cursor, mode_id);
        build_tree(tree, cmd, &mut cursor);
        let node = tree.node_mut(mode_id);
        node.cmd_node = Some(cmd);
        node.cmd_to_search = Some(search);
    }

    // Group nodes are shared between every subcommand line that names the
    // same collection, so entries spread over several lines merge.
    let mut group_cache: IndexMap<String, NodeId> = IndexMap::new();

    for line in &spec.subcommands {
        let mut cursor = Cursor::new(line);
        if cursor.at_end() {
            continue;
        }
        let key = sub_cmd_key(&cursor.words);
        let group_name = group_name_of(&cursor);

        let node = if let Some(id) = group_name.as_ref().and_then(|n| group_cache.get(n)).copied()
        {
            reenter_node(tree, id, &mut cursor);
            id
        } else if let Some(id) = tree.node(mode_id).children.get(&key).copied() {
            reenter_node(tree, id, &mut cursor);
            id
        } else {
            let id = create_node(tree, &mut cursor, mode_id);
            build_tree(tree, id, &mut cursor);
            if let Some(name) = group_name {
                group_cache.insert(name, id);
            }
            id
        };

        let mode_node = tree.node_mut(mode_id);
        mode_node.children.insert(key.clone(), node);
        // Group entries may appear negated on the device.
        if tree.node(node).kind == NodeKind::ListGroup {
            tree.node_mut(mode_id)
                .children
                .insert(format!("no {key}"), node);
        }
    }

    for (sub_name, sub_spec) in &spec.submodes {
        let submode = build_mode(tree, sub_name, sub_spec, mode_id)?;
        tree.node_mut(mode_id)
            .submodes
            .insert(sub_name.clone(), submode);
    }

    trace!(mode = name, "compiled mode");
    Ok(mode_id)
}

/// A subcommand line's dispatch key: the leading literal words, up to the
/// first parameter or optional word.
fn sub_cmd_key(words: &[Word]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for word in words {
        if word.is_param() || word.annotation.optional {
            break;
        }
        parts.push(&word.literal);
    }
    if parts.is_empty() {
        if let Some(first) = words.first() {
            return first.literal.clone();
        }
    }
    parts.join(" ")
}

/// The group collection a line targets, when its head word carries
/// `LIST_GROUP:`.
fn group_name_of(cursor: &Cursor) -> Option<String> {
    let w0 = cursor.peek(0)?;
    if let Some(name) = &w0.annotation.list_group {
        return Some(name.clone());
    }
    if !w0.is_param() {
        if let Some(w1) = cursor.peek(1) {
            if w1.is_param() {
                return w1.annotation.list_group.clone();
            }
        }
    }
    None
}

/// Resumes building an already created node from a fresh line: consumes the
/// words the node was created from, then continues its build.
fn reenter_node(tree: &mut Tree, id: NodeId, cursor: &mut Cursor) {
    let node = tree.node(id);
    let is_list = node.is_list();
    let has_cli = node.cli_name.is_some();
    let kind = node.kind;

    if has_cli && cursor.peek(0).map(|w| !w.is_param()).unwrap_or(false) {
        cursor.bump();
    }
    if is_list {
        build_list(tree, id, cursor);
        return;
    }
    // Named parameters were created from two words.
    if matches!(kind, NodeKind::Param | NodeKind::InterfaceParam)
        && has_cli
        && cursor.peek(0).map(Word::is_param).unwrap_or(false)
    {
        cursor.bump();
    }
    build_chain(tree, id, cursor);
}

// ============================================================================
// Node creation
// ============================================================================

fn is_list_word(word: &Word) -> bool {
    word.annotation.list.is_some()
        || word.annotation.list_group.is_some()
        || word.annotation.interface_list
}

/// Creates one node from the cursor, consuming the words it covers.
fn create_node(tree: &mut Tree, cursor: &mut Cursor, parent: NodeId) -> NodeId {
    let w0 = match cursor.peek(0) {
        Some(w) => w.clone(),
        None => return tree.alloc(Node::new(NodeKind::Literal)),
    };

    // SKIP wins over everything.
    if w0.annotation.skip {
        cursor.bump();
        let mut node = Node::new(NodeKind::Skip);
        node.parent = Some(parent);
        node.cli_name = Some(w0.literal.clone());
        node.fact_name = Some(w0.fact_name());
        return tree.alloc(node);
    }

    // Collections.
    if is_list_word(&w0) {
        return create_list(tree, cursor, parent, None);
    }
    if !w0.is_param() {
        if let Some(w1) = cursor.peek(1) {
            if w1.is_param() && is_list_word(w1) {
                let lit = cursor.bump();
                return create_list(tree, cursor, parent, Some(lit.literal));
            }
        }
    }

    // Fixed-value literal.
    if w0.annotation.value.is_some() {
        cursor.bump();
        let mut node = Node::new(NodeKind::FixedValue);
        node.parent = Some(parent);
        node.cli_name = Some(w0.literal.clone());
        node.fact_name = Some(w0.fact_name());
        node.fixed_value = w0.annotation.value.clone();
        apply_annotation(&mut node, &w0.annotation);
        return tree.alloc(node);
    }

    // Named container without a captured value.
    if w0.annotation.no_param {
        cursor.bump();
        let mut node = Node::new(NodeKind::Literal);
        node.parent = Some(parent);
        node.cli_name = Some(w0.literal.clone());
        node.fact_name = Some(w0.fact_name());
        apply_annotation(&mut node, &w0.annotation);
        return tree.alloc(node);
    }

    // Bare parameter.
    if w0.is_param() {
        cursor.bump();
        let kind = if w0.annotation.interface_param {
            NodeKind::InterfaceParam
        } else {
            NodeKind::Param
        };
        let mut node = Node::new(kind);
        node.parent = Some(parent);
        node.fact_name = Some(w0.fact_name());
        apply_annotation(&mut node, &w0.annotation);
        return tree.alloc(node);
    }

    // Named parameter: a literal directly followed by a parameter word.
    if let Some(w1) = cursor.peek(1) {
        if w1.is_param() {
            let w1 = w1.clone();
            cursor.bump();
            cursor.bump();
            let kind = if w1.annotation.interface_param {
                NodeKind::InterfaceParam
            } else {
                NodeKind::Param
            };
            let mut node = Node::new(kind);
            node.parent = Some(parent);
            node.cli_name = Some(w0.literal.clone());
            node.fact_name = Some(w1.fact_name());
            apply_annotation(&mut node, &w1.annotation);
            // A named parameter's presence is detectable by its word, so it
            // never blocks the rest of the line.
            node.optional = true;
            return tree.alloc(node);
        }
    }

    // Plain literal.
    cursor.bump();
    let mut node = Node::new(NodeKind::Literal);
    node.parent = Some(parent);
    node.cli_name = Some(w0.literal.clone());
    node.fact_name = Some(w0.fact_name());
    apply_annotation(&mut node, &w0.annotation);
    tree.alloc(node)
}

fn create_list(
    tree: &mut Tree,
    cursor: &mut Cursor,
    parent: NodeId,
    cli_from_prev: Option<String>,
) -> NodeId {
    let w = cursor.bump();
    let kind = if w.annotation.interface_list {
        NodeKind::InterfaceList
    } else if w.annotation.list_group.is_some() {
        NodeKind::ListGroup
    } else {
        NodeKind::List
    };

    let list_name = w
        .annotation
        .list
        .clone()
        .or_else(|| w.annotation.list_group.clone())
        .unwrap_or_else(|| w.fact_name());

    let mut node = Node::new(kind);
    node.parent = Some(parent);
    node.fact_name = Some(list_name);
    node.key_names = w.annotation.keys.clone();
    apply_annotation(&mut node, &w.annotation);

    if w.is_param() {
        // The list word doubles as its own first key.
        node.cli_name = cli_from_prev;
        cursor.insert_front(key_word_of(&w));
    } else {
        node.cli_name = Some(w.literal.clone());
    }

    let id = tree.alloc(node);
    build_list(tree, id, cursor);
    id
}

/// Reduces a parameter word that carries list annotations to the word its
/// key node is created from.
fn key_word_of(word: &Word) -> Word {
    Word {
        literal: word.literal.clone(),
        annotation: Annotation {
            name: word.annotation.name.clone(),
            optional: word.annotation.optional,
            translate_method: word.annotation.translate_method.clone(),
            value_check_method: word.annotation.value_check_method.clone(),
            interface_param: word.annotation.interface_param,
            ..Annotation::default()
        },
    }
}

fn apply_annotation(node: &mut Node, ann: &Annotation) {
    node.optional |= ann.optional;
    node.translate_method = ann.translate_method.clone();
    node.value_check_method = ann.value_check_method.clone();
    node.if_facts_present = ann.if_facts_present.clone();
    node.if_next_value = ann.if_next_value.clone();
    node.if_parent_value = ann.if_parent_value.clone();
    node.parent_name = ann.parent_name.clone();
    node.ignore_val_for_delete |= ann.ignore_val_for_delete;
    node.merge_as_replace |= ann.merge_as_replace;
    if node.negate_policy.is_none() {
        node.negate_policy = ann.negate_cmd;
    }
    if node.exit_cmd.is_none() {
        node.exit_cmd = ann.exit_cmd.clone();
    }
}

// ============================================================================
// Chain building
// ============================================================================

fn build_tree(tree: &mut Tree, id: NodeId, cursor: &mut Cursor) {
    if tree.node(id).is_list() {
        // Lists consume the rest of their line during creation.
        build_list_children(tree, id, cursor);
    } else {
        build_chain(tree, id, cursor);
    }
}

/// True when the words at the cursor build a node that may be absent from a
/// device line.
fn upcoming_is_optional(cursor: &Cursor) -> bool {
    let Some(w0) = cursor.peek(0) else {
        return false;
    };
    if w0.annotation.optional || w0.annotation.if_parent_value.is_some() {
        return true;
    }
    if !w0.is_param() && !is_list_word(w0) {
        if let Some(w1) = cursor.peek(1) {
            // Named parameters are always detectable, hence optional.
            if w1.is_param() && !is_list_word(w1) {
                return true;
            }
        }
    }
    false
}

/// Continues a non-list node with the rest of its line: optional words
/// become children, the first mandatory word becomes `next`.
fn build_chain(tree: &mut Tree, id: NodeId, cursor: &mut Cursor) {
    loop {
        if cursor.at_end() {
            return;
        }
        if upcoming_is_optional(cursor) {
            let child = create_node(tree, cursor, id);
            add_child(tree, id, child);
        } else {
            let next = create_node(tree, cursor, id);
            tree.node_mut(id).next = Some(next);
            build_tree(tree, next, cursor);
            return;
        }
    }
}

fn add_child(tree: &mut Tree, parent: NodeId, child: NodeId) {
    let key = tree.node(child).child_key();
    tree.node_mut(child).parent = Some(parent);
    tree.node_mut(parent).children.insert(key, child);
}

// ============================================================================
// List building
// ============================================================================

fn build_list(tree: &mut Tree, id: NodeId, cursor: &mut Cursor) {
    build_fixed_words(tree, id, cursor);
    build_keys(tree, id, cursor);
    if tree.node(id).kind == NodeKind::InterfaceList {
        let iface = tree.node(id).fixed_words.first().cloned();
        tree.node_mut(id).interface_name = iface;
    }
    build_list_children(tree, id, cursor);
    update_list_path(tree, id);
}

/// Consumes the literal words between the list word and its keys. On a
/// repeated line the words are consumed against the recorded fixed words.
fn build_fixed_words(tree: &mut Tree, id: NodeId, cursor: &mut Cursor) {
    if tree.node(id).cli_name.is_none() {
        return;
    }
    let already = tree.node(id).fixed_words.clone();
    if !already.is_empty() {
        for expected in &already {
            match cursor.peek(0) {
                Some(w) if !w.is_param() && &w.literal == expected => {
                    cursor.bump();
                }
                _ => break,
            }
        }
        return;
    }
    while let Some(w) = cursor.peek(0) {
        if w.is_param() {
            break;
        }
        // A literal followed by a parameter belongs to the children, unless
        // the parameter is still a declared key.
        if tree.node(id).key_nodes.len() >= tree.node(id).key_names.len() {
            if let Some(w1) = cursor.peek(1) {
                if w1.is_param() {
                    break;
                }
            }
        }
        let w = cursor.bump();
        if w.annotation.ignore_word_for_delete {
            tree.node_mut(id)
                .ignore_words_for_delete
                .push(w.literal.clone());
        }
        tree.node_mut(id).fixed_words.push(w.literal);
    }
}

/// Creates the declared key nodes from the next parameter words. Keys
/// already created by an earlier line are consumed without recreating.
fn build_keys(tree: &mut Tree, id: NodeId, cursor: &mut Cursor) {
    let needed = tree.node(id).key_names.len();
    for position in 0..needed {
        if cursor.at_end() {
            return;
        }
        if tree.node(id).key_nodes.len() > position {
            if cursor.peek(0).map(Word::is_param).unwrap_or(false) {
                cursor.bump();
            }
            continue;
        }
        let key = create_node(tree, cursor, id);
        if tree.node(id).kind == NodeKind::InterfaceList {
            let iface = tree.node(id).fixed_words.first().cloned();
            let key_node = tree.node_mut(key);
            key_node.kind = NodeKind::InterfaceKey;
            key_node.interface_name = iface;
        }
        tree.node_mut(id).key_nodes.push(key);
    }
}

fn build_list_children(tree: &mut Tree, id: NodeId, cursor: &mut Cursor) {
    while !cursor.at_end() {
        let nested = cursor.peek(0).map(is_list_word).unwrap_or(false)
            || (cursor.peek(0).map(|w| !w.is_param()).unwrap_or(false)
                && cursor.peek(1).map(is_list_word).unwrap_or(false)
                && cursor.peek(1).map(Word::is_param).unwrap_or(false));
        if nested {
            let next = create_node(tree, cursor, id);
            tree.node_mut(id).next = Some(next);
            return;
        }

        let child = create_node(tree, cursor, id);

        // A parameter named like a declared key becomes a late key node.
        let key_position = child_key_position(tree, id, child);
        if let Some(position) = key_position {
            if tree.node(id).kind == NodeKind::InterfaceList {
                let iface = tree.node(id).fixed_words.first().cloned();
                let key_node = tree.node_mut(child);
                key_node.kind = NodeKind::InterfaceKey;
                key_node.interface_name = iface;
            }
            let keys = &mut tree.node_mut(id).key_nodes;
            if position < keys.len() {
                keys[position] = child;
            } else {
                keys.push(child);
            }
            continue;
        }

        // PARENT_NAME re-parents the child under an earlier node.
        let target = tree
            .node(child)
            .parent_name
            .clone()
            .and_then(|name| find_node(tree, id, &name));
        match target {
            Some(target) => add_child(tree, target, child),
            None => add_child(tree, id, child),
        }

        let child_node = tree.node(child);
        if !child_node.optional && child_node.if_parent_value.is_none() {
            build_chain(tree, child, cursor);
        }
    }
}

/// Position of a declared key this freshly created parameter fills, if any.
fn child_key_position(tree: &Tree, list: NodeId, child: NodeId) -> Option<usize> {
    let child_node = tree.node(child);
    if !matches!(child_node.kind, NodeKind::Param | NodeKind::InterfaceParam) {
        return None;
    }
    if child_node.cli_name.is_some() {
        return None;
    }
    let list_node = tree.node(list);
    if list_node.key_nodes.len() >= list_node.key_names.len() {
        return None;
    }
    let fact = child_node.fact_name.as_deref()?;
    list_node
        .key_names
        .iter()
        .position(|name| name == fact)
        .or(Some(list_node.key_nodes.len()))
}

/// Finds a key node or direct child by fact name, for re-parenting.
fn find_node(tree: &Tree, scope: NodeId, name: &str) -> Option<NodeId> {
    let node = tree.node(scope);
    for key in &node.key_nodes {
        if tree.node(*key).fact_name.as_deref() == Some(name) {
            return Some(*key);
        }
    }
    for child in node.children.values() {
        if tree.node(*child).fact_name.as_deref() == Some(name) {
            return Some(*child);
        }
    }
    None
}

// ============================================================================
// List paths
// ============================================================================

/// One segment of a list path: `name[key1|key2]`.
fn list_path_part(tree: &Tree, id: NodeId) -> String {
    let node = tree.node(id);
    let mut keys: Vec<String> = node
        .key_nodes
        .iter()
        .filter_map(|k| tree.node(*k).fact_name.clone())
        .collect();
    if keys.is_empty() {
        keys = node.key_names.clone();
    }
    format!(
        "{}{}{}{}",
        node.fact_name.as_deref().unwrap_or_default(),
        KEY_OPEN,
        keys.join(&KEY_SEPARATOR.to_string()),
        KEY_CLOSE
    )
}

/// Registers the list's full path, pruning entries the new path subsumes.
fn update_list_path(tree: &mut Tree, id: NodeId) {
    let mut parts = vec![list_path_part(tree, id)];
    for ancestor in tree.ancestors(id) {
        let node = tree.node(ancestor);
        match node.kind {
            NodeKind::Root => break,
            NodeKind::Mode => {
                if let Some(cmd) = node.cmd_node {
                    let cmd_node = tree.node(cmd);
                    if cmd_node.is_list() {
                        parts.push(list_path_part(tree, cmd));
                    } else if let Some(fact) = &cmd_node.fact_name {
                        parts.push(fact.clone());
                    }
                }
            }
            NodeKind::List | NodeKind::ListGroup | NodeKind::InterfaceList => {
                parts.push(list_path_part(tree, ancestor));
            }
            NodeKind::Skip => {}
            _ => {
                if let Some(fact) = &node.fact_name {
                    parts.push(fact.clone());
                }
            }
        }
    }
    parts.reverse();
    let path = parts.join(&PATH_SEPARATOR.to_string());

    // A nested path subsumes its parent's standalone entry: each of its
    // segments is expanded on the way down. Nested lists register before
    // their parent, so the check runs in both directions.
    tree.list_paths
        .retain(|existing| !path_subsumes(existing, &path));
    let covered = tree
        .list_paths
        .iter()
        .any(|existing| path_subsumes(&path, existing));
    if !covered && !tree.list_paths.contains(&path) {
        trace!(path = %path, "registered list path");
        tree.list_paths.push(path);
    }
}

/// True when `longer` reaches the same collection as `shorter` and then
/// descends further, making the shorter entry redundant.
fn path_subsumes(shorter: &str, longer: &str) -> bool {
    shorter.ends_with(KEY_CLOSE)
        && longer.len() > shorter.len()
        && longer.starts_with(shorter)
        && longer[shorter.len()..].starts_with(PATH_SEPARATOR)
}

// ============================================================================
// Cursor
// ============================================================================

struct Cursor {
    words: Vec<Word>,
    pos: usize,
}

impl Cursor {
    fn new(line: &str) -> Cursor {
        Cursor {
            words: Word::parse_line(line),
            pos: 0,
        }
    }

    fn peek(&self, n: usize) -> Option<&Word> {
        self.words.get(self.pos + n)
    }

    fn bump(&mut self) -> Word {
        let word = self.words[self.pos].clone();
        self.pos += 1;
        word
    }

    fn insert_front(&mut self, word: Word) {
        self.words.insert(self.pos, word);
    }

    fn at_end(&self) -> bool {
        self.pos >= self.words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use pretty_assertions::assert_eq;

    fn compiled(yaml: &str) -> Tree {
        compile(&Grammar::from_yaml_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn compiles_flat_list_subcommand() {
        let tree = compiled(
            r#"
vlans:
  subcommands:
    - "vlan=LIST:vlan&KEYS:$id $id=NAME:name mtu $m=NAME:mtu&OPTIONAL"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        let list = *tree.node(mode).children.get("vlan").unwrap();
        let list_node = tree.node(list);
        assert_eq!(list_node.kind, NodeKind::List);
        assert_eq!(list_node.fact_name.as_deref(), Some("vlan"));
        assert_eq!(list_node.key_nodes.len(), 1);

        let key = tree.node(list_node.key_nodes[0]);
        assert_eq!(key.fact_name.as_deref(), Some("name"));

        let mtu = *list_node.children.get("mtu").unwrap();
        let mtu_node = tree.node(mtu);
        assert_eq!(mtu_node.kind, NodeKind::Param);
        assert!(mtu_node.optional);
        assert_eq!(mtu_node.cli_name.as_deref(), Some("mtu"));
        assert_eq!(mtu_node.fact_name.as_deref(), Some("mtu"));
    }

    #[test]
    fn registers_list_path_with_key_fact_names() {
        let tree = compiled(
            r#"
vlans:
  subcommands:
    - "vlan=LIST:vlan&KEYS:$id $id=NAME:name mtu $m=NAME:mtu&OPTIONAL"
"#,
        );
        assert_eq!(tree.list_paths, vec!["vlan[name]".to_string()]);
    }

    #[test]
    fn mode_command_sets_search_prefix() {
        let tree = compiled(
            r#"
interface:
  command: "interface=LIST:interfaces&KEYS:$name $name=NAME:name"
  subcommands:
    - "mtu $m=NAME:mtu"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        let mode_node = tree.node(mode);
        assert_eq!(mode_node.cmd_to_search.as_deref(), Some("interface"));
        assert!(mode_node.cmd_node.is_some());
        assert!(mode_node.children.contains_key("mtu"));
    }

    #[test]
    fn fixed_value_word_compiles_with_negate_policy() {
        let tree = compiled(
            r#"
interface:
  command: "interface=LIST:interfaces&KEYS:$name $name=NAME:name"
  subcommands:
    - "shutdown=NAME:shutdown&VALUE:true&NEGATE_CMD:ALLOW"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        let shutdown = *tree.node(mode).children.get("shutdown").unwrap();
        let node = tree.node(shutdown);
        assert_eq!(node.kind, NodeKind::FixedValue);
        assert_eq!(node.fixed_value.as_deref(), Some("true"));
        assert!(node.negate_policy.is_some());
    }

    #[test]
    fn fixed_words_between_list_and_keys_are_recorded() {
        let tree = compiled(
            r#"
qos:
  subcommands:
    - "qos=LIST:dscp_map&KEYS:$name map dscp-tc $name=NAME:name dscp $d=NAME:dscp"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        let list = *tree.node(mode).children.get("qos map dscp-tc").unwrap();
        let node = tree.node(list);
        assert_eq!(node.fixed_words, vec!["map".to_string(), "dscp-tc".to_string()]);
        assert_eq!(node.key_nodes.len(), 1);
        assert!(node.children.contains_key("dscp"));
    }

    #[test]
    fn repeated_subcommand_lines_share_one_list_node() {
        let tree = compiled(
            r#"
qos:
  subcommands:
    - "qos=LIST:dscp_map&KEYS:$name map dscp-tc $name=NAME:name dscp $d=NAME:dscp"
    - "qos=LIST:dscp_map&KEYS:$name map dscp-tc $name=NAME:name tc $t=NAME:tc"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        assert_eq!(tree.node(mode).children.len(), 1);
        let list = *tree.node(mode).children.get("qos map dscp-tc").unwrap();
        let node = tree.node(list);
        assert!(node.children.contains_key("dscp"));
        assert!(node.children.contains_key("tc"));
        assert_eq!(node.key_nodes.len(), 1);
    }

    #[test]
    fn list_group_registers_negated_dispatch_key() {
        let tree = compiled(
            r#"
snmp:
  subcommands:
    - "snmp-server=LIST_GROUP:communities&KEYS:$name community $name=NAME:name ro=NAME:read_only&VALUE:true&OPTIONAL"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        let mode_node = tree.node(mode);
        assert!(mode_node.children.contains_key("snmp-server community"));
        assert!(mode_node.children.contains_key("no snmp-server community"));
    }

    #[test]
    fn nested_list_prunes_parent_path_entry() {
        let tree = compiled(
            r#"
vlans:
  subcommands:
    - "vlan=LIST:vlan&KEYS:$id $id=NAME:name member=LIST:members&KEYS:$port $port=NAME:port"
"#,
        );
        assert_eq!(
            tree.list_paths,
            vec!["vlan[name]/members[port]".to_string()]
        );
    }

    #[test]
    fn mode_list_path_is_pruned_by_a_nested_subcommand_list() {
        let tree = compiled(
            r#"
interface:
  command: "interface=LIST:interfaces&KEYS:$name $name=NAME:name"
  subcommands:
    - "ip address=LIST:addresses&KEYS:$ip $ip=NAME:ip"
"#,
        );
        assert_eq!(
            tree.list_paths,
            vec!["interfaces[name]/addresses[ip]".to_string()]
        );
    }

    #[test]
    fn submodes_compile_under_their_parent() {
        let tree = compiled(
            r#"
interface:
  command: "interface=LIST:interfaces&KEYS:$name $name=NAME:name"
  switchport:
    subcommands:
      - "access vlan $v=NAME:access_vlan"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        let mode_node = tree.node(mode);
        assert!(mode_node.submodes.contains_key("switchport"));
    }

    #[test]
    fn malformed_annotation_compiles_to_plain_literal() {
        let tree = compiled(
            r#"
m:
  subcommands:
    - "weird=BOGUS:x"
"#,
        );
        let (_, mode) = tree.modes().next().unwrap();
        let child = *tree.node(mode).children.values().next().unwrap();
        assert_eq!(tree.node(child).kind, NodeKind::Literal);
        assert_eq!(tree.node(child).cli_name.as_deref(), Some("weird=BOGUS:x"));
    }
}
