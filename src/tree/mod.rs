//! The compiled node tree.
//!
//! A grammar compiles into an arena of [`Node`]s addressed by stable
//! [`NodeId`] indices. Indices make re-parenting (the `PARENT_NAME`
//! annotation) a plain index rewrite, and let extraction and synthesis walk
//! parent chains without ownership cycles.
//!
//! One [`Node`] struct carries the fields of every variant; the [`NodeKind`]
//! tag drives exhaustive dispatch in the extraction and synthesis walks.

pub mod compile;

use indexmap::IndexMap;

use crate::grammar::annotation::{NegatePolicy, NextValueGuard};

/// Stable index of a node in its [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed set of node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Tree root; its children are modes.
    Root,
    /// A mode: an optional entry command, subcommands and submodes.
    Mode,
    /// A literal device word, optionally naming a fact container.
    Literal,
    /// A literal that records a fixed value when present (`VALUE:`).
    FixedValue,
    /// A parameter capturing one value.
    Param,
    /// A parameter capturing an interface reference (two device tokens).
    InterfaceParam,
    /// A list key derived from an interface name.
    InterfaceKey,
    /// A literal matched but never captured (`SKIP`).
    Skip,
    /// A collection keyed by declared key fields (`LIST:`).
    List,
    /// A collection whose entries span several device lines (`LIST_GROUP:`).
    ListGroup,
    /// A collection of interface blocks (`INTERFACE_LIST`).
    InterfaceList,
}

/// One node of the compiled tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Variant tag.
    pub kind: NodeKind,
    /// Parent node, absent only for the root.
    pub parent: Option<NodeId>,
    /// Literal device word matched by this node, when it has one.
    pub cli_name: Option<String>,
    /// Fact field this node reads and writes.
    pub fact_name: Option<String>,
    /// Child nodes, keyed by their matching word (or fact name when the
    /// child has no literal).
    pub children: IndexMap<String, NodeId>,
    /// Mandatory continuation of this node on the same line.
    pub next: Option<NodeId>,

    // Parameter behaviour.
    /// The word may be absent from a device line.
    pub optional: bool,
    /// `TRANSLATE_METHOD:` name.
    pub translate_method: Option<String>,
    /// `VALUE_CHECK_METHOD:` name, possibly `!`-negated.
    pub value_check_method: Option<String>,
    /// `IF_FACTS_PRESENT:` guard field, possibly `!`-negated.
    pub if_facts_present: Option<String>,
    /// `IF_NEXT_VAL:` guard.
    pub if_next_value: Option<NextValueGuard>,
    /// `IF_PARENT_VAL:` guard value.
    pub if_parent_value: Option<String>,
    /// `PARENT_NAME:` re-parenting target field.
    pub parent_name: Option<String>,
    /// Omit the captured value from delete commands.
    pub ignore_val_for_delete: bool,
    /// Synthesize merges as replace (delete then merge).
    pub merge_as_replace: bool,
    /// Negation policy for fixed-value words.
    pub negate_policy: Option<NegatePolicy>,
    /// Fixed fact value recorded when the word is present (`VALUE:`).
    pub fixed_value: Option<String>,
    /// Mode exit command (`EXIT_CMD:`).
    pub exit_cmd: Option<String>,

    // List behaviour.
    /// Declared key field names, in order.
    pub key_names: Vec<String>,
    /// Key parameter nodes, in order.
    pub key_nodes: Vec<NodeId>,
    /// Literal words between the list word and the keys.
    pub fixed_words: Vec<String>,
    /// Fixed words omitted from delete commands.
    pub ignore_words_for_delete: Vec<String>,
    /// Interface type word of an interface list (`Ethernet`, `vxlan`, ...).
    pub interface_name: Option<String>,

    // Mode behaviour.
    /// The node compiled from the mode's entry command line.
    pub cmd_node: Option<NodeId>,
    /// Submodes by name.
    pub submodes: IndexMap<String, NodeId>,
    /// Leading literal words of the entry command, used to find mode blocks.
    pub cmd_to_search: Option<String>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            parent: None,
            cli_name: None,
            fact_name: None,
            children: IndexMap::new(),
            next: None,
            optional: false,
            translate_method: None,
            value_check_method: None,
            if_facts_present: None,
            if_next_value: None,
            if_parent_value: None,
            parent_name: None,
            ignore_val_for_delete: false,
            merge_as_replace: false,
            negate_policy: None,
            fixed_value: None,
            exit_cmd: None,
            key_names: Vec::new(),
            key_nodes: Vec::new(),
            fixed_words: Vec::new(),
            ignore_words_for_delete: Vec::new(),
            interface_name: None,
            cmd_node: None,
            submodes: IndexMap::new(),
            cmd_to_search: None,
        }
    }

    /// Key under which this node registers in its parent's child map.
    pub fn child_key(&self) -> String {
        match (&self.cli_name, &self.fact_name) {
            (Some(cli), _) => cli.clone(),
            (None, Some(fact)) => fact.clone(),
            (None, None) => String::new(),
        }
    }

    /// True for the collection variants.
    pub fn is_list(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::List | NodeKind::ListGroup | NodeKind::InterfaceList
        )
    }
}

/// The compiled tree: an arena of nodes plus the list-path side table.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    /// Root node id.
    pub root: NodeId,
    /// Registered list paths (`a/b[k1|k2]` syntax), in registration order.
    pub list_paths: Vec<String>,
}

impl Tree {
    pub(crate) fn new() -> Tree {
        let root = Node::new(NodeKind::Root);
        Tree {
            nodes: vec![root],
            root: NodeId(0),
            list_paths: Vec::new(),
        }
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Mode nodes in declaration order, with their names.
    pub fn modes(&self) -> impl Iterator<Item = (&String, NodeId)> {
        self.node(self.root)
            .children
            .iter()
            .map(|(name, id)| (name, *id))
    }

    /// Walks the parent chain from `id` (exclusive) up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.node(parent).parent;
        }
        out
    }
}
