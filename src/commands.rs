//! Command synthesis.
//!
//! Turns the difference between a want and a have fact document into device
//! commands. The four states map onto the relation buckets:
//!
//! * merged: emit want-only and changed fields.
//! * deleted: negate matched and changed fields named by want.
//! * replaced: rewrite listed entries in full, leave unlisted entries alone.
//! * overridden: rewrite listed entries and delete unlisted ones.
//!
//! Commands accumulate into a [`CommandSet`], which materializes mode entry
//! commands ahead of their subcommands and keeps emission order stable.

use serde_json::Value;
use tracing::{debug, trace};

use crate::device::CommandSet;
use crate::diff::{bucket_get, bucket_keys, bucket_pop, DiffNode, Relation};
use crate::error::Result;
use crate::facts::{NEGATE_KEYWORD, VTEP_PREFIX, VXLAN_INTERFACE};
use crate::grammar::annotation::NegatePolicy;
use crate::paths::{expand_facts, remove_empties, scalar_text};
use crate::state::State;
use crate::translate::{translate, Direction};
use crate::tree::{NodeId, NodeKind, Tree};

/// Synthesizes the command list that moves a device from `have` to `want`
/// under the given state.
pub fn synthesize(tree: &Tree, want: &Value, have: &Value, state: State) -> Result<Vec<String>> {
    let mut want = want.clone();
    let mut have = have.clone();
    remove_empties(&mut want);
    expand_facts(&mut want, &tree.list_paths);
    expand_facts(&mut have, &tree.list_paths);

    let relation = Relation::compare(&want, &have);
    if relation.is_empty() {
        return Ok(Vec::new());
    }

    let want_empty = want.as_object().map(|o| o.is_empty()).unwrap_or(true);
    let only_have = relation.want_only.is_none()
        && relation.matched.is_none()
        && relation.changed.is_none()
        && relation.have_only.is_some();

    let action = match state {
        State::Merged => Action::Merge,
        State::Deleted if want_empty && only_have => Action::DeleteAll,
        State::Deleted => Action::Delete,
        State::Replaced if only_have => {
            debug!("want names nothing on the device, nothing to rewrite");
            return Ok(Vec::new());
        }
        State::Replaced => Action::Replace,
        State::Overridden => Action::Override,
    };

    let synthesizer = Synthesizer { tree };
    let mut set = CommandSet::new();
    let modes: Vec<NodeId> = tree.modes().map(|(_, id)| id).collect();
    for mode in modes {
        synthesizer.mode_commands(mode, &relation, action, &mut set, &[]);
    }
    Ok(set.into_commands())
}

/// The concrete synthesis walk a state resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Merge,
    Delete,
    /// Delete everything the device has, ignoring want.
    DeleteAll,
    Replace,
    Override,
}

impl Action {
    fn is_delete(self) -> bool {
        matches!(self, Action::Delete | Action::DeleteAll)
    }
}

/// Which entries a list merge pass pulls in alongside the bucket it walks.
#[derive(Debug, Clone, Copy, Default)]
struct MergePulls {
    changed: bool,
    matched: bool,
    have_only: bool,
}

struct Synthesizer<'t> {
    tree: &'t Tree,
}

impl<'t> Synthesizer<'t> {
    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    fn mode_commands(
        &self,
        mode_id: NodeId,
        scope: &Relation,
        action: Action,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let mode = tree.node(mode_id);

        let Some(cmd) = mode.cmd_node else {
            // Flat mode: subcommands live at this scope directly.
            let children: Vec<NodeId> = mode.children.values().copied().collect();
            for child in children {
                self.dispatch_child(child, scope, action, set, parents);
            }
            return;
        };

        if tree.node(cmd).is_list() {
            self.keyed_mode_commands(mode_id, cmd, scope, action, set, parents);
        } else {
            self.singleton_mode_commands(mode_id, cmd, scope, action, set, parents);
        }
    }

    /// A mode whose entry command is keyed, one block per collection entry.
    fn keyed_mode_commands(
        &self,
        mode_id: NodeId,
        cmd: NodeId,
        scope: &Relation,
        action: Action,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let list_name = tree
            .node(cmd)
            .fact_name
            .clone()
            .unwrap_or_default();
        let relation = scope.find(&list_name);
        if relation.is_empty() {
            return;
        }

        match action {
            Action::Merge | Action::Replace => {
                let mut visited: Vec<String> = Vec::new();
                for key in bucket_keys(&relation.want_only) {
                    self.mode_entry(mode_id, cmd, &relation, &key, action, true, set, parents);
                    visited.push(key);
                }
                for key in bucket_keys(&relation.changed) {
                    if !visited.contains(&key) {
                        self.mode_entry(mode_id, cmd, &relation, &key, action, false, set, parents);
                        visited.push(key);
                    }
                }
                if action == Action::Replace {
                    // Changed entries carry matched residue that merge
                    // passes would skip, so replace also walks matches
                    // touched by any other bucket.
                    let mut matched = relation.clone();
                    matched.ignore_match_only();
                    for key in bucket_keys(&matched.matched) {
                        if !visited.contains(&key) {
                            self.mode_entry(
                                mode_id, cmd, &relation, &key, action, false, set, parents,
                            );
                        }
                    }
                }
            }
            Action::Delete => {
                let mut visited: Vec<String> = Vec::new();
                for key in bucket_keys(&relation.matched) {
                    self.mode_entry_delete(mode_id, cmd, &relation, &key, false, set, parents);
                    visited.push(key);
                }
                for key in bucket_keys(&relation.changed) {
                    if !visited.contains(&key) {
                        self.mode_entry_delete(mode_id, cmd, &relation, &key, false, set, parents);
                    }
                }
            }
            Action::DeleteAll => {
                let mut visited: Vec<String> = Vec::new();
                for bucket in [&relation.matched, &relation.changed, &relation.have_only] {
                    for key in bucket_keys(bucket) {
                        if !visited.contains(&key) {
                            self.mode_entry_delete(
                                mode_id, cmd, &relation, &key, true, set, parents,
                            );
                            visited.push(key);
                        }
                    }
                }
            }
            Action::Override => {
                let mut visited: Vec<String> = Vec::new();
                for bucket in [&relation.want_only, &relation.changed] {
                    for key in bucket_keys(bucket) {
                        if !visited.contains(&key) {
                            self.mode_entry(
                                mode_id,
                                cmd,
                                &relation,
                                &key,
                                Action::Override,
                                false,
                                set,
                                parents,
                            );
                            visited.push(key);
                        }
                    }
                }
                for key in bucket_keys(&relation.matched) {
                    if !visited.contains(&key) {
                        self.mode_entry(
                            mode_id,
                            cmd,
                            &relation,
                            &key,
                            Action::Override,
                            false,
                            set,
                            parents,
                        );
                        visited.push(key);
                    }
                }
                // Entries the want document never names are removed.
                for key in bucket_keys(&relation.have_only) {
                    if !visited.contains(&key) {
                        self.mode_entry_delete(mode_id, cmd, &relation, &key, true, set, parents);
                    }
                }
            }
        }
    }

    /// Emits one keyed mode block: the entry command, its subcommands and
    /// submodes, and the exit command when the mode declares one.
    #[allow(clippy::too_many_arguments)]
    fn mode_entry(
        &self,
        mode_id: NodeId,
        cmd: NodeId,
        relation: &Relation,
        key: &str,
        action: Action,
        is_new: bool,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let entry = relation.find(key);
        let Some(command) = self.entry_common_parts(cmd, &entry, false).map(join) else {
            trace!(key = %key, "mode entry has no addressable command");
            return;
        };
        let mut chain = parents.to_vec();
        chain.push(command.clone());
        if is_new {
            set.push(command.clone(), parents);
        }

        let children: Vec<NodeId> = tree.node(mode_id).children.values().copied().collect();
        for child in children {
            self.dispatch_child(child, &entry, action, set, &chain);
        }
        let submodes: Vec<NodeId> = tree.node(mode_id).submodes.values().copied().collect();
        for submode in submodes {
            self.mode_commands(submode, &entry, action, set, &chain);
        }

        if let Some(exit) = tree.node(cmd).exit_cmd.clone() {
            if set.has_commands_under(&chain) {
                set.push(exit, &chain);
            }
        }
        if !is_new {
            set.remove_empty_block(&command, parents);
        }
    }

    /// Deletes one keyed mode block. When want names only the entry keys
    /// (or the walk deletes everything), the whole block is negated;
    /// otherwise the named subcommands are negated inside the block.
    #[allow(clippy::too_many_arguments)]
    fn mode_entry_delete(
        &self,
        mode_id: NodeId,
        cmd: NodeId,
        relation: &Relation,
        key: &str,
        whole: bool,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let entry = relation.find(key);
        let Some(common) = self.entry_common_parts(cmd, &entry, true) else {
            return;
        };

        let whole = whole || !self.entry_requests_children(mode_id, &entry);
        let negatable = match tree.node(cmd).kind {
            // Physical interface blocks only negate when the grammar says so.
            NodeKind::InterfaceList => tree.node(cmd).negate_policy.is_some(),
            _ => true,
        };

        if whole && negatable {
            let mut parts = common;
            negate(&mut parts);
            set.push(join(parts), parents);
            return;
        }

        let command = join(common);
        let mut chain = parents.to_vec();
        chain.push(command.clone());
        let delete_action = if whole { Action::DeleteAll } else { Action::Delete };
        let entry = if whole { entry.have_only_as_matched() } else { entry };

        let children: Vec<NodeId> = tree.node(mode_id).children.values().copied().collect();
        for child in children {
            self.dispatch_child(child, &entry, delete_action, set, &chain);
        }
        let submodes: Vec<NodeId> = tree.node(mode_id).submodes.values().copied().collect();
        for submode in submodes {
            self.mode_commands(submode, &entry, delete_action, set, &chain);
        }
        set.remove_empty_block(&command, parents);
    }

    /// A mode entered by a fixed command, one block per document.
    #[allow(clippy::too_many_arguments)]
    fn singleton_mode_commands(
        &self,
        mode_id: NodeId,
        cmd: NodeId,
        scope: &Relation,
        action: Action,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let fact = tree.node(cmd).fact_name.clone().unwrap_or_default();
        let inner = scope.find(&fact);
        if inner.is_empty() {
            return;
        }
        let command = tree
            .node(cmd)
            .cli_name
            .clone()
            .unwrap_or_else(|| fact.clone());

        if action.is_delete() && !self.entry_requests_children(mode_id, &inner) {
            let mut parts = vec![command];
            negate(&mut parts);
            set.push(join(parts), parents);
            return;
        }

        let mut chain = parents.to_vec();
        chain.push(command.clone());
        let children: Vec<NodeId> = tree.node(mode_id).children.values().copied().collect();
        for child in children {
            self.dispatch_child(child, &inner, action, set, &chain);
        }
        let submodes: Vec<NodeId> = tree.node(mode_id).submodes.values().copied().collect();
        for submode in submodes {
            self.mode_commands(submode, &inner, action, set, &chain);
        }
        if let Some(exit) = tree.node(cmd).exit_cmd.clone() {
            if set.has_commands_under(&chain) {
                set.push(exit, &chain);
            }
        }
        set.remove_empty_block(&command, parents);
    }

    /// True when want addresses anything inside the block beyond its keys.
    fn entry_requests_children(&self, mode_id: NodeId, entry: &Relation) -> bool {
        let tree = self.tree;
        let mode = tree.node(mode_id);
        let mut names: Vec<String> = Vec::new();
        for &child in mode.children.values() {
            self.collect_fact_names(child, &mut names);
        }
        for &submode in mode.submodes.values() {
            if let Some(cmd) = tree.node(submode).cmd_node {
                if let Some(name) = &tree.node(cmd).fact_name {
                    names.push(name.clone());
                }
            }
        }
        names.iter().any(|name| {
            bucket_get(&entry.want_only, name).is_some()
                || bucket_get(&entry.matched, name).is_some()
                || bucket_get(&entry.changed, name).is_some()
        })
    }

    fn collect_fact_names(&self, id: NodeId, out: &mut Vec<String>) {
        let node = self.tree.node(id);
        match node.kind {
            NodeKind::Skip => {
                for &child in node.children.values() {
                    self.collect_fact_names(child, out);
                }
            }
            _ => {
                if let Some(name) = &node.fact_name {
                    out.push(name.clone());
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Subcommand dispatch
    // ------------------------------------------------------------------

    /// Routes one subcommand node through the walk the action requires.
    fn dispatch_child(
        &self,
        child: NodeId,
        scope: &Relation,
        action: Action,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let node = tree.node(child);
        match node.kind {
            NodeKind::List | NodeKind::InterfaceList => {
                let name = node.fact_name.clone().unwrap_or_default();
                let relation = scope.find(&name);
                if !relation.is_empty() {
                    self.list_commands(child, relation, action, set, parents);
                }
            }
            NodeKind::ListGroup => {
                let name = node.fact_name.clone().unwrap_or_default();
                let relation = scope.find(&name);
                if !relation.is_empty() {
                    self.group_commands(child, relation, action, set, parents);
                }
            }
            _ => self.param_dispatch(child, scope, action, set, parents),
        }
    }

    fn param_dispatch(
        &self,
        child: NodeId,
        scope: &Relation,
        action: Action,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let node = self.tree.node(child);
        match action {
            Action::Merge => {
                if let Some(parts) = self.command_parts(child, scope, false) {
                    if !parts.is_empty() {
                        set.push(join(parts), parents);
                    }
                }
            }
            Action::Delete | Action::DeleteAll => {
                let scope = if action == Action::DeleteAll {
                    scope.have_only_as_matched()
                } else {
                    scope.clone()
                };
                if let Some(mut parts) = self.command_parts(child, &scope, true) {
                    if !parts.is_empty() {
                        if node.kind != NodeKind::FixedValue {
                            negate(&mut parts);
                        }
                        set.push(join(parts), parents);
                    }
                }
            }
            Action::Replace | Action::Override => {
                let fact = node.fact_name.clone().unwrap_or_default();
                let in_want = bucket_get(&scope.want_only, &fact).is_some()
                    || bucket_get(&scope.changed, &fact).is_some();
                let in_have = bucket_get(&scope.have_only, &fact).is_some()
                    || bucket_get(&scope.changed, &fact).is_some();
                if !in_want && !in_have {
                    return;
                }
                if in_have && !node.merge_as_replace {
                    self.param_dispatch(child, scope, Action::Delete, set, parents);
                }
                if in_want {
                    self.param_dispatch(child, scope, Action::Merge, set, parents);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Part generation
    // ------------------------------------------------------------------

    /// Builds the word sequence of one node against its enclosing scope.
    /// `None` means the node has nothing to say for this scope and state.
    fn command_parts(&self, id: NodeId, scope: &Relation, deleted: bool) -> Option<Vec<String>> {
        let tree = self.tree;
        let node = tree.node(id);

        if let Some(guard) = &node.if_facts_present {
            if !self.facts_guard_met(guard, scope) {
                return Some(Vec::new());
            }
        }

        match node.kind {
            NodeKind::Skip => {
                let mut parts = vec![node.cli_name.clone().unwrap_or_default()];
                self.append_children(id, scope, deleted, &mut parts);
                Some(parts)
            }
            NodeKind::Literal => {
                let fact = node.fact_name.clone().unwrap_or_default();
                let inner = scope.find(&fact);
                if inner.is_empty() {
                    return None;
                }
                let mut parts = Vec::new();
                if let Some(cli) = &node.cli_name {
                    parts.push(cli.clone());
                }
                self.append_children(id, &inner, deleted, &mut parts);
                if let Some(next) = node.next {
                    let tail = self.command_parts(next, &inner, deleted)?;
                    parts.extend(tail);
                }
                Some(parts)
            }
            NodeKind::FixedValue => self.fixed_parts(id, scope, deleted),
            NodeKind::Param | NodeKind::InterfaceParam | NodeKind::InterfaceKey => {
                self.param_parts(id, scope, deleted)
            }
            _ => None,
        }
    }

    fn param_parts(&self, id: NodeId, scope: &Relation, deleted: bool) -> Option<Vec<String>> {
        let tree = self.tree;
        let node = tree.node(id);
        let fact = node.fact_name.clone().unwrap_or_default();

        let mut parts = Vec::new();
        if let Some(cli) = &node.cli_name {
            parts.push(cli.clone());
        }

        let value = leaf_value(scope, &fact, deleted);
        match value {
            Some(value) => {
                if !(deleted && node.ignore_val_for_delete) {
                    parts.push(self.render_param(id, &value));
                }
            }
            None if deleted && node.ignore_val_for_delete => {
                // Addressed by word alone; the value never appears in the
                // negated form.
            }
            None => return None,
        }
        if deleted && node.ignore_val_for_delete {
            return Some(parts);
        }

        self.append_children(id, scope, deleted, &mut parts);

        if let Some(next) = node.next {
            match self.command_parts(next, scope, deleted) {
                Some(tail) if !tail.is_empty() => parts.extend(tail),
                _ => {
                    let next_node = tree.node(next);
                    if !next_node.optional {
                        // A mandatory continuation must be restated even
                        // when unchanged.
                        let name = next_node.fact_name.clone().unwrap_or_default();
                        let fallback = unchanged_leaf(scope, &name)?;
                        if let Some(cli) = &next_node.cli_name {
                            parts.push(cli.clone());
                        }
                        parts.push(self.render_param(next, &fallback));
                    }
                }
            }
        }
        Some(parts)
    }

    fn fixed_parts(&self, id: NodeId, scope: &Relation, deleted: bool) -> Option<Vec<String>> {
        let tree = self.tree;
        let node = tree.node(id);
        let fact = node.fact_name.clone().unwrap_or_default();

        let value = leaf_value(scope, &fact, deleted)?;
        let fixed = fixed_value(node.fixed_value.as_deref().unwrap_or_default());
        let at_fixed = value == fixed;

        let policy = node.negate_policy;
        let parent_negates = node
            .parent
            .map(|p| tree.node(p).negate_policy.is_some())
            .unwrap_or(false);

        let negate_command = match policy {
            None => {
                // Without a negation form the word only appears on the side
                // it spells.
                if deleted == at_fixed {
                    return None;
                }
                false
            }
            Some(NegatePolicy::Allow) => (deleted && at_fixed) || (!deleted && !at_fixed),
            Some(NegatePolicy::Skip) => deleted && at_fixed,
        };

        let mut parts = vec![node.cli_name.clone().unwrap_or_default()];
        self.append_children(id, scope, deleted, &mut parts);
        if negate_command && !parent_negates {
            negate(&mut parts);
        }
        Some(parts)
    }

    fn append_children(&self, id: NodeId, scope: &Relation, deleted: bool, parts: &mut Vec<String>) {
        let children: Vec<NodeId> = self.tree.node(id).children.values().copied().collect();
        for child in children {
            if let Some(child_parts) = self.command_parts(child, scope, deleted) {
                parts.extend(child_parts);
            }
        }
    }

    fn render_param(&self, id: NodeId, value: &Value) -> String {
        let node = self.tree.node(id);
        let value = match &node.translate_method {
            Some(method) => {
                translate(method, Direction::FactsToConfig, value).unwrap_or_else(|| value.clone())
            }
            None => value.clone(),
        };
        let text = scalar_text(&value);
        match node.kind {
            NodeKind::InterfaceParam => split_interface_reference(&text),
            NodeKind::InterfaceKey => self.interface_key_part(id, &text),
            _ if text.contains(' ') => format!("\"{text}\""),
            _ => text,
        }
    }

    /// Strips the interface type from a key value; vxlan endpoints keep
    /// their full name.
    fn interface_key_part(&self, id: NodeId, text: &str) -> String {
        let node = self.tree.node(id);
        let iface = node.interface_name.as_deref().unwrap_or_default();
        if iface == VXLAN_INTERFACE {
            return text.to_string();
        }
        text.strip_prefix(iface).unwrap_or(text).to_string()
    }

    fn facts_guard_met(&self, guard: &str, scope: &Relation) -> bool {
        let (name, negated) = match guard.strip_prefix('!') {
            Some(rest) => (rest, true),
            None => (guard, false),
        };
        let present = [
            &scope.want_only,
            &scope.matched,
            &scope.changed,
            &scope.have_only,
        ]
        .iter()
        .any(|b| bucket_get(b, name).is_some());
        present != negated
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    fn list_commands(
        &self,
        id: NodeId,
        mut relation: Relation,
        action: Action,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        match action {
            Action::Merge => {
                self.list_merge(
                    id,
                    &mut relation,
                    ListBucket::WantOnly,
                    MergePulls { changed: true, ..MergePulls::default() },
                    set,
                    parents,
                );
                self.list_merge(
                    id,
                    &mut relation,
                    ListBucket::Changed,
                    MergePulls::default(),
                    set,
                    parents,
                );
            }
            Action::Delete => self.list_delete(id, &relation, false, set, parents),
            Action::DeleteAll => self.list_delete(id, &relation, true, set, parents),
            Action::Replace => {
                relation.ignore_match_only();
                let snapshot = relation.clone();
                self.list_delete(id, &snapshot, false, set, parents);
                self.list_merge(
                    id,
                    &mut relation,
                    ListBucket::WantOnly,
                    MergePulls { changed: true, matched: true, ..MergePulls::default() },
                    set,
                    parents,
                );
                self.list_merge(
                    id,
                    &mut relation,
                    ListBucket::Changed,
                    MergePulls { matched: true, ..MergePulls::default() },
                    set,
                    parents,
                );
            }
            Action::Override => {
                relation.ignore_match_only();
                let snapshot = relation.clone();
                self.list_delete(id, &snapshot, true, set, parents);
                self.list_merge(
                    id,
                    &mut relation,
                    ListBucket::WantOnly,
                    MergePulls { changed: true, matched: true, have_only: true },
                    set,
                    parents,
                );
                self.list_merge(
                    id,
                    &mut relation,
                    ListBucket::Changed,
                    MergePulls { matched: true, have_only: true, ..MergePulls::default() },
                    set,
                    parents,
                );
                self.list_merge(
                    id,
                    &mut relation,
                    ListBucket::Matched,
                    MergePulls { have_only: true, ..MergePulls::default() },
                    set,
                    parents,
                );
            }
        }
    }

    fn list_merge(
        &self,
        id: NodeId,
        relation: &mut Relation,
        bucket: ListBucket,
        pulls: MergePulls,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let keys = bucket_keys(bucket.of(relation));
        for key in keys {
            let entry = relation.find(&key);
            let Some(mut parts) = self.entry_common_parts(id, &entry, false) else {
                continue;
            };
            let prefix = self.parent_cli_names(id);
            if !prefix.is_empty() {
                let mut with_prefix = prefix;
                with_prefix.extend(parts);
                parts = with_prefix;
            }

            if let Some(next) = tree.node(id).next {
                self.nested_list_merge(id, next, &entry, &parts, set, parents);
            } else {
                self.append_entry_children(id, &entry, &mut parts);
            }

            // Pull the same entry out of the other buckets so a later pass
            // does not emit it again; its fields join this command.
            let mut pulled: Vec<Relation> = Vec::new();
            if pulls.changed {
                if let Some(node) = bucket_pop(&mut relation.changed, &key) {
                    pulled.push(wrap_changed(node));
                }
            }
            if pulls.matched {
                if let Some(node) = bucket_pop(&mut relation.matched, &key) {
                    pulled.push(wrap_want_only(node));
                }
            }
            if pulls.have_only {
                if let Some(node) = bucket_pop(&mut relation.have_only, &key) {
                    pulled.push(wrap_want_only(node));
                }
            }
            if tree.node(id).next.is_none() {
                for extra in &pulled {
                    self.append_entry_children(id, extra, &mut parts);
                }
                set.push(join(parts), parents);
            }
        }
    }

    fn nested_list_merge(
        &self,
        _outer: NodeId,
        inner: NodeId,
        entry: &Relation,
        prefix: &[String],
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let inner_name = tree.node(inner).fact_name.clone().unwrap_or_default();
        let inner_rel = entry.find(&inner_name);
        let mut keys = bucket_keys(&inner_rel.want_only);
        for key in bucket_keys(&inner_rel.changed) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        for key in keys {
            let sub = inner_rel.find(&key);
            let Some(sub_parts) = self.entry_common_parts(inner, &sub, false) else {
                continue;
            };
            let mut parts = prefix.to_vec();
            parts.extend(sub_parts);
            self.append_entry_children(inner, &sub, &mut parts);
            set.push(join(parts), parents);
        }
    }

    fn list_delete(
        &self,
        id: NodeId,
        relation: &Relation,
        include_have_only: bool,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let mut visited: Vec<String> = Vec::new();
        let mut buckets = vec![&relation.matched, &relation.changed];
        if include_have_only {
            buckets.push(&relation.have_only);
        }
        for bucket in buckets {
            for key in bucket_keys(bucket) {
                if visited.contains(&key) {
                    continue;
                }
                visited.push(key.clone());
                let entry = relation.find(&key);
                let entry = if include_have_only {
                    entry.have_only_as_matched()
                } else {
                    entry
                };
                let Some(mut parts) = self.entry_common_parts(id, &entry, true) else {
                    continue;
                };
                let prefix = self.parent_cli_names(id);
                if !prefix.is_empty() {
                    let mut with_prefix = prefix;
                    with_prefix.extend(parts);
                    parts = with_prefix;
                }

                if let Some(inner) = tree.node(id).next {
                    self.nested_list_delete(inner, &entry, &parts, include_have_only, set, parents);
                    continue;
                }

                self.append_entry_children_deleted(id, &entry, &mut parts);
                negate(&mut parts);
                set.push(join(parts), parents);
            }
        }
    }

    fn nested_list_delete(
        &self,
        inner: NodeId,
        entry: &Relation,
        prefix: &[String],
        include_have_only: bool,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let tree = self.tree;
        let inner_name = tree.node(inner).fact_name.clone().unwrap_or_default();
        let inner_rel = entry.find(&inner_name);
        let mut keys = bucket_keys(&inner_rel.matched);
        for key in bucket_keys(&inner_rel.changed) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if include_have_only {
            for key in bucket_keys(&inner_rel.have_only) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        for key in keys {
            let sub = inner_rel.find(&key);
            let sub = if include_have_only {
                sub.have_only_as_matched()
            } else {
                sub
            };
            let Some(sub_parts) = self.entry_common_parts(inner, &sub, true) else {
                continue;
            };
            let mut parts = prefix.to_vec();
            parts.extend(sub_parts);
            self.append_entry_children_deleted(inner, &sub, &mut parts);
            negate(&mut parts);
            set.push(join(parts), parents);
        }
    }

    /// The addressing words of one entry: the list word, its fixed words
    /// and its key values. `None` when a key cannot be resolved.
    fn entry_common_parts(&self, id: NodeId, entry: &Relation, deleted: bool) -> Option<Vec<String>> {
        let tree = self.tree;
        let node = tree.node(id);
        let mut parts = Vec::new();
        if let Some(cli) = &node.cli_name {
            parts.push(cli.clone());
        }
        for word in &node.fixed_words {
            if deleted && node.ignore_words_for_delete.iter().any(|w| w == word) {
                continue;
            }
            parts.push(word.clone());
        }
        for &key in &node.key_nodes {
            let key_node = tree.node(key);
            let name = key_node.fact_name.clone().unwrap_or_default();
            let value = entry_field(entry, &name)?;
            if key_node.kind == NodeKind::InterfaceKey {
                let text = scalar_text(&value);
                if !self.valid_interface_key(key, &text) {
                    return None;
                }
            }
            parts.push(self.render_param(key, &value));
        }
        Some(parts)
    }

    fn valid_interface_key(&self, id: NodeId, text: &str) -> bool {
        let node = self.tree.node(id);
        let iface = node.interface_name.as_deref().unwrap_or_default();
        if iface == VXLAN_INTERFACE {
            return text.starts_with(VTEP_PREFIX);
        }
        text.starts_with(iface)
    }

    fn append_entry_children(&self, id: NodeId, entry: &Relation, parts: &mut Vec<String>) {
        let tree = self.tree;
        let key_nodes = tree.node(id).key_nodes.clone();
        let children: Vec<NodeId> = tree.node(id).children.values().copied().collect();
        for child in children {
            if key_nodes.contains(&child) {
                continue;
            }
            match self.command_parts(child, entry, false) {
                Some(child_parts) => parts.extend(child_parts),
                None if !tree.node(child).optional => {
                    // Mandatory fields are restated from the device side.
                    let name = tree.node(child).fact_name.clone().unwrap_or_default();
                    if let Some(value) = unchanged_leaf(entry, &name) {
                        if let Some(cli) = &tree.node(child).cli_name {
                            parts.push(cli.clone());
                        }
                        parts.push(self.render_param(child, &value));
                    }
                }
                None => {}
            }
        }
    }

    fn append_entry_children_deleted(&self, id: NodeId, entry: &Relation, parts: &mut Vec<String>) {
        let tree = self.tree;
        let key_nodes = tree.node(id).key_nodes.clone();
        let children: Vec<NodeId> = tree.node(id).children.values().copied().collect();
        for child in children {
            if key_nodes.contains(&child) {
                continue;
            }
            if let Some(child_parts) = self.command_parts(child, entry, true) {
                parts.extend(child_parts);
            }
        }
    }

    // ------------------------------------------------------------------
    // Grouped lists
    // ------------------------------------------------------------------

    /// A grouped list emits one full command per populated child rather
    /// than one command per entry.
    fn group_commands(
        &self,
        id: NodeId,
        mut relation: Relation,
        action: Action,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        match action {
            Action::Merge => {
                self.group_walk(id, &mut relation, ListBucket::WantOnly, true, false, set, parents);
                self.group_walk(id, &mut relation, ListBucket::Changed, false, false, set, parents);
            }
            Action::Delete => {
                self.group_delete(id, &relation, false, set, parents);
            }
            Action::DeleteAll => {
                self.group_delete(id, &relation, true, set, parents);
            }
            Action::Replace | Action::Override => {
                relation.ignore_match_only();
                let snapshot = relation.clone();
                for key in bucket_keys(&snapshot.have_only) {
                    // Entries want never names are removed in full.
                    if bucket_get(&snapshot.want_only, &key).is_none()
                        && bucket_get(&snapshot.changed, &key).is_none()
                        && (action == Action::Override
                            || bucket_get(&snapshot.matched, &key).is_some())
                    {
                        self.group_delete_entry(id, &snapshot, &key, set, parents);
                    }
                }
                self.group_walk(id, &mut relation, ListBucket::WantOnly, true, true, set, parents);
                self.group_walk(id, &mut relation, ListBucket::Changed, false, true, set, parents);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn group_walk(
        &self,
        id: NodeId,
        relation: &mut Relation,
        bucket: ListBucket,
        pull_changed: bool,
        pull_matched: bool,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let keys = bucket_keys(bucket.of(relation));
        for key in keys {
            let mut scopes = vec![relation.find(&key)];
            if pull_changed {
                if let Some(node) = bucket_pop(&mut relation.changed, &key) {
                    scopes.push(wrap_changed(node));
                }
            }
            if pull_matched {
                if let Some(node) = bucket_pop(&mut relation.matched, &key) {
                    scopes.push(wrap_want_only(node));
                }
            }
            let entry = &scopes[0];
            let Some(common) = self.entry_common_parts(id, entry, false) else {
                continue;
            };
            let prefix = self.parent_cli_names(id);
            for scope in &scopes {
                self.group_child_commands(id, scope, &prefix, &common, false, set, parents);
            }
        }
    }

    fn group_delete(
        &self,
        id: NodeId,
        relation: &Relation,
        include_have_only: bool,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let mut visited: Vec<String> = Vec::new();
        let mut buckets = vec![&relation.matched, &relation.changed];
        if include_have_only {
            buckets.push(&relation.have_only);
        }
        for bucket in buckets {
            for key in bucket_keys(bucket) {
                if !visited.contains(&key) {
                    visited.push(key.clone());
                    self.group_delete_entry(id, relation, &key, set, parents);
                }
            }
        }
    }

    fn group_delete_entry(
        &self,
        id: NodeId,
        relation: &Relation,
        key: &str,
        set: &mut CommandSet,
        parents: &[String],
    ) {
        let entry = relation.find(key);
        // Want naming only the entry keys means the whole entry goes, with
        // its field values restated from the device side.
        let key_names = self.key_fact_names(id);
        let addresses_fields = [&entry.want_only, &entry.matched, &entry.changed]
            .iter()
            .any(|b| bucket_keys(b).iter().any(|k| !key_names.contains(k)));
        let entry = if addresses_fields {
            entry
        } else {
            entry.have_only_as_matched()
        };
        let Some(common) = self.entry_common_parts(id, &entry, true) else {
            return;
        };
        let prefix = self.parent_cli_names(id);
        let emitted = self.group_child_commands(id, &entry, &prefix, &common, true, set, parents);
        if emitted == 0 {
            let mut parts = prefix;
            parts.extend(common);
            negate(&mut parts);
            set.push(join(parts), parents);
        }
    }

    fn key_fact_names(&self, id: NodeId) -> Vec<String> {
        self.tree
            .node(id)
            .key_nodes
            .iter()
            .filter_map(|&k| self.tree.node(k).fact_name.clone())
            .collect()
    }

    /// Emits one full command per populated child of the group entry.
    /// Returns how many commands were pushed.
    #[allow(clippy::too_many_arguments)]
    fn group_child_commands(
        &self,
        id: NodeId,
        scope: &Relation,
        prefix: &[String],
        common: &[String],
        deleted: bool,
        set: &mut CommandSet,
        parents: &[String],
    ) -> usize {
        let tree = self.tree;
        let mut emitted = 0;
        let key_nodes = tree.node(id).key_nodes.clone();
        let children: Vec<NodeId> = tree.node(id).children.values().copied().collect();
        for child in children {
            if key_nodes.contains(&child) {
                continue;
            }
            let Some(child_parts) = self.command_parts(child, scope, deleted) else {
                continue;
            };
            if child_parts.is_empty() {
                continue;
            }
            let mut parts = prefix.to_vec();
            parts.extend_from_slice(common);
            let child_negated = child_parts.first().map(String::as_str) == Some(NEGATE_KEYWORD);
            if child_negated {
                parts.extend(child_parts.into_iter().skip(1));
                if !deleted {
                    // The negation belongs to the whole command line.
                    negate(&mut parts);
                }
            } else {
                parts.extend(child_parts);
            }
            if deleted {
                negate(&mut parts);
            }
            set.push(join(parts), parents);
            emitted += 1;
        }
        emitted
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Literal words of the ancestors below the nearest mode or list,
    /// outermost first.
    fn parent_cli_names(&self, id: NodeId) -> Vec<String> {
        let tree = self.tree;
        let mut names = Vec::new();
        for ancestor in tree.ancestors(id) {
            let node = tree.node(ancestor);
            match node.kind {
                NodeKind::Literal | NodeKind::Skip => {
                    if let Some(cli) = &node.cli_name {
                        names.push(cli.clone());
                    }
                }
                _ => break,
            }
        }
        names.reverse();
        names
    }
}

/// Which relation bucket a list pass walks.
#[derive(Debug, Clone, Copy)]
enum ListBucket {
    WantOnly,
    Matched,
    Changed,
}

impl ListBucket {
    fn of(self, relation: &Relation) -> &crate::diff::Bucket {
        match self {
            ListBucket::WantOnly => &relation.want_only,
            ListBucket::Matched => &relation.matched,
            ListBucket::Changed => &relation.changed,
        }
    }
}

/// Toggles the negation keyword at the front of a command.
fn negate(parts: &mut Vec<String>) {
    if parts.first().map(String::as_str) == Some(NEGATE_KEYWORD) {
        parts.remove(0);
    } else {
        parts.insert(0, NEGATE_KEYWORD.to_string());
    }
}

fn join(parts: Vec<String>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The value a field contributes to a command: want side for merges,
/// device side for deletes.
fn leaf_value(scope: &Relation, name: &str, deleted: bool) -> Option<Value> {
    let (primary, secondary) = if deleted {
        (&scope.matched, &scope.changed)
    } else {
        (&scope.want_only, &scope.changed)
    };
    let node = bucket_get(primary, name).or_else(|| bucket_get(secondary, name))?;
    let value = if deleted {
        node.comparable_value()
    } else {
        node.base_value()
    }?;
    Some(value.clone())
}

/// An unchanged field restated from the matched or have-only bucket.
fn unchanged_leaf(scope: &Relation, name: &str) -> Option<Value> {
    let node =
        bucket_get(&scope.matched, name).or_else(|| bucket_get(&scope.have_only, name))?;
    node.comparable_value().cloned()
}

/// Any field value of an entry, searched across all buckets. Used for key
/// fields, which land wherever the rest of the entry did.
fn entry_field(entry: &Relation, name: &str) -> Option<Value> {
    for bucket in [&entry.want_only, &entry.matched, &entry.changed, &entry.have_only] {
        if let Some(node) = bucket_get(bucket, name) {
            if let Some(value) = node.base_value() {
                return Some(value.clone());
            }
        }
    }
    None
}

fn wrap_changed(node: DiffNode) -> Relation {
    Relation {
        changed: Some(node),
        ..Relation::default()
    }
}

fn wrap_want_only(node: DiffNode) -> Relation {
    Relation {
        want_only: Some(node),
        ..Relation::default()
    }
}

fn fixed_value(text: &str) -> Value {
    match text.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

/// Splits an interface reference back into its type and identifier words.
fn split_interface_reference(text: &str) -> String {
    match text.find(|c: char| c.is_ascii_digit()) {
        Some(index) if index > 0 => format!("{} {}", &text[..index], &text[index..]),
        _ => text.to_string(),
    }
}
