//! Device configuration text model.
//!
//! `show running-config` output is an indentation-structured block tree with
//! `!` separator lines between sections. [`DeviceConfig`] parses that text,
//! and [`CommandSet`] accumulates synthesized commands with their mode
//! context, in emission order.

use similar::TextDiff;
use tracing::trace;

/// One line of device configuration with its nested lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The line text, whitespace-trimmed.
    pub text: String,
    /// Indented lines under this one.
    pub children: Vec<Block>,
}

impl Block {
    fn new(text: impl Into<String>) -> Block {
        Block {
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// True when the block has nested lines (a mode block rather than a
    /// plain command).
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Parsed `show running-config` text.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    /// Top-level blocks in document order.
    pub blocks: Vec<Block>,
}

/// True when `text` starts with `prefix` on a token boundary.
pub fn starts_with_token(text: &str, prefix: &str) -> bool {
    text == prefix
        || (text.starts_with(prefix) && text.as_bytes().get(prefix.len()) == Some(&b' '))
}

impl DeviceConfig {
    /// Parses device text. Blank lines and `!` comment lines are dropped;
    /// nesting follows leading-space depth.
    pub fn parse(text: &str) -> DeviceConfig {
        let mut config = DeviceConfig::default();
        // Stack of (indent, path of child indices) into the block forest.
        let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();

        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('!') {
                continue;
            }
            let indent = raw.len() - raw.trim_start().len();
            while let Some((top_indent, _)) = stack.last() {
                if *top_indent >= indent {
                    stack.pop();
                } else {
                    break;
                }
            }

            let path: Vec<usize> = match stack.last() {
                None => {
                    config.blocks.push(Block::new(trimmed));
                    vec![config.blocks.len() - 1]
                }
                Some((_, parent_path)) => {
                    let parent = config.block_at_mut(parent_path);
                    parent.children.push(Block::new(trimmed));
                    let mut path = parent_path.clone();
                    path.push(parent.children.len() - 1);
                    path
                }
            };
            stack.push((indent, path));
        }

        trace!(blocks = config.blocks.len(), "parsed device config");
        config
    }

    fn block_at_mut(&mut self, path: &[usize]) -> &mut Block {
        let mut block = &mut self.blocks[path[0]];
        for index in &path[1..] {
            block = &mut block.children[*index];
        }
        block
    }

    /// Top-level blocks whose first line starts with `prefix` on a token
    /// boundary.
    pub fn find_blocks(&self, prefix: &str) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| starts_with_token(&b.text, prefix))
            .collect()
    }
}

// ============================================================================
// Command accumulation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct CommandEntry {
    text: String,
    parents: Vec<String>,
}

/// Ordered, de-duplicated command accumulator.
///
/// Pushing a command with mode parents first materializes any missing
/// parent commands, so a mode is entered once however many of its
/// subcommands are emitted.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    entries: Vec<CommandEntry>,
}

impl CommandSet {
    pub fn new() -> CommandSet {
        CommandSet::default()
    }

    fn contains(&self, text: &str, parents: &[String]) -> bool {
        self.entries
            .iter()
            .any(|e| e.text == text && e.parents == parents)
    }

    /// Appends a command under the given parent chain.
    pub fn push(&mut self, command: impl Into<String>, parents: &[String]) {
        let command = command.into();
        for depth in 0..parents.len() {
            let (text, chain) = (&parents[depth], &parents[..depth]);
            if !self.contains(text, chain) {
                self.entries.push(CommandEntry {
                    text: text.clone(),
                    parents: chain.to_vec(),
                });
            }
        }
        if !self.contains(&command, parents) {
            self.entries.push(CommandEntry {
                text: command,
                parents: parents.to_vec(),
            });
        }
    }

    /// Removes the command when nothing was emitted under it. Returns
    /// whether a removal happened.
    pub fn remove_empty_block(&mut self, command: &str, parents: &[String]) -> bool {
        let mut chain = parents.to_vec();
        chain.push(command.to_string());
        if self.entries.iter().any(|e| e.parents == chain) {
            return false;
        }
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.text == command && e.parents == parents));
        self.entries.len() != before
    }

    /// True when no command was accumulated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when at least one command sits directly under the chain.
    pub fn has_commands_under(&self, parents: &[String]) -> bool {
        self.entries.iter().any(|e| e.parents == parents)
    }

    /// The flat command list, in emission order.
    pub fn into_commands(self) -> Vec<String> {
        self.entries.into_iter().map(|e| e.text).collect()
    }
}

/// Renders a unified diff between two configuration texts.
pub fn render_diff(before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header("before", "after")
        .to_string()
}
