//! Grammar source model.
//!
//! A grammar is a YAML mapping of mode names to mode specifications. A mode
//! holds an optional entry `command` line, a list of `subcommands` lines,
//! and any number of nested submodes (every key other than `command` and
//! `subcommands` is a submode):
//!
//! ```yaml
//! interface:
//!   command: "interface $name=LIST:interfaces&KEYS:$name $name=NAME:name&INTERFACE_PARAM"
//!   subcommands:
//!     - "mtu $m=NAME:mtu&OPTIONAL"
//!     - "shutdown=NAME:shutdown&VALUE:true&NEGATE_CMD:ALLOW"
//! ```

pub mod annotation;

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};

/// One mode of the grammar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeSpec {
    /// The annotated line that enters the mode, when the mode is a block.
    pub command: Option<String>,
    /// Annotated lines recognised inside the mode (or at top level for a
    /// mode without a command).
    pub subcommands: Vec<String>,
    /// Nested submodes by name.
    pub submodes: IndexMap<String, ModeSpec>,
}

/// A full grammar: ordered modes by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grammar {
    /// Modes in declaration order.
    pub modes: IndexMap<String, ModeSpec>,
}

impl Grammar {
    /// Parses a grammar from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Grammar> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
        let mapping = doc
            .as_mapping()
            .ok_or_else(|| Error::GrammarValidation("grammar root must be a mapping".into()))?;

        let mut modes = IndexMap::new();
        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| Error::GrammarValidation("mode names must be strings".into()))?;
            modes.insert(name.to_string(), mode_from_yaml(name, value)?);
        }
        debug!(modes = modes.len(), "parsed grammar");
        Ok(Grammar { modes })
    }

    /// Loads a grammar from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Grammar> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text).map_err(|e| {
            Error::grammar_parse(path, e.to_string(), Some(Box::new(e)))
        })
    }

    /// Looks up a mode by name.
    pub fn mode(&self, name: &str) -> Result<&ModeSpec> {
        self.modes
            .get(name)
            .ok_or_else(|| Error::ModeNotFound(name.to_string()))
    }
}

fn mode_from_yaml(name: &str, value: &serde_yaml::Value) -> Result<ModeSpec> {
    let mapping = value.as_mapping().ok_or_else(|| {
        Error::GrammarValidation(format!("mode '{name}' must be a mapping"))
    })?;

    let mut spec = ModeSpec::default();
    for (key, item) in mapping {
        let key = key.as_str().ok_or_else(|| {
            Error::GrammarValidation(format!("keys of mode '{name}' must be strings"))
        })?;
        match key {
            "command" => {
                spec.command = Some(
                    item.as_str()
                        .ok_or_else(|| {
                            Error::GrammarValidation(format!(
                                "command of mode '{name}' must be a string"
                            ))
                        })?
                        .to_string(),
                );
            }
            "subcommands" => {
                let lines = item.as_sequence().ok_or_else(|| {
                    Error::GrammarValidation(format!(
                        "subcommands of mode '{name}' must be a list"
                    ))
                })?;
                for line in lines {
                    let line = line.as_str().ok_or_else(|| {
                        Error::GrammarValidation(format!(
                            "subcommands of mode '{name}' must be strings"
                        ))
                    })?;
                    spec.subcommands.push(line.to_string());
                }
            }
            // Any other key introduces a submode.
            submode => {
                spec.submodes
                    .insert(submode.to_string(), mode_from_yaml(submode, item)?);
            }
        }
    }
    Ok(spec)
}
