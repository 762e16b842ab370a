//! # Cliconf - Grammar-Driven Network CLI Configuration
//!
//! Cliconf compiles a declarative YAML grammar describing a network device's
//! CLI into a node tree, then drives that tree in both directions:
//!
//! - **Fact extraction**: parse `show running-config` text into a structured
//!   fact document.
//! - **Command synthesis**: compare a wanted fact document against the
//!   device's current facts and emit the CLI commands that close the gap,
//!   under merge, delete, replace, or override semantics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ YAML grammar │ ──▶ │  Node tree   │ ──▶ │ list-path table  │
//! └──────────────┘     └──────┬───────┘     └──────────────────┘
//!                             │
//!          ┌──────────────────┴──────────────────┐
//!          ▼                                     ▼
//! ┌─────────────────┐                   ┌─────────────────┐
//! │ fact extraction │                   │command synthesis│
//! │ (device → facts)│                   │ (facts → device)│
//! └─────────────────┘                   └─────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use cliconf::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let grammar = Grammar::from_path("sonic.yml".as_ref())?;
//!     let tree = compile(&grammar)?;
//!
//!     let device = DeviceConfig::parse(&running_config);
//!     let have = extract(&tree, &device)?;
//!
//!     let commands = synthesize(&tree, &want, &have, State::Merged)?;
//!     for command in commands {
//!         println!("{command}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of the types most callers need.

    pub use crate::commands::synthesize;
    pub use crate::device::{CommandSet, DeviceConfig};
    pub use crate::diff::Relation;
    pub use crate::error::{Error, Result};
    pub use crate::facts::extract;
    pub use crate::grammar::Grammar;
    pub use crate::state::State;
    pub use crate::tree::compile::compile;
    pub use crate::tree::{NodeId, NodeKind, Tree};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
///
/// Provides the main [`Error`](error::Error) enum covering grammar parsing,
/// fact validation, and I/O failures, with stable process exit codes.
pub mod error;

/// The configuration state a synthesis run targets.
pub mod state;

// ============================================================================
// Grammar
// ============================================================================

/// Grammar documents and their annotation syntax.
///
/// A grammar is a YAML document of modes, each with an optional entry
/// command, subcommand lines, and nested submodes. Words on a command line
/// carry `=KEY:value&KEY:value` annotations that control how the word is
/// parsed and synthesized.
pub mod grammar;

/// The compiled node tree and the grammar-to-tree compiler.
pub mod tree;

// ============================================================================
// Device Text
// ============================================================================

/// Parsing of `show running-config` text and command accumulation.
pub mod device;

/// Value translation between device spelling and fact spelling.
pub mod translate;

/// Value validation methods referenced by grammar annotations.
pub mod validate;

// ============================================================================
// Facts and Synthesis
// ============================================================================

/// Fact extraction: device text to fact document.
pub mod facts;

/// List paths and fact document reshaping for comparison.
pub mod paths;

/// Want/have fact differencing.
pub mod diff;

/// Command synthesis: fact difference to device commands.
pub mod commands;

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of Cliconf.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns detailed version information including build metadata.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        target: std::env::consts::ARCH,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Detailed version information for the Cliconf build.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Semantic version string
    pub version: &'static str,
    /// Target architecture for the build
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cliconf {} ({}, {})",
            self.version, self.target, self.profile
        )
    }
}
