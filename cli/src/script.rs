//! JSON-lines replay scripts.
//!
//! One operation per line; blank lines and `#` comments are skipped.
//!
//! ```text
//! {"op":"register","path":"src/main.flx","moniker":"parser","len":120}
//! {"op":"replace","path":"src/main.flx","moniker":"parser","items":[
//!     {"message":"expected `;`","severity":"high","squiggle":true,
//!      "span":{"start":{"line":3,"column":5,"index":40},"end":{"index":41}}}]}
//! {"op":"flush"}
//! ```

use std::path::Path;
use std::{fs, io};

use anyhow::{Context, Result};
use errata_provider::DiagnosticItem;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Open a buffer for `(path, moniker)` with `len` characters.
    Register {
        path: String,
        #[serde(default)]
        moniker: String,
        len: usize,
    },
    Unregister {
        path: String,
        #[serde(default)]
        moniker: String,
    },
    Replace {
        path: String,
        #[serde(default)]
        moniker: String,
        #[serde(default)]
        items: Vec<DiagnosticItem>,
    },
    Add {
        path: String,
        #[serde(default)]
        moniker: String,
        items: Vec<DiagnosticItem>,
    },
    Clear {
        path: String,
        #[serde(default)]
        moniker: String,
    },
    ClearAll,
    Flush,
    Sleep {
        ms: u64,
    },
}

/// Parse a whole script. Errors name the offending line.
pub fn parse(script: &str) -> Result<Vec<Op>> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("line {}: invalid operation", index + 1))
        })
        .collect()
}

/// Read a script from `path`, or stdin when `path` is `None` or `-`.
pub fn read(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display())),
        _ => io::read_to_string(io::stdin()).context("failed to read script from stdin"),
    }
}
