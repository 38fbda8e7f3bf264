//! Identity of the source units diagnostics are attributed to.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct EntryInner {
    path: PathBuf,
}

/// Opaque handle to one logical source unit.
///
/// Equality and hashing are by identity: two entries created for the same
/// path are still different entries. Clones share the identity.
#[derive(Clone)]
pub struct SourceEntry(Arc<EntryInner>);

impl SourceEntry {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(EntryInner { path: path.into() }))
    }

    /// Path shown to the user for this unit.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0.path
    }
}

impl PartialEq for SourceEntry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SourceEntry {}

impl Hash for SourceEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceEntry")
            .field(&self.0.path)
            .field(&Arc::as_ptr(&self.0))
            .finish()
    }
}

/// Which source unit, and which diagnostic stream for it, a batch belongs to.
///
/// The empty key (no entry) stands for "all entries" in clear operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    entry: Option<SourceEntry>,
    moniker: String,
}

impl EntryKey {
    #[must_use]
    pub fn new(entry: &SourceEntry, moniker: impl Into<String>) -> Self {
        Self {
            entry: Some(entry.clone()),
            moniker: moniker.into(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            entry: None,
            moniker: String::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    #[must_use]
    pub fn entry(&self) -> Option<&SourceEntry> {
        self.entry.as_ref()
    }

    #[must_use]
    pub fn moniker(&self) -> &str {
        &self.moniker
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{}#{}", entry.path().display(), self.moniker),
            None => f.write_str("<all>"),
        }
    }
}
