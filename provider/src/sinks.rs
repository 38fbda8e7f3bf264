//! Consumer contracts: the problem list and the squiggle layer.
//!
//! Every method here is invoked on the serialized publish context, never on
//! a producer thread or the worker.

use std::sync::Arc;

use errata_types::{ProviderId, ResolvedSquiggle};

use crate::error::SinkError;
use crate::tasks::TaskSource;

/// The shared problem list.
///
/// The provider never pushes individual items; it signals "re-pull
/// everything" and the list enumerates through the [`TaskSource`].
pub trait ProblemList: Send + Sync {
    fn refresh_all(&self, source: &TaskSource) -> Result<(), SinkError>;

    /// Release the registration for a provider that is shutting down.
    fn unregister(&self, _provider: ProviderId) {}
}

/// A live text buffer diagnostics can be drawn on.
pub trait TextBuffer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Current length in characters; squiggles are clamped to it.
    fn len_chars(&self) -> usize;
}

/// Replaces the full set of squiggles on one buffer.
pub trait Tagger: Send + Sync {
    fn replace_all(&self, squiggles: Vec<ResolvedSquiggle>) -> Result<(), SinkError>;
}

/// Looks up the tagger for a buffer.
pub trait DecorationHost: Send + Sync {
    /// `None` means the buffer has no squiggle capability; it is skipped.
    fn tagger_for(&self, buffer: &dyn TextBuffer) -> Option<Arc<dyn Tagger>>;
}

/// A decoration host for embedders without a squiggle layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDecorations;

impl DecorationHost for NoDecorations {
    fn tagger_for(&self, _buffer: &dyn TextBuffer) -> Option<Arc<dyn Tagger>> {
        None
    }
}
