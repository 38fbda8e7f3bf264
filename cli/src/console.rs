//! Console consumers: a problem list and a squiggle layer that print.

use std::io::{self, Write};
use std::sync::Arc;

use errata_provider::{
    DecorationHost, ProblemList, ProviderId, ResolvedSquiggle, SinkError, SquiggleKind, Tagger,
    TaskSource, TextBuffer,
};
use parking_lot::Mutex;

fn write_failed(err: &io::Error) -> SinkError {
    SinkError::new(format!("console write failed: {err}"))
}

/// Prints every task on each refresh.
pub struct ConsoleProblemList<W> {
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send> ConsoleProblemList<W> {
    pub fn new(out: Arc<Mutex<W>>) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ProblemList for ConsoleProblemList<W> {
    fn refresh_all(&self, source: &TaskSource) -> Result<(), SinkError> {
        let tasks = source.tasks();
        let mut out = self.out.lock();
        writeln!(out, "-- problems ({}) --", tasks.len()).map_err(|e| write_failed(&e))?;
        for task in &tasks {
            writeln!(out, "{task}").map_err(|e| write_failed(&e))?;
        }
        out.flush().map_err(|e| write_failed(&e))
    }

    fn unregister(&self, provider: ProviderId) {
        tracing::debug!(%provider, "Problem list registration released");
    }
}

/// Hands every buffer a tagger that prints its squiggles.
pub struct ConsoleDecorations<W> {
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send> ConsoleDecorations<W> {
    pub fn new(out: Arc<Mutex<W>>) -> Self {
        Self { out }
    }
}

impl<W: Write + Send + 'static> DecorationHost for ConsoleDecorations<W> {
    fn tagger_for(&self, buffer: &dyn TextBuffer) -> Option<Arc<dyn Tagger>> {
        Some(Arc::new(ConsoleTagger {
            buffer: buffer.name().to_string(),
            out: Arc::clone(&self.out),
        }))
    }
}

struct ConsoleTagger<W> {
    buffer: String,
    out: Arc<Mutex<W>>,
}

fn kind_label(kind: SquiggleKind) -> &'static str {
    match kind {
        SquiggleKind::Error => "error",
        SquiggleKind::Warning => "warning",
        SquiggleKind::Suggestion => "suggestion",
    }
}

impl<W: Write + Send> Tagger for ConsoleTagger<W> {
    fn replace_all(&self, squiggles: Vec<ResolvedSquiggle>) -> Result<(), SinkError> {
        let mut out = self.out.lock();
        if squiggles.is_empty() {
            writeln!(out, "squiggles {}: none", self.buffer).map_err(|e| write_failed(&e))?;
        }
        for squiggle in &squiggles {
            writeln!(
                out,
                "squiggle {} {}..{} {}: {}",
                self.buffer,
                squiggle.range.start,
                squiggle.range.end,
                kind_label(squiggle.kind),
                squiggle.tooltip
            )
            .map_err(|e| write_failed(&e))?;
        }
        out.flush().map_err(|e| write_failed(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use errata_provider::{
        Consumers, DiagnosticItem, DiagnosticProvider, ProviderConfig, PublishContext, PublishError,
        PublishJob, Severity, SourceEntry, SourcePosition, SourceSpan, TextRange,
    };

    struct InlineContext;

    impl PublishContext for InlineContext {
        fn post(&self, job: PublishJob) -> Result<(), PublishError> {
            job();
            Ok(())
        }
    }

    struct Buffer;

    impl TextBuffer for Buffer {
        fn name(&self) -> &str {
            "main.flx"
        }

        fn len_chars(&self) -> usize {
            100
        }
    }

    fn text(out: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(out.lock().clone()).unwrap()
    }

    #[tokio::test]
    async fn problem_list_prints_tasks() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let provider = DiagnosticProvider::new(
            &ProviderConfig::with_debounce(Duration::from_millis(5)),
            tokio::runtime::Handle::current(),
            Consumers {
                context: Arc::new(InlineContext),
                problem_list: Arc::new(ConsoleProblemList::new(Arc::clone(&out))),
                decorations: Arc::new(errata_provider::NoDecorations),
            },
        );
        let entry = SourceEntry::new("main.flx");
        provider.replace_items(
            &entry,
            "parser",
            vec![DiagnosticItem::new(
                "expected `)`",
                Some(SourceSpan::new(
                    SourcePosition::new(4, 2, 30),
                    SourcePosition::new(4, 3, 31),
                )),
                Severity::High,
            )],
        );
        provider.flush().await.unwrap();

        assert_eq!(
            text(&out),
            "-- problems (1) --\nmain.flx:4:2: error: expected `)`\n"
        );
        provider.dispose().await;
        assert!(text(&out).ends_with("-- problems (0) --\n"));
    }

    #[test]
    fn tagger_prints_ranges_and_empty_sets() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let host = ConsoleDecorations::new(Arc::clone(&out));
        let tagger = host.tagger_for(&Buffer).unwrap();

        tagger
            .replace_all(vec![ResolvedSquiggle {
                range: TextRange { start: 3, end: 7 },
                kind: SquiggleKind::Warning,
                tooltip: "unused".to_string(),
            }])
            .unwrap();
        tagger.replace_all(Vec::new()).unwrap();

        assert_eq!(
            text(&out),
            "squiggle main.flx 3..7 warning: unused\nsquiggles main.flx: none\n"
        );
    }
}
