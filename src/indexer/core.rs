use super::languages::LanguageTag;
use super::reconciler::{IndexReconciler, ReconcileResult};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Which files a directory run picks up.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Lowercase extensions without the dot. Empty means every extension
    /// with a supported grammar.
    pub extensions: Vec<String>,
    pub recursive: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            recursive: true,
        }
    }
}

impl IndexOptions {
    fn accepts(&self, ext: &str) -> bool {
        if self.extensions.is_empty() {
            LanguageTag::from_extension(ext).is_supported()
        } else {
            self.extensions
                .iter()
                .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexRunSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub chunks_added: usize,
    pub chunks_failed: usize,
}

impl IndexRunSummary {
    fn absorb(&mut self, result: ReconcileResult) {
        self.files_processed += result.files_touched;
        self.chunks_added += result.chunks_added;
        self.chunks_failed += result.chunks_failed;
    }
}

pub struct Indexer<'a> {
    reconciler: &'a IndexReconciler,
}

impl<'a> Indexer<'a> {
    pub fn new(reconciler: &'a IndexReconciler) -> Self {
        Self { reconciler }
    }

    /// Reconciles every matching file under `dir`. Hidden entries and
    /// anything excluded by `.gitignore` are skipped. A file that cannot be
    /// read or parsed is counted as failed and the run moves on.
    pub async fn index_directory<P: AsRef<Path>>(
        &self,
        dir: P,
        options: &IndexOptions,
    ) -> IndexRunSummary {
        let dir = dir.as_ref();
        let mut summary = IndexRunSummary::default();

        let mut builder = WalkBuilder::new(dir);
        builder.sort_by_file_name(|a, b| a.cmp(b));
        if !options.recursive {
            builder.max_depth(Some(1));
        }

        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("walk error under {}: {e}", dir.display());
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if !options.accepts(ext) {
                continue;
            }

            match self.index_file(path).await {
                Some(result) => summary.absorb(result),
                None => summary.files_failed += 1,
            }
        }

        info!(
            dir = %dir.display(),
            files = summary.files_processed,
            failed_files = summary.files_failed,
            chunks = summary.chunks_added,
            failed_chunks = summary.chunks_failed,
            "index run complete"
        );
        summary
    }

    /// Reads and reconciles one file. `None` means it failed and was logged.
    pub async fn index_file(&self, path: &Path) -> Option<ReconcileResult> {
        // store paths with forward slashes on every platform
        let key = path.to_string_lossy().replace('\\', "/");
        let language = LanguageTag::from_extension(
            path.extension()
                .and_then(|s| s.to_str())
                .unwrap_or_default(),
        );

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %key, "cannot read file: {e}");
                return None;
            }
        };

        match self.reconciler.reconcile(&key, &text, language).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(path = %key, "indexing failed: {e}");
                None
            }
        }
    }
}
