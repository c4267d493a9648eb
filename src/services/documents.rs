//! Document Store
//!
//! Authoritative map of open documents to their text, version, language and
//! syntax tree, plus the debounced reparse engine.
//!
//! Two locks, never held together: a `RwLock` over the documents and a
//! `Mutex` over the pending-reparse registry. Parsing always happens outside
//! both, on the blocking pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tree_sitter::{InputEdit, Tree};

use crate::infra::ast::parser::ParseService;
use crate::infra::position::{ceil_char_boundary, floor_char_boundary, point_for_offset};

struct Document {
    text: Arc<str>,
    version: i32,
    language_id: String,
    tree: Option<Tree>,
    /// Bumped by every text update; unique across the store
    revision: u64,
    /// Revision of the text `tree` was parsed from
    tree_revision: u64,
    /// Previous tree with every pending edit applied, matching `text`
    hint: Option<Tree>,
}

impl Document {
    fn is_stale(&self) -> bool {
        is_stale(self.tree.as_ref(), &self.text, self.revision, self.tree_revision)
    }
}

fn is_stale(tree: Option<&Tree>, text: &str, revision: u64, tree_revision: u64) -> bool {
    match tree {
        None => true,
        Some(tree) => tree.root_node().end_byte() != text.len() || tree_revision != revision,
    }
}

/// Copy of one document taken under the read lock
#[derive(Clone)]
pub struct DocumentSnapshot {
    pub uri: String,
    pub text: Arc<str>,
    pub version: i32,
    pub language_id: String,
    pub tree: Option<Tree>,
    revision: u64,
    tree_revision: u64,
    hint: Option<Tree>,
}

impl DocumentSnapshot {
    /// True when the tree is missing or no longer describes `text`
    pub fn is_stale(&self) -> bool {
        is_stale(self.tree.as_ref(), &self.text, self.revision, self.tree_revision)
    }
}

impl std::fmt::Debug for DocumentSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSnapshot")
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("language_id", &self.language_id)
            .field("len", &self.text.len())
            .field("has_tree", &self.tree.is_some())
            .finish()
    }
}

enum ReparseJob {
    Closed,
    Fresh,
    Parse {
        language_id: String,
        text: Arc<str>,
        revision: u64,
        hint: Option<Tree>,
    },
}

struct PendingReparse {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct DocumentStore {
    documents: RwLock<HashMap<String, Document>>,
    pending: Mutex<HashMap<String, PendingReparse>>,
    parser: Arc<dyn ParseService>,
    debounce: Duration,
    next_revision: AtomicU64,
    next_generation: AtomicU64,
}

impl DocumentStore {
    pub fn new(parser: Arc<dyn ParseService>, debounce: Duration) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            parser,
            debounce,
            next_revision: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
        }
    }

    fn revision(&self) -> u64 {
        self.next_revision.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a document and parse it right away in the background
    pub async fn open(self: &Arc<Self>, uri: &str, text: String, version: i32, language_id: &str) {
        let revision = self.revision();
        let len = text.len();
        let previous = self.documents.write().await.insert(
            uri.to_string(),
            Document {
                text: Arc::from(text),
                version,
                language_id: language_id.to_string(),
                tree: None,
                revision,
                tree_revision: 0,
                hint: None,
            },
        );
        if previous.is_some() {
            tracing::debug!("Reopened {uri}; previous state replaced");
        }
        tracing::info!("Opened {uri} ({language_id}, v{version}, {len} bytes)");

        if self.parser.supports(language_id) {
            self.schedule_reparse(uri, Duration::ZERO).await;
        }
    }

    /// Replace the full text of an open document and schedule a debounced
    /// reparse. Returns `false` when the document is not open.
    pub async fn apply_full_text(self: &Arc<Self>, uri: &str, text: String, version: i32) -> bool {
        let revision = self.revision();
        let language_id = {
            let mut documents = self.documents.write().await;
            let Some(doc) = documents.get_mut(uri) else {
                return false;
            };

            if version < doc.version {
                tracing::warn!(
                    "Version of {uri} went backwards ({} -> {version}); applying anyway",
                    doc.version
                );
            }

            // Edits accumulate on the hint until the next successful parse
            let base = doc.hint.take().or_else(|| doc.tree.clone());
            doc.hint = base.map(|mut tree| {
                if let Some(edit) = compute_edit(&doc.text, &text) {
                    tree.edit(&edit);
                }
                tree
            });

            tracing::debug!(
                "Updated {uri} to v{version} ({} -> {} bytes)",
                doc.text.len(),
                text.len()
            );
            doc.text = Arc::from(text);
            doc.version = version;
            doc.revision = revision;
            doc.language_id.clone()
        };

        if self.parser.supports(&language_id) {
            self.schedule_reparse(uri, self.debounce).await;
        }
        true
    }

    /// Forget a document and cancel its pending reparse.
    /// Returns `false` when the document was not open.
    pub async fn close(&self, uri: &str) -> bool {
        if let Some(pending) = self.pending.lock().await.remove(uri) {
            pending.handle.abort();
            tracing::debug!("Cancelled pending reparse for {uri}");
        }
        let removed = self.documents.write().await.remove(uri).is_some();
        if removed {
            tracing::info!("Closed {uri}");
        }
        removed
    }

    pub async fn snapshot(&self, uri: &str) -> Option<DocumentSnapshot> {
        let documents = self.documents.read().await;
        documents.get(uri).map(|doc| DocumentSnapshot {
            uri: uri.to_string(),
            text: Arc::clone(&doc.text),
            version: doc.version,
            language_id: doc.language_id.clone(),
            tree: doc.tree.clone(),
            revision: doc.revision,
            tree_revision: doc.tree_revision,
            hint: doc.hint.clone(),
        })
    }

    /// Snapshot whose tree agrees with its text.
    ///
    /// A stale tree is replaced by a synchronous reparse, bypassing the
    /// debounce. The returned text and tree are always the pair that was
    /// parsed together, even if a newer edit lands meanwhile.
    pub async fn ensure_fresh(&self, uri: &str) -> Option<DocumentSnapshot> {
        let mut snapshot = self.snapshot(uri).await?;
        if !snapshot.is_stale() {
            return Some(snapshot);
        }
        if !self.parser.supports(&snapshot.language_id) {
            snapshot.tree = None;
            return Some(snapshot);
        }

        tracing::debug!(
            "Tree for {uri} is stale (v{}); reparsing inline",
            snapshot.version
        );
        let tree = self
            .parse_off_thread(
                &snapshot.language_id,
                snapshot.hint.take(),
                Arc::clone(&snapshot.text),
            )
            .await;
        self.store_tree(uri, snapshot.revision, tree.clone()).await;

        snapshot.tree = tree;
        snapshot.tree_revision = snapshot.revision;
        Some(snapshot)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Cancel every pending reparse
    pub async fn shutdown(&self) {
        let mut pending = self.pending.lock().await;
        for (_, reparse) in pending.drain() {
            reparse.handle.abort();
        }
    }

    /// Replace any pending reparse of `uri` with one firing after `delay`
    async fn schedule_reparse(self: &Arc<Self>, uri: &str, delay: Duration) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut pending = self.pending.lock().await;

        // Spawned under the registry lock so the task cannot release its
        // entry before it has been inserted.
        let store = Arc::clone(self);
        let key = uri.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.run_reparse(&key, generation).await;
        });

        if let Some(previous) = pending.insert(uri.to_string(), PendingReparse { generation, handle })
        {
            previous.handle.abort();
            tracing::trace!("Superseded reparse {} for {uri}", previous.generation);
        }
    }

    async fn run_reparse(&self, uri: &str, generation: u64) {
        let job = {
            let documents = self.documents.read().await;
            match documents.get(uri) {
                None => ReparseJob::Closed,
                Some(doc) if !doc.is_stale() => ReparseJob::Fresh,
                Some(doc) => ReparseJob::Parse {
                    language_id: doc.language_id.clone(),
                    text: Arc::clone(&doc.text),
                    revision: doc.revision,
                    hint: doc.hint.clone(),
                },
            }
        };

        match job {
            ReparseJob::Parse {
                language_id,
                text,
                revision,
                hint,
            } => {
                tracing::debug!(
                    "Debounced reparse of {uri} (incremental: {})",
                    hint.is_some()
                );
                let tree = self.parse_off_thread(&language_id, hint, text).await;
                self.store_tree(uri, revision, tree).await;
            }
            ReparseJob::Fresh => tracing::trace!("{uri} already reparsed inline"),
            ReparseJob::Closed => tracing::debug!("{uri} closed before its reparse fired"),
        }

        self.release_pending(uri, generation).await;
    }

    /// Drop the registry entry only if it still belongs to `generation`
    async fn release_pending(&self, uri: &str, generation: u64) {
        let mut pending = self.pending.lock().await;
        if pending
            .get(uri)
            .is_some_and(|entry| entry.generation == generation)
        {
            pending.remove(uri);
        }
    }

    /// Write back a parse result if the document still holds the parsed text
    async fn store_tree(&self, uri: &str, revision: u64, tree: Option<Tree>) -> bool {
        let mut documents = self.documents.write().await;
        let Some(doc) = documents.get_mut(uri) else {
            tracing::debug!("Discarding tree for closed {uri}");
            return false;
        };
        if doc.revision != revision {
            tracing::debug!("Discarding tree for outdated text of {uri}");
            return false;
        }

        if tree.is_none() {
            tracing::warn!("No syntax tree for {uri}; will retry on next edit or request");
        }
        doc.tree = tree;
        doc.tree_revision = revision;
        doc.hint = None;
        true
    }

    async fn parse_off_thread(
        &self,
        language_id: &str,
        hint: Option<Tree>,
        text: Arc<str>,
    ) -> Option<Tree> {
        let parser = Arc::clone(&self.parser);
        let language = language_id.to_string();
        let result =
            tokio::task::spawn_blocking(move || parser.parse(&language, hint.as_ref(), &text))
                .await;

        match result {
            Ok(Ok(tree)) => tree,
            Ok(Err(e)) => {
                tracing::warn!("Parse failed: {e}");
                None
            }
            Err(e) => {
                tracing::error!("Parse task failed: {e}");
                None
            }
        }
    }
}

/// Single edit turning `old` into `new`, from their common prefix and suffix.
/// `None` when the texts are equal.
fn compute_edit(old: &str, new: &str) -> Option<InputEdit> {
    if old == new {
        return None;
    }

    let prefix = old
        .bytes()
        .zip(new.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    let start = floor_char_boundary(old, prefix);

    let max_suffix = old.len().min(new.len()) - start;
    let suffix = old
        .bytes()
        .rev()
        .zip(new.bytes().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    let old_end = ceil_char_boundary(old, old.len() - suffix);
    let new_end = new.len() - (old.len() - old_end);

    Some(InputEdit {
        start_byte: start,
        old_end_byte: old_end,
        new_end_byte: new_end,
        start_position: point_for_offset(old, start),
        old_end_position: point_for_offset(old, old_end),
        new_end_position: point_for_offset(new, new_end),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::infra::ast::parser::TreeSitterParser;

    /// Real parser that records every text it is asked to parse
    struct CountingParser {
        inner: TreeSitterParser,
        parsed: std::sync::Mutex<Vec<(String, bool)>>,
    }

    impl CountingParser {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: TreeSitterParser::new().unwrap(),
                parsed: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.parsed.lock().unwrap().len()
        }

        fn last(&self) -> Option<(String, bool)> {
            self.parsed.lock().unwrap().last().cloned()
        }

        fn reset(&self) {
            self.parsed.lock().unwrap().clear();
        }
    }

    impl ParseService for CountingParser {
        fn parse(
            &self,
            language_id: &str,
            previous: Option<&Tree>,
            text: &str,
        ) -> Result<Option<Tree>, ParseError> {
            self.parsed
                .lock()
                .unwrap()
                .push((text.to_string(), previous.is_some()));
            self.inner.parse(language_id, previous, text)
        }

        fn supports(&self, language_id: &str) -> bool {
            self.inner.supports(language_id)
        }
    }

    const URI: &str = "file:///tmp/main.go";

    fn store(parser: &Arc<CountingParser>, debounce_ms: u64) -> Arc<DocumentStore> {
        Arc::new(DocumentStore::new(
            Arc::clone(parser) as Arc<dyn ParseService>,
            Duration::from_millis(debounce_ms),
        ))
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test]
    async fn test_open_parses_immediately() {
        let parser = CountingParser::new();
        let store = store(&parser, 5_000);
        store.open(URI, "package main\n".into(), 1, "go").await;
        settle(200).await;

        let snapshot = store.snapshot(URI).await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.language_id, "go");
        assert!(!snapshot.is_stale());
        assert_eq!(parser.count(), 1);
        assert!(store.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_rapid_changes_coalesce_into_one_reparse() {
        let parser = CountingParser::new();
        let store = store(&parser, 60);
        store.open(URI, "package main\n".into(), 1, "go").await;
        settle(200).await;
        parser.reset();

        for (i, body) in ["func a() {}", "func ab() {}", "func abc() {}"].iter().enumerate() {
            let text = format!("package main\n\n{body}\n");
            assert!(store.apply_full_text(URI, text, i as i32 + 2).await);
            settle(10).await;
        }
        settle(400).await;

        assert_eq!(parser.count(), 1);
        let (text, incremental) = parser.last().unwrap();
        assert_eq!(text, "package main\n\nfunc abc() {}\n");
        assert!(incremental);

        let snapshot = store.snapshot(URI).await.unwrap();
        assert_eq!(snapshot.version, 4);
        assert!(!snapshot.is_stale());
        assert!(store.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_cancels_pending_reparse() {
        let parser = CountingParser::new();
        let store = store(&parser, 50);
        store.open(URI, "package main\n".into(), 1, "go").await;
        settle(200).await;
        parser.reset();

        store
            .apply_full_text(URI, "package main\n\nvar x = 1\n".into(), 2)
            .await;
        assert!(store.close(URI).await);
        settle(300).await;

        assert_eq!(parser.count(), 0);
        assert!(store.snapshot(URI).await.is_none());
        assert!(store.pending.lock().await.is_empty());
        assert!(!store.close(URI).await);
    }

    #[tokio::test]
    async fn test_change_for_unopened_document_is_ignored() {
        let parser = CountingParser::new();
        let store = store(&parser, 10);
        assert!(!store.apply_full_text(URI, "x".into(), 1).await);
        settle(50).await;
        assert_eq!(parser.count(), 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_stale_tree_triggers_inline_reparse() {
        let parser = CountingParser::new();
        let store = store(&parser, 60_000);
        store.open(URI, "package main\n".into(), 1, "go").await;
        settle(200).await;

        let new_text = "package main\n\nfunc main() {\n\tfmt.Pri\n}\n";
        store.apply_full_text(URI, new_text.into(), 2).await;

        let before = store.snapshot(URI).await.unwrap();
        assert!(before.is_stale());
        let count = parser.count();

        let fresh = store.ensure_fresh(URI).await.unwrap();
        assert_eq!(parser.count(), count + 1);
        assert_eq!(&*fresh.text, new_text);
        let tree = fresh.tree.as_ref().unwrap();
        assert_eq!(tree.root_node().end_byte(), new_text.len());

        // Written back, so the next request needs no parse
        let again = store.ensure_fresh(URI).await.unwrap();
        assert!(!again.is_stale());
        assert_eq!(parser.count(), count + 1);
    }

    #[tokio::test]
    async fn test_same_length_edit_is_still_stale() {
        let parser = CountingParser::new();
        let store = store(&parser, 60_000);
        store.open(URI, "var a = 1\n".into(), 1, "go").await;
        settle(200).await;

        store.apply_full_text(URI, "var b = 1\n".into(), 2).await;
        assert!(store.snapshot(URI).await.unwrap().is_stale());
    }

    #[tokio::test]
    async fn test_outdated_parse_is_discarded() {
        let parser = CountingParser::new();
        let store = store(&parser, 60_000);
        store.open(URI, "package main\n".into(), 1, "go").await;
        settle(200).await;

        let old = store.snapshot(URI).await.unwrap();
        store
            .apply_full_text(URI, "package main\n\nvar x = 1\n".into(), 2)
            .await;

        // A parse of the old revision lands after the edit
        assert!(!store.store_tree(URI, old.revision, old.tree.clone()).await);
        assert!(store.snapshot(URI).await.unwrap().is_stale());

        let current = store.snapshot(URI).await.unwrap();
        let tree = TreeSitterParser::new()
            .unwrap()
            .parse("go", None, &current.text)
            .unwrap();
        assert!(store.store_tree(URI, current.revision, tree).await);
        assert!(!store.snapshot(URI).await.unwrap().is_stale());
    }

    #[tokio::test]
    async fn test_lagging_reparse_keeps_newer_registry_entry() {
        let parser = CountingParser::new();
        let store = store(&parser, 60_000);
        store.open(URI, "package main\n".into(), 1, "go").await;
        settle(200).await;

        store.apply_full_text(URI, "package a\n".into(), 2).await;
        let first = store.pending.lock().await.get(URI).unwrap().generation;
        store.apply_full_text(URI, "package b\n".into(), 3).await;
        let second = store.pending.lock().await.get(URI).unwrap().generation;
        assert_ne!(first, second);

        store.release_pending(URI, first).await;
        assert_eq!(
            store.pending.lock().await.get(URI).map(|p| p.generation),
            Some(second)
        );

        store.release_pending(URI, second).await;
        assert!(store.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_language_is_never_parsed() {
        let parser = CountingParser::new();
        let store = store(&parser, 10);
        store
            .open("file:///notes.txt", "hello".into(), 1, "plaintext")
            .await;
        store
            .apply_full_text("file:///notes.txt", "hello world".into(), 2)
            .await;
        settle(100).await;

        assert_eq!(parser.count(), 0);
        let snapshot = store.ensure_fresh("file:///notes.txt").await.unwrap();
        assert!(snapshot.tree.is_none());
        assert_eq!(&*snapshot.text, "hello world");
    }

    #[test]
    fn test_compute_edit() {
        let edit = compute_edit("fn a() {}\n", "fn abc() {}\n").unwrap();
        assert_eq!(edit.start_byte, 4);
        assert_eq!(edit.old_end_byte, 4);
        assert_eq!(edit.new_end_byte, 6);

        let edit = compute_edit("a\nbc\nd", "a\nd").unwrap();
        assert_eq!(edit.start_byte, 2);
        assert_eq!(edit.old_end_byte, 5);
        assert_eq!(edit.new_end_byte, 2);
        assert_eq!(edit.old_end_position.row, 2);

        assert!(compute_edit("same", "same").is_none());
    }

    #[test]
    fn test_compute_edit_repeated_characters() {
        // Prefix and suffix must not overlap
        let edit = compute_edit("aaa", "aaaa").unwrap();
        assert_eq!(edit.start_byte, 3);
        assert_eq!(edit.old_end_byte, 3);
        assert_eq!(edit.new_end_byte, 4);
    }

    #[test]
    fn test_compute_edit_multibyte() {
        let edit = compute_edit("é", "è").unwrap();
        assert_eq!(edit.start_byte, 0);
        assert_eq!(edit.old_end_byte, 2);
        assert_eq!(edit.new_end_byte, 2);
    }

    #[test]
    fn test_incremental_hint_matches_fresh_parse() {
        let parser = TreeSitterParser::new().unwrap();
        let texts = [
            "package main\n\nfunc main() {}\n",
            "package main\n\nfunc main() {\n\tx := 1\n}\n",
            "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tx := 1\n\tfmt.Println(x)\n}\n",
        ];

        let mut hint = parser.parse("go", None, texts[0]).unwrap().unwrap();
        for pair in texts.windows(2) {
            let edit = compute_edit(pair[0], pair[1]).unwrap();
            hint.edit(&edit);
        }

        let incremental = parser
            .parse("go", Some(&hint), texts[2])
            .unwrap()
            .unwrap();
        let fresh = parser.parse("go", None, texts[2]).unwrap().unwrap();
        assert_eq!(
            incremental.root_node().to_sexp(),
            fresh.root_node().to_sexp()
        );
    }
}
