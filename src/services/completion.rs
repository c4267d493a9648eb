//! Completion Orchestrator
//!
//! Document snapshot → fresh tree → position translation → context
//! extraction → bounded backend call. Every "no suggestion" outcome is an
//! empty result; only malformed positions are reported as errors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::RuntimeConfig;
use crate::error::{BackendError, PositionError};
use crate::infra::position::offset_for_position;
use crate::models::context::ContextInfo;
use crate::models::lsp::{
    CompletionItem, CompletionItemKind, CompletionList, InlineCompletionItem,
    InlineCompletionList, InsertTextFormat, Position,
};
use crate::services::backend::CompletionBackend;
use crate::services::context::{ContextExtractor, SourceView, node_at_cursor};
use crate::services::documents::{DocumentSnapshot, DocumentStore};

const ITEM_DETAIL: &str = "(Grasshopper AI)";

/// Extracted context waiting for its backend call
pub struct PendingSuggestion {
    backend: Arc<dyn CompletionBackend>,
    context: ContextInfo,
    shutdown: broadcast::Receiver<()>,
}

impl PendingSuggestion {
    pub fn context(&self) -> &ContextInfo {
        &self.context
    }
}

pub struct CompletionService {
    documents: Arc<DocumentStore>,
    backend: Option<Arc<dyn CompletionBackend>>,
    extractor: ContextExtractor,
    timeout: Duration,
    shutdown: broadcast::Sender<()>,
}

impl CompletionService {
    pub fn new(
        documents: Arc<DocumentStore>,
        backend: Option<Arc<dyn CompletionBackend>>,
        config: &RuntimeConfig,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            documents,
            backend,
            extractor: ContextExtractor::from(config),
            timeout: config.completion_timeout(),
            shutdown,
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<String> {
        self.backend.as_ref().map(|backend| backend.identify())
    }

    /// Suggestion text for `position` in `uri`, `Ok(None)` when there is none
    pub async fn suggest(
        &self,
        uri: &str,
        position: Position,
    ) -> Result<Option<String>, PositionError> {
        match self.prepare(uri, position).await? {
            Some(pending) => Ok(self.resolve(pending).await),
            None => Ok(None),
        }
    }

    /// Everything up to the backend call, against the current document text
    pub async fn prepare(
        &self,
        uri: &str,
        position: Position,
    ) -> Result<Option<PendingSuggestion>, PositionError> {
        let Some(snapshot) = self.documents.ensure_fresh(uri).await else {
            tracing::debug!("Completion for unknown document {uri}");
            return Ok(None);
        };
        let Some(backend) = &self.backend else {
            tracing::debug!("No completion backend configured");
            return Ok(None);
        };

        let context = self.extract_context(&snapshot, position)?;
        Ok(Some(PendingSuggestion {
            backend: Arc::clone(backend),
            context,
            shutdown: self.shutdown.subscribe(),
        }))
    }

    /// Bounded backend call; cancelled by the shutdown signal
    pub async fn resolve(&self, pending: PendingSuggestion) -> Option<String> {
        let PendingSuggestion {
            backend,
            context,
            mut shutdown,
        } = pending;
        self.call_backend(backend.as_ref(), &context, &mut shutdown)
            .await
    }

    pub fn extract_context(
        &self,
        snapshot: &DocumentSnapshot,
        position: Position,
    ) -> Result<ContextInfo, PositionError> {
        let text: &str = &snapshot.text;
        let offset = offset_for_position(text, position)?;

        let cursor_node = snapshot
            .tree
            .as_ref()
            .and_then(|tree| node_at_cursor(tree.root_node(), offset));

        let source = SourceView {
            text,
            tree: snapshot.tree.as_ref(),
            language_id: &snapshot.language_id,
            filename: filename_from_uri(&snapshot.uri),
        };
        Ok(self.extractor.extract(&source, offset, cursor_node))
    }

    async fn call_backend(
        &self,
        backend: &dyn CompletionBackend,
        context: &ContextInfo,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Option<String> {
        let started = std::time::Instant::now();

        let outcome = tokio::select! {
            result = tokio::time::timeout(self.timeout, backend.get_suggestion(context)) => {
                result.unwrap_or(Err(BackendError::Timeout))
            }
            _ = shutdown.recv() => Err(BackendError::Cancelled),
        };

        match outcome {
            Ok(suggestion) if suggestion.is_empty() => {
                tracing::debug!("{} returned an empty suggestion", backend.identify());
                None
            }
            Ok(suggestion) => {
                tracing::debug!(
                    "{} answered in {:?} ({} bytes)",
                    backend.identify(),
                    started.elapsed(),
                    suggestion.len()
                );
                Some(suggestion)
            }
            Err(e) if e.is_deadline() => {
                tracing::debug!("No suggestion in time: {e}");
                None
            }
            Err(e) => {
                tracing::warn!("{} failed: {e}", backend.identify());
                None
            }
        }
    }
}

/// Last path segment of a URI
pub fn filename_from_uri(uri: &str) -> &str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/').next().unwrap_or(path)
}

/// Popup-menu envelope for a suggestion
pub fn completion_list(suggestion: Option<String>) -> CompletionList {
    let items = suggestion
        .map(|text| {
            vec![CompletionItem {
                label: text.clone(),
                kind: Some(CompletionItemKind::Snippet),
                detail: Some(ITEM_DETAIL.to_string()),
                insert_text_format: Some(InsertTextFormat::detect(&text)),
                insert_text: Some(text),
            }]
        })
        .unwrap_or_default();

    CompletionList {
        is_incomplete: false,
        items,
    }
}

/// Inline (ghost text) envelope for a suggestion
pub fn inline_completion_list(suggestion: Option<String>) -> InlineCompletionList {
    InlineCompletionList {
        items: suggestion
            .map(|insert_text| vec![InlineCompletionItem { insert_text }])
            .unwrap_or_default(),
    }
}
