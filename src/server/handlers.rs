//! LSP method handlers
//!
//! Request handlers return a [`Reply`]; notification handlers only log their
//! failures since there is no id to answer.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::ServerContext;
use super::dispatcher::{Reply, parse_params, to_result};
use crate::infra::lsp::protocol::{RpcError, methods};
use crate::models::lsp::{
    CompletionParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, InitializeParams, InitializeResult,
    InlineCompletionParams, LogMessageParams, MessageType, Position, ServerCapabilities,
    ServerInfo,
};
use crate::services::completion::{completion_list, inline_completion_list};

pub const SERVER_NAME: &str = "grasshopper";

// ============================================================================
// Lifecycle
// ============================================================================

pub fn initialize(ctx: &ServerContext, params: Option<Value>) -> BoxFuture<'_, Reply> {
    async move {
        let params: InitializeParams = match params {
            None | Some(Value::Null) => InitializeParams::default(),
            params => match parse_params(params) {
                Ok(params) => params,
                Err(e) => return Reply::Ready(Err(e)),
            },
        };

        match &params.client_info {
            Some(client) => tracing::info!(
                "Initializing for {} {}",
                client.name,
                client.version.as_deref().unwrap_or("")
            ),
            None => tracing::info!("Initializing for unnamed client"),
        }
        if let Some(root) = &params.root_uri {
            tracing::debug!("Workspace root: {root}");
        }

        let result = to_result(&InitializeResult {
            capabilities: ServerCapabilities::grasshopper(),
            server_info: Some(ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        });
        if result.is_ok() {
            ctx.lifecycle.mark_initialized();
        }
        Reply::Ready(result)
    }
    .boxed()
}

pub fn initialized(ctx: &ServerContext, _params: Option<Value>) -> BoxFuture<'_, Result<(), RpcError>> {
    async move {
        let backend = ctx
            .completion
            .backend_name()
            .unwrap_or_else(|| "no backend configured".to_string());
        tracing::info!("Client initialized; completions via {backend}");

        let message = LogMessageParams {
            kind: MessageType::Info,
            message: format!("Grasshopper connected ({backend})"),
        };
        let params = serde_json::to_value(&message)
            .map_err(|e| RpcError::internal_error(&e.to_string()))?;
        ctx.writer
            .send_notification(methods::LOG_MESSAGE, Some(params))
            .await
            .map_err(|e| RpcError::internal_error(&e.to_string()))
    }
    .boxed()
}

pub fn shutdown(ctx: &ServerContext, _params: Option<Value>) -> BoxFuture<'_, Reply> {
    async move {
        if ctx.lifecycle.begin_shutdown() {
            tracing::info!("Shutdown requested");
            ctx.signal_shutdown();
            ctx.documents.shutdown().await;
        }
        Reply::Ready(Ok(Value::Null))
    }
    .boxed()
}

// ============================================================================
// Document synchronization
// ============================================================================

pub fn did_open(ctx: &ServerContext, params: Option<Value>) -> BoxFuture<'_, Result<(), RpcError>> {
    async move {
        let params: DidOpenTextDocumentParams = parse_params(params)?;
        let document = params.text_document;
        tracing::debug!(
            "Opened {} ({}, v{})",
            document.uri,
            document.language_id,
            document.version
        );
        ctx.documents
            .open(
                &document.uri,
                document.text,
                document.version,
                &document.language_id,
            )
            .await;
        Ok(())
    }
    .boxed()
}

pub fn did_change(ctx: &ServerContext, params: Option<Value>) -> BoxFuture<'_, Result<(), RpcError>> {
    async move {
        let params: DidChangeTextDocumentParams = parse_params(params)?;
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Full sync: the last change carries the whole document
        let Some(change) = params.content_changes.into_iter().last() else {
            tracing::debug!("Empty change for {uri}");
            return Ok(());
        };
        if change.range.is_some() {
            return Err(RpcError::invalid_params(
                "incremental changes are not supported, expected full document sync",
            ));
        }

        if !ctx.documents.apply_full_text(&uri, change.text, version).await {
            tracing::debug!("Change for unopened document {uri}");
        }
        Ok(())
    }
    .boxed()
}

pub fn did_save(_ctx: &ServerContext, params: Option<Value>) -> BoxFuture<'_, Result<(), RpcError>> {
    async move {
        let params: DidSaveTextDocumentParams = parse_params(params)?;
        tracing::debug!("Saved {}", params.text_document.uri);
        Ok(())
    }
    .boxed()
}

pub fn did_close(ctx: &ServerContext, params: Option<Value>) -> BoxFuture<'_, Result<(), RpcError>> {
    async move {
        let params: DidCloseTextDocumentParams = parse_params(params)?;
        let uri = params.text_document.uri;
        if ctx.documents.close(&uri).await {
            tracing::debug!("Closed {uri}");
        } else {
            tracing::debug!("Close for unopened document {uri}");
        }
        Ok(())
    }
    .boxed()
}

// ============================================================================
// Completion
// ============================================================================

#[derive(Clone, Copy)]
enum Envelope {
    Popup,
    Inline,
}

impl Envelope {
    fn wrap(self, suggestion: Option<String>) -> Result<Value, RpcError> {
        match self {
            Envelope::Popup => to_result(&completion_list(suggestion)),
            Envelope::Inline => to_result(&inline_completion_list(suggestion)),
        }
    }
}

pub fn completion(ctx: &ServerContext, params: Option<Value>) -> BoxFuture<'_, Reply> {
    async move {
        match parse_params::<CompletionParams>(params) {
            Ok(params) => {
                if let Some(trigger) = &params.context {
                    tracing::trace!("Completion trigger kind {}", trigger.trigger_kind);
                }
                suggest(ctx, params.text_document.uri, params.position, Envelope::Popup).await
            }
            Err(e) => Reply::Ready(Err(e)),
        }
    }
    .boxed()
}

pub fn inline_completion(ctx: &ServerContext, params: Option<Value>) -> BoxFuture<'_, Reply> {
    async move {
        match parse_params::<InlineCompletionParams>(params) {
            Ok(params) => {
                suggest(ctx, params.text_document.uri, params.position, Envelope::Inline).await
            }
            Err(e) => Reply::Ready(Err(e)),
        }
    }
    .boxed()
}

/// Context is built in receipt order; only the backend call is deferred
async fn suggest(ctx: &ServerContext, uri: String, position: Position, envelope: Envelope) -> Reply {
    tracing::debug!(
        "Completion at {uri}:{}:{}",
        position.line,
        position.character
    );

    match ctx.completion.prepare(&uri, position).await {
        Err(e) => Reply::Ready(Err(RpcError::invalid_params(&e.to_string()))),
        Ok(None) => Reply::Ready(envelope.wrap(None)),
        Ok(Some(pending)) => {
            let completion = Arc::clone(&ctx.completion);
            Reply::Deferred(
                async move {
                    let suggestion = completion.resolve(pending).await;
                    envelope.wrap(suggestion)
                }
                .boxed(),
            )
        }
    }
}
