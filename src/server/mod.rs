//! Language server dispatch loop
//!
//! One loop reads frames in order and runs handlers inline. Backend calls
//! returned as [`Reply::Deferred`] run on their own tasks and answer through
//! the shared writer.

pub mod dispatcher;
pub mod handlers;
pub mod lifecycle;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::config::RuntimeConfig;
use crate::error::ProtocolError;
use crate::infra::ast::parser::ParseService;
use crate::infra::lsp::protocol::{
    Message, Notification, Request, RequestId, Response, RpcError, methods, salvage_id,
};
use crate::infra::lsp::transport::{Frame, MessageReader, MessageWriter};
use crate::services::backend::CompletionBackend;
use crate::services::completion::CompletionService;
use crate::services::documents::DocumentStore;

use dispatcher::{Dispatcher, HandlerResult, Reply};
use lifecycle::Lifecycle;

/// How long exit waits for deferred responses to flush
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// State shared by every handler
pub struct ServerContext {
    pub lifecycle: Lifecycle,
    pub documents: Arc<DocumentStore>,
    pub completion: Arc<CompletionService>,
    pub writer: Arc<MessageWriter>,
    pub request_timeout: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl ServerContext {
    /// Cancel in-flight backend calls
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn respond(&self, id: Option<RequestId>, result: HandlerResult) {
        let response = match (id, result) {
            (Some(id), Ok(value)) => Response::success(id, value),
            (id, Ok(_)) => Response::error(id, RpcError::internal_error("missing request id")),
            (id, Err(error)) => Response::error(id, error),
        };
        if let Err(e) = self.writer.send_response(&response).await {
            tracing::error!("Failed to write response: {}", e);
        }
    }
}

pub struct Server {
    runtime: RuntimeConfig,
    parser: Arc<dyn ParseService>,
    backend: Option<Arc<dyn CompletionBackend>>,
    dispatcher: Dispatcher,
}

impl Server {
    pub fn new(
        runtime: RuntimeConfig,
        parser: Arc<dyn ParseService>,
        backend: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        Self {
            runtime,
            parser,
            backend,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Serve one client until `exit` or end of stream; returns the process
    /// exit code (0 only after a shutdown request)
    pub async fn run<R, W>(self, input: R, output: W) -> i32
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Send + 'static,
    {
        let ctx = Arc::new(self.context(output));
        let mut reader = MessageReader::new(BufReader::new(input));
        let mut in_flight: JoinSet<()> = JoinSet::new();

        tracing::info!("Grasshopper {} ready", env!("CARGO_PKG_VERSION"));

        let graceful = loop {
            while in_flight.try_join_next().is_some() {}

            let frame = match reader.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!("Client closed the stream");
                    break ctx.lifecycle.exit();
                }
                Err(e) => {
                    tracing::error!("Cannot read from client: {}", e);
                    break ctx.lifecycle.exit();
                }
            };

            match frame {
                Frame::Invalid { error, body } => Self::reject(&ctx, error, body).await,
                Frame::Message(Message::Request(request)) => {
                    self.handle_request(&ctx, request, &mut in_flight).await
                }
                Frame::Message(Message::Notification(notification))
                    if notification.method == methods::EXIT =>
                {
                    break ctx.lifecycle.exit();
                }
                Frame::Message(Message::Notification(notification)) => {
                    self.handle_notification(&ctx, notification).await
                }
                Frame::Message(Message::Response(response)) => {
                    tracing::debug!("Ignoring client response {:?}", response.id);
                }
            }
        };

        ctx.signal_shutdown();
        ctx.documents.shutdown().await;
        Self::drain(&mut in_flight).await;

        if graceful {
            tracing::info!("Exit after shutdown");
            0
        } else {
            tracing::warn!("Exit without shutdown");
            1
        }
    }

    fn context<W: AsyncWrite + Send + 'static>(&self, output: W) -> ServerContext {
        let (shutdown_tx, _) = broadcast::channel(1);
        let documents = Arc::new(DocumentStore::new(
            Arc::clone(&self.parser),
            self.runtime.debounce,
        ));
        let completion = Arc::new(CompletionService::new(
            Arc::clone(&documents),
            self.backend.clone(),
            &self.runtime,
            shutdown_tx.clone(),
        ));

        ServerContext {
            lifecycle: Lifecycle::new(),
            documents,
            completion,
            writer: Arc::new(MessageWriter::new(output)),
            request_timeout: self.runtime.request_timeout(),
            shutdown_tx,
        }
    }

    async fn reject(ctx: &ServerContext, error: ProtocolError, body: Option<String>) {
        tracing::warn!("Rejecting frame: {}", error);
        let id = body.as_deref().and_then(salvage_id);
        ctx.respond(id, Err(RpcError::from(&error))).await;
    }

    async fn handle_request(
        &self,
        ctx: &Arc<ServerContext>,
        request: Request,
        in_flight: &mut JoinSet<()>,
    ) {
        let Request {
            id, method, params, ..
        } = request;
        tracing::debug!("Request {} {}", id, method);

        if let Err(error) = ctx.lifecycle.check_request(&method) {
            tracing::debug!("Rejected {} in state {:?}", method, ctx.lifecycle.state());
            ctx.respond(Some(id), Err(error)).await;
            return;
        }

        let Some(handler) = self.dispatcher.request(&method) else {
            ctx.respond(Some(id), Err(RpcError::method_not_found(&method)))
                .await;
            return;
        };

        let reply = AssertUnwindSafe(handler(ctx.as_ref(), params))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!("Handler for {} panicked", method);
                Reply::Ready(Err(RpcError::internal_error("handler panicked")))
            });

        match reply {
            Reply::Ready(result) => ctx.respond(Some(id), result).await,
            Reply::Deferred(future) => {
                let ctx = Arc::clone(ctx);
                in_flight.spawn(async move {
                    let result = match tokio::time::timeout(
                        ctx.request_timeout,
                        AssertUnwindSafe(future).catch_unwind(),
                    )
                    .await
                    {
                        Ok(Ok(result)) => result,
                        Ok(Err(_)) => {
                            tracing::error!("Handler for {} panicked", method);
                            Err(RpcError::internal_error("handler panicked"))
                        }
                        Err(_) => Err(RpcError::internal_error("request timed out")),
                    };
                    ctx.respond(Some(id), result).await;
                });
            }
        }
    }

    async fn handle_notification(&self, ctx: &ServerContext, notification: Notification) {
        let Notification { method, params, .. } = notification;

        if Dispatcher::is_ignored(&method) {
            tracing::trace!("Ignoring {}", method);
            return;
        }
        if !ctx.lifecycle.accepts_notifications() {
            tracing::debug!(
                "Dropping {} in state {:?}",
                method,
                ctx.lifecycle.state()
            );
            return;
        }
        let Some(handler) = self.dispatcher.notification(&method) else {
            tracing::debug!("Unhandled notification {}", method);
            return;
        };

        match AssertUnwindSafe(handler(ctx, params)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("{} failed: {}", method, e),
            Err(_) => tracing::error!("Handler for {} panicked", method),
        }
    }

    /// Let cancelled backend calls answer, then drop whatever is left
    async fn drain(in_flight: &mut JoinSet<()>) {
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::debug!("Abandoning {} pending responses", in_flight.len());
            in_flight.abort_all();
        }
    }
}
