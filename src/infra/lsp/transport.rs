//! LSP Transport Layer
//!
//! Content-Length framing over any async byte stream. The reader is owned by
//! the dispatch loop; the writer is shared and serializes whole frames.

use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use super::protocol::{Message, Notification, Response};
use crate::error::ProtocolError;

const CONTENT_LENGTH: &str = "content-length";

/// Largest body the reader will allocate for
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// One decoded frame, or the reason it could not be decoded
#[derive(Debug)]
pub enum Frame {
    Message(Message),
    /// The frame was consumed but is unusable; `body` is kept for id recovery
    Invalid {
        error: ProtocolError,
        body: Option<String>,
    },
}

/// Reads framed messages from the client
pub struct MessageReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the next frame
    ///
    /// ```text
    /// Content-Length: 123\r\n
    /// \r\n
    /// {"jsonrpc":"2.0",...}
    /// ```
    ///
    /// Returns `Ok(None)` on a clean end of stream between frames. `Err` is
    /// only returned when the stream itself can no longer be read.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let content_length = match self.read_headers().await? {
            None => return Ok(None),
            Some(Ok(length)) => length,
            Some(Err(error)) => return Ok(Some(Frame::Invalid { error, body: None })),
        };

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;

        let Ok(json) = String::from_utf8(body) else {
            return Ok(Some(Frame::Invalid {
                error: ProtocolError::InvalidUtf8,
                body: None,
            }));
        };
        tracing::trace!("LSP <- {}", json);

        Ok(Some(match Message::parse(&json) {
            Ok(message) => Frame::Message(message),
            Err(error) => Frame::Invalid {
                error,
                body: Some(json),
            },
        }))
    }

    /// Read a header block and return its Content-Length
    ///
    /// The outer `None` is end of stream before any header. A bad header
    /// block is still read up to its blank line so the next frame starts
    /// cleanly.
    async fn read_headers(&mut self) -> Result<Option<Result<usize, ProtocolError>>, ProtocolError> {
        let mut content_length: Option<Result<usize, ProtocolError>> = None;
        let mut first_error: Option<ProtocolError> = None;
        let mut seen_header = false;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                if seen_header {
                    return Err(ProtocolError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "stream closed inside a header block",
                    )));
                }
                return Ok(None);
            }

            let header = line.trim_end_matches(['\r', '\n']);

            // Empty line marks end of headers; stray blank lines between
            // frames are skipped
            if header.is_empty() {
                if seen_header {
                    break;
                }
                continue;
            }
            seen_header = true;

            let Some((name, value)) = header.split_once(':') else {
                first_error.get_or_insert(ProtocolError::MalformedHeader(header.to_string()));
                continue;
            };

            // Other headers (Content-Type) are ignored
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let value = value.trim();
                content_length = Some(match value.parse::<usize>() {
                    Ok(length) if length <= MAX_CONTENT_LENGTH => Ok(length),
                    _ => Err(ProtocolError::InvalidContentLength(value.to_string())),
                });
            }
        }

        Ok(Some(match (first_error, content_length) {
            (Some(error), _) => Err(error),
            (None, Some(length)) => length,
            (None, None) => Err(ProtocolError::MissingContentLength),
        }))
    }
}

/// Shared writer; one lock per frame so concurrent senders never interleave
pub struct MessageWriter {
    writer: Mutex<Pin<Box<dyn AsyncWrite + Send>>>,
}

impl MessageWriter {
    pub fn new<W: AsyncWrite + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::pin(writer)),
        }
    }

    pub async fn send_response(&self, response: &Response) -> Result<(), ProtocolError> {
        self.send(response).await
    }

    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), ProtocolError> {
        self.send(&Notification::new(method, params)).await
    }

    /// Write one message with LSP framing
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<(), ProtocolError> {
        let json = serde_json::to_string(message)?;
        tracing::trace!("LSP -> {}", json);

        let frame = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
        let mut writer = self.writer.lock().await;
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}
