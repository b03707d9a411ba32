//! Outbound Streams
//!
//! A [`FrameSink`] is the persistent stream a stream pump writes to. Writing
//! a message covers both the write and the flush; any error means the viewer
//! is unreachable.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::messages::frame;

/// Errors writing to an outbound stream
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Outbound stream closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Write timed out")]
    Timeout,
}

/// Destination for pushed playback messages
#[async_trait]
pub trait FrameSink: Send {
    /// Write one wire message and flush it to the viewer
    async fn send_message(&mut self, message: &str) -> Result<(), SinkError>;
}

/// Server-Sent Events response body.
///
/// Frames go through a bounded channel that backs the streaming HTTP body.
/// When the client goes away the body is dropped and the next write fails.
pub struct BodySink {
    sender: mpsc::Sender<Result<Bytes, Infallible>>,
}

impl BodySink {
    /// Create a sink and the response body it feeds
    pub fn channel(buffer: usize) -> (Self, Body) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let body = Body::from_stream(ReceiverStream::new(receiver));
        (Self { sender }, body)
    }
}

#[async_trait]
impl FrameSink for BodySink {
    async fn send_message(&mut self, message: &str) -> Result<(), SinkError> {
        self.sender
            .send(Ok(Bytes::from(frame(message))))
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// WebSocket connection; each message is sent as one text frame
pub struct WsSink {
    sink: SplitSink<WebSocket, Message>,
}

impl WsSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_message(&mut self, message: &str) -> Result<(), SinkError> {
        self.sink
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}
