//! Server-Sent Events framing.
//!
//! [`SseBroadcaster`] fans a message out to every subscriber (used for the
//! rare multi-listener case); most inference-gateway streaming is per-request
//! and built directly from the backend's token stream via [`done_event`] and
//! the `data: ...\n\n` framing `axum::response::sse::Event` already provides.
//!
//! # Usage
//!
//! ```ignore
//! use gateway_core::sse::SseBroadcaster;
//!
//! let broadcaster = SseBroadcaster::new(128);
//! let stream = broadcaster.subscribe();
//! Sse::new(stream).keep_alive(SseKeepAlive::default())
//!
//! broadcaster.send("hello").ok();
//! broadcaster.send_event("update", r#"{"count":42}"#).ok();
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::sse::Event as SseEvent;
use tokio::sync::broadcast;

/// Message sent through the broadcast channel.
#[derive(Clone, Debug)]
pub struct SseMessage {
    pub event: Option<String>,
    pub data: String,
}

/// The sentinel terminating a chat-completion SSE stream, matching the
/// OpenAI wire contract.
pub const DONE_MARKER: &str = "[DONE]";

/// Build the terminal `data: [DONE]\n\n` event.
pub fn done_event() -> SseEvent {
    SseEvent::default().data(DONE_MARKER)
}

/// Injectable SSE broadcaster for multi-client streaming.
#[derive(Clone)]
pub struct SseBroadcaster {
    tx: broadcast::Sender<SseMessage>,
}

impl SseBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn send(&self, data: impl Into<String>) -> Result<(), broadcast::error::SendError<SseMessage>> {
        self.tx.send(SseMessage {
            event: None,
            data: data.into(),
        })?;
        Ok(())
    }

    pub fn send_event(
        &self,
        event: &str,
        data: impl Into<String>,
    ) -> Result<(), broadcast::error::SendError<SseMessage>> {
        self.tx.send(SseMessage {
            event: Some(event.to_string()),
            data: data.into(),
        })?;
        Ok(())
    }

    pub fn subscribe(&self) -> SseSubscription {
        SseSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

fn msg_to_event(msg: SseMessage) -> SseEvent {
    let mut event = SseEvent::default().data(msg.data);
    if let Some(ref name) = msg.event {
        event = event.event(name);
    }
    event
}

/// A subscription stream yielding SSE events, ready to pass to `Sse::new()`.
pub struct SseSubscription {
    rx: broadcast::Receiver<SseMessage>,
}

impl futures_core::Stream for SseSubscription {
    type Item = Result<SseEvent, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => return Poll::Ready(Some(Ok(msg_to_event(msg)))),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Closed) => return Poll::Ready(None),
                Err(broadcast::error::TryRecvError::Empty) => break,
            }
        }

        // Cancel-safe: broadcast::Receiver::recv() only advances its cursor
        // on a successful read, so dropping this future between polls can't
        // lose a message.
        let rx = &mut self.rx;
        let mut recv_fut = Box::pin(rx.recv());
        match recv_fut.as_mut().poll(cx) {
            Poll::Ready(Ok(msg)) => Poll::Ready(Some(Ok(msg_to_event(msg)))),
            Poll::Ready(Err(broadcast::error::RecvError::Closed)) => Poll::Ready(None),
            Poll::Ready(Err(broadcast::error::RecvError::Lagged(_))) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_core::Stream;

    async fn next_event(sub: &mut SseSubscription) -> Option<SseEvent> {
        tokio::time::timeout(std::time::Duration::from_millis(100), async {
            std::future::poll_fn(|cx| Pin::new(&mut *sub).poll_next(cx)).await
        })
        .await
        .ok()
        .flatten()
        .map(|r| r.unwrap())
    }

    #[tokio::test]
    async fn sse_broadcaster_send_recv() {
        let broadcaster = SseBroadcaster::new(16);
        let mut sub = broadcaster.subscribe();
        broadcaster.send("hello").unwrap();
        let event = next_event(&mut sub).await.expect("should receive event");
        let debug = format!("{event:?}");
        assert!(debug.contains("hello"), "event debug should contain data: {debug}");
    }

    #[tokio::test]
    async fn sse_broadcaster_typed_event() {
        let broadcaster = SseBroadcaster::new(16);
        let mut sub = broadcaster.subscribe();
        broadcaster.send_event("msg", "payload").unwrap();
        let event = next_event(&mut sub).await.expect("should receive event");
        let debug = format!("{event:?}");
        assert!(debug.contains("msg"), "event debug should contain event type: {debug}");
        assert!(debug.contains("payload"), "event debug should contain data: {debug}");
    }

    #[tokio::test]
    async fn sse_multiple_subscribers() {
        let broadcaster = SseBroadcaster::new(16);
        let mut sub1 = broadcaster.subscribe();
        let mut sub2 = broadcaster.subscribe();
        broadcaster.send("shared").unwrap();
        let e1 = next_event(&mut sub1).await.expect("sub1 should receive");
        let e2 = next_event(&mut sub2).await.expect("sub2 should receive");
        let d1 = format!("{e1:?}");
        let d2 = format!("{e2:?}");
        assert!(d1.contains("shared"));
        assert!(d2.contains("shared"));
    }

    #[test]
    fn done_event_contains_marker() {
        let event = done_event();
        let debug = format!("{event:?}");
        assert!(debug.contains("[DONE]"));
    }
}
