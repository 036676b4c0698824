//! Frames and legs
//!
//! A [`Frame`] is what a bridge moves between its two sockets. A [`Leg`] is
//! one side of a bridge reduced to a boxed frame sink and frame stream, so the
//! bridge does not care whether it is talking to an accepted axum socket, a
//! tungstenite client, or an in-memory channel.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::WebSocketStream;

use crate::error::RelayError;

/// Transport-neutral WebSocket frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl Frame {
    /// Data payload for text and binary frames
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Frame::Text(text) => Some(text.as_bytes()),
            Frame::Binary(data) => Some(data),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
            Frame::Ping(_) => "ping",
            Frame::Pong(_) => "pong",
            Frame::Close => "close",
        }
    }
}

impl From<AxumMessage> for Frame {
    fn from(message: AxumMessage) -> Self {
        match message {
            AxumMessage::Text(text) => Frame::Text(text),
            AxumMessage::Binary(data) => Frame::Binary(data),
            AxumMessage::Ping(data) => Frame::Ping(data),
            AxumMessage::Pong(data) => Frame::Pong(data),
            AxumMessage::Close(_) => Frame::Close,
        }
    }
}

impl From<Frame> for AxumMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => AxumMessage::Text(text),
            Frame::Binary(data) => AxumMessage::Binary(data),
            Frame::Ping(data) => AxumMessage::Ping(data),
            Frame::Pong(data) => AxumMessage::Pong(data),
            Frame::Close => AxumMessage::Close(None),
        }
    }
}

impl From<TungsteniteMessage> for Frame {
    fn from(message: TungsteniteMessage) -> Self {
        match message {
            TungsteniteMessage::Text(text) => Frame::Text(text),
            TungsteniteMessage::Binary(data) => Frame::Binary(data),
            TungsteniteMessage::Ping(data) => Frame::Ping(data),
            TungsteniteMessage::Pong(data) => Frame::Pong(data),
            TungsteniteMessage::Close(_) => Frame::Close,
            // Raw frames only show up when reading with a custom config
            TungsteniteMessage::Frame(raw) => Frame::Binary(raw.into_data()),
        }
    }
}

impl From<Frame> for TungsteniteMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => TungsteniteMessage::Text(text),
            Frame::Binary(data) => TungsteniteMessage::Binary(data),
            Frame::Ping(data) => TungsteniteMessage::Ping(data),
            Frame::Pong(data) => TungsteniteMessage::Pong(data),
            Frame::Close => TungsteniteMessage::Close(None),
        }
    }
}

/// A relayed JSON event
///
/// The payload is kept as-is; only `type` is read, for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedEvent(Value);

impl RelayedEvent {
    /// Parse a text or binary payload as JSON
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload).map(Self)
    }

    /// The event's `type` discriminator, or `unknown`
    pub fn event_type(&self) -> &str {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = RelayError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, RelayError>> + Send>>;

/// One side of a bridge
pub struct Leg {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Leg {
    pub fn new<Si, St>(sink: Si, stream: St) -> Self
    where
        Si: Sink<Frame, Error = RelayError> + Send + 'static,
        St: Stream<Item = Result<Frame, RelayError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    /// Wrap a socket accepted by the axum upgrade handler
    pub fn from_axum(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        let sink = sink
            .sink_map_err(RelayError::from)
            .with(|frame: Frame| future::ready(Ok::<_, RelayError>(AxumMessage::from(frame))));
        let stream = stream.map(|item| item.map(Frame::from).map_err(RelayError::from));
        Self::new(sink, stream)
    }

    /// Wrap a tungstenite client or server stream
    pub fn from_tungstenite<S>(socket: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = socket.split();
        let sink = sink.sink_map_err(RelayError::from).with(|frame: Frame| {
            future::ready(Ok::<_, RelayError>(TungsteniteMessage::from(frame)))
        });
        let stream = stream.map(|item| item.map(Frame::from).map_err(RelayError::from));
        Self::new(sink, stream)
    }

    /// Set `alive` whenever a pong arrives on this leg
    pub fn on_pong(self, alive: Arc<AtomicBool>) -> Self {
        let stream = self.stream.inspect(move |item| {
            if let Ok(Frame::Pong(_)) = item {
                alive.store(true, Ordering::SeqCst);
            }
        });
        Self {
            sink: self.sink,
            stream: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leg").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    #[test]
    fn test_event_type_falls_back_to_unknown() {
        let event = RelayedEvent::decode(br#"{"type":"session.update"}"#).unwrap();
        assert_eq!(event.event_type(), "session.update");

        let untyped = RelayedEvent::decode(br#"{"delta":"..."}"#).unwrap();
        assert_eq!(untyped.event_type(), "unknown");

        let numeric = RelayedEvent::decode(br#"{"type":7}"#).unwrap();
        assert_eq!(numeric.event_type(), "unknown");
    }

    #[test]
    fn test_decode_rejects_non_json_and_bad_utf8() {
        assert!(RelayedEvent::decode(b"not json").is_err());
        assert!(RelayedEvent::decode(&[0xff, 0xfe, b'{', b'}']).is_err());
    }

    #[test]
    fn test_payload_only_for_data_frames() {
        assert_eq!(Frame::Text("{}".into()).payload(), Some("{}".as_bytes()));
        assert_eq!(Frame::Binary(vec![1, 2]).payload(), Some(&[1u8, 2][..]));
        assert_eq!(Frame::Ping(vec![1]).payload(), None);
        assert_eq!(Frame::Close.payload(), None);
    }

    #[test]
    fn test_close_maps_to_bare_close() {
        assert_eq!(AxumMessage::from(Frame::Close), AxumMessage::Close(None));
        assert_eq!(
            TungsteniteMessage::from(Frame::Close),
            TungsteniteMessage::Close(None)
        );
        assert_eq!(
            Frame::from(TungsteniteMessage::Text("hi".into())),
            Frame::Text("hi".into())
        );
    }

    #[tokio::test]
    async fn test_on_pong_sets_flag() {
        let (sink_tx, _sink_rx) = mpsc::unbounded::<Frame>();
        let (stream_tx, stream_rx) = mpsc::unbounded::<Result<Frame, RelayError>>();
        let leg = Leg::new(
            sink_tx.sink_map_err(|_| RelayError::ChannelClosed),
            stream_rx,
        );

        let alive = Arc::new(AtomicBool::new(false));
        let mut leg = leg.on_pong(alive.clone());

        stream_tx.unbounded_send(Ok(Frame::Text("{}".into()))).unwrap();
        leg.stream.next().await.unwrap().unwrap();
        assert!(!alive.load(Ordering::SeqCst));

        stream_tx.unbounded_send(Ok(Frame::Pong(Vec::new()))).unwrap();
        assert_eq!(leg.stream.next().await.unwrap().unwrap(), Frame::Pong(Vec::new()));
        assert!(alive.load(Ordering::SeqCst));
    }
}
