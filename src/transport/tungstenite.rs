use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Sink, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async as tungstenite_connect,
    connect_async_tls_with_config as tungstenite_connect_tls,
    tungstenite::{
        Message as TungsteniteMessage, Utf8Bytes, protocol::CloseFrame as TungCloseFrame,
    },
};

use crate::core::{Frame, TelemetryError};
use crate::tls::install_rustls_crypto_provider;
use crate::transport::{Transport, TransportConnectFuture};

fn map_ws_error(context: &'static str, err: impl ToString) -> TelemetryError {
    TelemetryError::TransportError {
        context,
        error: err.to_string(),
    }
}

fn close_reason(frame: Option<TungCloseFrame>) -> Option<String> {
    frame.map(|f| {
        if f.reason.is_empty() {
            format!("close code {}", u16::from(f.code))
        } else {
            format!("close code {}: {}", u16::from(f.code), f.reason)
        }
    })
}

fn msg_to_frame(msg: TungsteniteMessage) -> Frame {
    match msg {
        TungsteniteMessage::Text(text) => Frame::Text(AsRef::<Bytes>::as_ref(&text).clone()),
        TungsteniteMessage::Binary(bytes) => Frame::Binary(bytes),
        TungsteniteMessage::Ping(bytes) => Frame::Ping(bytes),
        TungsteniteMessage::Pong(bytes) => Frame::Pong(bytes),
        TungsteniteMessage::Close(frame) => Frame::Close(close_reason(frame)),
        TungsteniteMessage::Frame(_) => Frame::Binary(Bytes::new()),
    }
}

fn frame_to_msg(frame: Frame) -> TungsteniteMessage {
    match frame {
        Frame::Text(bytes) => match std::str::from_utf8(bytes.as_ref()) {
            Ok(_) => {
                let text = unsafe { Utf8Bytes::from_bytes_unchecked(bytes) };
                TungsteniteMessage::Text(text)
            }
            Err(_) => TungsteniteMessage::Binary(bytes),
        },
        Frame::Binary(bytes) => TungsteniteMessage::Binary(bytes),
        Frame::Ping(bytes) => TungsteniteMessage::Ping(bytes),
        Frame::Pong(bytes) => TungsteniteMessage::Pong(bytes),
        Frame::Close(reason) => TungsteniteMessage::Close(reason.map(|reason| TungCloseFrame {
            code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
            reason: Utf8Bytes::from(reason),
        })),
    }
}

#[derive(Clone, Default)]
pub struct TungsteniteTransport {
    connector: Option<Connector>,
}

impl TungsteniteTransport {
    pub fn with_connector(connector: Connector) -> Self {
        Self {
            connector: Some(connector),
        }
    }

    pub fn rustls(config: Arc<rustls::ClientConfig>) -> Self {
        Self::with_connector(Connector::Rustls(config))
    }
}

pub struct TungsteniteReader {
    inner: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl Stream for TungsteniteReader {
    type Item = Result<Frame, TelemetryError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(msg))) => Poll::Ready(Some(Ok(msg_to_frame(msg)))),
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(map_ws_error("read", err)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct TungsteniteWriter {
    inner: futures_util::stream::SplitSink<
        WebSocketStream<MaybeTlsStream<TcpStream>>,
        TungsteniteMessage,
    >,
}

impl Sink<Frame> for TungsteniteWriter {
    type Error = TelemetryError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_ready(cx)
            .map_err(|e| map_ws_error("write", e))
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        Pin::new(&mut self.inner)
            .start_send(frame_to_msg(item))
            .map_err(|e| map_ws_error("write", e))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_flush(cx)
            .map_err(|e| map_ws_error("write", e))
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_close(cx)
            .map_err(|e| map_ws_error("write", e))
    }
}

impl Transport for TungsteniteTransport {
    type Reader = TungsteniteReader;
    type Writer = TungsteniteWriter;

    fn connect(&self, url: String) -> TransportConnectFuture<Self::Reader, Self::Writer> {
        let connector = self.connector.clone();
        Box::pin(async move {
            install_rustls_crypto_provider();

            let (stream, _) = match connector {
                Some(connector) => {
                    tungstenite_connect_tls(url, None, false, Some(connector))
                        .await
                        .map_err(|e| map_ws_error("connect", e))?
                }
                None => {
                    // For ws://, connect_async is enough; fall back to the TLS
                    // path for wss:// endpoints.
                    match tungstenite_connect(url.clone()).await {
                        Ok(ok) => ok,
                        Err(_) => tungstenite_connect_tls(url, None, false, None)
                            .await
                            .map_err(|e| map_ws_error("connect", e))?,
                    }
                }
            };

            let (write, read) = stream.split();
            Ok((
                TungsteniteReader { inner: read },
                TungsteniteWriter { inner: write },
            ))
        })
    }
}
