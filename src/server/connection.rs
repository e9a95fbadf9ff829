//! Per-connection protocol handler
//!
//! Upgrades the socket, checks the route, reads the single subscription
//! message, binds the connection to its stream and then forwards broadcast
//! frames until either side goes away.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{Broadcaster, SubscriberQueue};
use crate::error::{Error, Result};
use crate::registry::{StreamKey, StreamRegistry};
use crate::server::config::ServerConfig;
use crate::server::protocol::{self, StatusMessage, SubscribeRequest};
use crate::server::state::ConnectionState;

type WsStream = WebSocketStream<TcpStream>;

/// Outcome of waiting for the subscription message
enum SubscriptionRead {
    /// A text (or UTF-8 binary) frame arrived; `None` if it did not parse
    Request(Option<SubscribeRequest>),
    /// Client went away before subscribing
    Disconnected,
    /// Server is stopping
    Shutdown,
}

/// Why a subscribed session ended
#[derive(Debug)]
enum SessionEnd {
    ClientClosed,
    Shutdown,
    Lagged,
    SendTimeout,
    Transport(String),
}

/// A single client connection
pub struct Connection {
    state: ConnectionState,
    config: Arc<ServerConfig>,
    registry: Arc<StreamRegistry>,
    broadcaster: Arc<Broadcaster>,
    shutdown: CancellationToken,
}

impl Connection {
    /// Create a handler for an accepted socket
    pub fn new(
        conn_id: u64,
        peer_addr: SocketAddr,
        config: Arc<ServerConfig>,
        registry: Arc<StreamRegistry>,
        broadcaster: Arc<Broadcaster>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state: ConnectionState::new(conn_id, peer_addr),
            config,
            registry,
            broadcaster,
            shutdown,
        }
    }

    /// Connection state
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Drive the connection to completion
    ///
    /// Errors are limited to the upgrade itself; everything after it is
    /// handled here and ends in `Ok`.
    pub async fn run(&mut self, socket: TcpStream) -> Result<()> {
        let result = self.serve(socket).await;
        self.state.close();
        result
    }

    async fn serve(&mut self, socket: TcpStream) -> Result<()> {
        let (mut ws, path) = self.upgrade(socket).await?;
        self.state.on_upgraded();

        if self.config.requires_route() && path != self.config.route {
            tracing::warn!(
                conn_id = self.state.id,
                peer = %self.state.peer_addr,
                path = %path,
                expected = %self.config.route,
                "Connection attempt on invalid path"
            );
            self.reject(&mut ws, protocol::INVALID_PATH).await;
            return Ok(());
        }

        let request = match self.read_subscription(&mut ws).await {
            SubscriptionRead::Request(request) => request,
            SubscriptionRead::Disconnected => {
                tracing::debug!(conn_id = self.state.id, "Client left before subscribing");
                return Ok(());
            }
            SubscriptionRead::Shutdown => {
                let _ = timeout(self.config.send_timeout, ws.close(Some(protocol::shutdown_close())))
                    .await;
                return Ok(());
            }
        };

        let key = match request {
            Some(req) if self.registry.is_registered(&req.stream_key()) => req.stream_key(),
            other => {
                tracing::warn!(
                    conn_id = self.state.id,
                    peer = %self.state.peer_addr,
                    request = ?other,
                    "Invalid subscription request"
                );
                self.reject(&mut ws, protocol::INVALID_SUBSCRIPTION).await;
                return Ok(());
            }
        };

        self.state.on_subscribed(key.clone());
        let (tx, queue) = mpsc::channel(self.config.subscriber_queue_capacity);
        self.broadcaster.subscribe(
            &key,
            self.state.id,
            tx,
            &self.registry,
            self.config.replay_cached,
        );

        tracing::info!(
            conn_id = self.state.id,
            peer = %self.state.peer_addr,
            stream = %key,
            "Client subscribed"
        );

        let sent = timeout(
            self.config.send_timeout,
            ws.send(StatusMessage::success().to_message()),
        )
        .await;

        let end = match sent {
            Ok(Ok(())) => self.forward(ws, queue, &key).await,
            Ok(Err(e)) => {
                self.broadcaster.unsubscribe(&key, self.state.id);
                SessionEnd::Transport(e.to_string())
            }
            Err(_) => {
                self.broadcaster.unsubscribe(&key, self.state.id);
                SessionEnd::SendTimeout
            }
        };

        match end {
            SessionEnd::ClientClosed | SessionEnd::Shutdown => tracing::info!(
                conn_id = self.state.id,
                stream = %key,
                frames_sent = self.state.frames_sent,
                reason = ?end,
                "Client unsubscribed"
            ),
            _ => tracing::warn!(
                conn_id = self.state.id,
                stream = %key,
                frames_sent = self.state.frames_sent,
                reason = ?end,
                "Client dropped"
            ),
        }

        Ok(())
    }

    /// Perform the WebSocket upgrade, returning the request target
    async fn upgrade(&self, socket: TcpStream) -> Result<(WsStream, String)> {
        let mut path = String::new();
        let callback = |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
            // Full request target, query included, so `/data?x` is not `/data`
            path = req
                .uri()
                .path_and_query()
                .map_or_else(|| req.uri().path().to_string(), |pq| pq.as_str().to_string());
            Ok(resp)
        };

        let ws = timeout(
            self.config.handshake_timeout,
            tokio_tungstenite::accept_hdr_async(socket, callback),
        )
        .await
        .map_err(|_| Error::HandshakeTimeout)??;

        Ok((ws, path))
    }

    /// Wait for the subscription message
    ///
    /// Control frames are skipped. Binary frames are accepted if they hold
    /// UTF-8 text. A timeout counts as an invalid request.
    async fn read_subscription(&self, ws: &mut WsStream) -> SubscriptionRead {
        let read = async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return SubscriptionRead::Request(SubscribeRequest::parse(text.as_str()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let request = std::str::from_utf8(&data)
                            .ok()
                            .and_then(SubscribeRequest::parse);
                        return SubscriptionRead::Request(request);
                    }
                    Some(Ok(Message::Close(_))) | None => return SubscriptionRead::Disconnected,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(conn_id = self.state.id, error = %e, "Read failed before subscribing");
                        return SubscriptionRead::Disconnected;
                    }
                }
            }
        };

        tokio::select! {
            _ = self.shutdown.cancelled() => SubscriptionRead::Shutdown,
            result = timeout(self.config.handshake_timeout, read) => {
                result.unwrap_or(SubscriptionRead::Request(None))
            }
        }
    }

    /// Send a failure frame and close with a policy violation
    async fn reject(&mut self, ws: &mut WsStream, reason: &'static str) {
        self.state.reject();

        let close = async {
            ws.send(StatusMessage::failure(reason).to_message()).await?;
            ws.close(Some(protocol::policy_violation(reason))).await?;
            // Wait for the client's close reply so the frame is not lost to a reset
            while let Some(Ok(_)) = ws.next().await {}
            Ok::<_, tokio_tungstenite::tungstenite::Error>(())
        };

        match timeout(self.config.send_timeout, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(conn_id = self.state.id, error = %e, "Reject close failed"),
            Err(_) => tracing::debug!(conn_id = self.state.id, "Reject close timed out"),
        }
    }

    /// Forward queued frames to the socket until the session ends
    ///
    /// The read half is polled only to notice close and errors; anything the
    /// client sends is discarded.
    async fn forward(&mut self, ws: WsStream, mut queue: SubscriberQueue, key: &StreamKey) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let shutdown = self.shutdown.clone();
        let send_timeout = self.config.send_timeout;
        let conn_id = self.state.id;
        let mut frames_sent = 0u64;

        let end = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break SessionEnd::Shutdown,
                frame = queue.recv() => {
                    let Some(frame) = frame else {
                        break SessionEnd::Lagged;
                    };
                    match timeout(send_timeout, sink.send(Message::Text(frame.text))).await {
                        Ok(Ok(())) => frames_sent += 1,
                        Ok(Err(e)) => break SessionEnd::Transport(e.to_string()),
                        Err(_) => break SessionEnd::SendTimeout,
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break SessionEnd::ClientClosed,
                    Some(Ok(_)) => {
                        tracing::trace!(conn_id = conn_id, "Ignoring client frame while subscribed");
                    }
                    Some(Err(e)) => break SessionEnd::Transport(e.to_string()),
                },
            }
        };

        self.state.frames_sent += frames_sent;

        // Leave the fan-out list before the socket goes away
        self.broadcaster.unsubscribe(key, conn_id);

        let close_frame = match end {
            SessionEnd::Shutdown => Some(protocol::shutdown_close()),
            SessionEnd::Lagged => Some(protocol::lagged_close()),
            _ => None,
        };
        if let Some(frame) = close_frame {
            let _ = timeout(send_timeout, sink.send(Message::Close(Some(frame)))).await;
        }
        if matches!(end, SessionEnd::ClientClosed | SessionEnd::Shutdown | SessionEnd::Lagged) {
            // Flushes the close reply queued by the read half
            let _ = timeout(send_timeout, sink.close()).await;
        }

        end
    }
}
