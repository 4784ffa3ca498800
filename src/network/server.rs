//! WebSocket Game Server
//!
//! Async WebSocket server for the single match this instance hosts. Each
//! connection joins with its initial coordinates, streams location updates,
//! and leaves on explicit request or socket close. After every mutation
//! batch the server fans a consistent state snapshot out to all clients;
//! the core never pushes, it only leaves the state observable.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::session::{
    broadcast_batch, run_session_loop, SessionConfig, SessionPhase, ZoneSession,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Session configuration.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:2567".parse().unwrap(),
            max_connections: 64,
            session: SessionConfig::default(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// The game server: one listener, one session.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The single session this instance hosts.
    session: Arc<RwLock<ZoneSession>>,
    /// Broadcast channel every connection's outbox subscribes to.
    fanout: broadcast::Sender<ServerMessage>,
    /// Live connection count.
    connections: Arc<AtomicUsize>,
    /// Set once the periodic loop has been spawned.
    loop_armed: Arc<AtomicBool>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (fanout, _) = broadcast::channel(256);
        let (shutdown_tx, _) = broadcast::channel(1);

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let session = Arc::new(RwLock::new(ZoneSession::new(config.session.clone(), seed)));

        Self {
            config,
            session,
            fanout,
            connections: Arc::new(AtomicUsize::new(0)),
            loop_armed: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Run the server until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Listening on ws://{}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Tear down the session so the periodic loop stops too
        self.session.write().await.dispose();
        let _ = self.fanout.send(ServerMessage::Shutdown {
            reason: "Server shutting down".to_string(),
        });

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let session = self.session.clone();
        let fanout = self.fanout.clone();
        let connections = self.connections.clone();
        let loop_armed = self.loop_armed.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    connections.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let mut fanout_rx = fanout.subscribe();

            // Outbox task: direct replies and session-wide broadcasts share
            // this connection's socket
            let sender_task = tokio::spawn(async move {
                loop {
                    let msg = tokio::select! {
                        direct = msg_rx.recv() => match direct {
                            Some(m) => m,
                            None => break,
                        },
                        shared = fanout_rx.recv() => match shared {
                            Ok(m) => m,
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("Client {} lagged, skipped {} broadcasts", addr, skipped);
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    };

                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Id assigned on join; this connection's whole identity
            let mut player_id: Option<PlayerId> = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error {
                                            code: ErrorCode::InvalidMessage,
                                            message: "Invalid message format".to_string(),
                                        }).await;
                                        continue;
                                    }
                                };

                                handle_client_message(
                                    addr,
                                    client_msg,
                                    &mut player_id,
                                    &session,
                                    &fanout,
                                    &loop_armed,
                                    &msg_tx,
                                ).await;
                            }
                            Some(Ok(Message::Ping(_))) => {
                                // tungstenite answers pings itself
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // A dropped socket is a leave; late location updates for this id
            // will be dropped by the session
            if let Some(id) = player_id {
                let batch = {
                    let mut s = session.write().await;
                    s.on_leave(id);
                    s.drain_batch()
                };
                broadcast_batch(&fanout, batch);
            }

            sender_task.abort();
            connections.fetch_sub(1, Ordering::Relaxed);
            info!("Client {} cleaned up", addr);
        });
    }

    /// Signal the server to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Get the session's lifecycle phase.
    pub async fn session_phase(&self) -> SessionPhase {
        self.session.read().await.phase()
    }
}

/// Route one parsed client message.
async fn handle_client_message(
    addr: SocketAddr,
    msg: ClientMessage,
    player_id: &mut Option<PlayerId>,
    session: &Arc<RwLock<ZoneSession>>,
    fanout: &broadcast::Sender<ServerMessage>,
    loop_armed: &AtomicBool,
    msg_tx: &mpsc::Sender<ServerMessage>,
) {
    match msg {
        ClientMessage::Join { coords } => {
            if player_id.is_some() {
                let _ = msg_tx
                    .send(ServerMessage::Error {
                        code: ErrorCode::AlreadyJoined,
                        message: "Connection already joined".to_string(),
                    })
                    .await;
                return;
            }

            let id = PlayerId::generate();
            let (result, batch, phase) = {
                let mut s = session.write().await;
                let result = s.on_join(id, coords);
                (result, s.drain_batch(), s.phase())
            };

            match result {
                Ok(()) => {
                    *player_id = Some(id);

                    // Arm the periodic loop exactly once, when the session
                    // goes live
                    if phase == SessionPhase::Active
                        && loop_armed
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_ok()
                    {
                        tokio::spawn(run_session_loop(session.clone(), fanout.clone()));
                    }

                    let _ = msg_tx
                        .send(ServerMessage::Welcome {
                            player_id: id,
                            snapshot: batch.0.clone(),
                        })
                        .await;
                    broadcast_batch(fanout, batch);
                    debug!("Client {} joined as {}", addr, id);
                }
                Err(err) => {
                    warn!("Join from {} rejected: {}", addr, err);
                    let _ = msg_tx
                        .send(ServerMessage::Error {
                            code: ErrorCode::SessionClosed,
                            message: err.to_string(),
                        })
                        .await;
                }
            }
        }

        ClientMessage::LocationUpdate { coords } => {
            let Some(id) = *player_id else {
                let _ = msg_tx
                    .send(ServerMessage::Error {
                        code: ErrorCode::NotJoined,
                        message: "Join before sending location updates".to_string(),
                    })
                    .await;
                return;
            };

            let batch = {
                let mut s = session.write().await;
                s.on_location_update(id, coords);
                s.drain_batch()
            };
            broadcast_batch(fanout, batch);
        }

        ClientMessage::Leave => {
            let Some(id) = player_id.take() else {
                return;
            };

            let batch = {
                let mut s = session.write().await;
                s.on_leave(id);
                s.drain_batch()
            };
            broadcast_batch(fanout, batch);
        }

        ClientMessage::Ping { timestamp } => {
            let _ = msg_tx
                .send(ServerMessage::Pong {
                    timestamp,
                    server_time: unix_millis(),
                })
                .await;
        }
    }
}

/// Wall-clock milliseconds since the unix epoch.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 2567);
        assert_eq!(config.max_connections, 64);
        assert!(!config.session.dispose_when_empty);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::new(ServerConfig::default());
        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.session_phase().await, SessionPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_server_shutdown_disposes_session() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = Arc::new(GameServer::new(config));

        let handle = tokio::spawn({
            let server = server.clone();
            async move { server.run().await }
        });

        // Let the accept loop come up before signalling
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        server.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("server should stop after shutdown")
            .unwrap()
            .unwrap();

        assert_eq!(server.session_phase().await, SessionPhase::Disposed);
    }
}
