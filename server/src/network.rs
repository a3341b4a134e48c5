//! Server network layer handling UDP communication with arcade clients

use crate::engine::GameEngine;
use crate::error::SessionError;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::protocol::{ClientPacket, Rejection, RejectionKind, ServerPacket};
use shared::SessionId;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};

/// Messages sent from request handlers to the socket writer
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: ServerPacket, addr: SocketAddr },
}

type Subscriptions = Arc<Mutex<HashMap<(SessionId, SocketAddr), usize>>>;

/// Everything a request handler needs, cheap to clone into a task
#[derive(Clone)]
struct Dispatcher {
    engine: Arc<GameEngine>,
    subscriptions: Subscriptions,
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

/// UDP front end of the session engine
pub struct Server {
    socket: Arc<UdpSocket>,
    dispatcher: Dispatcher,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        engine: Arc<GameEngine>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            dispatcher: Dispatcher {
                engine,
                subscriptions: Arc::new(Mutex::new(HashMap::new())),
                game_tx,
            },
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(socket: Arc<UdpSocket>, mut game_rx: mpsc::UnboundedReceiver<GameMessage>) {
        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Receives datagrams forever, handling each one in its own task so that
    /// sessions never wait on each other.
    pub async fn run(self) {
        let Server {
            socket,
            dispatcher,
            game_rx,
        } = self;
        Self::spawn_network_sender(Arc::clone(&socket), game_rx);

        let mut buffer = [0u8; 8192];
        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => match deserialize::<ClientPacket>(&buffer[..len]) {
                    Ok(packet) => {
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move {
                            dispatcher.dispatch(packet, addr).await;
                        });
                    }
                    Err(e) => {
                        warn!("Failed to deserialize packet from {}: {}", addr, e);
                    }
                },
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

impl Dispatcher {
    async fn dispatch(self, packet: ClientPacket, addr: SocketAddr) {
        let session_id = packet.session_id();
        let dispatcher = self.clone();
        self.isolate(session_id, addr, async move {
            dispatcher.handle_packet(packet, addr).await
        })
        .await;
    }

    /// Runs `handler` in its own task so a fault while handling one request
    /// is reported to its sender and touches nothing else.
    async fn isolate<F>(&self, session_id: SessionId, addr: SocketAddr, handler: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = tokio::spawn(handler).await {
            error!("Handler for session {} from {} failed: {}", session_id, addr, e);
            self.send(
                ServerPacket::Rejected {
                    session_id,
                    rejection: Rejection {
                        kind: RejectionKind::Internal,
                        reason: "internal error".to_string(),
                    },
                },
                addr,
            );
        }
    }

    async fn handle_packet(&self, packet: ClientPacket, addr: SocketAddr) {
        let session_id = packet.session_id();
        let result = match packet {
            ClientPacket::CreateSession {
                session_id,
                variant,
                players,
                difficulty,
            } => self
                .engine
                .create_session(session_id, variant, players, difficulty)
                .await
                .map(|state| self.send(ServerPacket::State { state }, addr)),
            ClientPacket::Join { session_id } => self.join(session_id, addr).await,
            ClientPacket::Leave { session_id } => {
                self.leave(session_id, addr).await;
                Ok(())
            }
            ClientPacket::Action {
                session_id,
                player_id,
                action,
            } => self
                .engine
                .submit(session_id, player_id, action)
                .await
                .map(|_| ()),
            ClientPacket::StartRace { session_id } => self.engine.start_race(session_id).await,
            ClientPacket::GetState { session_id } => self
                .engine
                .get_state(session_id)
                .await
                .map(|state| self.send(ServerPacket::State { state }, addr)),
        };

        if let Err(e) = result {
            debug!("Rejecting request from {}: {}", addr, e);
            self.send(
                ServerPacket::Rejected {
                    session_id,
                    rejection: e.to_rejection(),
                },
                addr,
            );
        }
    }

    /// Subscribes `addr` to the session and replies with the current state.
    async fn join(&self, session_id: SessionId, addr: SocketAddr) -> Result<(), SessionError> {
        let mut subscriptions = self.subscriptions.lock().await;
        if !subscriptions.contains_key(&(session_id, addr)) {
            let (subscriber_id, mut rx) = self.engine.subscribe(session_id);
            // Subscribe first so nothing published after the state read is missed.
            if let Err(e) = self.engine.get_state(session_id).await {
                self.engine.unsubscribe(session_id, subscriber_id);
                return Err(e);
            }
            subscriptions.insert((session_id, addr), subscriber_id);
            info!("{} joined session {}", addr, session_id);

            let game_tx = self.game_tx.clone();
            let registered = Arc::clone(&self.subscriptions);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let packet = ServerPacket::Event { session_id, event };
                    if let Err(e) = game_tx.send(GameMessage::SendPacket { packet, addr }) {
                        error!("Failed to queue event for {}: {}", addr, e);
                        break;
                    }
                }
                let mut registered = registered.lock().await;
                if registered.get(&(session_id, addr)) == Some(&subscriber_id) {
                    registered.remove(&(session_id, addr));
                }
                debug!("Stopped forwarding session {} to {}", session_id, addr);
            });
        }
        drop(subscriptions);

        let state = self.engine.get_state(session_id).await?;
        self.send(ServerPacket::State { state }, addr);
        Ok(())
    }

    async fn leave(&self, session_id: SessionId, addr: SocketAddr) {
        let removed = self.subscriptions.lock().await.remove(&(session_id, addr));
        if let Some(subscriber_id) = removed {
            self.engine.unsubscribe(session_id, subscriber_id);
            info!("{} left session {}", addr, session_id);
        }
    }

    fn send(&self, packet: ServerPacket, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &ServerPacket,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
