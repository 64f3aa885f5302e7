//! Server network layer handling UDP communications and the tick timer

use crate::simulation::Simulation;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ErrorCode, Packet, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from the main server loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Main server coordinating networking and game simulation
///
/// Requests and timer ticks are handled one at a time by `run`, which owns
/// the simulation outright.
pub struct Server {
    socket: Arc<UdpSocket>,
    simulation: Simulation,
    /// `None` means ticks only come from clients
    tick_period: Option<Duration>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        simulation: Simulation,
        tick_period: Option<Duration>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            simulation,
            tick_period,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for stopping `run` from another task.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Answers one datagram
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if !packet.is_request() {
            warn!("Unexpected packet type from client at {}", addr);
            self.send_packet(Packet::error(ErrorCode::BadRequest, "Unexpected packet"), addr);
            return;
        }

        let response = self.simulation.handle_request(packet);
        if let Packet::Error { code, message } = &response {
            debug!("Request from {} failed: {} ({})", addr, message, code.as_str());
        }
        self.send_packet(response, addr);
    }

    /// Main server loop coordinating all operations
    ///
    /// Returns after a `Shutdown` message or Ctrl-C, saving the game state
    /// first when a state file is configured.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let auto_tick = self.tick_period.is_some();
        let mut tick_interval = interval(self.tick_period.unwrap_or(Duration::from_secs(1)));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        tick_interval.tick().await;
        let mut last_tick = Instant::now();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick(), if auto_tick => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick);
                    last_tick = now;

                    let summary = self.simulation.advance(delta);

                    // Periodic performance monitoring
                    let tick = self.simulation.game().tick;
                    if tick % 100 == 0 {
                        debug!(
                            "Tick {}: {} players, {:.1}ms step, {} spawned, {} collected",
                            tick,
                            self.simulation.players().len(),
                            delta.as_secs_f64() * 1000.0,
                            summary.spawned,
                            summary.collected
                        );
                    }
                },

                _ = &mut ctrl_c => {
                    info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        if let Err(e) = self.simulation.save_state() {
            error!("Failed to save game state: {}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Game, GameSettings};
    use crate::model::{Map, Point, Road};
    use crate::players::PlayerRegistry;
    use shared::Direction;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_simulation(auto_tick: bool) -> Simulation {
        let mut game = Game::new(GameSettings {
            loot_probability: 0.0,
            ..GameSettings::default()
        });
        let mut map = Map::new("map1", "Map 1", 2.0, 3);
        map.add_road(Road::horizontal(Point::new(0, 0), 40));
        map.add_loot_type(5);
        game.add_map(map).unwrap();
        Simulation::new(game, PlayerRegistry::new(4), auto_tick, None)
    }

    async fn exchange(socket: &UdpSocket, server: SocketAddr, packet: &Packet) -> Packet {
        socket
            .send_to(&serialize(packet).unwrap(), server)
            .await
            .unwrap();
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("server did not answer")
            .unwrap();
        deserialize(&buf[..len]).unwrap()
    }

    #[test]
    fn test_server_message_creation() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

        let msg = ServerMessage::PacketReceived {
            packet: Packet::ListMaps,
            addr,
        };

        match msg {
            ServerMessage::PacketReceived { packet: p, addr: a } => {
                assert_eq!(a, addr);
                assert!(matches!(p, Packet::ListMaps));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

        assert!(tx
            .send(ServerMessage::PacketReceived {
                packet: Packet::Tick { time_delta: 20 },
                addr,
            })
            .is_ok());
        assert!(tx.send(ServerMessage::Shutdown).is_ok());

        match rx.try_recv().unwrap() {
            ServerMessage::PacketReceived { packet, addr: a } => {
                assert_eq!(a, addr);
                assert!(matches!(packet, Packet::Tick { time_delta: 20 }));
            }
            _ => panic!("Unexpected message type"),
        }
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Shutdown));
    }

    #[test]
    fn test_buffer_fits_largest_datagram() {
        let packet = Packet::error(ErrorCode::BadRequest, "x".repeat(1000));
        assert!(serialize(&packet).unwrap().len() < MAX_PACKET_SIZE);
    }

    #[tokio::test]
    async fn test_server_answers_requests() {
        let mut server = Server::new("127.0.0.1:0", test_simulation(false), None)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move {
            server.run().await.is_ok()
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let joined = exchange(
            &client,
            addr,
            &Packet::Join {
                user_name: "Rex".to_string(),
                map_id: "map1".to_string(),
            },
        )
        .await;
        let token = match joined {
            Packet::Joined { token, player_id } => {
                assert_eq!(player_id, 1);
                token
            }
            other => panic!("Unexpected response: {:?}", other),
        };

        let moved = exchange(
            &client,
            addr,
            &Packet::Move {
                token: token.clone(),
                direction: Direction::East,
            },
        )
        .await;
        assert!(matches!(moved, Packet::Ack));
        let ticked = exchange(&client, addr, &Packet::Tick { time_delta: 1000 }).await;
        assert!(matches!(ticked, Packet::Ack));

        match exchange(&client, addr, &Packet::GetState { token }).await {
            Packet::State { players, .. } => {
                assert_eq!(players[0].position.x, 2.0);
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_timer_drives_ticks() {
        let mut server = Server::new(
            "127.0.0.1:0",
            test_simulation(true),
            Some(Duration::from_millis(10)),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
            server.simulation().game().tick
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let refused = exchange(&client, addr, &Packet::Tick { time_delta: 10 }).await;
        assert!(matches!(
            refused,
            Packet::Error {
                code: ErrorCode::BadRequest,
                ..
            }
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.send(ServerMessage::Shutdown).unwrap();
        assert!(handle.await.unwrap() > 0);
    }
}
