//! Integration tests for the game server components
//!
//! These tests drive the public API end to end: configuration loading, the
//! tick pipeline, persistence and real UDP traffic against a running server.

use assert_approx_eq::assert_approx_eq;
use bincode::{deserialize, serialize};
use server::config::{load_game, GameConfig};
use server::game::Game;
use server::model::Item;
use server::network::{Server, ServerMessage};
use server::players::PlayerRegistry;
use server::simulation::{SaveConfig, Simulation};
use server::snapshot;
use shared::{Direction, ErrorCode, Packet, Vector2, MAX_PACKET_SIZE, TOKEN_LENGTH};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UdpSocket;

const CONFIG: &str = r#"{
    "defaultDogSpeed": 3.0,
    "defaultBagCapacity": 2,
    "dogRetirementTime": 60.0,
    "lootGeneratorConfig": { "period": 5.0, "probability": 0.0 },
    "maps": [
        {
            "id": "map1",
            "name": "Map 1",
            "roads": [
                { "x0": 0, "y0": 0, "x1": 10 },
                { "x0": 10, "y0": 0, "y1": 10 }
            ],
            "buildings": [ { "x": 2, "y": 2, "w": 6, "h": 6 } ],
            "offices": [ { "id": "o0", "x": 10, "y": 10, "offsetX": 5, "offsetY": 0 } ],
            "lootTypes": [ { "name": "key", "value": 10 }, { "name": "wallet", "value": 30 } ]
        },
        {
            "id": "map2",
            "name": "Map 2",
            "dogSpeed": 1.5,
            "roads": [ { "x0": 0, "y0": 0, "y1": 20 } ],
            "lootTypes": [ { "value": 1 } ]
        }
    ]
}"#;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("road-dogs-{}-{}", name, std::process::id()))
}

fn test_game() -> Game {
    let mut game = GameConfig::from_json(CONFIG)
        .unwrap()
        .into_game(false)
        .unwrap();
    game.seed_rng(99);
    game
}

/// GAME PIPELINE TESTS
mod game_logic_tests {
    use super::*;

    /// Loads the config from disk and checks map defaults and overrides
    #[test]
    fn config_file_loading() {
        let path = temp_path("config.json");
        std::fs::write(&path, CONFIG).unwrap();
        let game = load_game(&path, true).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(game.maps().len(), 2);
        assert_eq!(game.find_map("map1").unwrap().bag_capacity(), 2);
        assert_eq!(game.find_map("map2").unwrap().dog_speed(), 1.5);
        assert!(game.settings().random_spawn);
    }

    /// A dog runs to the crossing, turns and stops at the end of the second road
    #[test]
    fn turn_at_crossing() {
        let mut sim = Simulation::new(test_game(), PlayerRegistry::new(4), false, None);
        let token = match sim.handle_request(Packet::Join {
            user_name: "Rex".to_string(),
            map_id: "map1".to_string(),
        }) {
            Packet::Joined { token, .. } => token,
            other => panic!("Unexpected response: {:?}", other),
        };

        let steer = |sim: &mut Simulation, direction| {
            sim.handle_request(Packet::Move {
                token: token.clone(),
                direction,
            })
        };

        // East along the first road into the crossing at (10, 0)
        steer(&mut sim, Direction::East);
        for _ in 0..4 {
            sim.handle_request(Packet::Tick { time_delta: 1000 });
        }
        // South down the second road
        steer(&mut sim, Direction::South);
        for _ in 0..4 {
            sim.handle_request(Packet::Tick { time_delta: 1000 });
        }

        match sim.handle_request(Packet::GetState { token }) {
            Packet::State { players, .. } => {
                let dog = &players[0];
                assert_approx_eq!(dog.position.x, 10.2);
                assert_approx_eq!(dog.position.y, 10.2);
                assert_eq!(dog.speed, Vector2::ZERO);
                assert_eq!(dog.direction, Direction::South);
            }
            other => panic!("Unexpected response: {:?}", other),
        }
    }

    /// Loot picked up on the first road is delivered at the office and scored
    #[test]
    fn collect_and_deliver_round() {
        let mut game = test_game();
        let mut players = PlayerRegistry::new(4);
        let rex = players.add_player("Rex", &mut game, "map1").unwrap().clone();
        let fido = players.add_player("Fido", &mut game, "map1").unwrap().clone();
        assert_eq!(rex.session_id, fido.session_id);

        let wallet = game.find_map("map1").unwrap().loot_type(1).unwrap();
        let session = game.session_mut(rex.session_id).unwrap();
        session.restore_item(Item {
            id: 7,
            item_type: wallet,
            position: Vector2::new(5.0, 0.0),
        });
        session.set_last_item_id(7);

        game.set_dog_direction(rex.session_id, rex.id, Direction::East);
        let mut collected = 0;
        for _ in 0..4 {
            collected += game.tick(1000, &mut players).collected;
        }
        assert_eq!(collected, 1);
        assert!(game.session(rex.session_id).unwrap().items().is_empty());

        game.set_dog_direction(rex.session_id, rex.id, Direction::South);
        let mut scored = 0;
        for _ in 0..4 {
            scored += game.tick(1000, &mut players).scored;
        }
        assert_eq!(scored, 30);

        let session = game.session(rex.session_id).unwrap();
        assert!(session.dog(rex.id).unwrap().bag().is_empty());
        assert_eq!(players.find_by_token(&rex.token).unwrap().score, 30);
        assert_eq!(players.find_by_token(&fido.token).unwrap().score, 0);
    }

    /// Players on different maps never see each other
    #[test]
    fn sessions_are_isolated() {
        let mut sim = Simulation::new(test_game(), PlayerRegistry::new(4), false, None);
        let mut tokens = Vec::new();
        for (name, map) in [("Rex", "map1"), ("Fido", "map2"), ("Max", "map1")] {
            match sim.handle_request(Packet::Join {
                user_name: name.to_string(),
                map_id: map.to_string(),
            }) {
                Packet::Joined { token, .. } => {
                    assert_eq!(token.len(), TOKEN_LENGTH);
                    tokens.push(token);
                }
                other => panic!("Unexpected response: {:?}", other),
            }
        }

        match sim.handle_request(Packet::GetState {
            token: tokens[1].clone(),
        }) {
            Packet::State { players, .. } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].position, Vector2::ZERO);
            }
            other => panic!("Unexpected response: {:?}", other),
        }
        match sim.handle_request(Packet::GetPlayers {
            token: tokens[0].clone(),
        }) {
            Packet::Players { players } => assert_eq!(players.len(), 2),
            other => panic!("Unexpected response: {:?}", other),
        }
    }

    /// Saved state survives a restart of the whole simulation
    #[test]
    fn state_survives_restart() {
        let path = temp_path("restart.bin");
        let save = SaveConfig {
            state_file: path.clone(),
            period: None,
        };
        let mut sim = Simulation::new(test_game(), PlayerRegistry::new(4), false, Some(save));
        let token = match sim.handle_request(Packet::Join {
            user_name: "Rex".to_string(),
            map_id: "map1".to_string(),
        }) {
            Packet::Joined { token, .. } => token,
            other => panic!("Unexpected response: {:?}", other),
        };
        sim.handle_request(Packet::Move {
            token: token.clone(),
            direction: Direction::East,
        });
        sim.handle_request(Packet::Tick { time_delta: 1000 });
        sim.save_state().unwrap();

        let mut game = test_game();
        let mut players = PlayerRegistry::new(4);
        snapshot::restore(
            snapshot::load_from_file(&path).unwrap(),
            &mut game,
            &mut players,
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();
        let mut restarted = Simulation::new(game, players, false, None);

        match restarted.handle_request(Packet::GetState { token }) {
            Packet::State { players, .. } => {
                assert_eq!(players[0].position, Vector2::new(3.0, 0.0));
                assert_eq!(players[0].speed, Vector2::new(3.0, 0.0));
            }
            other => panic!("Unexpected response: {:?}", other),
        }
    }

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_packet = Packet::Join {
            user_name: "Rex".to_string(),
            map_id: "map1".to_string(),
        };
        let valid_data = serialize(&valid_packet).unwrap();

        // Test truncated packet
        let truncated_data = &valid_data[..valid_data.len() / 2];
        let result: Result<Packet, _> = deserialize(truncated_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize truncated packet"
        );

        // Test corrupted packet
        let mut corrupted_data = valid_data.clone();
        corrupted_data[0] = 0xFF;
        let result: Result<Packet, _> = deserialize(&corrupted_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize corrupted packet"
        );

        // Test empty packet
        let empty_data = vec![];
        let result: Result<Packet, _> = deserialize(&empty_data);
        assert!(result.is_err(), "Should fail to deserialize empty packet");
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

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

    /// Full session over real UDP sockets with two clients
    #[tokio::test]
    async fn udp_session_roundtrip() {
        let simulation = Simulation::new(test_game(), PlayerRegistry::new(4), false, None);
        let mut server = Server::new("127.0.0.1:0", simulation, None).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let rex = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let fido = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        match exchange(&rex, addr, &Packet::ListMaps).await {
            Packet::Maps { maps } => assert_eq!(maps.len(), 2),
            other => panic!("Unexpected response: {:?}", other),
        }

        let details = Packet::GetMap {
            map_id: "map1".to_string(),
        };
        match exchange(&rex, addr, &details).await {
            Packet::MapDetails { map } => {
                assert_eq!(map.roads.len(), 2);
                assert_eq!(map.buildings[0].w, 6);
                assert_eq!(map.offices[0].offset_x, 5);
                assert!(map.loot_types.contains("\"wallet\""));
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        let records = Packet::GetRecords {
            start: 0,
            max_items: Some(10),
        };
        match exchange(&rex, addr, &records).await {
            Packet::Records { records } => assert!(records.is_empty()),
            other => panic!("Unexpected response: {:?}", other),
        }

        let join = |name: &str| Packet::Join {
            user_name: name.to_string(),
            map_id: "map1".to_string(),
        };
        let rex_token = match exchange(&rex, addr, &join("Rex")).await {
            Packet::Joined { token, player_id } => {
                assert_eq!(player_id, 1);
                token
            }
            other => panic!("Unexpected response: {:?}", other),
        };
        let fido_token = match exchange(&fido, addr, &join("Fido")).await {
            Packet::Joined { token, player_id } => {
                assert_eq!(player_id, 2);
                token
            }
            other => panic!("Unexpected response: {:?}", other),
        };
        assert_ne!(rex_token, fido_token);

        let moved = exchange(
            &fido,
            addr,
            &Packet::Move {
                token: fido_token,
                direction: Direction::East,
            },
        )
        .await;
        assert!(matches!(moved, Packet::Ack));
        assert!(matches!(
            exchange(&rex, addr, &Packet::Tick { time_delta: 2000 }).await,
            Packet::Ack
        ));

        match exchange(&rex, addr, &Packet::GetState { token: rex_token }).await {
            Packet::State { players, .. } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].position, Vector2::ZERO);
                assert_eq!(players[1].position, Vector2::new(6.0, 0.0));
            }
            other => panic!("Unexpected response: {:?}", other),
        }

        let bad_map = Packet::Join {
            user_name: "Max".to_string(),
            map_id: "map9".to_string(),
        };
        assert!(matches!(
            exchange(&rex, addr, &bad_map).await,
            Packet::Error {
                code: ErrorCode::MapNotFound,
                ..
            }
        ));

        shutdown.send(ServerMessage::Shutdown).unwrap();
        handle.await.unwrap();
    }

    /// Undecodable datagrams are dropped without disturbing the server
    #[tokio::test]
    async fn garbage_datagram_is_ignored() {
        let simulation = Simulation::new(test_game(), PlayerRegistry::new(4), false, None);
        let mut server = Server::new("127.0.0.1:0", simulation, None).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[0xFF, 0x00, 0x13], addr).await.unwrap();

        match exchange(&client, addr, &Packet::ListMaps).await {
            Packet::Maps { maps } => assert_eq!(maps[0].id, "map1"),
            other => panic!("Unexpected response: {:?}", other),
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
        handle.await.unwrap();
    }
}
