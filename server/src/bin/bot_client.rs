use bincode::{deserialize, serialize};
use clap::Parser;
use rand::seq::SliceRandom;
use shared::{Direction, Packet, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

/// Joins a map and wanders around it, printing what the dog sees
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Map to join; defaults to the first map the server lists
    #[arg(short = 'm', long)]
    map: Option<String>,

    #[arg(short = 'n', long, default_value = "Bot")]
    name: String,

    /// Number of moves to make
    #[arg(long, default_value = "10")]
    moves: u32,

    /// Fixed moves as direction codes (U, D, L, R; S stops), e.g. "RRDS"; replaces random moves
    #[arg(long)]
    route: Option<String>,

    /// Ask the server to tick by this many milliseconds after each move
    #[arg(long)]
    tick: Option<u64>,
}

fn parse_route(route: &str) -> Result<Vec<Direction>, String> {
    route
        .chars()
        .map(|c| match c {
            'S' => Ok(Direction::Zero),
            _ => Direction::from_code(&c.to_string())
                .ok_or_else(|| format!("Unknown direction code '{}'", c)),
        })
        .collect()
}

async fn request(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
) -> Result<Packet, Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, server).await?;

    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    Ok(deserialize(&buf[..len])?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);
    let server = args.server.parse::<SocketAddr>()?;

    let map_id = match args.map {
        Some(map) => map,
        None => match request(&socket, server, &Packet::ListMaps).await? {
            Packet::Maps { maps } if !maps.is_empty() => {
                for map in &maps {
                    println!("Map {}: {}", map.id, map.name);
                }
                maps[0].id.clone()
            }
            other => return Err(format!("Server has no maps: {:?}", other).into()),
        },
    };

    let join = Packet::Join {
        user_name: args.name.clone(),
        map_id: map_id.clone(),
    };
    if let Packet::MapDetails { map } = request(
        &socket,
        server,
        &Packet::GetMap {
            map_id: map_id.clone(),
        },
    )
    .await?
    {
        println!(
            "Map {} has {} roads, {} buildings and {} offices",
            map.name,
            map.roads.len(),
            map.buildings.len(),
            map.offices.len()
        );
    }

    let token = match request(&socket, server, &join).await? {
        Packet::Joined { token, player_id } => {
            println!("Joined {} as player {}", map_id, player_id);
            token
        }
        other => return Err(format!("Join failed: {:?}", other).into()),
    };

    let directions = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];
    let plan = match &args.route {
        Some(route) => parse_route(route)?,
        None => (0..args.moves)
            .map(|_| {
                *directions
                    .choose(&mut rand::thread_rng())
                    .unwrap_or(&Direction::Zero)
            })
            .collect(),
    };

    for direction in plan {
        request(
            &socket,
            server,
            &Packet::Move {
                token: token.clone(),
                direction,
            },
        )
        .await?;

        if let Some(time_delta) = args.tick {
            request(&socket, server, &Packet::Tick { time_delta }).await?;
        } else {
            sleep(Duration::from_secs(1)).await;
        }

        match request(&socket, server, &Packet::GetState { token: token.clone() }).await? {
            Packet::State {
                players,
                lost_objects,
            } => {
                println!(
                    "Heading {} - {} dogs, {} lost objects",
                    direction.code(),
                    players.len(),
                    lost_objects.len()
                );
                for dog in players {
                    println!(
                        "  Dog {}: pos=({:.2}, {:.2}) bag={} score={}",
                        dog.id,
                        dog.position.x,
                        dog.position.y,
                        dog.bag.len(),
                        dog.score
                    );
                }
            }
            other => println!("Unexpected packet: {:?}", other),
        }
    }

    request(
        &socket,
        server,
        &Packet::Move {
            token,
            direction: Direction::Zero,
        },
    )
    .await?;
    println!("Bot finished");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route() {
        assert_eq!(
            parse_route("RRDS").unwrap(),
            vec![
                Direction::East,
                Direction::East,
                Direction::South,
                Direction::Zero
            ]
        );
        assert!(parse_route("RX").is_err());
        assert!(parse_route("").unwrap().is_empty());
    }
}
