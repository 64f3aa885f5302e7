pub mod collision;
pub mod geom;

pub use collision::{
    find_gather_events, sort_by_time, try_collect_point, CollectionResult, Gatherer,
    GatheringEvent, ItemGathererProvider, Target,
};
pub use geom::{Point2, Vector2};

use serde::{Deserialize, Serialize};

/// Full width of a road strip. Dogs may stray half of it off the centre line.
pub const ROAD_WIDTH: f64 = 0.4;
pub const ROAD_HALF_WIDTH: f64 = ROAD_WIDTH / 2.0;
/// Pickup width of a dog.
pub const DOG_WIDTH: f64 = 0.6;
/// Lost objects are points.
pub const ITEM_WIDTH: f64 = 0.0;
/// Drop-off width of an office.
pub const OFFICE_WIDTH: f64 = 0.5;
pub const MILLISECONDS_IN_SECOND: f64 = 1000.0;
/// Auth tokens are 128 bits rendered as lowercase hex.
pub const TOKEN_LENGTH: usize = 32;
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Facing / movement direction of a dog.
///
/// `Zero` stops the dog but keeps its last facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    North,
    South,
    West,
    East,
    Zero,
}

impl Direction {
    /// Parses the single-letter move codes `U`, `D`, `L`, `R` and the empty stop code.
    pub fn from_code(code: &str) -> Option<Direction> {
        match code {
            "U" => Some(Direction::North),
            "D" => Some(Direction::South),
            "L" => Some(Direction::West),
            "R" => Some(Direction::East),
            "" => Some(Direction::Zero),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Direction::North => "U",
            Direction::South => "D",
            Direction::West => "L",
            Direction::East => "R",
            Direction::Zero => "",
        }
    }

    /// Unit velocity for this direction in map coordinates (y grows southwards).
    pub fn unit_velocity(&self) -> Vector2 {
        match self {
            Direction::North => Vector2::new(0.0, -1.0),
            Direction::South => Vector2::new(0.0, 1.0),
            Direction::West => Vector2::new(-1.0, 0.0),
            Direction::East => Vector2::new(1.0, 0.0),
            Direction::Zero => Vector2::ZERO,
        }
    }

    pub fn is_horizontal(&self) -> bool {
        matches!(self, Direction::West | Direction::East)
    }

    pub fn is_vertical(&self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidArgument,
    MapNotFound,
    UnknownToken,
    BadRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalidArgument",
            ErrorCode::MapNotFound => "mapNotFound",
            ErrorCode::UnknownToken => "unknownToken",
            ErrorCode::BadRequest => "badRequest",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MapSummary {
    pub id: String,
    pub name: String,
}

/// Road as configured: `x1` for horizontal roads, `y1` for vertical ones.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoadView {
    pub x0: i32,
    pub y0: i32,
    pub x1: Option<i32>,
    pub y1: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BuildingView {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OfficeView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Everything a client needs to draw a map.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MapDescription {
    pub id: String,
    pub name: String,
    pub roads: Vec<RoadView>,
    pub buildings: Vec<BuildingView>,
    pub offices: Vec<OfficeView>,
    /// Loot type entries exactly as configured, as a JSON array
    pub loot_types: String,
}

/// One leaderboard entry of a retired player
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerRecord {
    pub name: String,
    pub score: u64,
    /// Seconds
    pub play_time: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BagItem {
    pub id: u32,
    pub type_index: usize,
}

/// A dog as seen by the players sharing its session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DogView {
    pub id: u32,
    pub position: Vector2,
    pub speed: Vector2,
    pub direction: Direction,
    pub bag: Vec<BagItem>,
    pub score: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LostObject {
    pub id: u32,
    pub type_index: usize,
    pub position: Vector2,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSummary {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    ListMaps,
    GetMap {
        map_id: String,
    },
    Join {
        user_name: String,
        map_id: String,
    },
    Move {
        token: String,
        direction: Direction,
    },
    Tick {
        time_delta: u64,
    },
    GetState {
        token: String,
    },
    GetPlayers {
        token: String,
    },
    /// Leaderboard page; `max_items` defaults to and may not exceed 100.
    GetRecords {
        start: u32,
        max_items: Option<u32>,
    },

    Maps {
        maps: Vec<MapSummary>,
    },
    MapDetails {
        map: MapDescription,
    },
    Joined {
        token: String,
        player_id: u32,
    },
    Ack,
    State {
        players: Vec<DogView>,
        lost_objects: Vec<LostObject>,
    },
    Players {
        players: Vec<PlayerSummary>,
    },
    Records {
        records: Vec<PlayerRecord>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl Packet {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Packet {
        Packet::Error {
            code,
            message: message.into(),
        }
    }

    /// Returns true for packets a client sends to the server.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Packet::ListMaps
                | Packet::GetMap { .. }
                | Packet::Join { .. }
                | Packet::Move { .. }
                | Packet::Tick { .. }
                | Packet::GetState { .. }
                | Packet::GetPlayers { .. }
                | Packet::GetRecords { .. }
        )
    }
}
