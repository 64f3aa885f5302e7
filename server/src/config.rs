//! Game configuration file
//!
//! The server is configured with a JSON document describing the maps and the
//! world-wide game settings. Map-level `dogSpeed` and `bagCapacity` override
//! the defaults; loot type entries may carry extra presentation fields, which
//! are kept as-is for clients while the game itself only uses `value`.

use crate::game::{Game, GameSettings};
use crate::model::{Building, Map, ModelError, Offset, Office, Point, Rectangle, Road, Size};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Map {0} has a road with neither x1 nor y1")]
    InvalidRoad(String),

    #[error("Map {0} has no roads")]
    NoRoads(String),

    #[error("Map {0} has no loot types")]
    NoLootTypes(String),

    #[error("{field} of {value} seconds is out of range")]
    InvalidDuration { field: &'static str, value: f64 },
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value.max(0.0))
        .map_err(|_| ConfigError::InvalidDuration { field, value })
}

fn default_dog_speed() -> f64 {
    1.0
}

fn default_bag_capacity() -> usize {
    3
}

fn default_retirement_time() -> f64 {
    60.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default = "default_dog_speed")]
    pub default_dog_speed: f64,
    #[serde(default = "default_bag_capacity")]
    pub default_bag_capacity: usize,
    /// Seconds
    #[serde(default = "default_retirement_time")]
    pub dog_retirement_time: f64,
    pub loot_generator_config: LootGeneratorConfig,
    pub maps: Vec<MapConfig>,
}

#[derive(Debug, Deserialize)]
pub struct LootGeneratorConfig {
    /// Seconds
    pub period: f64,
    pub probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    pub id: String,
    pub name: String,
    pub dog_speed: Option<f64>,
    pub bag_capacity: Option<usize>,
    pub roads: Vec<RoadConfig>,
    #[serde(default)]
    pub buildings: Vec<BuildingConfig>,
    #[serde(default)]
    pub offices: Vec<OfficeConfig>,
    pub loot_types: Vec<LootTypeConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RoadConfig {
    pub x0: i32,
    pub y0: i32,
    pub x1: Option<i32>,
    pub y1: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BuildingConfig {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeConfig {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LootTypeConfig {
    pub value: u32,
    /// Name, model file, colour and the like
    #[serde(flatten)]
    pub presentation: serde_json::Map<String, serde_json::Value>,
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn settings(&self, random_spawn: bool) -> Result<GameSettings, ConfigError> {
        Ok(GameSettings {
            loot_period: seconds("lootGeneratorConfig.period", self.loot_generator_config.period)?,
            loot_probability: self.loot_generator_config.probability,
            random_spawn,
            retirement_time: seconds("dogRetirementTime", self.dog_retirement_time)?,
        })
    }

    /// Builds the game world described by this config.
    pub fn into_game(self, random_spawn: bool) -> Result<Game, ConfigError> {
        let mut game = Game::new(self.settings(random_spawn)?);

        for map_config in &self.maps {
            let map = map_config.build(self.default_dog_speed, self.default_bag_capacity)?;
            game.add_map(map)?;
        }

        Ok(game)
    }
}

impl MapConfig {
    fn build(&self, default_speed: f64, default_capacity: usize) -> Result<Map, ConfigError> {
        if self.roads.is_empty() {
            return Err(ConfigError::NoRoads(self.id.clone()));
        }
        if self.loot_types.is_empty() {
            return Err(ConfigError::NoLootTypes(self.id.clone()));
        }

        let mut map = Map::new(
            self.id.clone(),
            self.name.clone(),
            self.dog_speed.unwrap_or(default_speed),
            self.bag_capacity.unwrap_or(default_capacity),
        );

        for road in &self.roads {
            let start = Point::new(road.x0, road.y0);
            let road = match (road.x1, road.y1) {
                (Some(x1), _) => Road::horizontal(start, x1),
                (None, Some(y1)) => Road::vertical(start, y1),
                (None, None) => return Err(ConfigError::InvalidRoad(self.id.clone())),
            };
            map.add_road(road);
        }

        for building in &self.buildings {
            map.add_building(Building {
                bounds: Rectangle {
                    position: Point::new(building.x, building.y),
                    size: Size {
                        width: building.w,
                        height: building.h,
                    },
                },
            });
        }

        for office in &self.offices {
            map.add_office(Office {
                id: office.id.clone(),
                position: Point::new(office.x, office.y),
                offset: Offset {
                    dx: office.offset_x,
                    dy: office.offset_y,
                },
            })?;
        }

        for loot_type in &self.loot_types {
            map.add_loot_type(loot_type.value);
        }
        map.set_loot_type_info(serde_json::to_string(&self.loot_types)?);

        Ok(map)
    }
}

/// Reads and builds the game from the JSON file at `path`.
pub fn load_game(path: &Path, random_spawn: bool) -> Result<Game, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    GameConfig::from_json(&json)?.into_game(random_spawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const CONFIG: &str = r#"{
        "defaultDogSpeed": 3.0,
        "defaultBagCapacity": 3,
        "dogRetirementTime": 15.5,
        "lootGeneratorConfig": { "period": 5.0, "probability": 0.5 },
        "maps": [
            {
                "id": "map1",
                "name": "Map 1",
                "roads": [
                    { "x0": 0, "y0": 0, "x1": 40 },
                    { "x0": 40, "y0": 0, "y1": 30 }
                ],
                "buildings": [ { "x": 5, "y": 5, "w": 30, "h": 20 } ],
                "offices": [ { "id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0 } ],
                "lootTypes": [
                    { "name": "key", "file": "assets/key.obj", "type": "obj", "value": 10 },
                    { "name": "wallet", "value": 30 }
                ]
            },
            {
                "id": "town",
                "name": "Town",
                "dogSpeed": 7.5,
                "bagCapacity": 1,
                "roads": [ { "x0": 0, "y0": 0, "y1": 10 } ],
                "lootTypes": [ { "value": 1 } ]
            }
        ]
    }"#;

    #[test]
    fn test_load_full_config() {
        let game = GameConfig::from_json(CONFIG).unwrap().into_game(true).unwrap();

        let settings = game.settings();
        assert_eq!(settings.loot_period, Duration::from_secs(5));
        assert_approx_eq!(settings.loot_probability, 0.5);
        assert_eq!(settings.retirement_time, Duration::from_millis(15_500));
        assert!(settings.random_spawn);

        let map = game.find_map("map1").unwrap();
        assert_eq!(map.name(), "Map 1");
        assert_approx_eq!(map.dog_speed(), 3.0);
        assert_eq!(map.bag_capacity(), 3);
        assert_eq!(map.roads().len(), 2);
        assert!(map.roads()[0].is_horizontal());
        assert!(map.roads()[1].is_vertical());
        assert_eq!(map.buildings().len(), 1);
        assert_eq!(map.find_office("o0").unwrap().offset, Offset { dx: 5, dy: 0 });
        assert_eq!(map.loot_types()[1].value, 30);
        assert_eq!(map.loot_types()[1].type_index, 1);
    }

    #[test]
    fn test_map_overrides_defaults() {
        let game = GameConfig::from_json(CONFIG).unwrap().into_game(false).unwrap();
        let town = game.find_map("town").unwrap();

        assert_approx_eq!(town.dog_speed(), 7.5);
        assert_eq!(town.bag_capacity(), 1);
        assert!(town.offices().is_empty());
    }

    #[test]
    fn test_optional_settings_default() {
        let json = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 1.0 },
            "maps": []
        }"#;
        let config = GameConfig::from_json(json).unwrap();

        assert_approx_eq!(config.default_dog_speed, 1.0);
        assert_eq!(config.default_bag_capacity, 3);
        assert_eq!(
            config.settings(false).unwrap().retirement_time,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let huge_period = CONFIG.replace("\"period\": 5.0", "\"period\": 1e300");
        assert!(matches!(
            GameConfig::from_json(&huge_period).unwrap().into_game(false),
            Err(ConfigError::InvalidDuration {
                field: "lootGeneratorConfig.period",
                ..
            })
        ));

        let huge_retirement = CONFIG.replace(
            "\"dogRetirementTime\": 15.5",
            "\"dogRetirementTime\": 1e300",
        );
        assert!(matches!(
            GameConfig::from_json(&huge_retirement).unwrap().settings(false),
            Err(ConfigError::InvalidDuration {
                field: "dogRetirementTime",
                ..
            })
        ));
    }

    #[test]
    fn test_loot_type_presentation_kept() {
        let game = GameConfig::from_json(CONFIG).unwrap().into_game(false).unwrap();
        let info: serde_json::Value =
            serde_json::from_str(game.find_map("map1").unwrap().loot_type_info()).unwrap();

        assert_eq!(info[0]["name"], "key");
        assert_eq!(info[0]["file"], "assets/key.obj");
        assert_eq!(info[0]["value"], 10);
        assert_eq!(info[1]["name"], "wallet");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let duplicate_map = CONFIG.replace("\"town\"", "\"map1\"");
        assert!(matches!(
            GameConfig::from_json(&duplicate_map).unwrap().into_game(false),
            Err(ConfigError::Model(ModelError::DuplicateMap(_)))
        ));

        let duplicate_office = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 1.0 },
            "maps": [ {
                "id": "m", "name": "M",
                "roads": [ { "x0": 0, "y0": 0, "x1": 5 } ],
                "offices": [
                    { "id": "o", "x": 0, "y": 0, "offsetX": 0, "offsetY": 0 },
                    { "id": "o", "x": 5, "y": 0, "offsetX": 0, "offsetY": 0 }
                ],
                "lootTypes": [ { "value": 1 } ]
            } ]
        }"#;
        assert!(matches!(
            GameConfig::from_json(duplicate_office).unwrap().into_game(false),
            Err(ConfigError::Model(ModelError::DuplicateOffice(_)))
        ));
    }

    #[test]
    fn test_invalid_maps_rejected() {
        let no_loot = CONFIG.replace("\"lootTypes\": [ { \"value\": 1 } ]", "\"lootTypes\": []");
        assert!(matches!(
            GameConfig::from_json(&no_loot).unwrap().into_game(false),
            Err(ConfigError::NoLootTypes(id)) if id == "town"
        ));

        let bad_road = CONFIG.replace("{ \"x0\": 0, \"y0\": 0, \"y1\": 10 }", "{ \"x0\": 0, \"y0\": 0 }");
        assert!(matches!(
            GameConfig::from_json(&bad_road).unwrap().into_game(false),
            Err(ConfigError::InvalidRoad(id)) if id == "town"
        ));

        assert!(matches!(
            GameConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_game(Path::new("/definitely/not/here.json"), false),
            Err(ConfigError::Io(_))
        ));
    }
}
