//! World model: maps, roads, offices, dogs and the per-map game session
//!
//! Maps are immutable once loaded and shared between the session that plays
//! on them and anything that needs to describe them. A session exclusively
//! owns its dogs and the lost objects lying on the ground.

use crate::loot::LootGenerator;
use rand::Rng;
use shared::{Direction, Vector2, MILLISECONDS_IN_SECOND, ROAD_HALF_WIDTH};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub type DogId = u32;
pub type ItemId = u32;
pub type SessionId = u32;

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("Duplicate office id: {0}")]
    DuplicateOffice(String),

    #[error("Map with id {0} already exists")]
    DuplicateMap(String),
}

/// Integer map coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    pub fn to_vector(self) -> Vector2 {
        Vector2::new(self.x as f64, self.y as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub position: Point,
    pub size: Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

/// Axis-aligned road segment
///
/// A zero-length road counts as horizontal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Road {
    start: Point,
    end: Point,
}

impl Road {
    pub fn horizontal(start: Point, end_x: i32) -> Self {
        Road {
            start,
            end: Point::new(end_x, start.y),
        }
    }

    pub fn vertical(start: Point, end_y: i32) -> Self {
        Road {
            start,
            end: Point::new(start.x, end_y),
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }

    pub fn is_vertical(&self) -> bool {
        !self.is_horizontal()
    }

    /// Returns the end points ordered so that `lo <= hi` along the road.
    pub fn bounds(&self) -> (Point, Point) {
        let swap = if self.is_horizontal() {
            self.start.x > self.end.x
        } else {
            self.start.y > self.end.y
        };
        if swap {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        }
    }

    /// Returns true if `position` lies inside the road strip.
    pub fn strip_contains(&self, position: Vector2) -> bool {
        let (lo, hi) = self.bounds();
        position.x >= lo.x as f64 - ROAD_HALF_WIDTH
            && position.x <= hi.x as f64 + ROAD_HALF_WIDTH
            && position.y >= lo.y as f64 - ROAD_HALF_WIDTH
            && position.y <= hi.y as f64 + ROAD_HALF_WIDTH
    }

    /// Point at `fraction` (0..=1) of the way from start to end.
    pub fn point_at(&self, fraction: f64) -> Vector2 {
        let start = self.start.to_vector();
        start.add(&self.end.to_vector().sub(&start).scale(fraction))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Building {
    pub bounds: Rectangle,
}

/// Drop-off point where dogs turn their bag into score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Office {
    pub id: String,
    pub position: Point,
    pub offset: Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemType {
    /// Index into the map's loot type list
    pub type_index: usize,
    pub value: u32,
}

/// A lost object, either on the ground or in a dog's bag
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub item_type: ItemType,
    pub position: Vector2,
}

#[derive(Debug, Clone)]
pub struct Map {
    id: String,
    name: String,
    roads: Vec<Road>,
    buildings: Vec<Building>,
    offices: Vec<Office>,
    office_index: HashMap<String, usize>,
    loot_types: Vec<ItemType>,
    /// Presentation data of the loot types as a JSON array, passed to clients untouched
    loot_type_info: String,
    dog_speed: f64,
    bag_capacity: usize,
}

impl Map {
    pub fn new(id: impl Into<String>, name: impl Into<String>, dog_speed: f64, bag_capacity: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roads: Vec::new(),
            buildings: Vec::new(),
            offices: Vec::new(),
            office_index: HashMap::new(),
            loot_types: Vec::new(),
            loot_type_info: "[]".to_string(),
            dog_speed,
            bag_capacity,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    pub fn loot_types(&self) -> &[ItemType] {
        &self.loot_types
    }

    pub fn loot_type_info(&self) -> &str {
        &self.loot_type_info
    }

    pub fn set_loot_type_info(&mut self, json: String) {
        self.loot_type_info = json;
    }

    pub fn dog_speed(&self) -> f64 {
        self.dog_speed
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn add_road(&mut self, road: Road) {
        self.roads.push(road);
    }

    pub fn add_building(&mut self, building: Building) {
        self.buildings.push(building);
    }

    pub fn add_office(&mut self, office: Office) -> Result<(), ModelError> {
        if self.office_index.contains_key(&office.id) {
            return Err(ModelError::DuplicateOffice(office.id));
        }
        self.office_index.insert(office.id.clone(), self.offices.len());
        self.offices.push(office);
        Ok(())
    }

    pub fn find_office(&self, id: &str) -> Option<&Office> {
        self.office_index.get(id).map(|&idx| &self.offices[idx])
    }

    /// Appends a loot type worth `value`; its index is its position in the list.
    pub fn add_loot_type(&mut self, value: u32) -> ItemType {
        let item_type = ItemType {
            type_index: self.loot_types.len(),
            value,
        };
        self.loot_types.push(item_type);
        item_type
    }

    pub fn loot_type(&self, type_index: usize) -> Option<ItemType> {
        self.loot_types.get(type_index).copied()
    }

    /// Roads whose strip contains `position`.
    pub fn roads_at(&self, position: Vector2) -> Vec<&Road> {
        self.roads
            .iter()
            .filter(|road| road.strip_contains(position))
            .collect()
    }

    /// Uniformly random point on a uniformly random road.
    pub fn random_road_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vector2> {
        if self.roads.is_empty() {
            return None;
        }
        let road = &self.roads[rng.gen_range(0..self.roads.len())];
        Some(road.point_at(rng.gen_range(0.0..=1.0)))
    }
}

#[derive(Debug, Clone)]
pub struct Dog {
    id: DogId,
    position: Vector2,
    prev_position: Vector2,
    speed: Vector2,
    direction: Direction,
    bag: Vec<Item>,
}

impl Dog {
    pub fn new(id: DogId, position: Vector2) -> Self {
        Self {
            id,
            position,
            prev_position: position,
            speed: Vector2::ZERO,
            direction: Direction::North,
            bag: Vec::new(),
        }
    }

    pub fn id(&self) -> DogId {
        self.id
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    /// Position before the latest move; the dog travelled from here to `position`.
    pub fn prev_position(&self) -> Vector2 {
        self.prev_position
    }

    pub fn speed(&self) -> Vector2 {
        self.speed
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn bag(&self) -> &[Item] {
        &self.bag
    }

    pub fn bag_len(&self) -> usize {
        self.bag.len()
    }

    pub fn set_position(&mut self, position: Vector2) {
        self.prev_position = self.position;
        self.position = position;
    }

    pub fn set_speed(&mut self, speed: Vector2) {
        self.speed = speed;
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Sets velocity from a movement command. `Zero` stops the dog and keeps its facing.
    pub fn apply_direction(&mut self, direction: Direction, map_speed: f64) {
        self.speed = direction.unit_velocity().scale(map_speed);
        if direction != Direction::Zero {
            self.direction = direction;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.speed == Vector2::ZERO
    }

    pub fn add_item(&mut self, item: Item) {
        self.bag.push(item);
    }

    /// Empties the bag, handing its contents to the caller.
    pub fn take_bag(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.bag)
    }

    /// Length of the latest move.
    pub fn travelled(&self) -> f64 {
        self.position.distance_to(&self.prev_position)
    }

    /// Integrates one tick of movement constrained to the map's road strips
    ///
    /// Roads are picked at the pre-move position. Away from crossings every
    /// standing road clamps the dog; on a crossing of two roads only the road
    /// running along the dog's facing clamps it. Hitting a strip edge stops
    /// the dog.
    pub fn advance(&mut self, map: &Map, delta_ms: u64) {
        let stand_roads = map.roads_at(self.position);
        let mut position = self.position;

        if !stand_roads.is_empty() {
            position = position.add(
                &self
                    .speed
                    .scale(delta_ms as f64 / MILLISECONDS_IN_SECOND),
            );
        }

        let at_crossing = stand_roads.len() == 2;

        for road in &stand_roads {
            let (lo, hi) = road.bounds();
            let min_x = lo.x as f64 - ROAD_HALF_WIDTH;
            let max_x = hi.x as f64 + ROAD_HALF_WIDTH;
            let min_y = lo.y as f64 - ROAD_HALF_WIDTH;
            let max_y = hi.y as f64 + ROAD_HALF_WIDTH;

            let clamp_x = !at_crossing || (road.is_horizontal() && self.direction.is_horizontal());
            let clamp_y = !at_crossing || (road.is_vertical() && self.direction.is_vertical());

            if clamp_x && position.x < min_x {
                position.x = min_x;
                self.speed = Vector2::ZERO;
            } else if clamp_x && position.x > max_x {
                position.x = max_x;
                self.speed = Vector2::ZERO;
            } else if clamp_y && position.y < min_y {
                position.y = min_y;
                self.speed = Vector2::ZERO;
            } else if clamp_y && position.y > max_y {
                position.y = max_y;
                self.speed = Vector2::ZERO;
            }
        }

        self.set_position(position);
    }

    /// Rebuilds a dog from saved state. The previous position equals the current one.
    pub fn restore(
        id: DogId,
        position: Vector2,
        speed: Vector2,
        direction: Direction,
        bag: Vec<Item>,
    ) -> Self {
        Self {
            id,
            position,
            prev_position: position,
            speed,
            direction,
            bag,
        }
    }
}

/// Everything happening on one map
pub struct GameSession {
    id: SessionId,
    map: Arc<Map>,
    dogs: Vec<Dog>,
    items: Vec<Item>,
    random_spawn: bool,
    last_item_id: ItemId,
    loot: LootGenerator,
}

impl GameSession {
    pub fn new(id: SessionId, map: Arc<Map>, random_spawn: bool, loot: LootGenerator) -> Self {
        Self {
            id,
            map,
            dogs: Vec::new(),
            items: Vec::new(),
            random_spawn,
            last_item_id: 0,
            loot,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    pub fn dogs(&self) -> &[Dog] {
        &self.dogs
    }

    pub fn dogs_mut(&mut self) -> &mut [Dog] {
        &mut self.dogs
    }

    pub fn dog(&self, id: DogId) -> Option<&Dog> {
        self.dogs.iter().find(|dog| dog.id() == id)
    }

    pub fn dog_mut(&mut self, id: DogId) -> Option<&mut Dog> {
        self.dogs.iter_mut().find(|dog| dog.id() == id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn last_item_id(&self) -> ItemId {
        self.last_item_id
    }

    /// Spawns a dog for a newly joined player
    ///
    /// Dogs start at the first road's start, or at a random road point when
    /// random spawning is on.
    pub fn spawn_dog<R: Rng + ?Sized>(&mut self, id: DogId, rng: &mut R) -> &Dog {
        let first_road_start = self
            .map
            .roads()
            .first()
            .map(|road| road.start().to_vector())
            .unwrap_or_default();

        let position = if self.random_spawn {
            self.map.random_road_point(rng).unwrap_or(first_road_start)
        } else {
            first_road_start
        };

        self.add_dog(Dog::new(id, position))
    }

    pub fn add_dog(&mut self, dog: Dog) -> &Dog {
        self.dogs.push(dog);
        &self.dogs[self.dogs.len() - 1]
    }

    pub fn remove_dog(&mut self, id: DogId) -> Option<Dog> {
        let idx = self.dogs.iter().position(|dog| dog.id() == id)?;
        Some(self.dogs.remove(idx))
    }

    /// Drops `count` new lost objects on random road points with random loot types.
    pub fn add_items<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) {
        let loot_types = self.map.loot_types();
        if loot_types.is_empty() {
            return;
        }

        for _ in 0..count {
            let Some(position) = self.map.random_road_point(rng) else {
                return;
            };
            let item_type = loot_types[rng.gen_range(0..loot_types.len())];
            self.last_item_id += 1;
            self.items.push(Item {
                id: self.last_item_id,
                item_type,
                position,
            });
        }
    }

    /// Puts an item with a known id back on the ground. Later ids continue after it.
    pub fn restore_item(&mut self, item: Item) {
        self.last_item_id = self.last_item_id.max(item.id);
        self.items.push(item);
    }

    pub fn set_last_item_id(&mut self, id: ItemId) {
        self.last_item_id = self.last_item_id.max(id);
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let idx = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(idx))
    }

    pub(crate) fn take_items(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    pub(crate) fn put_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    /// Moves every dog along the roads for `delta_ms` milliseconds.
    pub fn advance_dogs(&mut self, delta_ms: u64) {
        for dog in &mut self.dogs {
            dog.advance(&self.map, delta_ms);
        }
    }

    /// Asks the loot generator how much to spawn for this tick and spawns it.
    pub fn spawn_loot<R: Rng + ?Sized>(&mut self, delta_ms: u64, rng: &mut R) -> usize {
        let count = self.loot.generate(
            std::time::Duration::from_millis(delta_ms),
            self.items.len(),
            self.dogs.len(),
        );
        self.add_items(count, rng);
        count
    }
}
