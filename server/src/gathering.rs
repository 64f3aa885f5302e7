//! Turns one tick of dog movement into pickups and deliveries
//!
//! Dogs are run through the collision detector twice: against the lost
//! objects lying on the ground and against the map's offices. The two event
//! lists are put on a common time axis and resolved in chronological order,
//! so a dog that passes an office and then an item ends the tick carrying the
//! item, and the other way round ends it with an empty bag and more score.

use crate::model::{Dog, DogId, GameSession, Item, Office, SessionId};
use shared::{
    find_gather_events, sort_by_time, Gatherer, GatheringEvent, ItemGathererProvider, Target,
    DOG_WIDTH, ITEM_WIDTH, OFFICE_WIDTH,
};
use std::sync::Arc;

/// Receives score for bags delivered to an office.
pub trait ScoreSink {
    fn add_scores(&mut self, session_id: SessionId, dog_id: DogId, amount: u64);
}

/// What happened to one session's items during a tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GatheringSummary {
    pub collected: usize,
    pub delivered_items: usize,
    pub scored: u64,
}

impl GatheringSummary {
    pub fn is_empty(&self) -> bool {
        self.collected == 0 && self.delivered_items == 0
    }
}

fn dog_gatherer(dog: &Dog) -> Gatherer {
    Gatherer {
        start_pos: dog.prev_position(),
        end_pos: dog.position(),
        width: DOG_WIDTH,
    }
}

/// Dogs against the lost objects on the ground.
struct LootProvider<'a> {
    items: &'a [Item],
    dogs: &'a [Dog],
}

impl ItemGathererProvider for LootProvider<'_> {
    fn items_count(&self) -> usize {
        self.items.len()
    }

    fn get_item(&self, idx: usize) -> Target {
        Target {
            position: self.items[idx].position,
            width: ITEM_WIDTH,
        }
    }

    fn gatherers_count(&self) -> usize {
        self.dogs.len()
    }

    fn get_gatherer(&self, idx: usize) -> Gatherer {
        dog_gatherer(&self.dogs[idx])
    }
}

/// Dogs against the map's offices.
struct OfficeProvider<'a> {
    offices: &'a [Office],
    dogs: &'a [Dog],
}

impl ItemGathererProvider for OfficeProvider<'_> {
    fn items_count(&self) -> usize {
        self.offices.len()
    }

    fn get_item(&self, idx: usize) -> Target {
        Target {
            position: self.offices[idx].position.to_vector(),
            width: OFFICE_WIDTH,
        }
    }

    fn gatherers_count(&self) -> usize {
        self.dogs.len()
    }

    fn get_gatherer(&self, idx: usize) -> Gatherer {
        dog_gatherer(&self.dogs[idx])
    }
}

/// Rescales segment fractions onto the tick's time axis.
///
/// A dog stopped by a road edge covers less than `speed * interval`; its
/// fractions shrink accordingly so events of different dogs compare.
fn rescale_times(events: &mut [GatheringEvent], dogs: &[Dog], dog_speed: f64, interval_ms: u64) {
    let full_move = dog_speed * interval_ms as f64;
    if full_move <= 0.0 {
        return;
    }

    for event in events.iter_mut() {
        event.time *= dogs[event.gatherer_id].travelled() / full_move;
    }
}

/// Resolves pickups and deliveries for the movement the session's dogs just made
///
/// Must run after the dogs have advanced: each dog's previous and current
/// positions form its gatherer segment. An item goes to the first dog that
/// reaches it and has room in its bag; on equal times a pickup happens before
/// a delivery.
pub fn update_session_items<S>(
    session: &mut GameSession,
    interval_ms: u64,
    sink: &mut S,
) -> GatheringSummary
where
    S: ScoreSink + ?Sized,
{
    let map = Arc::clone(session.map());

    let mut item_events = find_gather_events(&LootProvider {
        items: session.items(),
        dogs: session.dogs(),
    });
    let mut office_events = find_gather_events(&OfficeProvider {
        offices: map.offices(),
        dogs: session.dogs(),
    });

    rescale_times(&mut item_events, session.dogs(), map.dog_speed(), interval_ms);
    rescale_times(&mut office_events, session.dogs(), map.dog_speed(), interval_ms);
    sort_by_time(&mut item_events);
    sort_by_time(&mut office_events);

    let session_id = session.id();
    let capacity = map.bag_capacity();
    let mut ground: Vec<Option<Item>> = session.take_items().into_iter().map(Some).collect();
    let mut summary = GatheringSummary::default();

    let mut items_it = item_events.iter().peekable();
    let mut offices_it = office_events.iter().peekable();

    loop {
        let take_item = match (items_it.peek(), offices_it.peek()) {
            (Some(item), Some(office)) => item.time <= office.time,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        if take_item {
            let Some(event) = items_it.next() else { break };
            let dog = &mut session.dogs_mut()[event.gatherer_id];
            if dog.bag_len() >= capacity {
                continue;
            }
            if let Some(item) = ground[event.item_id].take() {
                dog.add_item(item);
                summary.collected += 1;
            }
        } else {
            let Some(event) = offices_it.next() else { break };
            let dog = &mut session.dogs_mut()[event.gatherer_id];
            let bag = dog.take_bag();
            if bag.is_empty() {
                continue;
            }
            let amount: u64 = bag.iter().map(|item| u64::from(item.item_type.value)).sum();
            sink.add_scores(session_id, dog.id(), amount);
            summary.delivered_items += bag.len();
            summary.scored += amount;
        }
    }

    session.put_items(ground.into_iter().flatten().collect());
    summary
}
