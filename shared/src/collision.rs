//! Continuous collision detection between moving gatherers and static targets
//!
//! A gatherer is a dog's straight-line movement over one tick. A target is a
//! point with a pickup width: a lost object or an office. The detector finds,
//! for every gatherer that moved, each target whose centre passes within the
//! combined pickup radius of the movement segment, and reports where along the
//! segment the closest approach happens.

use crate::geom::Point2;

/// Closest approach of a point to a movement segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionResult {
    /// Squared perpendicular distance from the point to the segment's line
    pub sq_distance: f64,
    /// Position of the projection along the segment, 0 at the start, 1 at the end
    pub proj_ratio: f64,
}

impl CollectionResult {
    pub fn new(sq_distance: f64, proj_ratio: f64) -> Self {
        Self {
            sq_distance,
            proj_ratio,
        }
    }

    /// Returns true if the projection lies on the segment and the point is
    /// within `collect_radius` of it.
    pub fn is_collected(&self, collect_radius: f64) -> bool {
        (0.0..=1.0).contains(&self.proj_ratio)
            && self.sq_distance <= collect_radius * collect_radius
    }
}

/// Projects `c` onto the line through `a` and `b`.
///
/// The segment must have non-zero length; callers filter out gatherers that
/// did not move.
pub fn try_collect_point(a: Point2, b: Point2, c: Point2) -> CollectionResult {
    let u = c.sub(&a);
    let v = b.sub(&a);
    let u_dot_v = u.dot(&v);
    let u_len2 = u.sq_magnitude();
    let v_len2 = v.sq_magnitude();
    let proj_ratio = u_dot_v / v_len2;
    let sq_distance = u_len2 - (u_dot_v * u_dot_v) / v_len2;

    CollectionResult::new(sq_distance, proj_ratio)
}

/// A static collision target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub position: Point2,
    pub width: f64,
}

/// A moving probe: where it was at the start of the tick and where it ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gatherer {
    pub start_pos: Point2,
    pub end_pos: Point2,
    pub width: f64,
}

impl Gatherer {
    pub fn has_moved(&self) -> bool {
        self.start_pos != self.end_pos
    }
}

/// Indexed access to the gatherers and targets of one detection pass.
///
/// Event ids refer back to the indices handed out here.
pub trait ItemGathererProvider {
    fn items_count(&self) -> usize;
    fn get_item(&self, idx: usize) -> Target;
    fn gatherers_count(&self) -> usize;
    fn get_gatherer(&self, idx: usize) -> Gatherer;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatheringEvent {
    pub item_id: usize,
    pub gatherer_id: usize,
    pub sq_distance: f64,
    pub proj_ratio: f64,
    /// Starts out as `proj_ratio`; callers may rescale it onto a shared time axis
    pub time: f64,
}

/// Sorts events by `time`, keeping the existing order for equal times.
pub fn sort_by_time(events: &mut [GatheringEvent]) {
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Finds every gatherer/target pair that collides during the tick
///
/// Gatherers are visited in index order and targets in index order within each
/// gatherer; the returned events are sorted by time and ties keep that order.
pub fn find_gather_events<P>(provider: &P) -> Vec<GatheringEvent>
where
    P: ItemGathererProvider + ?Sized,
{
    let mut events = Vec::new();

    for gatherer_id in 0..provider.gatherers_count() {
        let gatherer = provider.get_gatherer(gatherer_id);
        if !gatherer.has_moved() {
            continue;
        }

        for item_id in 0..provider.items_count() {
            let item = provider.get_item(item_id);
            let result = try_collect_point(gatherer.start_pos, gatherer.end_pos, item.position);

            if result.is_collected(gatherer.width / 2.0 + item.width / 2.0) {
                events.push(GatheringEvent {
                    item_id,
                    gatherer_id,
                    sq_distance: result.sq_distance,
                    proj_ratio: result.proj_ratio,
                    time: result.proj_ratio,
                });
            }
        }
    }

    sort_by_time(&mut events);
    events
}
