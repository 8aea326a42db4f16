//! Availability projection -- from an ordered layer list to calendar views.
//!
//! Computes the set of available ranges by folding layers in ascending
//! priority (grants compose by intersection, blocks carve out
//! unconditionally), then projects the result to a month-granularity per-day
//! view or to fine-grained slot grids with per-slot attribution.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::{intersect, subtract, TimeRange};
use crate::layer::{compile_layers, start_of_utc_day, AvailabilityLayer, Effect};
use crate::model::Resource;

/// Calendar granularity requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Month,
    Week,
    Day,
}

/// Step size for fine-grained slot grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "lowercase")]
pub enum SlotResolution {
    Minute(u32),
    Hour(u32),
    Day(u32),
}

impl SlotResolution {
    pub fn duration(self) -> Duration {
        match self {
            SlotResolution::Minute(v) => Duration::minutes(v as i64),
            SlotResolution::Hour(v) => Duration::hours(v as i64),
            SlotResolution::Day(v) => Duration::days(v as i64),
        }
    }
}

/// One fixed-size slot with its availability verdict and attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
    /// Layers temporally overlapping the slot, descending by priority.
    pub layers: Vec<AvailabilityLayer>,
    /// The layer that decided this slot: the highest-priority grant when
    /// available, else the highest-priority block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_layer: Option<AvailabilityLayer>,
}

/// Per-day availability record consumed by calendar presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingAvailability {
    /// Midnight UTC of the day this record describes.
    pub date: DateTime<Utc>,
    pub is_available: bool,
    pub view: CalendarView,
    /// Fine-grained slots; empty for month view.
    #[serde(default)]
    pub slots: Vec<AvailabilitySlot>,
    /// Layers affecting the day, descending by priority (month view only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<AvailabilityLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_layer: Option<AvailabilityLayer>,
}

/// Fold an ordered layer list into the set of available ranges.
///
/// Layers are stable-sorted ascending by priority. The first grant seeds the
/// accumulator with its own range; every further grant intersects (AND
/// semantics across active grants -- adding a grant can only shrink or
/// preserve availability); every block subtracts unconditionally. A block
/// therefore carves out its range regardless of how many grants cover it.
pub fn compute_availability(layers: &[AvailabilityLayer]) -> Vec<TimeRange> {
    let mut sorted: Vec<&AvailabilityLayer> = layers.iter().collect();
    sorted.sort_by_key(|l| l.priority);

    let mut available: Vec<TimeRange> = Vec::new();
    let mut granted = false;

    for layer in sorted {
        match layer.effect {
            Effect::Grant if !granted => {
                granted = true;
                available = vec![layer.time_range];
            }
            Effect::Grant => {
                available = intersect(&available, &[layer.time_range]);
            }
            Effect::Block => {
                available = subtract(&available, &[layer.time_range]);
            }
        }
    }

    available
}

/// Layers temporally overlapping `[start, end)`, descending by priority.
fn layers_affecting(
    layers: &[AvailabilityLayer],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<AvailabilityLayer> {
    let mut affecting: Vec<AvailabilityLayer> = layers
        .iter()
        .filter(|l| l.time_range.start < end && l.time_range.end > start)
        .cloned()
        .collect();
    affecting.sort_by(|a, b| b.priority.cmp(&a.priority));
    affecting
}

/// Project available ranges to a per-day month view over `[from, to]`.
///
/// A day is available iff any computed range overlaps it. The effective
/// layer is the highest-priority layer affecting the day, used by calendars
/// for coloring; no per-slot detail is returned.
pub fn project_month(
    ranges: &[TimeRange],
    layers: &[AvailabilityLayer],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<BookingAvailability> {
    let mut days = Vec::new();
    let mut cursor = from;

    while cursor <= to {
        let day_start = start_of_utc_day(cursor);
        let day_end = day_start + Duration::days(1);

        let is_available = ranges
            .iter()
            .any(|r| r.start < day_end && r.end > day_start);

        let affecting = layers_affecting(layers, day_start, day_end);

        days.push(BookingAvailability {
            date: day_start,
            is_available,
            view: CalendarView::Month,
            slots: Vec::new(),
            effective_layer: affecting.first().cloned(),
            layers: affecting,
        });

        cursor += Duration::days(1);
    }

    days
}

/// Walk `[from, to)` in fixed-size steps and attribute each slot.
///
/// A slot is available iff some computed range **fully** covers it; partial
/// coverage does not count. This is a deliberately conservative policy: a
/// slot a customer can select must be bookable for its whole duration.
pub fn generate_slots(
    ranges: &[TimeRange],
    layers: &[AvailabilityLayer],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    resolution: SlotResolution,
) -> Vec<AvailabilitySlot> {
    let step = resolution.duration();
    let mut slots = Vec::new();

    if step <= Duration::zero() {
        return slots;
    }

    let mut cursor = from;
    while cursor + step <= to {
        let slot_end = cursor + step;

        let available = ranges.iter().any(|r| r.covers(cursor, slot_end));

        let affecting = layers_affecting(layers, cursor, slot_end);
        let effective_layer = if available {
            affecting.iter().find(|l| l.effect == Effect::Grant).cloned()
        } else {
            affecting.iter().find(|l| l.effect == Effect::Block).cloned()
        };

        slots.push(AvailabilitySlot {
            start: cursor,
            end: slot_end,
            available,
            layers: affecting,
            effective_layer,
        });

        cursor = slot_end;
    }

    slots
}

/// Group slots into per-UTC-day buckets, sorted by date.
///
/// A day is available iff any of its slots is.
pub fn group_slots_by_day(
    slots: Vec<AvailabilitySlot>,
    view: CalendarView,
) -> Vec<BookingAvailability> {
    let mut buckets: BTreeMap<NaiveDate, BookingAvailability> = BTreeMap::new();

    for slot in slots {
        let day = slot.start.date_naive();
        let bucket = buckets.entry(day).or_insert_with(|| BookingAvailability {
            date: day.and_time(NaiveTime::MIN).and_utc(),
            is_available: false,
            view,
            slots: Vec::new(),
            layers: Vec::new(),
            effective_layer: None,
        });

        if slot.available {
            bucket.is_available = true;
        }
        bucket.slots.push(slot);
    }

    buckets.into_values().collect()
}

/// Compute available ranges for a resource over `[from, to]`, returning the
/// compiled layer list alongside for attribution.
pub fn availability_with_layers(
    resource: &Resource,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> (Vec<TimeRange>, Vec<AvailabilityLayer>) {
    let layers = compile_layers(resource, from, to);
    let ranges = compute_availability(&layers);
    (ranges, layers)
}

/// Compute calendar-shaped availability for a resource at the requested
/// granularity: per-day verdicts for month view, 30-minute slots for week
/// view, 15-minute slots for day view.
pub fn get_availability(
    resource: &Resource,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    view: CalendarView,
) -> Vec<BookingAvailability> {
    let (ranges, layers) = availability_with_layers(resource, from, to);

    let resolution = match view {
        CalendarView::Month => return project_month(&ranges, &layers, from, to),
        CalendarView::Week => SlotResolution::Minute(30),
        CalendarView::Day => SlotResolution::Minute(15),
    };

    group_slots_by_day(generate_slots(&ranges, &layers, from, to, resolution), view)
}

/// Whether some computed range fully covers `[start, end]`.
///
/// This is the pre-hold check: a window may only be held when it is bookable
/// for its whole duration.
pub fn is_window_available(
    resource: &Resource,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    let (ranges, _) = availability_with_layers(resource, start, end);
    ranges.iter().any(|r| r.covers(start, end))
}
