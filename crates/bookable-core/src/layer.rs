//! Availability layer compilation.
//!
//! A layer is one grant/block contribution to a resource's availability, with
//! a source and a priority. The compiler flattens a resource snapshot into an
//! ordered layer list: one base grant covering the queried window, one layer
//! per active availability rule, and one block per live allocation. The
//! projector consumes this list; no further processing happens here.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::TimeRange;
use crate::model::{AllocationStatus, Resource, RuleEffect};

/// Priority carried by every allocation-sourced block layer.
///
/// Strictly greater than [`MAX_RULE_PRIORITY`], so an allocation always
/// dominates any rule grant or block at the same instant.
pub const ALLOCATION_PRIORITY: i32 = 999;

/// Highest priority a rule layer can carry. Rule priorities are clamped here
/// during compilation, which makes allocation supremacy structural rather
/// than a convention operators could break.
pub const MAX_RULE_PRIORITY: i32 = 998;

/// Whether a layer permits or forbids time within its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Grant,
    Block,
}

/// How an allocation renders in calendar attribution: a temporary hold, or
/// any other live status shown as booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationKind {
    Hold,
    Booked,
}

/// Where a layer came from. Each variant carries only the fields relevant to
/// its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "lowercase")]
pub enum LayerSource {
    Base,
    Rule {
        id: String,
        name: String,
    },
    Allocation {
        id: String,
        kind: AllocationKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },
}

/// One grant/block contribution to availability.
///
/// Layers are evaluated in ascending priority when computing available
/// ranges, and in descending priority when attributing an instant to the
/// single layer that decided it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityLayer {
    #[serde(flatten)]
    pub source: LayerSource,
    pub effect: Effect,
    pub priority: i32,
    pub time_range: TimeRange,
}

/// Midnight UTC of the day containing `t`.
pub fn start_of_utc_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Compile the ordered layer list for a resource over `[from, to]`.
///
/// - One base grant at priority 0 covering whole UTC days from the start of
///   `from`'s day through the end of `to`'s day.
/// - One layer per `is_active` rule, ascending by priority; a rule without
///   `valid_from`/`valid_until` bounds applies to the whole queried window,
///   not literally forever.
/// - One block at [`ALLOCATION_PRIORITY`] per non-cancelled allocation.
pub fn compile_layers(
    resource: &Resource,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<AvailabilityLayer> {
    let base_start = start_of_utc_day(from);
    let base_end = start_of_utc_day(to) + Duration::days(1);

    let mut layers = vec![AvailabilityLayer {
        source: LayerSource::Base,
        effect: Effect::Grant,
        priority: 0,
        time_range: TimeRange::new(base_start, base_end),
    }];

    let mut active_rules: Vec<_> = resource
        .availability_rules
        .iter()
        .filter(|r| r.is_active)
        .collect();
    active_rules.sort_by_key(|r| r.priority);

    for rule in active_rules {
        layers.push(AvailabilityLayer {
            source: LayerSource::Rule {
                id: rule.id.clone(),
                name: rule.name.clone(),
            },
            effect: match rule.effect {
                RuleEffect::Available => Effect::Grant,
                RuleEffect::Unavailable => Effect::Block,
            },
            priority: rule.priority.min(MAX_RULE_PRIORITY),
            time_range: TimeRange::new(
                rule.valid_from.unwrap_or(base_start),
                rule.valid_until.unwrap_or(base_end),
            ),
        });
    }

    for allocation in resource
        .allocations
        .iter()
        .filter(|a| a.status != AllocationStatus::Cancelled)
    {
        layers.push(AvailabilityLayer {
            source: LayerSource::Allocation {
                id: allocation.id.clone(),
                kind: if allocation.status == AllocationStatus::Hold {
                    AllocationKind::Hold
                } else {
                    AllocationKind::Booked
                },
                expires_at: allocation.expires_at,
            },
            effect: Effect::Block,
            priority: ALLOCATION_PRIORITY,
            time_range: TimeRange::new(allocation.start_time, allocation.end_time),
        });
    }

    layers
}
