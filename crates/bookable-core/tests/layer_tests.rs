//! Tests for layer compilation: base window, rule layers, allocation blocks,
//! and the allocation priority sentinel.

use bookable_core::layer::{
    compile_layers, AllocationKind, Effect, LayerSource, ALLOCATION_PRIORITY, MAX_RULE_PRIORITY,
};
use bookable_core::model::{
    Allocation, AllocationStatus, AvailabilityRule, Resource, RuleEffect,
};
use chrono::{DateTime, TimeZone, Utc};

fn dt(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, min, 0).unwrap()
}

fn rule(
    id: &str,
    effect: RuleEffect,
    priority: i32,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
) -> AvailabilityRule {
    AvailabilityRule {
        id: id.to_string(),
        booking_resource_id: "res_1".to_string(),
        rule_type: "custom".to_string(),
        name: format!("rule {id}"),
        description: None,
        effect,
        priority,
        valid_from,
        valid_until,
        configuration: serde_json::Value::Null,
        is_active: true,
        metadata: None,
    }
}

fn allocation(id: &str, status: AllocationStatus, start: DateTime<Utc>, end: DateTime<Utc>) -> Allocation {
    Allocation {
        id: id.to_string(),
        booking_resource_id: "res_1".to_string(),
        cart_item_id: None,
        line_item_id: None,
        start_time: start,
        end_time: end,
        expires_at: None,
        status,
        cancellation_reason: None,
        metadata: None,
    }
}

#[test]
fn base_layer_covers_whole_utc_days() {
    // Querying 10:00 on the 5th through 14:00 on the 7th grants midnight of
    // the 5th through midnight of the 8th.
    let resource = Resource::new("res_1", "prod_1", "Room");

    let layers = compile_layers(&resource, dt(5, 10, 0), dt(7, 14, 0));

    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].source, LayerSource::Base);
    assert_eq!(layers[0].effect, Effect::Grant);
    assert_eq!(layers[0].priority, 0);
    assert_eq!(layers[0].time_range.start, dt(5, 0, 0));
    assert_eq!(layers[0].time_range.end, dt(8, 0, 0));
}

#[test]
fn inactive_rules_are_excluded() {
    let mut resource = Resource::new("res_1", "prod_1", "Room");
    let mut inactive = rule("r1", RuleEffect::Unavailable, 10, None, None);
    inactive.is_active = false;
    resource.availability_rules.push(inactive);

    let layers = compile_layers(&resource, dt(1, 0, 0), dt(1, 0, 0));

    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].source, LayerSource::Base);
}

#[test]
fn unbounded_rule_defaults_to_base_window() {
    // A rule without valid_from/valid_until applies to the queried window,
    // not literally forever.
    let mut resource = Resource::new("res_1", "prod_1", "Room");
    resource
        .availability_rules
        .push(rule("r1", RuleEffect::Unavailable, 10, None, None));

    let layers = compile_layers(&resource, dt(5, 0, 0), dt(7, 0, 0));

    let rule_layer = &layers[1];
    assert_eq!(rule_layer.effect, Effect::Block);
    assert_eq!(rule_layer.time_range.start, dt(5, 0, 0));
    assert_eq!(rule_layer.time_range.end, dt(8, 0, 0));
}

#[test]
fn rule_layers_sorted_ascending_by_priority() {
    let mut resource = Resource::new("res_1", "prod_1", "Room");
    resource
        .availability_rules
        .push(rule("high", RuleEffect::Available, 20, None, None));
    resource
        .availability_rules
        .push(rule("low", RuleEffect::Unavailable, 10, None, None));

    let layers = compile_layers(&resource, dt(1, 0, 0), dt(2, 0, 0));

    assert_eq!(layers[1].priority, 10);
    assert_eq!(layers[2].priority, 20);
    assert!(matches!(
        &layers[1].source,
        LayerSource::Rule { id, .. } if id == "low"
    ));
}

#[test]
fn rule_priority_is_clamped_below_allocation_sentinel() {
    // An operator setting a rule priority above the sentinel cannot outrank
    // allocations.
    let mut resource = Resource::new("res_1", "prod_1", "Room");
    resource
        .availability_rules
        .push(rule("r1", RuleEffect::Available, 5000, None, None));

    let layers = compile_layers(&resource, dt(1, 0, 0), dt(2, 0, 0));

    assert_eq!(layers[1].priority, MAX_RULE_PRIORITY);
    assert!(ALLOCATION_PRIORITY > MAX_RULE_PRIORITY);
}

#[test]
fn non_cancelled_allocations_emit_block_layers_at_sentinel_priority() {
    let mut resource = Resource::new("res_1", "prod_1", "Room");
    resource.allocations.push(allocation(
        "a1",
        AllocationStatus::Hold,
        dt(1, 10, 0),
        dt(1, 12, 0),
    ));
    resource.allocations.push(allocation(
        "a2",
        AllocationStatus::Confirmed,
        dt(1, 14, 0),
        dt(1, 15, 0),
    ));

    let layers = compile_layers(&resource, dt(1, 0, 0), dt(1, 0, 0));

    assert_eq!(layers.len(), 3);
    for layer in &layers[1..] {
        assert_eq!(layer.effect, Effect::Block);
        assert_eq!(layer.priority, ALLOCATION_PRIORITY);
    }
    assert!(matches!(
        &layers[1].source,
        LayerSource::Allocation { kind: AllocationKind::Hold, .. }
    ));
    assert!(matches!(
        &layers[2].source,
        LayerSource::Allocation { kind: AllocationKind::Booked, .. }
    ));
}

#[test]
fn cancelled_allocations_are_excluded() {
    let mut resource = Resource::new("res_1", "prod_1", "Room");
    resource.allocations.push(allocation(
        "a1",
        AllocationStatus::Cancelled,
        dt(1, 10, 0),
        dt(1, 12, 0),
    ));

    let layers = compile_layers(&resource, dt(1, 0, 0), dt(1, 0, 0));

    assert_eq!(layers.len(), 1);
}

#[test]
fn reserved_allocation_renders_as_booked() {
    let mut resource = Resource::new("res_1", "prod_1", "Room");
    resource.allocations.push(allocation(
        "a1",
        AllocationStatus::Reserved,
        dt(1, 10, 0),
        dt(1, 12, 0),
    ));

    let layers = compile_layers(&resource, dt(1, 0, 0), dt(1, 0, 0));

    assert!(matches!(
        &layers[1].source,
        LayerSource::Allocation { kind: AllocationKind::Booked, .. }
    ));
}
