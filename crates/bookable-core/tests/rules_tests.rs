//! Tests for booking-policy rule filtering and scope-then-priority merging.

use bookable_core::rules::{
    filter_applicable, resolve_rules, BookingRule, ResolutionContext, ResolvedRules, RuleScope,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

fn eval_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn global_rule(id: &str, priority: i64, ttl: i64) -> BookingRule {
    BookingRule {
        id: id.to_string(),
        name: format!("rule {id}"),
        description: None,
        scope: RuleScope::Global,
        booking_resource_ids: None,
        require_payment: true,
        require_confirmation: false,
        reservation_ttl_seconds: ttl,
        configuration: None,
        priority,
        is_active: true,
        valid_from: None,
        valid_until: None,
    }
}

fn resource_rule(id: &str, priority: i64, ttl: i64, resource_ids: &[&str]) -> BookingRule {
    BookingRule {
        scope: RuleScope::Resource,
        booking_resource_ids: Some(resource_ids.iter().map(|s| s.to_string()).collect()),
        ..global_rule(id, priority, ttl)
    }
}

// ── filtering ───────────────────────────────────────────────────────────────

#[test]
fn inactive_rules_are_dropped() {
    let mut rule = global_rule("g1", 0, 100);
    rule.is_active = false;

    let rules = vec![rule];
    let applicable = filter_applicable(&rules, &ResolutionContext::at(eval_time()));

    assert!(applicable.is_empty());
}

#[test]
fn rules_outside_validity_window_are_dropped() {
    let mut not_yet = global_rule("g1", 0, 100);
    not_yet.valid_from = Some(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
    let mut expired = global_rule("g2", 0, 100);
    expired.valid_until = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

    let rules = vec![not_yet, expired];
    let applicable = filter_applicable(&rules, &ResolutionContext::at(eval_time()));

    assert!(applicable.is_empty());
}

#[test]
fn validity_bounds_are_inclusive() {
    let mut rule = global_rule("g1", 0, 100);
    rule.valid_from = Some(eval_time());
    rule.valid_until = Some(eval_time());

    let rules = vec![rule];
    let applicable = filter_applicable(&rules, &ResolutionContext::at(eval_time()));

    assert_eq!(applicable.len(), 1);
}

#[test]
fn resource_rule_requires_matching_context() {
    let rules = vec![resource_rule("r1", 0, 100, &["res_a"])];

    // No resource in context: dropped.
    let applicable = filter_applicable(&rules, &ResolutionContext::at(eval_time()));
    assert!(applicable.is_empty());

    // Non-member resource: dropped.
    let applicable =
        filter_applicable(&rules, &ResolutionContext::for_resource("res_b", eval_time()));
    assert!(applicable.is_empty());

    // Member resource: kept.
    let applicable =
        filter_applicable(&rules, &ResolutionContext::for_resource("res_a", eval_time()));
    assert_eq!(applicable.len(), 1);
}

#[test]
fn global_rules_apply_to_any_context() {
    let rules = vec![global_rule("g1", 0, 100)];

    let applicable =
        filter_applicable(&rules, &ResolutionContext::for_resource("res_a", eval_time()));

    assert_eq!(applicable.len(), 1);
}

// ── merging ─────────────────────────────────────────────────────────────────

#[test]
fn resource_scope_overrides_global_regardless_of_numeric_priority() {
    // Global rule at priority 5 with TTL 100; resource rule at priority 1
    // with TTL 200. Resource always layers on top: resolved TTL is 200.
    let rules = vec![
        global_rule("g1", 5, 100),
        resource_rule("r1", 1, 200, &["res_a"]),
    ];

    let resolved = resolve_rules(&rules, &ResolutionContext::for_resource("res_a", eval_time()));

    assert_eq!(resolved.reservation_ttl_seconds, 200);
    assert_eq!(
        resolved.resolved_from,
        vec![RuleScope::Global, RuleScope::Resource]
    );
    assert_eq!(resolved.priority, 5);
}

#[test]
fn highest_priority_wins_within_a_scope_group() {
    let mut low = global_rule("g1", 1, 100);
    low.require_confirmation = true;
    let high = global_rule("g2", 9, 500);

    let rules = vec![high, low];
    let resolved = resolve_rules(&rules, &ResolutionContext::at(eval_time()));

    // g2 (priority 9) is applied last and fully replaces the policy fields.
    assert_eq!(resolved.reservation_ttl_seconds, 500);
    assert!(!resolved.require_confirmation);
    assert_eq!(resolved.priority, 9);
}

#[test]
fn custom_config_is_retained_when_later_rule_has_none() {
    let mut with_config = global_rule("g1", 1, 100);
    with_config.configuration = Some(json!({"buffer_minutes": 15}));
    let without_config = global_rule("g2", 9, 500);

    let rules = vec![with_config, without_config];
    let resolved = resolve_rules(&rules, &ResolutionContext::at(eval_time()));

    // g2 wins the policy fields but does not clear g1's config.
    assert_eq!(resolved.reservation_ttl_seconds, 500);
    assert_eq!(resolved.custom_config, Some(json!({"buffer_minutes": 15})));
}

#[test]
fn no_applicable_rules_returns_the_fixed_default_policy() {
    let resolved = resolve_rules(&[], &ResolutionContext::at(eval_time()));

    assert_eq!(resolved, ResolvedRules::default());
    assert!(resolved.require_payment);
    assert_eq!(resolved.reservation_ttl_seconds, 3600);
    assert!(!resolved.require_confirmation);
    assert_eq!(resolved.custom_config, None);
    assert!(resolved.resolved_from.is_empty());
    assert_eq!(resolved.priority, -1);
}

#[test]
fn resolved_rules_serialize_with_underscore_metadata_fields() {
    let value = serde_json::to_value(ResolvedRules::default()).unwrap();

    assert_eq!(value["_priority"], json!(-1));
    assert_eq!(value["_resolved_from"], json!([]));
    assert_eq!(value["reservation_ttl_seconds"], json!(3600));
}
