//! Booking policy rules and their resolution into one effective policy.
//!
//! Booking rules govern checkout behavior (payment requirement, confirmation
//! requirement, reservation TTL, custom config) -- they are independent of
//! availability rules, which govern time. Global and resource-scoped rules
//! merge by scope-then-priority ordering: resource rules always layer on top
//! of global ones regardless of numeric priority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::default_true;

/// Whether a rule applies to all resources or to specific ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    #[default]
    Global,
    Resource,
}

/// A persisted checkout-policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRule {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub scope: RuleScope,
    /// Resources the rule targets; only meaningful when `scope` is
    /// `Resource`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_resource_ids: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub require_payment: bool,
    #[serde(default)]
    pub require_confirmation: bool,
    pub reservation_ttl_seconds: i64,
    #[serde(default)]
    pub configuration: Option<Value>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

/// The single effective policy merged from all applicable rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRules {
    pub require_payment: bool,
    pub reservation_ttl_seconds: i64,
    pub require_confirmation: bool,
    pub custom_config: Option<Value>,
    /// Scopes actually applied, in application order.
    #[serde(rename = "_resolved_from")]
    pub resolved_from: Vec<RuleScope>,
    /// Highest priority seen, or -1 when no rule applied.
    #[serde(rename = "_priority")]
    pub priority: i64,
}

impl Default for ResolvedRules {
    /// The fixed fallback policy when no rule is applicable.
    fn default() -> Self {
        Self {
            require_payment: true,
            reservation_ttl_seconds: 3600,
            require_confirmation: false,
            custom_config: None,
            resolved_from: Vec::new(),
            priority: -1,
        }
    }
}

/// What the rules are being resolved for.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub booking_resource_id: Option<String>,
    pub evaluation_time: DateTime<Utc>,
}

impl ResolutionContext {
    pub fn at(evaluation_time: DateTime<Utc>) -> Self {
        Self {
            booking_resource_id: None,
            evaluation_time,
        }
    }

    pub fn for_resource(resource_id: impl Into<String>, evaluation_time: DateTime<Utc>) -> Self {
        Self {
            booking_resource_id: Some(resource_id.into()),
            evaluation_time,
        }
    }
}

/// Filter to the rules that apply in the given context.
///
/// - Inactive rules are dropped.
/// - Rules whose `[valid_from, valid_until]` window (either bound optional,
///   both inclusive) excludes the evaluation time are dropped.
/// - Global rules always apply; resource rules apply only when the context
///   names a resource that is a member of the rule's target list.
pub fn filter_applicable<'a>(
    rules: &'a [BookingRule],
    ctx: &ResolutionContext,
) -> Vec<&'a BookingRule> {
    rules
        .iter()
        .filter(|rule| {
            if !rule.is_active {
                return false;
            }
            if let Some(from) = rule.valid_from {
                if from > ctx.evaluation_time {
                    return false;
                }
            }
            if let Some(until) = rule.valid_until {
                if until < ctx.evaluation_time {
                    return false;
                }
            }

            match rule.scope {
                RuleScope::Global => true,
                RuleScope::Resource => match (&ctx.booking_resource_id, &rule.booking_resource_ids) {
                    (Some(id), Some(targets)) => targets.iter().any(|t| t == id),
                    _ => false,
                },
            }
        })
        .collect()
}

fn scope_rank(scope: RuleScope) -> u8 {
    match scope {
        RuleScope::Global => 0,
        RuleScope::Resource => 1,
    }
}

/// Merge applicable rules into one effective policy.
///
/// Rules are sorted ascending by `(scope rank, priority)` -- global first,
/// resource on top, and within each scope group the highest-priority rule is
/// applied last and therefore wins. Each applied rule fully replaces the
/// payment/TTL/confirmation fields (last-write-wins); `custom_config` is
/// replaced only when the rule defines a non-null configuration.
fn merge_rules(applicable: &[&BookingRule]) -> ResolvedRules {
    let mut sorted = applicable.to_vec();
    sorted.sort_by_key(|r| (scope_rank(r.scope), r.priority));

    let mut resolved = ResolvedRules::default();

    for rule in sorted {
        resolved.resolved_from.push(rule.scope);
        if rule.priority > resolved.priority {
            resolved.priority = rule.priority;
        }

        resolved.require_payment = rule.require_payment;
        resolved.reservation_ttl_seconds = rule.reservation_ttl_seconds;
        resolved.require_confirmation = rule.require_confirmation;
        if let Some(config) = &rule.configuration {
            resolved.custom_config = Some(config.clone());
        }
    }

    resolved
}

/// Resolve the effective policy for the given context.
///
/// Filters to applicable rules, then merges them; with zero applicable rules
/// the fixed default policy is returned.
///
/// # Examples
///
/// ```
/// use bookable_core::rules::{resolve_rules, ResolutionContext, ResolvedRules};
///
/// let resolved = resolve_rules(&[], &ResolutionContext::at("2024-06-01T00:00:00Z".parse().unwrap()));
/// assert_eq!(resolved, ResolvedRules::default());
/// assert_eq!(resolved.reservation_ttl_seconds, 3600);
/// ```
pub fn resolve_rules(rules: &[BookingRule], ctx: &ResolutionContext) -> ResolvedRules {
    let applicable = filter_applicable(rules, ctx);
    if applicable.is_empty() {
        return ResolvedRules::default();
    }
    merge_rules(&applicable)
}
