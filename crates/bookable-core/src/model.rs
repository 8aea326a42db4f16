//! Persisted domain model for bookable resources, allocations, and bookings.
//!
//! Entities reference each other through explicit foreign-key-style id fields
//! rather than live object graphs; the owning aggregate (resource → rules and
//! allocations, booking → line items) is assembled by the storage collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) fn default_true() -> bool {
    true
}

/// Publication state of a resource in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    #[default]
    Draft,
    Published,
}

/// A bookable resource (room, equipment, service) with its availability rules
/// and live allocations preloaded.
///
/// The provider supplies rules unfiltered; excluding inactive rules is the
/// availability engine's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub product_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resource_type: String,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(default = "default_true")]
    pub is_bookable: bool,
    #[serde(default)]
    pub availability_rules: Vec<AvailabilityRule>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Resource {
    /// A published, bookable resource with no rules or allocations.
    pub fn new(
        id: impl Into<String>,
        product_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            title: title.into(),
            subtitle: None,
            description: None,
            resource_type: "general".to_string(),
            status: ResourceStatus::Published,
            is_bookable: true,
            availability_rules: Vec::new(),
            allocations: Vec::new(),
            metadata: None,
        }
    }
}

/// Whether a rule permits or forbids time within its validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEffect {
    Available,
    Unavailable,
}

/// An operator-managed availability rule owned by a resource.
///
/// Only `is_active` rules participate in layer compilation; soft-deleted
/// rules never reach the engine. Absent `valid_from`/`valid_until` bounds
/// mean the rule applies to the whole queried window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: String,
    pub booking_resource_id: String,
    pub rule_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub effect: RuleEffect,
    pub priority: i32,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub configuration: Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Reservation state of an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Hold,
    Reserved,
    Confirmed,
    Cancelled,
}

impl AllocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationStatus::Hold => "hold",
            AllocationStatus::Reserved => "reserved",
            AllocationStatus::Confirmed => "confirmed",
            AllocationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AllocationStatus::Cancelled)
    }

    /// Valid transitions: `hold`/`reserved` → `confirmed` or `cancelled`,
    /// `confirmed` → `cancelled`; `cancelled` is terminal.
    pub fn can_transition_to(self, next: AllocationStatus) -> bool {
        use AllocationStatus::*;
        matches!(
            (self, next),
            (Hold, Confirmed)
                | (Hold, Cancelled)
                | (Reserved, Confirmed)
                | (Reserved, Cancelled)
                | (Confirmed, Cancelled)
        )
    }
}

impl std::fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reservation of a resource's time: a temporary hold, a reservation, or a
/// confirmed booking slot.
///
/// At most one of `cart_item_id` / `line_item_id` links the allocation to the
/// checkout flow. `expires_at` governs the expiry sweep for `hold` status only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub booking_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub status: AllocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Booking aggregate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Valid transitions: `pending` → `confirmed` → `completed`, with
    /// `cancelled` reachable from any non-terminal state.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (Pending, Confirmed) | (Confirmed, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer booking: one or more line items, each tied 1:1 to an allocation.
///
/// `start_time`/`end_time` are derived as min(start)/max(end) across the line
/// items at creation time; they are not an independently mutable source of
/// truth. Transition timestamps are set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub booking_number: String,
    pub order_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub line_items: Vec<BookingLineItem>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reserved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One booked window within a booking, tied to exactly one allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingLineItem {
    pub id: String,
    pub booking_id: String,
    pub allocation_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
