//! # bookable-core
//!
//! Layered availability resolution and reservation lifecycle for bookable
//! resources (rooms, equipment, services).
//!
//! Availability for a resource and time window is computed by composing an
//! ordered list of *layers* -- a base grant, prioritized availability rules,
//! and live allocation blocks -- then projecting the result into calendar
//! views (month/week/day) with full attribution: every day and slot records
//! which layer decided its state. A separate resolver merges global and
//! resource-scoped checkout-policy rules into one effective policy.
//!
//! ## Quick start
//!
//! ```rust
//! use bookable_core::{get_availability, CalendarView, LayerSource};
//! use bookable_core::model::Resource;
//!
//! let resource = Resource::new("res_room", "prod_room", "Meeting Room");
//! let from = "2024-01-01T00:00:00Z".parse().unwrap();
//! let to = "2024-01-01T23:59:59Z".parse().unwrap();
//!
//! let days = get_availability(&resource, from, to, CalendarView::Month);
//! assert!(days[0].is_available);
//! assert!(matches!(
//!     days[0].effective_layer.as_ref().map(|l| &l.source),
//!     Some(LayerSource::Base)
//! ));
//! ```
//!
//! ## Modules
//!
//! - [`interval`] -- pure interval algebra (intersect / subtract)
//! - [`layer`] -- layer compilation from a resource snapshot
//! - [`projector`] -- range computation and month/week/day projection
//! - [`rules`] -- global/resource booking-policy resolution
//! - [`model`] -- persisted domain model
//! - [`lifecycle`] -- holds, confirmation, cancellation, expiry sweep
//! - [`store`] -- collaborator contracts + in-memory implementations
//! - [`error`] -- error types

pub mod error;
pub mod interval;
pub mod layer;
pub mod lifecycle;
pub mod model;
pub mod projector;
pub mod rules;
pub mod store;

pub use error::{BookingError, Result};
pub use interval::TimeRange;
pub use layer::{
    compile_layers, AllocationKind, AvailabilityLayer, Effect, LayerSource, ALLOCATION_PRIORITY,
    MAX_RULE_PRIORITY,
};
pub use lifecycle::{AllocationLifecycle, BookingMode, HoldOptions, SweepReport};
pub use projector::{
    compute_availability, get_availability, is_window_available, AvailabilitySlot,
    BookingAvailability, CalendarView, SlotResolution,
};
pub use rules::{filter_applicable, resolve_rules, BookingRule, ResolutionContext, ResolvedRules};
