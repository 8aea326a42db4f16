//! Allocation and booking lifecycle -- the state machine behind the
//! "allocation" layers the projector consumes.
//!
//! Holds are created when a customer selects a window, confirmed when
//! checkout completes, and cancelled when they expire or their booking is
//! cancelled. Hold creation serializes per resource through an advisory lock;
//! every status change goes through a status-guarded conditional write so the
//! periodic expiry sweep can never clobber a concurrent confirmation.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::error::{BookingError, Result};
use crate::model::{
    Allocation, AllocationStatus, Booking, BookingLineItem, BookingStatus,
};
use crate::projector::is_window_available;
use crate::rules::{resolve_rules, ResolutionContext};
use crate::store::{
    AllocationFilter, AllocationStore, BookingStore, Clock, LockProvider, ResourceProvider,
    RuleProvider,
};

/// How long a hold/confirm waits on the resource lock.
pub const LOCK_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// How long a lock lease survives a crashed holder.
pub const LOCK_TTL: StdDuration = StdDuration::from_secs(5);

/// Granularity a resource is booked at. Date-mode bookings occupy whole UTC
/// days; the selected end date extends to the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingMode {
    #[default]
    Time,
    Date,
}

/// Normalize a customer-selected window for the resource's booking mode.
pub fn normalize_window(
    mode: BookingMode,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match mode {
        BookingMode::Time => (start, end),
        BookingMode::Date => (start, end + Duration::days(1)),
    }
}

/// Options for placing a hold.
#[derive(Debug, Clone, Default)]
pub struct HoldOptions {
    pub mode: BookingMode,
    /// Create the allocation as `reserved` instead of `hold`. Reserved
    /// allocations are not subject to the expiry sweep.
    pub reserved: bool,
    /// Expiry TTL override; defaults to the resolved booking rules'
    /// `reservation_ttl_seconds`.
    pub ttl: Option<Duration>,
    pub cart_item_id: Option<String>,
}

/// Outcome of one expiry sweep run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Holds transitioned to cancelled/expired this run.
    pub swept: Vec<String>,
    /// Guard misses: listed as expired but confirmed or cancelled before the
    /// guarded write landed. Left untouched.
    pub skipped: Vec<String>,
    /// Store failures, left in place for the next run.
    pub failed: Vec<String>,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.swept.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Hold creation, expiry sweep, and confirmation/cancellation transitions
/// over pluggable storage, locking, and clock collaborators.
pub struct AllocationLifecycle<S, L, C> {
    store: S,
    locks: L,
    clock: C,
}

impl<S, L, C> AllocationLifecycle<S, L, C>
where
    S: ResourceProvider + RuleProvider + AllocationStore + BookingStore,
    L: LockProvider,
    C: Clock,
{
    pub fn new(store: S, locks: L, clock: C) -> Self {
        Self { store, locks, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Place a hold on a resource window ahead of checkout.
    ///
    /// Serialized per resource through the advisory lock; concurrent attempts
    /// on the same resource see either the lock (retryable
    /// [`BookingError::LockContended`]) or the freshly inserted allocation
    /// (definitive [`BookingError::WindowUnavailable`]). The hold expires at
    /// `now + TTL` unless confirmed first.
    pub fn hold(
        &self,
        resource_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        opts: &HoldOptions,
    ) -> Result<Allocation> {
        self.locks.acquire(resource_id, LOCK_TIMEOUT, LOCK_TTL)?;
        let result = self.hold_locked(resource_id, start, end, opts);
        self.locks.release(resource_id);
        result
    }

    fn hold_locked(
        &self,
        resource_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        opts: &HoldOptions,
    ) -> Result<Allocation> {
        let resource = self.store.resource(resource_id)?;
        if !resource.is_bookable {
            return Err(BookingError::NotBookable(resource_id.to_string()));
        }

        let (start, end) = normalize_window(opts.mode, start, end);
        if !is_window_available(&resource, start, end) {
            return Err(BookingError::WindowUnavailable {
                resource_id: resource_id.to_string(),
                start,
                end,
            });
        }

        let now = self.clock.now();
        let ttl = match opts.ttl {
            Some(ttl) => ttl,
            None => {
                let rules = self.store.booking_rules()?;
                let resolved = resolve_rules(
                    &rules,
                    &ResolutionContext::for_resource(resource_id, now),
                );
                Duration::seconds(resolved.reservation_ttl_seconds)
            }
        };

        let allocation = Allocation {
            id: format!("alloc_{}", Ulid::new()),
            booking_resource_id: resource_id.to_string(),
            cart_item_id: opts.cart_item_id.clone(),
            line_item_id: None,
            start_time: start,
            end_time: end,
            expires_at: Some(now + ttl),
            status: if opts.reserved {
                AllocationStatus::Reserved
            } else {
                AllocationStatus::Hold
            },
            cancellation_reason: None,
            metadata: None,
        };
        self.store.insert_allocation(allocation.clone())?;

        debug!(
            allocation = %allocation.id,
            resource = resource_id,
            status = %allocation.status,
            "window held"
        );
        Ok(allocation)
    }

    /// Confirm every allocation referenced by a completing cart.
    ///
    /// Already-confirmed allocations are left alone; a cancelled allocation
    /// is a hard error -- its hold expired before checkout completed.
    pub fn confirm_allocations(&self, allocation_ids: &[String]) -> Result<()> {
        for id in allocation_ids {
            let updated = self.store.transition_allocation(
                id,
                &[AllocationStatus::Hold, AllocationStatus::Reserved],
                AllocationStatus::Confirmed,
                None,
            )?;
            if !updated {
                let current = self.store.allocation(id)?;
                if current.status == AllocationStatus::Confirmed {
                    continue;
                }
                return Err(BookingError::InvalidTransition {
                    from: current.status,
                    to: AllocationStatus::Confirmed,
                });
            }
        }
        Ok(())
    }

    /// Cancel every expired hold.
    ///
    /// The guarded write transitions only allocations still in `hold`, so a
    /// hold confirmed between the listing and the write is skipped, not
    /// clobbered. Per-allocation failures are logged and left for the next
    /// run; re-running with no new holds is a no-op.
    pub fn sweep_expired_holds(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired = self.store.allocations(&AllocationFilter {
            status: Some(AllocationStatus::Hold),
            expires_before: Some(now),
            resource_id: None,
        })?;

        let mut report = SweepReport::default();
        for allocation in expired {
            match self.store.transition_allocation(
                &allocation.id,
                &[AllocationStatus::Hold],
                AllocationStatus::Cancelled,
                Some("expired"),
            ) {
                Ok(true) => report.swept.push(allocation.id),
                Ok(false) => {
                    debug!(allocation = %allocation.id, "hold moved on before expiry write");
                    report.skipped.push(allocation.id);
                }
                Err(err) => {
                    warn!(allocation = %allocation.id, %err, "failed to expire hold");
                    report.failed.push(allocation.id);
                }
            }
        }

        if !report.swept.is_empty() {
            info!(count = report.swept.len(), "expired holds cancelled");
        }
        Ok(report)
    }

    /// Create a pending booking over the given allocations.
    ///
    /// One line item per allocation, window copied from the allocation; the
    /// booking's own window is derived as min(start)/max(end) across its
    /// line items.
    pub fn create_booking(&self, order_id: &str, allocation_ids: &[String]) -> Result<Booking> {
        if allocation_ids.is_empty() {
            return Err(BookingError::EmptyBooking);
        }

        let now = self.clock.now();
        let booking_id = format!("book_{}", Ulid::new());

        let mut line_items = Vec::with_capacity(allocation_ids.len());
        for allocation_id in allocation_ids {
            let allocation = self.store.allocation(allocation_id)?;
            let line_item = BookingLineItem {
                id: format!("bli_{}", Ulid::new()),
                booking_id: booking_id.clone(),
                allocation_id: allocation.id.clone(),
                start_time: allocation.start_time,
                end_time: allocation.end_time,
                metadata: None,
            };
            self.store.attach_line_item(&allocation.id, &line_item.id)?;
            line_items.push(line_item);
        }

        let start_time = line_items
            .iter()
            .map(|li| li.start_time)
            .min()
            .ok_or(BookingError::EmptyBooking)?;
        let end_time = line_items
            .iter()
            .map(|li| li.end_time)
            .max()
            .ok_or(BookingError::EmptyBooking)?;

        let booking = Booking {
            id: booking_id,
            booking_number: format!("BKG-{}", now.timestamp_millis()),
            order_id: order_id.to_string(),
            start_time,
            end_time,
            status: BookingStatus::Pending,
            line_items,
            confirmed_at: None,
            cancelled_at: None,
            completed_at: None,
            reserved_at: Some(now),
            metadata: None,
        };
        self.store.insert_booking(booking.clone())?;

        info!(booking = %booking.id, order = order_id, "booking created");
        Ok(booking)
    }

    /// Checkout completion: the booking and every allocation reachable
    /// through its line items become confirmed.
    pub fn confirm_booking(&self, booking_id: &str) -> Result<Booking> {
        let mut booking = self.store.booking(booking_id)?;
        if !booking.status.can_transition_to(BookingStatus::Confirmed) {
            return Err(BookingError::InvalidBookingTransition {
                from: booking.status,
                to: BookingStatus::Confirmed,
            });
        }

        let allocation_ids: Vec<String> = booking
            .line_items
            .iter()
            .map(|li| li.allocation_id.clone())
            .collect();
        self.confirm_allocations(&allocation_ids)?;

        booking.status = BookingStatus::Confirmed;
        booking.confirmed_at = Some(self.clock.now());
        self.store.update_booking(booking.clone())?;
        Ok(booking)
    }

    /// Mark a confirmed booking as completed.
    pub fn complete_booking(&self, booking_id: &str) -> Result<Booking> {
        let mut booking = self.store.booking(booking_id)?;
        if !booking.status.can_transition_to(BookingStatus::Completed) {
            return Err(BookingError::InvalidBookingTransition {
                from: booking.status,
                to: BookingStatus::Completed,
            });
        }

        booking.status = BookingStatus::Completed;
        booking.completed_at = Some(self.clock.now());
        self.store.update_booking(booking.clone())?;
        Ok(booking)
    }

    /// Cancel a booking and cascade to every allocation reachable through
    /// its line items. Allocations that are already cancelled are skipped.
    pub fn cancel_booking(&self, booking_id: &str) -> Result<Booking> {
        let mut booking = self.store.booking(booking_id)?;
        if !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(BookingError::InvalidBookingTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        for line_item in &booking.line_items {
            let updated = self.store.transition_allocation(
                &line_item.allocation_id,
                &[
                    AllocationStatus::Hold,
                    AllocationStatus::Reserved,
                    AllocationStatus::Confirmed,
                ],
                AllocationStatus::Cancelled,
                Some("booking_cancelled"),
            )?;
            if !updated {
                debug!(
                    allocation = %line_item.allocation_id,
                    "allocation already cancelled"
                );
            }
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(self.clock.now());
        self.store.update_booking(booking.clone())?;

        info!(booking = %booking.id, "booking cancelled");
        Ok(booking)
    }
}
