//! Collaborator contracts and in-memory reference implementations.
//!
//! The engine core is persistence-agnostic: resources, rules, allocations,
//! and bookings come from provider/store traits, "now" comes from a clock,
//! and hold/confirm serialization comes from an advisory lock provider. The
//! in-memory implementations back the test suites and the CLI's snapshot
//! commands.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};

use crate::error::{BookingError, Result};
use crate::model::{Allocation, AllocationStatus, Booking, Resource};
use crate::rules::BookingRule;

/// Supplies a resource aggregate with rules and allocations preloaded.
///
/// Rules arrive unfiltered; excluding inactive ones is the engine's job.
pub trait ResourceProvider {
    fn resource(&self, id: &str) -> Result<Resource>;
}

/// Supplies the full unfiltered list of booking-policy rules.
pub trait RuleProvider {
    fn booking_rules(&self) -> Result<Vec<BookingRule>>;
}

/// Supplies "now" for expiry sweeps and default evaluation times.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Selection criteria for listing allocations.
#[derive(Debug, Clone, Default)]
pub struct AllocationFilter {
    pub status: Option<AllocationStatus>,
    pub expires_before: Option<DateTime<Utc>>,
    pub resource_id: Option<String>,
}

/// Create/read/list/transition operations for allocations.
pub trait AllocationStore {
    fn insert_allocation(&self, allocation: Allocation) -> Result<()>;

    fn allocation(&self, id: &str) -> Result<Allocation>;

    fn allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>>;

    /// Conditional, status-guarded transition: the write happens only while
    /// the allocation is still in one of `expected`. Returns `false` on a
    /// guard miss (the allocation moved on concurrently) -- that is an
    /// outcome, not an error.
    fn transition_allocation(
        &self,
        id: &str,
        expected: &[AllocationStatus],
        next: AllocationStatus,
        reason: Option<&str>,
    ) -> Result<bool>;

    /// Record which booking line item owns the allocation.
    fn attach_line_item(&self, id: &str, line_item_id: &str) -> Result<()>;
}

/// Create/read/update operations for booking aggregates.
pub trait BookingStore {
    fn insert_booking(&self, booking: Booking) -> Result<()>;

    fn booking(&self, id: &str) -> Result<Booking>;

    fn update_booking(&self, booking: Booking) -> Result<()>;
}

/// Advisory lock keyed by resource (or cart) identifier.
///
/// `acquire` waits up to `timeout` and surfaces contention as a retryable
/// error; the lease auto-expires after `ttl` if the holder crashes without
/// releasing.
pub trait LockProvider {
    fn acquire(&self, key: &str, timeout: StdDuration, ttl: StdDuration) -> Result<()>;

    fn release(&self, key: &str);
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<T: LockProvider + ?Sized> LockProvider for std::sync::Arc<T> {
    fn acquire(&self, key: &str, timeout: StdDuration, ttl: StdDuration) -> Result<()> {
        (**self).acquire(key, timeout, ttl)
    }

    fn release(&self, key: &str) {
        (**self).release(key)
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to an explicit instant, advanced by hand. For tests and
/// replaying snapshots at a fixed time.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = lock(&self.now);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

// Recover the guard from a poisoned mutex rather than propagating the panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory store implementing every persistence-facing contract.
///
/// Resources are stored without their allocations; the aggregate is
/// reassembled on read so allocation state has a single home.
#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: Mutex<HashMap<String, Resource>>,
    allocations: Mutex<HashMap<String, Allocation>>,
    bookings: Mutex<HashMap<String, Booking>>,
    rules: Mutex<Vec<BookingRule>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource. Embedded allocations are moved into the
    /// allocation table so they participate in sweeps and transitions.
    pub fn put_resource(&self, mut resource: Resource) {
        let embedded = std::mem::take(&mut resource.allocations);
        {
            let mut allocations = lock(&self.allocations);
            for allocation in embedded {
                allocations.insert(allocation.id.clone(), allocation);
            }
        }
        lock(&self.resources).insert(resource.id.clone(), resource);
    }

    pub fn put_rule(&self, rule: BookingRule) {
        lock(&self.rules).push(rule);
    }

    /// Remove a resource and everything it owns. Allocations cascade with
    /// the resource; removing an allocation never cascades upward.
    pub fn remove_resource(&self, id: &str) {
        lock(&self.resources).remove(id);
        lock(&self.allocations).retain(|_, a| a.booking_resource_id != id);
    }
}

impl ResourceProvider for MemoryStore {
    fn resource(&self, id: &str) -> Result<Resource> {
        let mut resource = lock(&self.resources)
            .get(id)
            .cloned()
            .ok_or_else(|| BookingError::ResourceNotFound(id.to_string()))?;

        let mut owned: Vec<Allocation> = lock(&self.allocations)
            .values()
            .filter(|a| a.booking_resource_id == id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        resource.allocations = owned;

        Ok(resource)
    }
}

impl RuleProvider for MemoryStore {
    fn booking_rules(&self) -> Result<Vec<BookingRule>> {
        Ok(lock(&self.rules).clone())
    }
}

impl AllocationStore for MemoryStore {
    fn insert_allocation(&self, allocation: Allocation) -> Result<()> {
        lock(&self.allocations).insert(allocation.id.clone(), allocation);
        Ok(())
    }

    fn allocation(&self, id: &str) -> Result<Allocation> {
        lock(&self.allocations)
            .get(id)
            .cloned()
            .ok_or_else(|| BookingError::AllocationNotFound(id.to_string()))
    }

    fn allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>> {
        let mut matching: Vec<Allocation> = lock(&self.allocations)
            .values()
            .filter(|a| {
                if let Some(status) = filter.status {
                    if a.status != status {
                        return false;
                    }
                }
                if let Some(expires_before) = filter.expires_before {
                    match a.expires_at {
                        Some(expires_at) if expires_at < expires_before => {}
                        _ => return false,
                    }
                }
                if let Some(resource_id) = &filter.resource_id {
                    if &a.booking_resource_id != resource_id {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    fn transition_allocation(
        &self,
        id: &str,
        expected: &[AllocationStatus],
        next: AllocationStatus,
        reason: Option<&str>,
    ) -> Result<bool> {
        let mut allocations = lock(&self.allocations);
        let allocation = allocations
            .get_mut(id)
            .ok_or_else(|| BookingError::AllocationNotFound(id.to_string()))?;

        if !expected.contains(&allocation.status) {
            return Ok(false);
        }

        allocation.status = next;
        if let Some(reason) = reason {
            allocation.cancellation_reason = Some(reason.to_string());
        }
        Ok(true)
    }

    fn attach_line_item(&self, id: &str, line_item_id: &str) -> Result<()> {
        let mut allocations = lock(&self.allocations);
        let allocation = allocations
            .get_mut(id)
            .ok_or_else(|| BookingError::AllocationNotFound(id.to_string()))?;
        allocation.line_item_id = Some(line_item_id.to_string());
        Ok(())
    }
}

impl BookingStore for MemoryStore {
    fn insert_booking(&self, booking: Booking) -> Result<()> {
        lock(&self.bookings).insert(booking.id.clone(), booking);
        Ok(())
    }

    fn booking(&self, id: &str) -> Result<Booking> {
        lock(&self.bookings)
            .get(id)
            .cloned()
            .ok_or_else(|| BookingError::BookingNotFound(id.to_string()))
    }

    fn update_booking(&self, booking: Booking) -> Result<()> {
        lock(&self.bookings).insert(booking.id.clone(), booking);
        Ok(())
    }
}

/// In-memory advisory lock with lease expiry.
///
/// A lease left behind by a crashed holder becomes reclaimable once its TTL
/// passes, matching the semantics expected of a distributed lock service.
#[derive(Debug, Default)]
pub struct MemoryLockProvider {
    leases: Mutex<HashMap<String, Instant>>,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockProvider for MemoryLockProvider {
    fn acquire(&self, key: &str, timeout: StdDuration, ttl: StdDuration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut leases = lock(&self.leases);
                let now = Instant::now();
                leases.retain(|_, expires| *expires > now);

                if !leases.contains_key(key) {
                    leases.insert(key.to_string(), now + ttl);
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(BookingError::LockContended {
                    key: key.to_string(),
                });
            }
            std::thread::sleep(StdDuration::from_millis(5));
        }
    }

    fn release(&self, key: &str) {
        lock(&self.leases).remove(key);
    }
}
