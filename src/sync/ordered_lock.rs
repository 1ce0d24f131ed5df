//! Rank-ordered mutex that rejects out-of-order acquisition.
//!
//! Every [`OrderedLock`] carries a [`LockRank`]. While a thread holds
//! ordered locks it may only acquire locks of strictly lower rank, so all
//! threads descend the same total order and no wait-for cycle can form
//! among ordered locks.
//!
//! The check runs before the thread blocks. An out-of-order attempt
//! returns [`LockOrderViolation`] immediately instead of risking a
//! deadlock, including re-acquiring a lock the thread already holds.
//!
//! # Example
//!
//! ```ignore
//! let accounts = OrderedLock::with_name(LockRank::new(200), "accounts", Ledger::new());
//! let journal = OrderedLock::with_name(LockRank::new(100), "journal", Vec::new());
//!
//! let ledger = accounts.lock()?;   // rank 200
//! let mut log = journal.lock()?;   // rank 100 < 200: allowed
//! log.push(ledger.snapshot());
//!
//! // journal.lock() then accounts.lock() on one thread fails fast instead.
//! ```
//!
//! # Held Stack
//!
//! Each thread keeps a private stack of the ordered locks it holds, ranks
//! strictly descending. The top of the stack is the thread's held rank.
//! Dropping a guard removes that lock's entry, which restores the held rank
//! saved when it was acquired. Guards dropped out of acquisition order
//! remove their own entry, leaving the stack descending.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

use crate::tracing_compat::{debug, error, trace};

/// Position of an [`OrderedLock`] in the global acquisition order.
///
/// Higher ranks are acquired first. Ranks need not be contiguous; only
/// their relative order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockRank(u32);

impl LockRank {
    /// Creates a rank.
    #[must_use]
    pub const fn new(rank: u32) -> Self {
        Self(rank)
    }

    /// Returns the raw rank value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for LockRank {
    fn from(rank: u32) -> Self {
        Self(rank)
    }
}

impl fmt::Display for LockRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a thread acquires an ordered lock out of rank order.
///
/// This is a defect in the calling code (a wrong rank assignment or a wrong
/// acquisition order), not a transient condition. It is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOrderViolation {
    requested: LockRank,
    requested_name: Option<&'static str>,
    held: LockRank,
    held_name: Option<&'static str>,
}

impl LockOrderViolation {
    /// Creates a violation report.
    #[must_use]
    pub const fn new(
        requested: LockRank,
        requested_name: Option<&'static str>,
        held: LockRank,
        held_name: Option<&'static str>,
    ) -> Self {
        Self {
            requested,
            requested_name,
            held,
            held_name,
        }
    }

    /// Rank of the lock the thread tried to acquire.
    #[must_use]
    pub const fn requested(&self) -> LockRank {
        self.requested
    }

    /// Name of the lock the thread tried to acquire, if it has one.
    #[must_use]
    pub const fn requested_name(&self) -> Option<&'static str> {
        self.requested_name
    }

    /// Rank the thread held at the time of the attempt.
    #[must_use]
    pub const fn held(&self) -> LockRank {
        self.held
    }

    /// Name of the most recently acquired held lock, if it has one.
    #[must_use]
    pub const fn held_name(&self) -> Option<&'static str> {
        self.held_name
    }
}

impl fmt::Display for LockOrderViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock order violation: acquiring ")?;
        write_lock(f, self.requested, self.requested_name)?;
        write!(f, " while holding ")?;
        write_lock(f, self.held, self.held_name)
    }
}

fn write_lock(f: &mut fmt::Formatter<'_>, rank: LockRank, name: Option<&str>) -> fmt::Result {
    match name {
        Some(name) => write!(f, "'{name}' (rank {rank})"),
        None => write!(f, "rank {rank}"),
    }
}

impl std::error::Error for LockOrderViolation {}

/// Error returned by [`OrderedLock::lock_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The acquisition would break rank order.
    #[error(transparent)]
    OrderViolation(#[from] LockOrderViolation),
    /// The lock stayed held by another thread for the whole timeout.
    #[error("ordered lock acquisition timed out")]
    TimedOut,
}

/// Error returned by [`OrderedLock::try_lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryLockError {
    /// The acquisition would break rank order.
    #[error(transparent)]
    OrderViolation(#[from] LockOrderViolation),
    /// The lock is held by another thread.
    #[error("ordered lock is held by another thread")]
    WouldBlock,
}

/// One entry of a thread's held stack.
#[derive(Debug, Clone, Copy)]
struct HeldLock {
    /// Address of the owning `OrderedLock`, unique while it is borrowed.
    id: usize,
    rank: LockRank,
    name: Option<&'static str>,
}

mod held {
    use super::{HeldLock, LockRank, RefCell, SmallVec};

    thread_local! {
        static HELD: RefCell<SmallVec<[HeldLock; 8]>> = RefCell::new(SmallVec::new());
    }

    /// Most recently acquired lock still held by this thread.
    pub(super) fn top() -> Option<HeldLock> {
        HELD.with(|held| held.borrow().last().copied())
    }

    pub(super) fn push(entry: HeldLock) {
        HELD.with(|held| held.borrow_mut().push(entry));
    }

    /// Removes the entry for lock `id`. Tolerates thread-local teardown.
    pub(super) fn remove(id: usize) {
        let _ = HELD.try_with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|entry| entry.id == id) {
                held.remove(pos);
            }
        });
    }

    pub(super) fn rank() -> Option<LockRank> {
        top().map(|entry| entry.rank)
    }

    pub(super) fn count() -> usize {
        HELD.with(|held| held.borrow().len())
    }
}

/// Returns the rank of the most recently acquired ordered lock still held
/// by the calling thread, or `None` if it holds none.
#[must_use]
pub fn current_held_rank() -> Option<LockRank> {
    held::rank()
}

/// Returns how many ordered locks the calling thread currently holds.
#[must_use]
pub fn held_lock_count() -> usize {
    held::count()
}

/// A mutex with a fixed rank in the global lock order.
///
/// Acquisition fails with [`LockOrderViolation`] if the calling thread
/// already holds an ordered lock whose rank is greater than or equal to
/// this one's. The check happens before waiting, so a violation never
/// blocks.
///
/// Guards are `!Send`: the held stack belongs to the acquiring thread.
pub struct OrderedLock<T> {
    rank: LockRank,
    name: Option<&'static str>,
    data: Mutex<T>,
}

impl<T> OrderedLock<T> {
    /// Creates an unlocked ordered lock with the given rank.
    #[must_use]
    pub const fn new(rank: LockRank, value: T) -> Self {
        Self {
            rank,
            name: None,
            data: Mutex::new(value),
        }
    }

    /// Creates an unlocked ordered lock with a rank and a diagnostic name.
    #[must_use]
    pub const fn with_name(rank: LockRank, name: &'static str, value: T) -> Self {
        Self {
            rank,
            name: Some(name),
            data: Mutex::new(value),
        }
    }

    /// Returns this lock's rank.
    #[must_use]
    pub const fn rank(&self) -> LockRank {
        self.rank
    }

    /// Returns this lock's diagnostic name.
    #[must_use]
    pub const fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Returns true if some thread currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.data.is_locked()
    }

    /// Acquires the lock, blocking until it is free.
    ///
    /// # Errors
    ///
    /// Returns [`LockOrderViolation`] without blocking if the calling thread
    /// holds an ordered lock of rank greater than or equal to this one.
    pub fn lock(&self) -> Result<OrderedLockGuard<'_, T>, LockOrderViolation> {
        self.check_order()?;
        let guard = self.data.lock();
        Ok(self.admit(guard))
    }

    /// Acquires the lock, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::OrderViolation`] without blocking on a rank
    /// conflict, or [`LockError::TimedOut`] if the lock stayed held.
    pub fn lock_timeout(&self, timeout: Duration) -> Result<OrderedLockGuard<'_, T>, LockError> {
        self.check_order()?;
        match self.data.try_lock_for(timeout) {
            Some(guard) => Ok(self.admit(guard)),
            None => {
                debug!(
                    rank = self.rank.get(),
                    name = self.name,
                    timeout = ?timeout,
                    "ordered lock acquisition timed out"
                );
                Err(LockError::TimedOut)
            }
        }
    }

    /// Acquires the lock only if it is free right now.
    ///
    /// # Errors
    ///
    /// Returns [`TryLockError::OrderViolation`] on a rank conflict, or
    /// [`TryLockError::WouldBlock`] if another thread holds the lock.
    pub fn try_lock(&self) -> Result<OrderedLockGuard<'_, T>, TryLockError> {
        self.check_order()?;
        self.data
            .try_lock()
            .map(|guard| self.admit(guard))
            .ok_or(TryLockError::WouldBlock)
    }

    /// Returns a mutable reference to the protected value.
    ///
    /// Exclusive access to the lock means no locking or order check is needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Consumes the lock, returning the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn id(&self) -> usize {
        (self as *const Self) as usize
    }

    fn check_order(&self) -> Result<(), LockOrderViolation> {
        let Some(top) = held::top() else {
            return Ok(());
        };
        if self.rank < top.rank {
            return Ok(());
        }
        let violation = LockOrderViolation::new(self.rank, self.name, top.rank, top.name);
        error!(
            requested = self.rank.get(),
            requested_name = self.name,
            held = top.rank.get(),
            held_name = top.name,
            "lock order violation"
        );
        Err(violation)
    }

    fn admit<'a>(&'a self, guard: MutexGuard<'a, T>) -> OrderedLockGuard<'a, T> {
        held::push(HeldLock {
            id: self.id(),
            rank: self.rank,
            name: self.name,
        });
        trace!(rank = self.rank.get(), name = self.name, "ordered lock acquired");
        OrderedLockGuard {
            lock: self,
            guard,
            _not_send: PhantomData,
        }
    }
}

impl<T: Default> Default for OrderedLock<T> {
    /// An ordered lock at rank 0, the lowest rank.
    fn default() -> Self {
        Self::new(LockRank::new(0), T::default())
    }
}

impl<T> fmt::Debug for OrderedLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedLock")
            .field("rank", &self.rank)
            .field("name", &self.name)
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Guard that releases an [`OrderedLock`] when dropped.
///
/// Dropping the guard first restores the thread's held rank, then unlocks.
///
/// The guard cannot leave the acquiring thread, since the held stack it
/// updates on drop is thread-local:
///
/// ```compile_fail
/// use sync_core::{LockRank, OrderedLock};
///
/// fn assert_send<T: Send>(_: &T) {}
///
/// let lock = OrderedLock::new(LockRank::new(1), 0);
/// let guard = lock.lock().unwrap();
/// assert_send(&guard);
/// ```
#[must_use = "guard will be immediately released if not held"]
pub struct OrderedLockGuard<'a, T> {
    lock: &'a OrderedLock<T>,
    guard: MutexGuard<'a, T>,
    /// Keeps the guard `!Send` regardless of parking_lot's `send_guard` feature.
    _not_send: PhantomData<*const ()>,
}

impl<T> OrderedLockGuard<'_, T> {
    /// Rank of the lock this guard holds.
    #[must_use]
    pub fn rank(&self) -> LockRank {
        self.lock.rank
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedLockGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedLockGuard")
            .field("rank", &self.lock.rank)
            .field("data", &*self.guard)
            .finish()
    }
}

impl<T> Deref for OrderedLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for OrderedLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for OrderedLockGuard<'_, T> {
    fn drop(&mut self) {
        held::remove(self.lock.id());
        trace!(
            rank = self.lock.rank.get(),
            name = self.lock.name,
            "ordered lock released"
        );
        // The inner MutexGuard unlocks after this body returns.
    }
}
