//! Core virtual clock implementation

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::config::ClockConfig;
use crate::date::VirtualDate;
use crate::duration::TickAmount;
use crate::error::ClockError;
use crate::job::{Callback, Delay, Job, JobKind, Millis, TimerId};
use crate::metrics::{ClockMetrics, MetricsCollector};
use crate::queue::JobQueue;
use crate::script::ScriptScope;

struct ClockState {
    // Core state
    now: Cell<Millis>,
    start_time: Millis,
    next_id: Cell<u64>,

    // Pending work
    queue: RefCell<JobQueue>,
    scope: RefCell<ScriptScope>,

    // Nesting depth of in-progress `tick` calls
    depth: Cell<u32>,

    metrics: MetricsCollector,
}

/// Deterministic virtual clock owning virtual time and its pending jobs.
///
/// `Clock` is a cheap handle: clones share the same time and queue, so a
/// callback can capture its clock to schedule, cancel or tick re-entrantly.
/// No internal borrow is held while a callback runs.
///
/// A pending job whose callback holds a strong handle keeps the clock alive
/// until the job fires, is cancelled or is dropped by [`reset`](Self::reset).
/// Callbacks that should not extend the clock's lifetime capture a
/// [`WeakClock`] from [`downgrade`](Self::downgrade) instead.
#[derive(Clone)]
pub struct Clock {
    inner: Rc<ClockState>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a clock at virtual time 0
    pub fn new() -> Self {
        Self::with_start(crate::DEFAULT_START_TIME)
    }

    /// Create a clock at a specific virtual time
    pub fn with_start(start_time: Millis) -> Self {
        tracing::debug!("Creating virtual clock at {}", start_time);

        Self {
            inner: Rc::new(ClockState {
                now: Cell::new(start_time),
                start_time,
                next_id: Cell::new(1),
                queue: RefCell::new(JobQueue::new()),
                scope: RefCell::new(ScriptScope::new()),
                depth: Cell::new(0),
                metrics: MetricsCollector::new(),
            }),
        }
    }

    pub fn from_config(config: &ClockConfig) -> Self {
        Self::with_start(config.start_time)
    }

    /// Current virtual time
    #[inline]
    pub fn now(&self) -> Millis {
        self.inner.now.get()
    }

    #[inline]
    pub fn start_time(&self) -> Millis {
        self.inner.start_time
    }

    /// Whether a `tick` call is in progress on this clock
    #[inline]
    pub fn is_advancing(&self) -> bool {
        self.inner.depth.get() > 0
    }

    pub fn timer_count(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.queue.borrow().contains(id)
    }

    /// Due time of the earliest pending job
    pub fn next_due(&self) -> Option<Millis> {
        self.inner.queue.borrow().next_due()
    }

    pub fn metrics(&self) -> ClockMetrics {
        self.inner.metrics.get_metrics()
    }

    /// Variables written by source-text callbacks
    pub fn scope(&self) -> Ref<'_, ScriptScope> {
        self.inner.scope.borrow()
    }

    pub fn scope_mut(&self) -> RefMut<'_, ScriptScope> {
        self.inner.scope.borrow_mut()
    }

    /// Date factory bound to this clock
    pub fn date(&self) -> VirtualDate {
        VirtualDate::new(self.clone())
    }

    /// Whether both handles refer to the same clock
    pub fn ptr_eq(&self, other: &Clock) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakClock {
        WeakClock { inner: Rc::downgrade(&self.inner) }
    }

    pub fn set_timeout(
        &self,
        callback: impl Into<Option<Callback>>,
        delay: impl Into<Delay>,
    ) -> Result<TimerId, ClockError> {
        self.schedule(JobKind::Timeout, callback.into(), delay.into(), Vec::new())
    }

    pub fn set_timeout_with_args(
        &self,
        callback: impl Into<Option<Callback>>,
        delay: impl Into<Delay>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<TimerId, ClockError> {
        self.schedule(JobKind::Timeout, callback.into(), delay.into(), args.into_iter().collect())
    }

    pub fn set_interval(
        &self,
        callback: impl Into<Option<Callback>>,
        period: impl Into<Delay>,
    ) -> Result<TimerId, ClockError> {
        self.schedule(JobKind::Interval, callback.into(), period.into(), Vec::new())
    }

    pub fn set_interval_with_args(
        &self,
        callback: impl Into<Option<Callback>>,
        period: impl Into<Delay>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<TimerId, ClockError> {
        self.schedule(JobKind::Interval, callback.into(), period.into(), args.into_iter().collect())
    }

    pub fn set_immediate(
        &self,
        callback: impl Into<Option<Callback>>,
    ) -> Result<TimerId, ClockError> {
        self.schedule(JobKind::Immediate, callback.into(), Delay::ZERO, Vec::new())
    }

    pub fn set_immediate_with_args(
        &self,
        callback: impl Into<Option<Callback>>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<TimerId, ClockError> {
        self.schedule(JobKind::Immediate, callback.into(), Delay::ZERO, args.into_iter().collect())
    }

    /// Schedule a job of any kind.
    ///
    /// A missing callback fails before any state changes. Interval jobs with a
    /// zero period fire once.
    pub fn schedule(
        &self,
        kind: JobKind,
        callback: Option<Callback>,
        delay: Delay,
        args: Vec<Value>,
    ) -> Result<TimerId, ClockError> {
        let callback = callback.ok_or_else(|| {
            ClockError::InvalidArgument(format!("{kind:?} requires a callback"))
        })?;

        let state = &*self.inner;
        let id = TimerId(state.next_id.get());
        state.next_id.set(id.0 + 1);

        let now = state.now.get();
        let delay = match kind {
            JobKind::Immediate => 0,
            JobKind::Timeout | JobKind::Interval => delay.as_millis(),
        };
        let interval = match kind {
            JobKind::Interval if delay > 0 => Some(delay),
            _ => None,
        };
        let job = Job { id, kind, callback, args, call_at: now.saturating_add(delay), interval };

        tracing::trace!(id = %id, ?kind, call_at = job.call_at, "scheduled timer");
        state.queue.borrow_mut().insert(job);
        state.metrics.record_scheduled();
        Ok(id)
    }

    /// Cancel a pending job. Unknown or missing ids are ignored.
    ///
    /// Returns whether a job was removed.
    pub fn cancel(&self, id: impl Into<Option<TimerId>>) -> bool {
        let Some(id) = id.into() else {
            return false;
        };
        let removed = self.inner.queue.borrow_mut().remove(id).is_some();
        if removed {
            tracing::trace!(id = %id, "cancelled timer");
            self.inner.metrics.record_cancelled();
        }
        removed
    }

    pub fn clear_timeout(&self, id: impl Into<Option<TimerId>>) -> bool {
        self.cancel(id)
    }

    pub fn clear_interval(&self, id: impl Into<Option<TimerId>>) -> bool {
        self.cancel(id)
    }

    pub fn clear_immediate(&self, id: impl Into<Option<TimerId>>) -> bool {
        self.cancel(id)
    }

    /// Drop every pending job and return to the start time without firing anything
    pub fn reset(&self) {
        let state = &*self.inner;
        let dropped = {
            let mut queue = state.queue.borrow_mut();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        state.now.set(state.start_time);
        state.metrics.record_reset();
        tracing::debug!(dropped, start_time = state.start_time, "reset virtual clock");
    }

    /// Advance virtual time, firing every job that falls due on the way.
    ///
    /// Jobs fire in `(call_at, immediates first, insertion order)` order and
    /// `now` jumps to each job's due time before its callback runs. A failing
    /// callback does not stop the sweep; the first failure is returned once
    /// every due job has fired. A nested `tick` that moves time past this
    /// call's target extends the target, so time never runs backwards.
    pub fn tick(&self, amount: impl Into<TickAmount>) -> Result<Millis, ClockError> {
        let amount = amount.into().resolve()?;
        let state = &*self.inner;
        let mut target = state.now.get().saturating_add(amount);

        let _advancing = AdvanceGuard::enter(&state.depth);
        let mut first_error: Option<ClockError> = None;
        let mut fired = 0u64;

        while let Some(job) = self.take_due(target) {
            if job.call_at > state.now.get() {
                state.now.set(job.call_at);
            }

            fired += 1;
            state.metrics.record_fired();
            tracing::trace!(id = %job.id, now = state.now.get(), "firing timer");

            if let Err(source) = self.invoke(&job) {
                state.metrics.record_failure();
                tracing::warn!(id = %job.id, error = %source, "timer callback failed");
                if first_error.is_none() {
                    first_error = Some(ClockError::Callback { id: job.id, source });
                }
            }

            target = target.max(state.now.get());
        }

        state.now.set(target);
        state.metrics.record_tick(fired);
        tracing::debug!(now = target, fired, "tick complete");

        match first_error {
            Some(err) => Err(err),
            None => Ok(target),
        }
    }

    /// Pop the next due job, re-queueing the following occurrence of a
    /// recurring job before its callback runs so the callback can cancel it.
    fn take_due(&self, target: Millis) -> Option<Job> {
        let mut queue = self.inner.queue.borrow_mut();
        let key = queue.peek_due(target)?;
        let job = queue.remove(key.id)?;

        if let Some(next_at) = job.interval.and_then(|period| job.call_at.checked_add(period)) {
            queue.insert(Job { call_at: next_at, ..job.clone() });
        }
        Some(job)
    }

    fn invoke(&self, job: &Job) -> anyhow::Result<()> {
        match &job.callback {
            Callback::Func(f) => f(&job.args),
            Callback::Source(src) => {
                self.inner.scope.borrow_mut().eval(src)?;
                Ok(())
            }
        }
    }
}

/// Non-owning handle to a [`Clock`]
#[derive(Clone)]
pub struct WeakClock {
    inner: Weak<ClockState>,
}

impl WeakClock {
    /// The clock, if any strong handle is still alive
    pub fn upgrade(&self) -> Option<Clock> {
        self.inner.upgrade().map(|inner| Clock { inner })
    }
}

impl fmt::Debug for WeakClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakClock").field("alive", &(self.inner.strong_count() > 0)).finish()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("now", &self.now())
            .field("start_time", &self.start_time())
            .field("pending", &self.timer_count())
            .finish()
    }
}

struct AdvanceGuard<'a> {
    depth: &'a Cell<u32>,
}

impl<'a> AdvanceGuard<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}
