//! Scheduled job records

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Virtual timestamp in milliseconds
pub type Millis = u64;

/// Identifier of a scheduled job, unique for the lifetime of one clock
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

impl TimerId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<TimerId> for u64 {
    fn from(id: TimerId) -> Self {
        id.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Immediate = 0,
    Timeout = 1,
    Interval = 2,
}

impl JobKind {
    /// Tie-break rank among jobs due at the same instant (lower fires first)
    #[inline]
    pub fn rank(self) -> u8 {
        match self {
            JobKind::Immediate => 0,
            JobKind::Timeout | JobKind::Interval => 1,
        }
    }
}

type CallbackFn = dyn Fn(&[Value]) -> anyhow::Result<()>;

/// Work attached to a job
#[derive(Clone)]
pub enum Callback {
    /// Invocable unit of work, called with the job's stored arguments
    Func(Rc<CallbackFn>),
    /// Snippet evaluated by the clock's [`ScriptScope`](crate::script::ScriptScope)
    Source(String),
}

impl Callback {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<()> + 'static,
    {
        Callback::Func(Rc::new(f))
    }

    pub fn source(src: impl Into<String>) -> Self {
        Callback::Source(src.into())
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Func(_) => f.write_str("Callback::Func(..)"),
            Callback::Source(src) => f.debug_tuple("Callback::Source").field(src).finish(),
        }
    }
}

impl From<&str> for Callback {
    fn from(src: &str) -> Self {
        Callback::source(src)
    }
}

impl From<String> for Callback {
    fn from(src: String) -> Self {
        Callback::Source(src)
    }
}

/// Non-negative delay or period in milliseconds.
///
/// Every conversion saturates at zero: negative, NaN and non-numeric inputs
/// all become an immediate delay.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Delay(pub Millis);

impl Delay {
    pub const ZERO: Delay = Delay(0);

    #[inline]
    pub fn as_millis(self) -> Millis {
        self.0
    }
}

impl From<u64> for Delay {
    fn from(ms: u64) -> Self {
        Delay(ms)
    }
}

impl From<u32> for Delay {
    fn from(ms: u32) -> Self {
        Delay(ms as u64)
    }
}

impl From<usize> for Delay {
    fn from(ms: usize) -> Self {
        Delay(ms as u64)
    }
}

impl From<i64> for Delay {
    fn from(ms: i64) -> Self {
        Delay(ms.max(0) as u64)
    }
}

impl From<i32> for Delay {
    fn from(ms: i32) -> Self {
        Delay::from(ms as i64)
    }
}

impl From<f64> for Delay {
    fn from(ms: f64) -> Self {
        if ms.is_finite() && ms > 0.0 {
            Delay(ms as u64)
        } else {
            Delay::ZERO
        }
    }
}

impl From<Duration> for Delay {
    fn from(d: Duration) -> Self {
        Delay(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<&Value> for Delay {
    fn from(v: &Value) -> Self {
        match v {
            Value::Number(n) => match (n.as_u64(), n.as_i64(), n.as_f64()) {
                (Some(ms), _, _) => Delay(ms),
                (None, Some(ms), _) => Delay::from(ms),
                (None, None, Some(ms)) => Delay::from(ms),
                _ => Delay::ZERO,
            },
            _ => Delay::ZERO,
        }
    }
}

impl From<Value> for Delay {
    fn from(v: Value) -> Self {
        Delay::from(&v)
    }
}

impl<T: Into<Delay>> From<Option<T>> for Delay {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

/// One scheduled unit of future work
#[derive(Clone, Debug)]
pub struct Job {
    pub id: TimerId,
    pub kind: JobKind,
    pub callback: Callback,
    pub args: Vec<Value>,
    pub call_at: Millis,
    /// Recurrence period, present only for repeating jobs
    pub interval: Option<Millis>,
}

impl Job {
    #[inline]
    pub fn is_recurring(&self) -> bool {
        self.interval.is_some()
    }

    /// Ordering key inside the pending queue
    #[inline]
    pub fn key(&self) -> JobKey {
        JobKey { call_at: self.call_at, rank: self.kind.rank(), id: self.id }
    }
}

/// Firing order: due time, then immediates before timers, then insertion order
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct JobKey {
    pub call_at: Millis,
    pub rank: u8,
    pub id: TimerId,
}
