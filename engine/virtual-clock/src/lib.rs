//! # VirtualClock
//!
//! A deterministic, in-process virtual clock that stands in for timers
//! (timeouts, intervals, immediates) and the wall-clock date.
//!
//! Time only moves when [`Clock::tick`] is called. Every callback that falls
//! due inside the requested window fires synchronously, in a reproducible
//! order, before `tick` returns. An [`InstalledClock`] routes a [`Host`]'s
//! ambient bindings to a clock until it is restored.

pub mod clock;
pub mod config;
pub mod date;
pub mod duration;
pub mod error;
pub mod host;
pub mod install;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod script;



pub use clock::{Clock, WeakClock};
pub use config::ClockConfig;
pub use date::{Date, DateArgs, DateComponents, DateFactory, VirtualDate};
pub use duration::{parse_clock_string, TickAmount};
pub use error::ClockError;
pub use host::{Binding, BindingFn, BindingName, Host};
pub use install::{install, install_named, install_with_config, InstalledClock, Previous};
pub use job::{Callback, Delay, Job, JobKind, Millis, TimerId};
pub use metrics::ClockMetrics;
pub use script::{ScriptError, ScriptScope};

/// Current version of the virtual clock
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Virtual time a clock starts at when none is given
pub const DEFAULT_START_TIME: Millis = 0;

/// Bindings replaced by `install` when no names are given
pub const DEFAULT_FAKED_BINDINGS: [BindingName; 7] = [
    BindingName::SetTimeout,
    BindingName::ClearTimeout,
    BindingName::SetInterval,
    BindingName::ClearInterval,
    BindingName::SetImmediate,
    BindingName::ClearImmediate,
    BindingName::Date,
];
