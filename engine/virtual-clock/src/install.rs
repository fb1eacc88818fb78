//! Installing a clock in place of a host's timer and date bindings

use std::cell::RefCell;
use std::ops::Deref;

use crate::clock::Clock;
use crate::config::ClockConfig;
use crate::error::ClockError;
use crate::host::{Binding, BindingName, Host};
use crate::job::{Delay, JobKind, Millis};
use crate::DEFAULT_FAKED_BINDINGS;

/// What a name resolved to before the clock replaced it
#[derive(Debug, Clone)]
pub enum Previous {
    /// The host held its own binding under the name
    Own(Binding),
    /// The name only resolved through the host's prototype chain
    Inherited,
}

#[derive(Debug)]
struct SavedBinding {
    name: BindingName,
    previous: Previous,
}

/// A clock whose operations currently back a host's bindings.
///
/// Derefs to [`Clock`]. Bindings stay faked until [`restore`](Self::restore)
/// is called; dropping the handle does not restore them.
#[derive(Debug)]
pub struct InstalledClock {
    clock: Clock,
    host: Host,
    saved: RefCell<Vec<SavedBinding>>,
}

impl Deref for InstalledClock {
    type Target = Clock;

    fn deref(&self) -> &Clock {
        &self.clock
    }
}

impl InstalledClock {
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Names currently replaced on the host
    pub fn faked_names(&self) -> Vec<BindingName> {
        self.saved.borrow().iter().map(|s| s.name).collect()
    }

    pub fn is_installed(&self) -> bool {
        !self.saved.borrow().is_empty()
    }

    /// Put every replaced binding back.
    ///
    /// Names the host held as own bindings get their previous value back;
    /// names that were only inherited lose the own binding the clock added.
    /// Calling this again is a no-op.
    pub fn restore(&self) {
        let saved = std::mem::take(&mut *self.saved.borrow_mut());
        if saved.is_empty() {
            return;
        }

        for SavedBinding { name, previous } in saved.into_iter().rev() {
            match previous {
                Previous::Own(binding) => {
                    self.host.define_own(name.as_str(), binding);
                }
                Previous::Inherited => {
                    self.host.delete_own(name.as_str());
                }
            }
        }
        tracing::info!(now = self.clock.now(), "restored host bindings");
    }
}

/// Create a clock at `start_time` and install it over `names` on `host`.
///
/// `None` fakes the default set. Names that do not resolve on the host are
/// skipped; repeated names are faked once.
pub fn install(host: &Host, start_time: Millis, names: Option<&[BindingName]>) -> InstalledClock {
    let clock = Clock::with_start(start_time);
    let names = names.unwrap_or(&DEFAULT_FAKED_BINDINGS);
    let mut saved: Vec<SavedBinding> = Vec::with_capacity(names.len());

    for &name in names {
        if saved.iter().any(|s| s.name == name) {
            continue;
        }
        let key = name.as_str();
        let previous = match host.get_own(key) {
            Some(own) => Previous::Own(own),
            None if host.contains(key) => Previous::Inherited,
            None => {
                tracing::debug!(binding = %name, "binding absent on host, not faking");
                continue;
            }
        };

        host.define_own(key, fake_binding(name, &clock));
        saved.push(SavedBinding { name, previous });
    }

    tracing::info!(
        start_time,
        faked = ?saved.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "installed virtual clock"
    );

    InstalledClock { clock, host: host.clone(), saved: RefCell::new(saved) }
}

/// Like [`install`], with binding names given as strings
pub fn install_named(
    host: &Host,
    start_time: Millis,
    names: &[&str],
) -> Result<InstalledClock, ClockError> {
    let names = names.iter().map(|n| n.parse()).collect::<Result<Vec<BindingName>, _>>()?;
    Ok(install(host, start_time, Some(&names)))
}

pub fn install_with_config(host: &Host, config: &ClockConfig) -> Result<InstalledClock, ClockError> {
    config.validate()?;
    Ok(install(host, config.start_time, Some(&config.fake)))
}

fn fake_binding(name: BindingName, clock: &Clock) -> Binding {
    let owner = clock.clone();
    let c = clock.clone();
    let binding = match name {
        BindingName::SetTimeout => {
            Binding::schedule(move |cb, delay, args| c.schedule(JobKind::Timeout, cb, delay, args))
        }
        BindingName::SetInterval => {
            Binding::schedule(move |cb, delay, args| c.schedule(JobKind::Interval, cb, delay, args))
        }
        BindingName::SetImmediate => Binding::schedule(move |cb, _, args| {
            c.schedule(JobKind::Immediate, cb, Delay::ZERO, args)
        }),
        BindingName::ClearTimeout | BindingName::ClearInterval | BindingName::ClearImmediate => {
            Binding::cancel(move |id| {
                c.cancel(id);
            })
        }
        BindingName::Date => Binding::date_factory(c.date()),
        BindingName::Tick => Binding::tick(move |amount| c.tick(amount)),
    };
    binding.owned_by(owner)
}
