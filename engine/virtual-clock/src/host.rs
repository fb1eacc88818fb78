//! Ambient binding environment that a clock can be installed into
//!
//! A [`Host`] models a global scope: named own bindings plus an optional
//! prototype host whose bindings are visible through inheritance.
//! Application code reaches timers and dates through the host, so whatever
//! binding is current (native or faked) receives the call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::date::{Date, DateArgs, DateComponents, DateFactory, FnDate};
use crate::duration::TickAmount;
use crate::error::ClockError;
use crate::job::{Callback, Delay, Millis, TimerId};

/// Names of the bindings a clock knows how to fake
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingName {
    #[serde(rename = "setTimeout")]
    SetTimeout,
    #[serde(rename = "clearTimeout")]
    ClearTimeout,
    #[serde(rename = "setInterval")]
    SetInterval,
    #[serde(rename = "clearInterval")]
    ClearInterval,
    #[serde(rename = "setImmediate")]
    SetImmediate,
    #[serde(rename = "clearImmediate")]
    ClearImmediate,
    #[serde(rename = "Date")]
    Date,
    #[serde(rename = "tick")]
    Tick,
}

impl BindingName {
    pub const ALL: [BindingName; 8] = [
        BindingName::SetTimeout,
        BindingName::ClearTimeout,
        BindingName::SetInterval,
        BindingName::ClearInterval,
        BindingName::SetImmediate,
        BindingName::ClearImmediate,
        BindingName::Date,
        BindingName::Tick,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BindingName::SetTimeout => "setTimeout",
            BindingName::ClearTimeout => "clearTimeout",
            BindingName::SetInterval => "setInterval",
            BindingName::ClearInterval => "clearInterval",
            BindingName::SetImmediate => "setImmediate",
            BindingName::ClearImmediate => "clearImmediate",
            BindingName::Date => "Date",
            BindingName::Tick => "tick",
        }
    }
}

impl fmt::Display for BindingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindingName {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BindingName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ClockError::InvalidArgument(format!("{s:?} is not a fakeable binding")))
    }
}

pub type ScheduleFn = dyn Fn(Option<Callback>, Delay, Vec<Value>) -> Result<TimerId, ClockError>;
pub type CancelFn = dyn Fn(Option<TimerId>);
pub type DateFn = dyn DateFactory;
pub type TickFn = dyn Fn(TickAmount) -> Result<Millis, ClockError>;

/// Callable shapes a binding can take
#[derive(Clone)]
pub enum BindingFn {
    Schedule(Rc<ScheduleFn>),
    Cancel(Rc<CancelFn>),
    Date(Rc<DateFn>),
    Tick(Rc<TickFn>),
}

impl BindingFn {
    fn data_ptr(&self) -> *const () {
        match self {
            BindingFn::Schedule(f) => Rc::as_ptr(f) as *const (),
            BindingFn::Cancel(f) => Rc::as_ptr(f) as *const (),
            BindingFn::Date(f) => Rc::as_ptr(f) as *const (),
            BindingFn::Tick(f) => Rc::as_ptr(f) as *const (),
        }
    }
}

/// A function value stored under a name in a host scope
#[derive(Clone)]
pub struct Binding {
    func: BindingFn,
    clock: Option<Clock>,
}

impl Binding {
    pub fn schedule<F>(f: F) -> Self
    where
        F: Fn(Option<Callback>, Delay, Vec<Value>) -> Result<TimerId, ClockError> + 'static,
    {
        Self { func: BindingFn::Schedule(Rc::new(f)), clock: None }
    }

    pub fn cancel<F>(f: F) -> Self
    where
        F: Fn(Option<TimerId>) + 'static,
    {
        Self { func: BindingFn::Cancel(Rc::new(f)), clock: None }
    }

    /// Date binding from a constructor function alone; `now` reads a fresh date
    pub fn date<F>(f: F) -> Self
    where
        F: Fn(DateArgs) -> Result<Date, ClockError> + 'static,
    {
        Self::date_factory(FnDate(f))
    }

    pub fn date_factory(factory: impl DateFactory + 'static) -> Self {
        Self { func: BindingFn::Date(Rc::new(factory)), clock: None }
    }

    pub fn tick<F>(f: F) -> Self
    where
        F: Fn(TickAmount) -> Result<Millis, ClockError> + 'static,
    {
        Self { func: BindingFn::Tick(Rc::new(f)), clock: None }
    }

    pub(crate) fn owned_by(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn func(&self) -> &BindingFn {
        &self.func
    }

    /// Clock that installed this binding, if any
    pub fn clock(&self) -> Option<&Clock> {
        self.clock.as_ref()
    }

    /// Whether both bindings are the same function value
    pub fn ptr_eq(&self, other: &Binding) -> bool {
        self.func.data_ptr() == other.func.data_ptr()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.func {
            BindingFn::Schedule(_) => "schedule",
            BindingFn::Cancel(_) => "cancel",
            BindingFn::Date(_) => "date",
            BindingFn::Tick(_) => "tick",
        };
        f.debug_struct("Binding").field("shape", &shape).field("clock", &self.clock).finish()
    }
}

#[derive(Default)]
struct Scope {
    own: HashMap<String, Binding>,
    prototype: Option<Host>,
}

/// Global scope of named bindings with optional inheritance
#[derive(Clone, Default)]
pub struct Host {
    scope: Rc<RefCell<Scope>>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose missing names resolve through `prototype`
    pub fn with_prototype(prototype: &Host) -> Self {
        let host = Self::new();
        host.scope.borrow_mut().prototype = Some(prototype.clone());
        host
    }

    pub fn prototype(&self) -> Option<Host> {
        self.scope.borrow().prototype.clone()
    }

    /// Resolve a name through own bindings, then the prototype chain
    pub fn get(&self, name: &str) -> Option<Binding> {
        let scope = self.scope.borrow();
        match scope.own.get(name) {
            Some(binding) => Some(binding.clone()),
            None => scope.prototype.as_ref().and_then(|proto| proto.get(name)),
        }
    }

    pub fn get_own(&self, name: &str) -> Option<Binding> {
        self.scope.borrow().own.get(name).cloned()
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.scope.borrow().own.contains_key(name)
    }

    /// Whether the name resolves at all, own or inherited
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn define_own(&self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.scope.borrow_mut().own.insert(name.into(), binding)
    }

    pub fn delete_own(&self, name: &str) -> Option<Binding> {
        self.scope.borrow_mut().own.remove(name)
    }

    pub fn own_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scope.borrow().own.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn ptr_eq(&self, other: &Host) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }

    fn resolve(&self, name: BindingName) -> Result<BindingFn, ClockError> {
        self.get(name.as_str())
            .map(|binding| binding.func)
            .ok_or_else(|| ClockError::UnknownBinding { name: name.to_string() })
    }

    /// Call a schedule-shaped binding by name
    pub fn call_schedule(
        &self,
        name: BindingName,
        callback: Option<Callback>,
        delay: Delay,
        args: Vec<Value>,
    ) -> Result<TimerId, ClockError> {
        match self.resolve(name)? {
            BindingFn::Schedule(f) => f(callback, delay, args),
            _ => Err(ClockError::UnknownBinding { name: name.to_string() }),
        }
    }

    /// Call a cancel-shaped binding by name
    pub fn call_cancel(&self, name: BindingName, id: Option<TimerId>) -> Result<(), ClockError> {
        match self.resolve(name)? {
            BindingFn::Cancel(f) => {
                f(id);
                Ok(())
            }
            _ => Err(ClockError::UnknownBinding { name: name.to_string() }),
        }
    }

    pub fn set_timeout(
        &self,
        callback: impl Into<Option<Callback>>,
        delay: impl Into<Delay>,
    ) -> Result<TimerId, ClockError> {
        self.call_schedule(BindingName::SetTimeout, callback.into(), delay.into(), Vec::new())
    }

    pub fn set_interval(
        &self,
        callback: impl Into<Option<Callback>>,
        period: impl Into<Delay>,
    ) -> Result<TimerId, ClockError> {
        self.call_schedule(BindingName::SetInterval, callback.into(), period.into(), Vec::new())
    }

    pub fn set_immediate(
        &self,
        callback: impl Into<Option<Callback>>,
    ) -> Result<TimerId, ClockError> {
        self.call_schedule(BindingName::SetImmediate, callback.into(), Delay::ZERO, Vec::new())
    }

    pub fn clear_timeout(&self, id: impl Into<Option<TimerId>>) -> Result<(), ClockError> {
        self.call_cancel(BindingName::ClearTimeout, id.into())
    }

    pub fn clear_interval(&self, id: impl Into<Option<TimerId>>) -> Result<(), ClockError> {
        self.call_cancel(BindingName::ClearInterval, id.into())
    }

    pub fn clear_immediate(&self, id: impl Into<Option<TimerId>>) -> Result<(), ClockError> {
        self.call_cancel(BindingName::ClearImmediate, id.into())
    }

    fn date(&self) -> Result<Rc<DateFn>, ClockError> {
        match self.resolve(BindingName::Date)? {
            BindingFn::Date(factory) => Ok(factory),
            _ => Err(ClockError::UnknownBinding { name: BindingName::Date.to_string() }),
        }
    }

    /// Construct a date through the current `Date` binding
    pub fn new_date(&self, args: impl Into<DateArgs>) -> Result<Date, ClockError> {
        self.date()?.create(args.into())
    }

    /// `Date.now` of the current binding, in epoch milliseconds
    pub fn date_now(&self) -> Result<i64, ClockError> {
        self.date()?.now()
    }

    pub fn date_parse(&self, text: &str) -> Result<i64, ClockError> {
        self.date()?.parse(text)
    }

    pub fn date_utc(&self, components: DateComponents) -> Result<i64, ClockError> {
        self.date()?.utc(components)
    }

    pub fn date_source_string(&self) -> Result<String, ClockError> {
        Ok(self.date()?.to_source_string())
    }

    /// Call the current `tick` binding
    pub fn tick(&self, amount: impl Into<TickAmount>) -> Result<Millis, ClockError> {
        match self.resolve(BindingName::Tick)? {
            BindingFn::Tick(f) => f(amount.into()),
            _ => Err(ClockError::UnknownBinding { name: BindingName::Tick.to_string() }),
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("own", &self.own_names())
            .field("has_prototype", &self.scope.borrow().prototype.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_names_round_trip_through_strings() {
        for name in BindingName::ALL {
            assert_eq!(name.as_str().parse::<BindingName>().unwrap(), name);
        }
        assert!(matches!("setTimer".parse::<BindingName>(), Err(ClockError::InvalidArgument(_))));
    }

    #[test]
    fn lookups_fall_back_to_the_prototype() {
        let proto = Host::new();
        let inherited = Binding::cancel(|_| {});
        proto.define_own("clearTimeout", inherited.clone());

        let host = Host::with_prototype(&proto);
        assert!(!host.has_own("clearTimeout"));
        assert!(host.contains("clearTimeout"));
        assert!(host.get("clearTimeout").unwrap().ptr_eq(&inherited));

        let shadow = Binding::cancel(|_| {});
        host.define_own("clearTimeout", shadow.clone());
        assert!(host.get("clearTimeout").unwrap().ptr_eq(&shadow));
        assert!(!shadow.ptr_eq(&inherited));

        host.delete_own("clearTimeout");
        assert!(host.get("clearTimeout").unwrap().ptr_eq(&inherited));
    }

    #[test]
    fn dispatch_reports_missing_or_mismatched_bindings() {
        let host = Host::new();
        let err = host.set_timeout(Callback::source(""), 10).unwrap_err();
        assert!(matches!(err, ClockError::UnknownBinding { ref name } if name == "setTimeout"));

        host.define_own("setTimeout", Binding::cancel(|_| {}));
        assert!(matches!(
            host.set_timeout(Callback::source(""), 10),
            Err(ClockError::UnknownBinding { .. })
        ));
    }
}
