//! Date factory bound to a virtual clock
//!
//! Dates produced here are plain `chrono::DateTime<Utc>` values. Only the
//! "now" path reads the clock; explicit timestamps and calendar components
//! are converted exactly as chrono would convert them.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};

use crate::clock::Clock;
use crate::error::ClockError;

/// Native date type handed out by [`VirtualDate`]
pub type Date = DateTime<Utc>;

/// Calendar components of a date, month zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateComponents {
    pub year: i32,
    pub month0: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
}

impl DateComponents {
    /// First instant of the given month
    pub fn new(year: i32, month0: u32) -> Self {
        Self { year, month0, day: 1, hour: 0, minute: 0, second: 0, millisecond: 0 }
    }

    pub fn day(mut self, day: u32) -> Self {
        self.day = day;
        self
    }

    pub fn hms(mut self, hour: u32, minute: u32, second: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    pub fn millis(mut self, millisecond: u32) -> Self {
        self.millisecond = millisecond;
        self
    }

    fn to_date(self) -> Result<Date, ClockError> {
        let naive = self
            .month0
            .checked_add(1)
            .and_then(|month| NaiveDate::from_ymd_opt(self.year, month, self.day))
            .and_then(|d| d.and_hms_milli_opt(self.hour, self.minute, self.second, self.millisecond))
            .ok_or_else(|| ClockError::InvalidArgument(format!("invalid date components {self:?}")))?;
        Ok(Utc.from_utc_datetime(&naive))
    }
}

/// Arguments accepted by the date factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateArgs {
    /// Current virtual time
    #[default]
    Now,
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
    Components(DateComponents),
}

impl From<i64> for DateArgs {
    fn from(ms: i64) -> Self {
        DateArgs::Timestamp(ms)
    }
}

impl From<DateComponents> for DateArgs {
    fn from(c: DateComponents) -> Self {
        DateArgs::Components(c)
    }
}

/// Date factory that reads "now" from a virtual clock
#[derive(Clone, Debug)]
pub struct VirtualDate {
    clock: Clock,
}

impl VirtualDate {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Clock backing the "now" path
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Build a date; explicit arguments always bypass the clock
    pub fn create(&self, args: impl Into<DateArgs>) -> Result<Date, ClockError> {
        match args.into() {
            DateArgs::Now => from_millis(self.now()),
            DateArgs::Timestamp(ms) => from_millis(ms),
            DateArgs::Components(c) => c.to_date(),
        }
    }

    /// Date at the clock's current virtual time
    pub fn now_date(&self) -> Result<Date, ClockError> {
        self.create(DateArgs::Now)
    }

    /// Current virtual time in epoch milliseconds
    pub fn now(&self) -> i64 {
        i64::try_from(self.clock.now()).unwrap_or(i64::MAX)
    }

    /// Parse an RFC 3339 or RFC 2822 date string into epoch milliseconds
    pub fn parse(text: &str) -> Result<i64, ClockError> {
        DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_rfc2822(text))
            .map(|d| d.timestamp_millis())
            .map_err(|e| ClockError::InvalidArgument(format!("cannot parse date {text:?}: {e}")))
    }

    /// Epoch milliseconds of the given UTC calendar components
    pub fn utc(components: DateComponents) -> Result<i64, ClockError> {
        components.to_date().map(|d| d.timestamp_millis())
    }

    /// Name of the native date type this factory produces
    pub fn native_type_name() -> &'static str {
        std::any::type_name::<Date>()
    }

    /// Local-style string form of a date, as chrono renders RFC 2822
    pub fn to_string(date: &Date) -> String {
        date.to_rfc2822()
    }

    /// UTC string form of a date with millisecond precision
    pub fn to_utc_string(date: &Date) -> String {
        date.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Source representation of the date constructor. Identical for the
    /// virtual and the native factory.
    pub fn to_source_string() -> String {
        format!("fn Date() -> {} {{ [native code] }}", Self::native_type_name())
    }
}

/// Full date interface a host exposes under its `Date` binding.
///
/// Only `create` is required. The static functions default to the chrono
/// conversions shared by every factory; `now` defaults to reading a fresh
/// date, so a factory that only constructs dates still answers it.
pub trait DateFactory {
    fn create(&self, args: DateArgs) -> Result<Date, ClockError>;

    /// Current time in epoch milliseconds
    fn now(&self) -> Result<i64, ClockError> {
        self.create(DateArgs::Now).map(|date| date.timestamp_millis())
    }

    fn parse(&self, text: &str) -> Result<i64, ClockError> {
        VirtualDate::parse(text)
    }

    fn utc(&self, components: DateComponents) -> Result<i64, ClockError> {
        VirtualDate::utc(components)
    }

    fn to_source_string(&self) -> String {
        VirtualDate::to_source_string()
    }
}

impl DateFactory for VirtualDate {
    fn create(&self, args: DateArgs) -> Result<Date, ClockError> {
        VirtualDate::create(self, args)
    }

    fn now(&self) -> Result<i64, ClockError> {
        Ok(VirtualDate::now(self))
    }
}

/// Adapts a plain constructor function to [`DateFactory`]
pub(crate) struct FnDate<F>(pub(crate) F);

impl<F> DateFactory for FnDate<F>
where
    F: Fn(DateArgs) -> Result<Date, ClockError>,
{
    fn create(&self, args: DateArgs) -> Result<Date, ClockError> {
        (self.0)(args)
    }
}

fn from_millis(ms: i64) -> Result<Date, ClockError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| ClockError::InvalidArgument(format!("timestamp {ms} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn now_follows_the_clock() {
        let clock = Clock::with_start(1_000);
        let date = clock.date();
        let before = date.now_date().unwrap();
        clock.tick(3).unwrap();
        let after = date.create(DateArgs::Now).unwrap();
        assert_eq!(before.timestamp_millis(), 1_000);
        assert_eq!((after - before).num_milliseconds(), 3);
        assert_eq!(date.now(), 1_003);
    }

    #[test]
    fn explicit_arguments_bypass_the_clock() {
        let clock = Clock::with_start(5);
        let date = clock.date();

        let stamp = date.create(1_273_000_000_000i64).unwrap();
        assert_eq!(stamp.timestamp_millis(), 1_273_000_000_000);

        let parts = date
            .create(DateComponents::new(2010, 4).day(2).hms(12, 42, 53).millis(498))
            .unwrap();
        assert_eq!((parts.year(), parts.month(), parts.day()), (2010, 5, 2));
        assert_eq!((parts.hour(), parts.minute(), parts.second()), (12, 42, 53));
        assert_eq!(parts.timestamp_subsec_millis(), 498);

        let month_only = date.create(DateComponents::new(2010, 4)).unwrap();
        assert_eq!(month_only, Utc.with_ymd_and_hms(2010, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn static_surface_delegates_to_chrono() {
        assert_eq!(VirtualDate::parse("1970-01-01T00:00:01Z").unwrap(), 1_000);
        assert_eq!(VirtualDate::parse("Thu, 01 Jan 1970 00:00:02 +0000").unwrap(), 2_000);
        assert!(VirtualDate::parse("yesterday").is_err());
        assert_eq!(VirtualDate::utc(DateComponents::new(1970, 0).day(2)).unwrap(), 86_400_000);
        assert!(VirtualDate::utc(DateComponents::new(2010, 12)).is_err());
        assert!(VirtualDate::native_type_name().contains("DateTime"));
    }

    #[test]
    fn string_forms_mirror_chrono() {
        let date = Clock::new().date().create(DateComponents::new(2010, 4).day(2).millis(7)).unwrap();

        assert_eq!(VirtualDate::to_string(&date), date.to_rfc2822());
        assert!(VirtualDate::to_string(&date).starts_with("Sun, "));
        assert_eq!(VirtualDate::to_utc_string(&date), "2010-05-02T00:00:00.007Z");
        assert_eq!(
            VirtualDate::parse(&VirtualDate::to_utc_string(&date)).unwrap(),
            date.timestamp_millis()
        );

        let source = VirtualDate::to_source_string();
        assert!(source.starts_with("fn Date()"));
        assert!(source.contains(VirtualDate::native_type_name()));
    }

    #[test]
    fn factory_trait_reads_virtual_now() {
        let clock = Clock::with_start(250);
        let factory: Box<dyn DateFactory> = Box::new(clock.date());

        assert_eq!(factory.now().unwrap(), 250);
        clock.tick(50).unwrap();
        assert_eq!(factory.now().unwrap(), 300);
        assert_eq!(factory.create(DateArgs::Timestamp(9)).unwrap().timestamp_millis(), 9);
        assert_eq!(factory.parse("1970-01-01T00:00:00.042Z").unwrap(), 42);
        assert_eq!(factory.utc(DateComponents::new(1970, 0).day(1).hms(0, 0, 1)).unwrap(), 1_000);
        assert_eq!(factory.to_source_string(), VirtualDate::to_source_string());
    }

    #[test]
    fn constructor_functions_answer_now_through_create() {
        let fixed = FnDate(|_: DateArgs| from_millis(1_234));
        assert_eq!(fixed.now().unwrap(), 1_234);
    }
}
