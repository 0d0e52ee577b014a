// src/market.rs
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use std::str::FromStr;

/// Source of "now" for the scheduler. Swapped for a fixed clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Weekday on which a closed market reopens at `hour` UTC (e.g. Sunday 22:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reopen {
    pub day: Weekday,
    pub hour: u32,
}

impl FromStr for Reopen {
    type Err = String;

    /// `sun@22`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day, hour) = s
            .split_once('@')
            .ok_or_else(|| format!("expected <day>@<hour>, got `{s}`"))?;
        let day = parse_weekday(day)?;
        let hour = parse_hour(hour)?;
        Ok(Reopen { day, hour })
    }
}

pub fn parse_weekday(s: &str) -> Result<Weekday, String> {
    Weekday::from_str(s.trim()).map_err(|_| format!("unknown weekday `{}`", s.trim()))
}

pub fn parse_hour(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(h) if h <= 23 => Ok(h),
        _ => Err(format!("invalid UTC hour `{}` (0-23)", s.trim())),
    }
}

/// UTC trading calendar for the reference market.
///
/// Closed days are closed all day. A `reopen` rule overrides its weekday:
/// closed before `hour`, open from `hour` on. Maintenance hours close the
/// remaining trading days only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketCalendar {
    pub enabled: bool,
    pub closed_days: Vec<Weekday>,
    pub reopen: Option<Reopen>,
    pub maintenance_hours: Vec<u32>,
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self {
            enabled: true,
            closed_days: vec![Weekday::Sat, Weekday::Sun],
            reopen: None,
            maintenance_hours: vec![21],
        }
    }
}

impl MarketCalendar {
    pub fn always_open() -> Self {
        Self { enabled: false, closed_days: Vec::new(), reopen: None, maintenance_hours: Vec::new() }
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }
        let day = now.weekday();
        let hour = now.hour();
        if let Some(reopen) = self.reopen {
            if reopen.day == day {
                return hour >= reopen.hour;
            }
        }
        !self.closed_days.contains(&day) && !self.maintenance_hours.contains(&hour)
    }
}
