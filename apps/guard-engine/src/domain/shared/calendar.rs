//! Trading calendar: session boundaries, trading days and the weekend closure.
//!
//! Futures sessions usually open in the evening and close the next afternoon
//! (18:00 - 17:00 exchange time). Instants after the evening open belong to
//! the *next* calendar date's trading day, so a Friday 18:30 instant belongs
//! to Saturday, which is not a trading day.

use chrono::{
    Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
    Weekday,
};
use std::fmt;

use super::value_objects::Timestamp;

/// A daily wall-clock window. `open > close` denotes an overnight window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingHours {
    open: NaiveTime,
    close: NaiveTime,
}

impl TradingHours {
    /// Create a window from its open and close times.
    #[must_use]
    pub const fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    /// Window from whole hour/minute pairs, falling back to midnight for out-of-range input.
    #[must_use]
    pub fn from_hm(open: (u32, u32), close: (u32, u32)) -> Self {
        Self {
            open: NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    /// Opening time.
    #[must_use]
    pub const fn open(&self) -> NaiveTime {
        self.open
    }

    /// Closing time.
    #[must_use]
    pub const fn close(&self) -> NaiveTime {
        self.close
    }

    /// Returns true if the window wraps past midnight.
    #[must_use]
    pub fn is_overnight(&self) -> bool {
        self.open > self.close
    }

    /// Returns true if `time` falls inside the window (open inclusive, close exclusive).
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.is_overnight() {
            time >= self.open || time < self.close
        } else {
            time >= self.open && time < self.close
        }
    }
}

impl fmt::Display for TradingHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.open.format("%H:%M"), self.close.format("%H:%M"))
    }
}

/// Errors building a trading calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// UTC offset outside +/- 24h.
    InvalidOffset {
        /// Offset in minutes.
        minutes: i32,
    },
    /// Session open equals session close.
    EmptySession,
    /// No weekday is marked as a trading day.
    NoTradingDays,
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOffset { minutes } => write!(f, "invalid UTC offset: {minutes} minutes"),
            Self::EmptySession => write!(f, "session open and close must differ"),
            Self::NoTradingDays => write!(f, "at least one trading day is required"),
        }
    }
}

impl std::error::Error for CalendarError {}

/// Exchange calendar used for daily resets, lockout expiry and time rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingCalendar {
    offset: FixedOffset,
    session: TradingHours,
    trading_days: [bool; 7],
}

impl TradingCalendar {
    /// Create a calendar.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is out of range, the session is empty or
    /// no trading day is given.
    pub fn new(
        utc_offset_minutes: i32,
        session: TradingHours,
        trading_days: &[Weekday],
    ) -> Result<Self, CalendarError> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or(
            CalendarError::InvalidOffset {
                minutes: utc_offset_minutes,
            },
        )?;
        if session.open == session.close {
            return Err(CalendarError::EmptySession);
        }
        if trading_days.is_empty() {
            return Err(CalendarError::NoTradingDays);
        }

        let mut days = [false; 7];
        for day in trading_days {
            days[day.num_days_from_monday() as usize] = true;
        }

        Ok(Self {
            offset,
            session,
            trading_days: days,
        })
    }

    /// Session window in exchange-local time.
    #[must_use]
    pub const fn session(&self) -> TradingHours {
        self.session
    }

    /// Convert an instant to exchange-local wall-clock time.
    #[must_use]
    pub fn local(&self, now: Timestamp) -> NaiveDateTime {
        now.as_datetime().with_timezone(&self.offset).naive_local()
    }

    /// Returns true if `day` is a trading day.
    #[must_use]
    pub fn is_trading_day(&self, day: NaiveDate) -> bool {
        self.trading_days[day.weekday().num_days_from_monday() as usize]
    }

    /// The trading day an instant belongs to.
    #[must_use]
    pub fn trading_day(&self, now: Timestamp) -> NaiveDate {
        let local = self.local(now);
        if self.session.is_overnight() && local.time() >= self.session.open {
            local.date() + Duration::days(1)
        } else {
            local.date()
        }
    }

    /// First trading day strictly after `day`.
    #[must_use]
    pub fn next_trading_day(&self, day: NaiveDate) -> NaiveDate {
        let mut candidate = day + Duration::days(1);
        for _ in 0..7 {
            if self.is_trading_day(candidate) {
                return candidate;
            }
            candidate += Duration::days(1);
        }
        day + Duration::days(1)
    }

    /// Instant the session of trading day `day` opens.
    #[must_use]
    pub fn session_open(&self, day: NaiveDate) -> Timestamp {
        let date = if self.session.is_overnight() {
            day - Duration::days(1)
        } else {
            day
        };
        self.to_utc(date.and_time(self.session.open))
    }

    /// Instant the session of trading day `day` closes.
    #[must_use]
    pub fn session_close(&self, day: NaiveDate) -> Timestamp {
        self.to_utc(day.and_time(self.session.close))
    }

    /// Returns true if the exchange session is open at `now`.
    #[must_use]
    pub fn is_in_session(&self, now: Timestamp) -> bool {
        let day = self.trading_day(now);
        self.is_trading_day(day) && now >= self.session_open(day) && now < self.session_close(day)
    }

    /// Session open of the first trading day after the one `now` belongs to.
    #[must_use]
    pub fn next_session_open_after(&self, now: Timestamp) -> Timestamp {
        self.session_open(self.next_trading_day(self.trading_day(now)))
    }

    /// Returns true between the last close before a non-trading day and the next open.
    #[must_use]
    pub fn is_weekend_closure(&self, now: Timestamp) -> bool {
        let day = self.trading_day(now);
        if !self.is_trading_day(day) {
            return true;
        }
        now >= self.session_close(day) && !self.is_trading_day(day + Duration::days(1))
    }

    fn to_utc(&self, local: NaiveDateTime) -> Timestamp {
        let shifted = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Timestamp::new(Utc.from_utc_datetime(&shifted))
    }
}

impl Default for TradingCalendar {
    /// CME equity-index futures in US Eastern standard time: 18:00 - 17:00, Monday to Friday.
    fn default() -> Self {
        Self {
            offset: FixedOffset::west_opt(5 * 3600).unwrap_or_else(|| Utc.fix()),
            session: TradingHours::from_hm((18, 0), (17, 0)),
            trading_days: [true, true, true, true, true, false, false],
        }
    }
}
