/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session-time windows.
//!
//! A [`SessionSchedule`] describes the daily or weekly interval during which
//! a session may be active. Outside the window the session disconnects and
//! parks in the not-session-time state; when the stored creation time and the
//! current instant fall in different window instances, sequence numbers
//! reset.

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, NaiveTime, Offset, Timelike, Utc, Weekday,
};

/// A recurring session-time window.
///
/// Daily schedules repeat every 24 hours; weekly schedules span from a start
/// weekday/time to an end weekday/time. The start/end times are interpreted
/// in the configured UTC offset. Windows may cross midnight (end before
/// start), and boundaries are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSchedule {
    start: NaiveTime,
    end: NaiveTime,
    start_day: Option<Weekday>,
    end_day: Option<Weekday>,
    offset: FixedOffset,
}

impl SessionSchedule {
    /// Creates a daily window from `start` to `end` (UTC).
    #[must_use]
    pub fn daily(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start,
            end,
            start_day: None,
            end_day: None,
            offset: Utc.fix(),
        }
    }

    /// Creates a weekly window from `start_day`/`start` to `end_day`/`end`
    /// (UTC).
    #[must_use]
    pub fn weekly(start_day: Weekday, start: NaiveTime, end_day: Weekday, end: NaiveTime) -> Self {
        let mut schedule = Self::daily(start, end);
        schedule.start_day = Some(start_day);
        schedule.end_day = Some(end_day);
        schedule
    }

    /// Sets the UTC offset in which the window's times are interpreted.
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Returns the UTC offset in which the window's times are interpreted.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Returns true if the instant falls inside the window.
    #[must_use]
    pub fn is_in_range(&self, instant: DateTime<Utc>) -> bool {
        let elapsed = instant - self.window_start(instant);
        elapsed <= self.window_duration()
    }

    /// Returns true if both instants fall inside the same window instance.
    ///
    /// Two instants in range but separated by a window boundary (e.g.
    /// yesterday's session and today's) are not in the same range; a session
    /// whose store was created in a previous instance must reset.
    #[must_use]
    pub fn is_in_same_range(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.is_in_range(a) && self.is_in_range(b) && self.window_start(a) == self.window_start(b)
    }

    /// Returns the most recent window start at or before the instant.
    fn window_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let local = instant.with_timezone(&self.offset);

        let start_date = match self.start_day {
            Some(start_day) => {
                let days_back = (local.weekday().num_days_from_sunday() + 7
                    - start_day.num_days_from_sunday())
                    % 7;
                let candidate = local.date_naive() - Days::new(u64::from(days_back));
                if days_back == 0 && local.time() < self.start {
                    candidate - Days::new(7)
                } else {
                    candidate
                }
            }
            None => {
                if local.time() >= self.start {
                    local.date_naive()
                } else {
                    local.date_naive() - Days::new(1)
                }
            }
        };

        let local_naive = start_date.and_time(self.start);
        let utc_naive = local_naive - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc_naive, Utc)
    }

    /// Returns the length of one window instance.
    fn window_duration(&self) -> Duration {
        let mut duration = self.end.signed_duration_since(self.start);
        match (self.start_day, self.end_day) {
            (Some(start_day), Some(end_day)) => {
                let days = (end_day.num_days_from_sunday() + 7 - start_day.num_days_from_sunday()) % 7;
                duration = duration + Duration::days(i64::from(days));
                if duration <= Duration::zero() {
                    duration = duration + Duration::days(7);
                }
            }
            _ => {
                if duration <= Duration::zero() {
                    duration = duration + Duration::days(1);
                }
            }
        }
        duration
    }

    /// Returns true if the time-of-day (in the schedule's offset) matches the
    /// given time to the second. Used for the daily sequence-reset trigger.
    #[must_use]
    pub fn matches_time_of_day(instant: DateTime<Utc>, offset: FixedOffset, time: NaiveTime) -> bool {
        let local = instant.with_timezone(&offset).time();
        local.hour() == time.hour() && local.minute() == time.minute() && local.second() == time.second()
    }
}
