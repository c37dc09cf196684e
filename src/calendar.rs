//! Month grid construction for the training heatmap.
//!
//! A grid always holds six Sunday-first weeks (42 cells). Days before the 1st
//! are taken from the end of the previous month, and the grid is topped up with
//! the start of the next month.

use chrono::{Days, Utc};
use chrono_tz::Tz;

use crate::types::{DailyMinutes, DayCell, Intensity, MonthGrid, YearMonth};

pub const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn build_grid(month: YearMonth, daily: &DailyMinutes) -> MonthGrid {
    let start = month.grid_start();

    let weeks = std::array::from_fn(|week| {
        std::array::from_fn(|weekday| {
            let offset = (week * 7 + weekday) as u64;
            // YearMonth keeps years within 1..=9999, so the grid never leaves
            // chrono's representable range.
            let date = start.checked_add_days(Days::new(offset)).unwrap_or(start);
            let minutes = daily.minutes_on(date);
            DayCell {
                date,
                minutes,
                in_target_month: month.contains(date),
                intensity: Intensity::from_minutes(minutes),
            }
        })
    });

    MonthGrid { month, weeks }
}

/// The month currently on screen. Owned by whoever renders the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    month: YearMonth,
    tz: Tz,
}

impl MonthCursor {
    pub fn new(tz: Tz) -> Self {
        Self {
            month: YearMonth::current(tz),
            tz,
        }
    }

    pub fn at(month: YearMonth, tz: Tz) -> Self {
        Self { month, tz }
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn prev(&mut self) -> YearMonth {
        self.month = self.month.prev();
        self.month
    }

    pub fn next(&mut self) -> YearMonth {
        self.month = self.month.next();
        self.month
    }

    pub fn reset_to_current(&mut self) -> YearMonth {
        self.month = YearMonth::current(self.tz);
        self.month
    }

    pub fn is_current(&self) -> bool {
        self.month == YearMonth::current(self.tz)
    }

    pub fn grid(&self, daily: &DailyMinutes) -> MonthGrid {
        build_grid(self.month, daily)
    }
}

/// Today's date in `tz`.
pub fn today(tz: Tz) -> chrono::NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}
