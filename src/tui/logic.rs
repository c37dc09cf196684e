use chrono::NaiveDate;

use crate::types::MonthGrid;

/// Totals over the in-month cells of a grid. Padding days are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonthSummary {
    pub total_minutes: u64,
    pub active_days: usize,
    pub best_day: Option<(NaiveDate, u32)>,
}

pub fn month_summary(grid: &MonthGrid) -> MonthSummary {
    let mut summary = MonthSummary::default();
    for cell in grid.cells().filter(|c| c.in_target_month) {
        summary.total_minutes += u64::from(cell.minutes);
        if cell.minutes > 0 {
            summary.active_days += 1;
        }
        // Earliest date wins ties.
        if cell.minutes > 0 && summary.best_day.is_none_or(|(_, best)| cell.minutes > best) {
            summary.best_day = Some((cell.date, cell.minutes));
        }
    }
    summary
}

/// "Jane's Training"; names already ending in s get a bare apostrophe.
pub fn subject_title(name: &str) -> String {
    if name.ends_with('s') || name.ends_with('S') {
        format!("{name}' Training")
    } else {
        format!("{name}'s Training")
    }
}
