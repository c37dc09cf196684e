use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One training interval. `end_time` is `None` while the session is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingSession {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Rounded duration in whole minutes, half away from zero. Negative when the
    /// recorded end precedes the start; callers decide whether to clamp.
    pub fn duration_minutes(&self) -> Option<i64> {
        let end = self.end_time?;
        let millis = (end - self.start_time).num_milliseconds();
        Some((millis as f64 / 60_000.0).round() as i64)
    }
}

/// Training minutes per calendar date. Dates without a finished session are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyMinutes(BTreeMap<NaiveDate, u32>);

impl DailyMinutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, date: NaiveDate, minutes: u32) {
        let total = self.0.entry(date).or_insert(0);
        *total = total.saturating_add(minutes);
    }

    pub fn minutes_on(&self, date: NaiveDate) -> u32 {
        self.0.get(&date).copied().unwrap_or(0)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains_key(&date)
    }

    pub fn total_minutes(&self) -> u64 {
        self.0.values().map(|&m| m as u64).sum()
    }

    /// Number of dates with more than zero minutes.
    pub fn active_days(&self) -> usize {
        self.0.values().filter(|&&m| m > 0).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, u32)> + '_ {
        self.0.iter().map(|(&date, &minutes)| (date, minutes))
    }

    /// Oldest first, each with its intensity.
    pub fn entries(&self) -> Vec<DayMinutes> {
        self.iter()
            .map(|(date, minutes)| DayMinutes {
                date,
                minutes,
                intensity: Intensity::from_minutes(minutes),
            })
            .collect()
    }
}

/// One exported row of [`DailyMinutes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayMinutes {
    pub date: NaiveDate,
    pub minutes: u32,
    pub intensity: Intensity,
}

impl FromIterator<(NaiveDate, u32)> for DailyMinutes {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, u32)>>(iter: I) -> Self {
        let mut daily = DailyMinutes::new();
        for (date, minutes) in iter {
            daily.add(date, minutes);
        }
        daily
    }
}

/// Github-style activity level derived from daily minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    None,
    Light,
    Medium,
    Dark,
    Full,
}

impl Intensity {
    pub const ALL: [Intensity; 5] = [
        Intensity::None,
        Intensity::Light,
        Intensity::Medium,
        Intensity::Dark,
        Intensity::Full,
    ];

    /// One representative minute value per level, lowest first. Used for legends.
    pub const LEGEND_SAMPLES: [u32; 5] = [0, 20, 60, 100, 130];

    pub fn from_minutes(minutes: u32) -> Self {
        match minutes {
            0 => Intensity::None,
            1..40 => Intensity::Light,
            40..80 => Intensity::Medium,
            80..120 => Intensity::Dark,
            _ => Intensity::Full,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intensity::None => "NONE",
            Intensity::Light => "LIGHT",
            Intensity::Medium => "MEDIUM",
            Intensity::Dark => "DARK",
            Intensity::Full => "FULL",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar month. Always valid: years are limited to 1..=9999 so every grid
/// (including padding days from adjacent months) is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    first: NaiveDate,
}

impl YearMonth {
    pub const MIN_YEAR: i32 = 1;
    pub const MAX_YEAR: i32 = 9999;

    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn containing(date: NaiveDate) -> Option<Self> {
        Self::new(date.year(), date.month())
    }

    /// The month that "now" falls in, as seen from `tz`.
    pub fn current(tz: Tz) -> Self {
        let today = Utc::now().with_timezone(&tz).date_naive();
        Self::containing(today).unwrap_or_else(|| Self {
            first: today.with_day(1).unwrap_or(today),
        })
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    /// 1-based month number.
    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.first)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    /// Shift by `delta` months, rolling the year over. `None` outside 1..=9999.
    pub fn add_months(&self, delta: i32) -> Option<Self> {
        let total = self.year() as i64 * 12 + (self.month() as i64 - 1) + delta as i64;
        let year = i32::try_from(total.div_euclid(12)).ok()?;
        let month = (total.rem_euclid(12) + 1) as u32;
        Self::new(year, month)
    }

    /// Previous month; stays put at January of year 1.
    pub fn prev(&self) -> Self {
        self.add_months(-1).unwrap_or(*self)
    }

    /// Next month; stays put at December of year 9999.
    pub fn next(&self) -> Self {
        self.add_months(1).unwrap_or(*self)
    }

    /// First date shown on the month's 6x7 grid: the Sunday on or before the 1st.
    pub fn grid_start(&self) -> NaiveDate {
        let leading = self.first.weekday().num_days_from_sunday() as u64;
        self.first
            .checked_sub_days(Days::new(leading))
            .unwrap_or(self.first)
    }

    /// Short label such as `2025/Jan`.
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            self.year(),
            crate::calendar::MONTH_LABELS[self.month0()]
        )
    }

    fn month0(&self) -> usize {
        self.first.month0() as usize
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once(['-', '/'])
            .with_context(|| format!("Invalid month '{s}', expected YYYY-MM"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("Invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("Invalid month number in '{s}'"))?;
        YearMonth::new(year, month).with_context(|| format!("Month out of range: '{s}'"))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One cell of a rendered month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub date: NaiveDate,
    pub minutes: u32,
    pub in_target_month: bool,
    pub intensity: Intensity,
}

/// Six Sunday-first weeks of seven cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub month: YearMonth,
    pub weeks: [[DayCell; 7]; 6],
}

impl MonthGrid {
    /// All 42 cells in emission order.
    pub fn cells(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flatten()
    }

    pub fn target_month_minutes(&self) -> u64 {
        self.cells()
            .filter(|c| c.in_target_month)
            .map(|c| c.minutes as u64)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    #[default]
    Pink,
    LightBlue,
    YellowGreen,
    LightPurple,
}

impl ProfileColor {
    pub const ALL: [ProfileColor; 10] = [
        ProfileColor::Red,
        ProfileColor::Orange,
        ProfileColor::Yellow,
        ProfileColor::Green,
        ProfileColor::Blue,
        ProfileColor::Purple,
        ProfileColor::Pink,
        ProfileColor::LightBlue,
        ProfileColor::YellowGreen,
        ProfileColor::LightPurple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileColor::Red => "RED",
            ProfileColor::Orange => "ORANGE",
            ProfileColor::Yellow => "YELLOW",
            ProfileColor::Green => "GREEN",
            ProfileColor::Blue => "BLUE",
            ProfileColor::Purple => "PURPLE",
            ProfileColor::Pink => "PINK",
            ProfileColor::LightBlue => "LIGHT_BLUE",
            ProfileColor::YellowGreen => "YELLOW_GREEN",
            ProfileColor::LightPurple => "LIGHT_PURPLE",
        }
    }
}

impl fmt::Display for ProfileColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        ProfileColor::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .with_context(|| format!("Unknown profile color: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub place: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub profile_color: Option<ProfileColor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unknown")
    }

    pub fn display_place(&self) -> &str {
        self.place.as_deref().filter(|p| !p.is_empty()).unwrap_or("Unknown")
    }

    pub fn color(&self) -> ProfileColor {
        self.profile_color.unwrap_or_default()
    }
}

/// Partial profile write; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub place: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub profile_color: Option<ProfileColor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).expect("valid month")
    }

    #[test]
    fn intensity_boundaries_are_exact() {
        assert_eq!(Intensity::from_minutes(0), Intensity::None);
        assert_eq!(Intensity::from_minutes(1), Intensity::Light);
        assert_eq!(Intensity::from_minutes(39), Intensity::Light);
        assert_eq!(Intensity::from_minutes(40), Intensity::Medium);
        assert_eq!(Intensity::from_minutes(79), Intensity::Medium);
        assert_eq!(Intensity::from_minutes(80), Intensity::Dark);
        assert_eq!(Intensity::from_minutes(119), Intensity::Dark);
        assert_eq!(Intensity::from_minutes(120), Intensity::Full);
        assert_eq!(Intensity::from_minutes(u32::MAX), Intensity::Full);
    }

    #[test]
    fn legend_samples_cover_every_level_in_order() {
        let levels: Vec<_> = Intensity::LEGEND_SAMPLES
            .iter()
            .map(|&m| Intensity::from_minutes(m))
            .collect();
        assert_eq!(levels, Intensity::ALL.to_vec());
    }

    #[test]
    fn year_month_rolls_over_year_boundaries() {
        assert_eq!(ym(2025, 1).prev(), ym(2024, 12));
        assert_eq!(ym(2024, 12).next(), ym(2025, 1));
        assert_eq!(ym(2025, 3).add_months(-14), Some(ym(2024, 1)));
        assert_eq!(ym(2025, 3).add_months(22), Some(ym(2027, 1)));
    }

    #[test]
    fn year_month_saturates_at_supported_range() {
        assert_eq!(ym(1, 1).prev(), ym(1, 1));
        assert_eq!(ym(9999, 12).next(), ym(9999, 12));
        assert!(YearMonth::new(0, 1).is_none());
        assert!(YearMonth::new(2025, 13).is_none());
        assert!(YearMonth::new(2025, 0).is_none());
    }

    #[test]
    fn days_in_month_follows_the_calendar() {
        assert_eq!(ym(2024, 2).days_in_month(), 29);
        assert_eq!(ym(2025, 2).days_in_month(), 28);
        assert_eq!(ym(1900, 2).days_in_month(), 28);
        assert_eq!(ym(2000, 2).days_in_month(), 29);
        assert_eq!(ym(2025, 4).days_in_month(), 30);
        assert_eq!(ym(2025, 12).days_in_month(), 31);
        assert_eq!(ym(9999, 12).days_in_month(), 31);
    }

    #[test]
    fn year_month_parses_and_formats() {
        let month: YearMonth = "2025-03".parse().expect("parse");
        assert_eq!(month, ym(2025, 3));
        assert_eq!(month.to_string(), "2025-03");
        assert_eq!(month.label(), "2025/Mar");
        assert_eq!("2025/7".parse::<YearMonth>().expect("parse"), ym(2025, 7));
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("march".parse::<YearMonth>().is_err());
    }

    #[test]
    fn duration_minutes_rounds_half_away_from_zero() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let mut session = TrainingSession {
            id: SessionId("s".into()),
            user_id: UserId::new("u"),
            start_time: start,
            end_time: Some(start + chrono::Duration::seconds(90)),
            created_at: start,
            updated_at: start,
        };
        assert_eq!(session.duration_minutes(), Some(2));

        session.end_time = Some(start + chrono::Duration::seconds(89));
        assert_eq!(session.duration_minutes(), Some(1));

        session.end_time = Some(start - chrono::Duration::seconds(90));
        assert_eq!(session.duration_minutes(), Some(-2));

        session.end_time = None;
        assert_eq!(session.duration_minutes(), None);
        assert!(!session.is_finished());
    }

    #[test]
    fn profile_color_parses_loosely() {
        assert_eq!("light-blue".parse::<ProfileColor>().unwrap(), ProfileColor::LightBlue);
        assert_eq!("PINK".parse::<ProfileColor>().unwrap(), ProfileColor::Pink);
        assert_eq!(ProfileColor::default(), ProfileColor::Pink);
        assert!("teal".parse::<ProfileColor>().is_err());
    }

    #[test]
    fn daily_minutes_accumulates_and_defaults_to_zero() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let other = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let daily: DailyMinutes = [(day, 25), (day, 50), (other, 0)].into_iter().collect();

        assert_eq!(daily.minutes_on(day), 75);
        assert_eq!(daily.minutes_on(other), 0);
        assert!(daily.contains(other));
        assert_eq!(daily.len(), 2);
        assert_eq!(daily.active_days(), 1);
        assert_eq!(daily.total_minutes(), 75);

        let entries = daily.entries();
        assert_eq!(entries[0].date, day);
        assert_eq!(entries[0].intensity, Intensity::Medium);
        assert_eq!(entries[1].intensity, Intensity::None);
    }
}
