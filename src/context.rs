use anyhow::Result;
use chrono_tz::Tz;

use crate::calendar::build_grid;
use crate::carousel::Carousel;
use crate::config::Config;
use crate::heatmap::aggregate_in;
use crate::store::Store;
use crate::types::{DailyMinutes, MonthGrid, UserId, YearMonth};

/// Everything a command needs: the store, who is acting, and the timezone that
/// decides which calendar date a session belongs to. Passed explicitly; there
/// is no process-wide client or current-user state.
pub struct AppContext {
    pub store: Store,
    pub user: UserId,
    pub tz: Tz,
}

impl AppContext {
    pub fn new(store: Store, user: UserId, tz: Tz) -> Self {
        Self { store, user, tz }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Store::open(&config.db_path()?)?;
        Ok(Self::new(store, config.user_id()?, config.timezone()))
    }

    pub fn daily_minutes_for(&self, user: &UserId) -> Result<DailyMinutes> {
        let sessions = self.store.list_sessions(user)?;
        Ok(aggregate_in(&sessions, self.tz))
    }

    pub fn grid_for(&self, user: &UserId, month: YearMonth) -> Result<MonthGrid> {
        Ok(build_grid(month, &self.daily_minutes_for(user)?))
    }

    pub fn carousel(&self) -> Result<Carousel> {
        Carousel::load(&self.store, &self.user)
    }

    pub fn current_month(&self) -> YearMonth {
        YearMonth::current(self.tz)
    }
}
