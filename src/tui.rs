pub mod logic;

use std::io;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};

use crate::calendar::{self, MonthCursor, WEEKDAY_LABELS};
use crate::carousel::Carousel;
use crate::context::AppContext;
use crate::debug_log;
use crate::types::{DailyMinutes, DayCell, Intensity, MonthGrid, TrainingSession, UserId, YearMonth};
use crate::utils::{NumberFormatOptions, format_date_for_display, format_minutes, format_number};

use logic::{month_summary, subject_title};

/// Width of one day cell, including the gap to its right.
const CELL_WIDTH: usize = 5;

/// Magenta-to-orange gradient at 20/50/80/100% opacity over white.
pub const INTENSITY_COLORS: [(Intensity, Color); 5] = [
    (Intensity::None, Color::Rgb(255, 255, 255)),
    (Intensity::Light, Color::Rgb(255, 212, 225)),
    (Intensity::Medium, Color::Rgb(255, 147, 181)),
    (Intensity::Dark, Color::Rgb(255, 81, 137)),
    (Intensity::Full, Color::Rgb(255, 38, 107)),
];

pub fn intensity_color(intensity: Intensity) -> Color {
    INTENSITY_COLORS
        .iter()
        .find(|(level, _)| *level == intensity)
        .map(|(_, color)| *color)
        .unwrap_or(Color::Reset)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    /// The configured user's own heatmap.
    Mine,
    /// Heatmap of whoever is centred in the following carousel.
    Following,
    /// A user looked up by id.
    Lookup(UserId),
}

pub struct App<'a> {
    ctx: &'a AppContext,
    pub mode: ViewMode,
    pub cursor: MonthCursor,
    pub carousel: Carousel,
    pub daily: DailyMinutes,
    pub active: Option<TrainingSession>,
    pub today: NaiveDate,
    format_options: NumberFormatOptions,
}

impl<'a> App<'a> {
    pub fn new(
        ctx: &'a AppContext,
        month: Option<YearMonth>,
        format_options: NumberFormatOptions,
    ) -> Result<Self> {
        let cursor = match month {
            Some(month) => MonthCursor::at(month, ctx.tz),
            None => MonthCursor::new(ctx.tz),
        };

        let mut app = Self {
            ctx,
            mode: ViewMode::Mine,
            cursor,
            carousel: ctx.carousel()?,
            daily: DailyMinutes::new(),
            active: None,
            today: calendar::today(ctx.tz),
            format_options,
        };
        app.reload()?;
        Ok(app)
    }

    /// Show `user`: centred in the carousel if followed, otherwise as a lookup.
    pub fn focus(&mut self, user: &UserId) -> Result<()> {
        self.mode = if *user == self.ctx.user {
            ViewMode::Mine
        } else if self.carousel.center_on(user) {
            ViewMode::Following
        } else {
            ViewMode::Lookup(user.clone())
        };
        self.reload()
    }

    /// The user whose heatmap is on screen, if any.
    pub fn subject(&self) -> Option<UserId> {
        match &self.mode {
            ViewMode::Mine => Some(self.ctx.user.clone()),
            ViewMode::Following => self.carousel.centered().map(|p| p.user_id.clone()),
            ViewMode::Lookup(user) => Some(user.clone()),
        }
    }

    pub fn reload(&mut self) -> Result<()> {
        let _timed = debug_log::Timed::new("TUI", format!("reload {:?}", self.mode));
        self.daily = match self.subject() {
            Some(user) => self.ctx.daily_minutes_for(&user)?,
            None => DailyMinutes::new(),
        };
        self.active = match self.mode {
            ViewMode::Mine => self.ctx.store.active_session(&self.ctx.user)?,
            _ => None,
        };
        Ok(())
    }

    pub fn grid(&self) -> MonthGrid {
        self.cursor.grid(&self.daily)
    }

    pub fn tick(&mut self) {
        self.today = calendar::today(self.ctx.tz);
    }

    /// Apply a key press. Returns true when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.cursor.prev();
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.cursor.next();
            }
            KeyCode::Char('t') => {
                self.cursor.reset_to_current();
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.mode = match self.mode {
                    ViewMode::Mine => ViewMode::Following,
                    ViewMode::Following | ViewMode::Lookup(_) => ViewMode::Mine,
                };
                self.reload()?;
            }
            KeyCode::Down | KeyCode::Char('j') if self.mode == ViewMode::Following => {
                if self.carousel.next() {
                    self.reload()?;
                }
            }
            KeyCode::Up | KeyCode::Char('k') if self.mode == ViewMode::Following => {
                if self.carousel.prev() {
                    self.reload()?;
                }
            }
            KeyCode::Char('r') => {
                self.carousel = self.ctx.carousel()?;
                self.reload()?;
            }
            _ => {}
        }
        Ok(false)
    }

    fn title(&self) -> String {
        match &self.mode {
            ViewMode::Mine => "Your Training".to_string(),
            ViewMode::Following => match self.carousel.centered() {
                Some(profile) => subject_title(profile.display_name()),
                None => "Following".to_string(),
            },
            ViewMode::Lookup(user) => {
                let name = self
                    .ctx
                    .store
                    .get_profile(user)
                    .ok()
                    .flatten()
                    .and_then(|p| p.name)
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| user.to_string());
                subject_title(&name)
            }
        }
    }
}

pub fn run_tui(
    ctx: &AppContext,
    month: Option<YearMonth>,
    focus: Option<UserId>,
    format_options: NumberFormatOptions,
) -> Result<()> {
    let mut app = App::new(ctx, month, format_options)?;
    if let Some(user) = focus {
        app.focus(&user)?;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, event::poll, event::read, None);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Draw/poll/read loop. `poll` and `read` are injected so tests can script input.
pub fn run_app<B, P, R>(
    terminal: &mut Terminal<B>,
    app: &mut App<'_>,
    mut poll: P,
    mut read: R,
    max_iterations: Option<usize>,
) -> Result<()>
where
    B: Backend,
    P: FnMut(Duration) -> io::Result<bool>,
    R: FnMut() -> io::Result<Event>,
{
    let mut iterations = 0usize;
    loop {
        if let Some(max) = max_iterations {
            if iterations >= max {
                return Ok(());
            }
            iterations += 1;
        }

        app.tick();
        terminal
            .draw(|frame| draw(frame, app))
            .map_err(|e| anyhow!("Failed to draw frame: {e}"))?;

        if !poll(Duration::from_millis(250))? {
            continue;
        }

        if let Event::Key(key) = read()?
            && key.kind == KeyEventKind::Press
            && app.handle_key(key)?
        {
            return Ok(());
        }
    }
}

pub fn draw(frame: &mut Frame, app: &App<'_>) {
    let outer = Block::default()
        .borders(Borders::ALL)
        .title(" trainmap ")
        .title_alignment(Alignment::Center);
    let inner = outer.inner(frame.area());
    frame.render_widget(outer, frame.area());

    let rows = Layout::vertical([
        Constraint::Length(1), // title
        Constraint::Length(1), // carousel / status
        Constraint::Length(1), // month navigation
        Constraint::Length(1), // weekday header
        Constraint::Length(6), // weeks
        Constraint::Length(1), // spacer
        Constraint::Length(1), // legend
        Constraint::Length(1), // summary
        Constraint::Min(0),
        Constraint::Length(1), // help
    ])
    .split(inner);

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            app.title(),
            Style::default().add_modifier(Modifier::BOLD),
        )))
        .alignment(Alignment::Center),
        rows[0],
    );

    frame.render_widget(status_line(app), rows[1]);

    if app.mode == ViewMode::Following && app.carousel.is_empty() {
        frame.render_widget(
            Paragraph::new(vec![
                Line::from("You're not following anyone yet"),
                Line::from(Span::styled(
                    "trainmap follow <USER ID>",
                    Style::default().add_modifier(Modifier::DIM),
                )),
            ])
            .alignment(Alignment::Center),
            rows[4],
        );
    } else {
        let grid = app.grid();
        frame.render_widget(
            Paragraph::new(Line::from(format!("←  {}  →", grid.month.label())))
                .alignment(Alignment::Center),
            rows[2],
        );
        frame.render_widget(weekday_header(), rows[3]);
        render_weeks(frame, rows[4], &grid, app.today);
        frame.render_widget(legend(), rows[6]);
        frame.render_widget(summary_line(app, &grid), rows[7]);
    }

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            help_text(&app.mode),
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center),
        rows[9],
    );
}

fn help_text(mode: &ViewMode) -> &'static str {
    match mode {
        ViewMode::Following => "←/→ month  ↑/↓ user  t today  Tab mine  r reload  q quit",
        ViewMode::Lookup(_) => "←/→ month  t today  Tab mine  r reload  q quit",
        ViewMode::Mine => "←/→ month  t today  Tab following  r reload  q quit",
    }
}

fn status_line(app: &App<'_>) -> Paragraph<'static> {
    let line = match &app.mode {
        ViewMode::Following => {
            let centered = app.carousel.centered_index();
            let mut spans: Vec<Span> = Vec::new();
            if let Some(i) = centered {
                spans.push(Span::raw(format!("{}/{} ", i + 1, app.carousel.len())));
            }
            for (i, profile) in app.carousel.entries().iter().enumerate() {
                let style = if Some(i) == centered {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Rgb(255, 38, 107))
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().add_modifier(Modifier::DIM)
                };
                spans.push(Span::styled(format!(" {} ", profile.display_name()), style));
                spans.push(Span::raw(" "));
            }
            Line::from(spans)
        }
        _ => match &app.active {
            Some(session) => Line::from(Span::styled(
                format!(
                    "● training since {}",
                    session.start_time.with_timezone(&app.ctx.tz).format("%H:%M")
                ),
                Style::default().fg(Color::Rgb(255, 77, 0)),
            )),
            None => Line::from(""),
        },
    };
    Paragraph::new(line).alignment(Alignment::Center)
}

fn weekday_header() -> Paragraph<'static> {
    let spans: Vec<Span> = WEEKDAY_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let color = match i {
                0 => Color::Red,
                6 => Color::Blue,
                _ => Color::Gray,
            };
            Span::styled(
                format!("{:^width$}", label, width = CELL_WIDTH),
                Style::default().fg(color),
            )
        })
        .collect();
    Paragraph::new(Line::from(spans)).alignment(Alignment::Center)
}

pub fn cell_style(cell: &DayCell, today: NaiveDate) -> Style {
    let mut style = Style::default()
        .bg(intensity_color(cell.intensity))
        .fg(Color::Black);
    if !cell.in_target_month {
        style = style.fg(Color::DarkGray).add_modifier(Modifier::DIM);
    }
    if cell.date == today {
        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    }
    style
}

fn render_weeks(frame: &mut Frame, area: Rect, grid: &MonthGrid, today: NaiveDate) {
    let lines: Vec<Line> = grid
        .weeks
        .iter()
        .map(|week| {
            let spans: Vec<Span> = week
                .iter()
                .flat_map(|cell| {
                    [
                        Span::styled(
                            format!(" {:>2} ", chrono::Datelike::day(&cell.date)),
                            cell_style(cell, today),
                        ),
                        Span::raw(" "),
                    ]
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn legend() -> Paragraph<'static> {
    let mut spans = vec![Span::raw("Less ")];
    for minutes in Intensity::LEGEND_SAMPLES {
        let color = intensity_color(Intensity::from_minutes(minutes));
        spans.push(Span::styled("■", Style::default().fg(color)));
    }
    spans.push(Span::raw(" More"));
    Paragraph::new(Line::from(spans)).alignment(Alignment::Center)
}

fn summary_line(app: &App<'_>, grid: &MonthGrid) -> Paragraph<'static> {
    let summary = month_summary(grid);
    let mut text = format!(
        "{} this month · {} active days · {} days overall",
        format_minutes(summary.total_minutes),
        summary.active_days,
        format_number(app.daily.active_days() as u64, &app.format_options),
    );
    if let Some((date, minutes)) = summary.best_day {
        text.push_str(&format!(
            " · best {} ({})",
            format_date_for_display(date, app.today),
            format_minutes(u64::from(minutes))
        ));
    }
    Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::Gray),
    )))
    .alignment(Alignment::Center)
}
