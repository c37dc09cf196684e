use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::context::AppContext;
use crate::types::{Intensity, ProfileColor, ProfileUpdate, UserId, YearMonth};

mod calendar;
mod carousel;
mod config;
mod context;
mod debug_log;
mod heatmap;
mod mcp;
mod store;
mod tui;
mod types;
mod utils;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "trainmap")]
#[command(version)]
#[command(about = "Log training sessions and browse them as a monthly heatmap")]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use comma-separated number formatting
    #[arg(long, global = true)]
    number_comma: bool,

    /// Locale for number formatting (en, de, fr, es, it, ja, ko, zh)
    #[arg(long, global = true)]
    locale: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a training session now
    Start,
    /// Finish the training session in progress
    Finish(FinishArgs),
    /// Show the session in progress and today's minutes
    Status,
    /// Browse the monthly heatmap (default)
    Heatmap(HeatmapArgs),
    /// Output a month grid as JSON
    Grid(GridArgs),
    /// Output minutes per day as JSON
    Stats(StatsArgs),
    /// Show or edit profiles
    Profile(ProfileArgs),
    /// Follow another user
    Follow {
        /// User ID to follow
        user: String,
    },
    /// Stop following a user
    Unfollow {
        /// User ID to unfollow
        user: String,
    },
    /// List followed users
    Following,
    /// Manage configuration
    Config(ConfigArgs),
    /// Run as an MCP (Model Context Protocol) server
    Mcp,
}

#[derive(Args)]
struct FinishArgs {
    /// Session ID to finish. Defaults to the most recent unfinished session.
    #[arg(long)]
    session: Option<String>,
}

#[derive(Args, Default)]
struct HeatmapArgs {
    /// Month to open (YYYY-MM). Defaults to the current month.
    #[arg(long)]
    month: Option<YearMonth>,

    /// Open another user's heatmap
    #[arg(long)]
    user: Option<String>,
}

#[derive(Args)]
struct GridArgs {
    /// Month to build (YYYY-MM). Defaults to the current month.
    #[arg(long)]
    month: Option<YearMonth>,

    /// Whose sessions fill the grid. Defaults to the configured user.
    #[arg(long)]
    user: Option<String>,

    /// Pretty-print JSON instead of a single line
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Whose sessions to aggregate. Defaults to the configured user.
    #[arg(long)]
    user: Option<String>,

    /// Pretty-print JSON instead of a single line
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct ProfileArgs {
    #[command(subcommand)]
    subcommand: ProfileSubcommands,
}

#[derive(Subcommand)]
enum ProfileSubcommands {
    /// Show a profile. Defaults to your own.
    Show {
        /// User ID
        user: Option<String>,
    },
    /// Set a field of your own profile
    Set {
        /// Profile key (name, email, place, height, weight, color)
        key: String,
        /// Profile value
        value: String,
    },
    /// Delete your own profile
    Delete,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (user-id, user-name, db-path, timezone, locale, number-comma)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    debug_log::init();
    let cli = Cli::parse();

    let config = Config::load_or_default();

    let mut format_options = config.format_options();
    format_options.use_comma |= cli.number_comma;
    if let Some(locale) = cli.locale {
        format_options.locale = locale;
    }

    let result = match cli.command {
        None => run_heatmap(&config, HeatmapArgs::default(), format_options),
        Some(Commands::Heatmap(args)) => run_heatmap(&config, args, format_options),
        Some(Commands::Start) => run_start(&config),
        Some(Commands::Finish(args)) => run_finish(&config, args),
        Some(Commands::Status) => run_status(&config),
        Some(Commands::Grid(args)) => run_grid(&config, args),
        Some(Commands::Stats(args)) => run_stats(&config, args),
        Some(Commands::Profile(args)) => run_profile(&config, args),
        Some(Commands::Follow { user }) => run_follow(&config, &user, true),
        Some(Commands::Unfollow { user }) => run_follow(&config, &user, false),
        Some(Commands::Following) => run_following(&config),
        Some(Commands::Config(config_args)) => {
            handle_config_subcommand(config_args);
            Ok(())
        }
        Some(Commands::Mcp) => mcp::run_mcp_server().await.context("MCP server error"),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn subject(ctx: &AppContext, user: Option<String>) -> UserId {
    match user.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(user) => UserId::new(user),
        None => ctx.user.clone(),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        simd_json::to_string_pretty(value)?
    } else {
        simd_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn run_heatmap(
    config: &Config,
    args: HeatmapArgs,
    format_options: utils::NumberFormatOptions,
) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let focus = args.user.map(UserId::new);
    tui::run_tui(&ctx, args.month, focus, format_options).context("Error displaying TUI")
}

fn run_start(config: &Config) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    if let Some(active) = ctx.store.active_session(&ctx.user)? {
        utils::warn_once(format!(
            "⚠️  Session {} is still in progress; starting another",
            active.id
        ));
    }
    let id = ctx.store.start_training(&ctx.user)?;
    println!("🏃 Training started ({id})");
    println!("   Finish with: trainmap finish");
    Ok(())
}

fn run_finish(config: &Config, args: FinishArgs) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let id = match args.session {
        Some(id) => types::SessionId(id),
        None => ctx
            .store
            .active_session(&ctx.user)?
            .map(|s| s.id)
            .context("No training in progress. Start one with `trainmap start`")?,
    };

    ctx.store.finish_training(&ctx.user, &id)?;

    let minutes = ctx
        .store
        .list_sessions(&ctx.user)?
        .into_iter()
        .find(|s| s.id == id)
        .and_then(|s| s.duration_minutes())
        .unwrap_or(0)
        .max(0);
    println!(
        "✅ Training finished: {}",
        utils::format_minutes(minutes as u64)
    );
    Ok(())
}

fn run_status(config: &Config) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let today = calendar::today(ctx.tz);
    let daily = ctx.daily_minutes_for(&ctx.user)?;
    let minutes = daily.minutes_on(today);

    println!("📅 {}", utils::format_date_for_display(today, today));
    match ctx.store.active_session(&ctx.user)? {
        Some(active) => {
            let elapsed = (chrono::Utc::now() - active.start_time).num_minutes().max(0);
            println!(
                "   In progress since {} ({})",
                active.start_time.with_timezone(&ctx.tz).format("%H:%M"),
                utils::format_minutes(elapsed as u64)
            );
        }
        None => println!("   No training in progress"),
    }
    println!(
        "   Today: {} ({})",
        utils::format_minutes(u64::from(minutes)),
        Intensity::from_minutes(minutes)
    );

    let grid = calendar::build_grid(ctx.current_month(), &daily);
    println!(
        "   {}: {}",
        grid.month.label(),
        utils::format_minutes(grid.target_month_minutes())
    );
    Ok(())
}

fn run_grid(config: &Config, args: GridArgs) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let month = args.month.unwrap_or_else(|| ctx.current_month());
    let user = subject(&ctx, args.user);
    let grid = ctx.grid_for(&user, month)?;
    print_json(&grid, args.pretty)
}

fn run_stats(config: &Config, args: StatsArgs) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let user = subject(&ctx, args.user);
    let daily = ctx.daily_minutes_for(&user)?;
    print_json(&daily.entries(), args.pretty)
}

fn run_profile(config: &Config, args: ProfileArgs) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    match args.subcommand {
        ProfileSubcommands::Show { user } => {
            let user = subject(&ctx, user);
            match ctx.store.get_profile(&user)? {
                Some(profile) => {
                    println!("👤 {} ({})", profile.display_name(), profile.user_id);
                    println!("   Place: {}", profile.display_place());
                    if let Some(email) = &profile.email {
                        println!("   Email: {email}");
                    }
                    if let Some(height) = profile.height_cm {
                        println!("   Height: {height} cm");
                    }
                    if let Some(weight) = profile.weight_kg {
                        println!("   Weight: {weight} kg");
                    }
                    println!("   Color: {}", profile.color());
                    if ctx.store.is_following(&ctx.user, &user)? {
                        println!("   Following ✓");
                    }
                }
                None => println!("❌ No profile for '{user}'"),
            }
        }
        ProfileSubcommands::Set { key, value } => {
            let update = profile_update(&key, &value)?;
            let profile = ctx.store.upsert_profile(&ctx.user, update)?;
            println!("✅ Profile updated for {}", profile.display_name());
        }
        ProfileSubcommands::Delete => {
            if ctx.store.delete_profile(&ctx.user)? {
                println!("✅ Profile deleted for {}", ctx.user);
            } else {
                println!("No profile to delete for {}", ctx.user);
            }
        }
    }
    Ok(())
}

fn profile_update(key: &str, value: &str) -> Result<ProfileUpdate> {
    let mut update = ProfileUpdate::default();
    match key {
        "name" => update.name = Some(value.to_string()),
        "email" => update.email = Some(value.to_string()),
        "place" => update.place = Some(value.to_string()),
        "height" => {
            update.height_cm = Some(
                value
                    .parse::<f64>()
                    .context("Invalid height. Use centimetres, e.g. 172.5")?,
            );
        }
        "weight" => {
            update.weight_kg = Some(
                value
                    .parse::<f64>()
                    .context("Invalid weight. Use kilograms, e.g. 64")?,
            );
        }
        "color" => update.profile_color = Some(value.parse::<ProfileColor>()?),
        _ => anyhow::bail!("Unknown profile key: {}", key),
    }
    Ok(update)
}

fn run_follow(config: &Config, user: &str, follow: bool) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let target = UserId::new(user.trim());
    if follow {
        ctx.store.follow(&ctx.user, &target)?;
        println!("✅ Following {target}");
    } else if ctx.store.unfollow(&ctx.user, &target)? {
        println!("✅ Unfollowed {target}");
    } else {
        println!("You were not following {target}");
    }
    Ok(())
}

fn run_following(config: &Config) -> Result<()> {
    let ctx = AppContext::from_config(config)?;
    let carousel = ctx.carousel()?;
    if carousel.is_empty() {
        println!("You're not following anyone yet");
        return Ok(());
    }
    for profile in carousel.entries() {
        println!(
            "{:<20} {:<16} {}",
            profile.user_id,
            profile.display_name(),
            profile.display_place()
        );
    }
    Ok(())
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e}");
                std::process::exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn heatmap_is_the_default_command() {
        let cli = Cli::try_parse_from(["trainmap"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn month_flags_parse_into_year_month() {
        let cli = Cli::try_parse_from(["trainmap", "grid", "--month", "2025-03", "--pretty"])
            .expect("parse");
        match cli.command {
            Some(Commands::Grid(args)) => {
                assert_eq!(args.month, YearMonth::new(2025, 3));
                assert!(args.pretty);
            }
            _ => panic!("expected grid"),
        }

        assert!(Cli::try_parse_from(["trainmap", "heatmap", "--month", "2025-13"]).is_err());
    }

    #[test]
    fn profile_delete_parses() {
        let cli = Cli::try_parse_from(["trainmap", "profile", "delete"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Profile(ProfileArgs {
                subcommand: ProfileSubcommands::Delete
            }))
        ));
        assert!(Cli::try_parse_from(["trainmap", "profile", "delete", "someone"]).is_err());
    }

    #[test]
    fn profile_update_parses_known_keys() {
        assert_eq!(
            profile_update("name", "Jane").expect("name").name.as_deref(),
            Some("Jane")
        );
        assert_eq!(
            profile_update("weight", "58.5").expect("weight").weight_kg,
            Some(58.5)
        );
        assert_eq!(
            profile_update("color", "green")
                .expect("color")
                .profile_color,
            Some(ProfileColor::Green)
        );
        assert!(profile_update("height", "tall").is_err());
        assert!(profile_update("shoe-size", "42").is_err());
    }
}
