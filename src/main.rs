use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use box_scheduler::commands::{self, BookArgs, Env};
use box_scheduler::settings::{FontSize, Theme};
use box_scheduler::web;

/// Box scheduler: find free consultation boxes, book them and follow changes live.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print detailed API responses
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show free intervals and bookable start times of one box
    ///
    /// Examples:
    ///   free --box 3 --date 2026-10-20
    ///   free --box 3 --date 2026-10-20 --from 10:00
    Free {
        /// Box id
        #[arg(short = 'b', long = "box")]
        box_id: u32,

        /// Day to inspect (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Also list valid end times for this start time
        #[arg(long)]
        from: Option<String>,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Book a box for a time range
    ///
    /// Without --box the first configured box that is free for the whole
    /// range is used.
    Book {
        /// Day to book (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Start time (HH:MM)
        #[arg(long)]
        start: String,

        /// End time (HH:MM)
        #[arg(long)]
        end: String,

        /// Box id
        #[arg(short = 'b', long = "box")]
        box_id: Option<u32>,

        /// Person responsible for the booking
        #[arg(short = 'r', long)]
        responsible: String,

        /// Free-form notes
        #[arg(short = 'n', long)]
        notes: Option<String>,

        /// Dry run: pick a box but do not submit the booking
        #[arg(short = 'd', long)]
        dry_run: bool,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Release (delete) a booking
    Release {
        /// Booking id
        #[arg(value_name = "ID")]
        id: u64,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// List bookings for a day, marking overlapping ones
    Bookings {
        /// Day to list (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Restrict to one box
        #[arg(short = 'b', long = "box")]
        box_id: Option<u32>,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Report overlapping bookings within the same box
    Conflicts {
        /// Day to check (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Restrict to one box
        #[arg(short = 'b', long = "box")]
        box_id: Option<u32>,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Show occupancy of every configured box
    Status {
        /// Day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Time of day (HH:MM, defaults to now)
        #[arg(long)]
        at: Option<String>,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Occupancy statistics per box over one or more days
    ///
    /// Examples:
    ///   stats --date 2026-10-20 --days 5
    ///   stats --box 3
    Stats {
        /// First day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Number of consecutive days
        #[arg(long, default_value_t = 1)]
        days: u32,

        /// Restrict to one box
        #[arg(short = 'b', long = "box")]
        box_id: Option<u32>,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Follow one box's availability through push notifications
    Watch {
        /// Box id
        #[arg(short = 'b', long = "box")]
        box_id: u32,

        /// Day to follow (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Start web dashboard server
    Serve {
        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,

        /// Listen address (e.g. "0.0.0.0:3000")
        #[arg(short = 'a', long, default_value = "0.0.0.0:3009")]
        addr: String,
    },

    /// Show or change display preferences
    Settings {
        #[arg(long, value_enum)]
        theme: Option<Theme>,

        #[arg(long, value_enum)]
        font_size: Option<FontSize>,

        /// Settings file
        #[arg(short = 'f', long, default_value = "settings.json")]
        file: PathBuf,
    },
}

fn date_or_today(raw: Option<&str>, env: &Env) -> Result<chrono::NaiveDate> {
    commands::resolve_date(raw, env.tz)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match &cli.command {
        Command::Free {
            box_id,
            date,
            from,
            config,
        } => {
            let env = Env::load(config)?;
            let date = date_or_today(date.as_deref(), &env)?;
            commands::run_free(&env, *box_id, date, from.as_deref()).await?;
        }
        Command::Book {
            date,
            start,
            end,
            box_id,
            responsible,
            notes,
            dry_run,
            config,
        } => {
            let env = Env::load(config)?;
            let date = date_or_today(Some(date.as_str()), &env)?;
            let args = BookArgs {
                date,
                start,
                end,
                box_id: *box_id,
                responsible,
                notes: notes.as_deref(),
                dry_run: *dry_run,
            };
            commands::run_book(&env, args).await?;
        }
        Command::Release { id, config } => {
            let env = Env::load(config)?;
            commands::run_release(&env, *id).await?;
        }
        Command::Bookings {
            date,
            box_id,
            config,
        } => {
            let env = Env::load(config)?;
            let date = date_or_today(date.as_deref(), &env)?;
            commands::run_bookings(&env, date, *box_id).await?;
        }
        Command::Conflicts {
            date,
            box_id,
            config,
        } => {
            let env = Env::load(config)?;
            let date = date_or_today(date.as_deref(), &env)?;
            commands::run_conflicts(&env, date, *box_id).await?;
        }
        Command::Status { date, at, config } => {
            let env = Env::load(config)?;
            let date = date_or_today(date.as_deref(), &env)?;
            commands::run_status(&env, date, at.as_deref()).await?;
        }
        Command::Stats {
            date,
            days,
            box_id,
            config,
        } => {
            let env = Env::load(config)?;
            let date = date_or_today(date.as_deref(), &env)?;
            commands::run_stats(&env, date, *days, *box_id).await?;
        }
        Command::Watch {
            box_id,
            date,
            config,
        } => {
            let env = Env::load(config)?;
            let date = date_or_today(date.as_deref(), &env)?;
            commands::run_watch(&env, *box_id, date).await?;
        }
        Command::Serve { config, addr } => {
            let env = Env::load(config)?;
            web::serve(env, config, addr).await?;
        }
        Command::Settings {
            theme,
            font_size,
            file,
        } => {
            commands::run_settings(file, *theme, *font_size)?;
        }
    }

    Ok(())
}
