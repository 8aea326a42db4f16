//! `bookable` CLI — compute availability, resolve booking rules, and run the
//! expiry sweep over JSON snapshots from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Month view availability for a resource snapshot (stdin → stdout)
//! bookable availability --from 2024-01-01T00:00:00Z --to 2024-01-31T00:00:00Z --view month < resource.json
//!
//! # Day view from file to file
//! bookable availability -i resource.json -o days.json \
//!     --from 2024-01-01T00:00:00Z --to 2024-01-02T00:00:00Z --view day
//!
//! # Is a specific window bookable?
//! bookable check -i resource.json --start 2024-01-01T10:00:00Z --end 2024-01-01T12:00:00Z
//!
//! # Effective policy for a resource at a point in time
//! bookable resolve-rules -i rules.json --resource res_room_1 --at 2024-01-01T09:00:00Z
//!
//! # Cancel expired holds in an allocation snapshot
//! bookable sweep -i allocations.json --now 2024-01-01T12:00:00Z
//! ```

use anyhow::{Context, Result};
use bookable_core::lifecycle::AllocationLifecycle;
use bookable_core::model::{Allocation, Resource};
use bookable_core::projector::{get_availability, is_window_available, CalendarView};
use bookable_core::rules::{resolve_rules, BookingRule, ResolutionContext};
use bookable_core::store::{
    AllocationFilter, AllocationStore, MemoryLockProvider, MemoryStore, SystemClock,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::{self, Read};

#[derive(Parser)]
#[command(
    name = "bookable",
    version,
    about = "Layered availability engine for bookable resources"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute calendar availability from a resource snapshot
    Availability {
        /// Input resource JSON (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Window start (RFC 3339, e.g. 2024-01-01T00:00:00Z)
        #[arg(long)]
        from: String,
        /// Window end (RFC 3339)
        #[arg(long)]
        to: String,
        /// Calendar granularity: month, week, or day
        #[arg(long, default_value = "month")]
        view: String,
    },
    /// Check whether a window is fully bookable
    Check {
        /// Input resource JSON (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Window start (RFC 3339)
        #[arg(long)]
        start: String,
        /// Window end (RFC 3339)
        #[arg(long)]
        end: String,
    },
    /// Resolve the effective booking policy from a rules snapshot
    ResolveRules {
        /// Input rules JSON array (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Resolve for a specific resource id
        #[arg(long)]
        resource: Option<String>,
        /// Evaluation time (RFC 3339; defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Cancel expired holds in an allocations snapshot
    Sweep {
        /// Input allocations JSON array (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Sweep time (RFC 3339; defaults to now)
        #[arg(long)]
        now: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Availability {
            input,
            output,
            from,
            to,
            view,
        } => {
            let resource: Resource = read_json(input.as_deref())
                .context("Failed to parse resource snapshot")?;
            let from = parse_time(&from)?;
            let to = parse_time(&to)?;
            let view = parse_view(&view)?;

            let days = get_availability(&resource, from, to, view);
            write_output(output.as_deref(), &serde_json::to_string_pretty(&days)?)?;
        }
        Commands::Check { input, start, end } => {
            let resource: Resource = read_json(input.as_deref())
                .context("Failed to parse resource snapshot")?;
            let start = parse_time(&start)?;
            let end = parse_time(&end)?;

            let available = is_window_available(&resource, start, end);
            println!("Resource:  {}", resource.id);
            println!("Window:    {} -> {}", start.to_rfc3339(), end.to_rfc3339());
            println!("Available: {}", if available { "yes" } else { "no" });
        }
        Commands::ResolveRules {
            input,
            output,
            resource,
            at,
        } => {
            let rules: Vec<BookingRule> =
                read_json(input.as_deref()).context("Failed to parse rules snapshot")?;
            let evaluation_time = match at.as_deref() {
                Some(raw) => parse_time(raw)?,
                None => Utc::now(),
            };
            let ctx = ResolutionContext {
                booking_resource_id: resource,
                evaluation_time,
            };

            let resolved = resolve_rules(&rules, &ctx);
            write_output(output.as_deref(), &serde_json::to_string_pretty(&resolved)?)?;
        }
        Commands::Sweep { input, output, now } => {
            let allocations: Vec<Allocation> =
                read_json(input.as_deref()).context("Failed to parse allocations snapshot")?;
            let now = match now.as_deref() {
                Some(raw) => parse_time(raw)?,
                None => Utc::now(),
            };

            let store = MemoryStore::new();
            for allocation in allocations {
                store.insert_allocation(allocation)?;
            }
            let lifecycle =
                AllocationLifecycle::new(store, MemoryLockProvider::new(), SystemClock);

            let report = lifecycle.sweep_expired_holds(now)?;
            let remaining = lifecycle
                .store()
                .allocations(&AllocationFilter::default())?;

            let result = serde_json::json!({
                "report": report,
                "allocations": remaining,
            });
            write_output(output.as_deref(), &serde_json::to_string_pretty(&result)?)?;
        }
    }

    Ok(())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse()
        .with_context(|| format!("Invalid timestamp: '{}' (expected RFC 3339)", raw))
}

fn parse_view(raw: &str) -> Result<CalendarView> {
    match raw {
        "month" => Ok(CalendarView::Month),
        "week" => Ok(CalendarView::Week),
        "day" => Ok(CalendarView::Day),
        other => {
            anyhow::bail!("Unknown view: '{}'. Available views: month, week, day", other)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: Option<&str>) -> Result<T> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).map_err(Into::into)
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
