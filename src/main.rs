use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use epg_sync::{
    config::CacheType,
    logging,
    models::{event::default_placeholder, Event, Millis},
    Epg, EpgConfig,
};

#[derive(Parser)]
#[command(name = "epg-sync")]
#[command(version)]
#[command(about = "EPG event cache and channel-list synchronisation engine")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "epg-sync.toml")]
    config: String,

    /// Persistent cache URL; switches the cache type to persistent
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh and list channels
    Channels {
        #[arg(long, value_enum, default_value_t = Category::All)]
        category: Category,
    },
    /// Fetch events for services over a window
    Events {
        #[arg(required = true)]
        service_ids: Vec<String>,
        /// Window start in epoch milliseconds (default: now)
        #[arg(long)]
        start: Option<Millis>,
        /// Window length, e.g. "3h"
        #[arg(long, default_value = "3h", value_parser = humantime::parse_duration)]
        duration: Duration,
        /// Fill gaps with placeholders
        #[arg(long)]
        padded: bool,
    },
    /// Current and next event per service (all channels when none given)
    Now { service_ids: Vec<String> },
    /// Run one expiry sweep
    Sweep,
    /// Keep the cache maintained until interrupted
    Run,
}

#[derive(Clone, Copy, ValueEnum)]
enum Category {
    All,
    Subscribed,
    Radio,
    Video,
    Ip,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    info!("Starting epg-sync v{}", env!("CARGO_PKG_VERSION"));

    let mut config = EpgConfig::load(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        config.cache_type = CacheType::Persistent;
        config.database_url = database_url;
    }

    let epg = Arc::new(Epg::init(config).await?);

    match cli.command {
        Command::Channels { category } => {
            epg.refresh(false).await?;
            let channels = match category {
                Category::All => epg.get_all_channels(),
                Category::Subscribed => epg.get_subscribed_channels(),
                Category::Radio => epg.get_radio_channels(),
                Category::Video => epg.get_video_channels(),
                Category::Ip => epg.get_ip_channels(),
            };
            for channel in channels {
                println!(
                    "{:>5}  {:<24} {:<10} {:?}/{:?}{}",
                    channel.logical_channel_num,
                    channel.name,
                    channel.service_id,
                    channel.service_type,
                    channel.delivery_method,
                    if channel.is_subscribed { "" } else { "  (not subscribed)" }
                );
            }
        }
        Command::Events {
            service_ids,
            start,
            duration,
            padded,
        } => {
            let start = start.unwrap_or_else(|| Utc::now().timestamp_millis());
            let end = start + Millis::try_from(duration.as_millis())?;
            if padded {
                let rows = epg
                    .fetch_events_by_window_padded(&service_ids, start, end, default_placeholder)
                    .await;
                for (service_id, row) in service_ids.iter().zip(rows) {
                    println!("{service_id}");
                    for cell in row {
                        let title = match &cell.event {
                            Event::Real(event) => event.title.as_str(),
                            Event::Placeholder(_) => "(no information)",
                        };
                        println!(
                            "  {} - {}  {}",
                            format_time(cell.display_start_time),
                            format_time(cell.display_end_time),
                            title
                        );
                    }
                }
            } else {
                let events = epg.fetch_events_by_window(&service_ids, start, end).await;
                println!("{}", serde_json::to_string_pretty(&events)?);
            }
        }
        Command::Now { service_ids } => {
            epg.refresh(false).await?;
            let service_ids = if service_ids.is_empty() {
                epg.get_service_id_array()
            } else {
                service_ids
            };
            for service_id in service_ids {
                let current = epg.fetch_current_event_for_service(&service_id).await;
                let next = epg.fetch_next_event_for_service(&service_id).await;
                println!(
                    "{:<10} now: {:<32} next: {}",
                    service_id,
                    current.map(|e| e.title).unwrap_or_else(|| "-".to_string()),
                    next.map(|e| e.title).unwrap_or_else(|| "-".to_string())
                );
            }
        }
        Command::Sweep => {
            let removed = epg.sweep_expired().await?;
            println!("Removed {removed} expired events");
        }
        Command::Run => {
            epg.refresh(true).await?;
            let sweeper = epg.start_sweeper();
            let listener = epg.start_push_listener();
            info!(
                "Maintaining EPG cache for {} channels, press Ctrl-C to stop",
                epg.get_service_id_array().len()
            );

            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            sweeper.abort();
            if let Some(listener) = listener {
                listener.abort();
            }
        }
    }

    Ok(())
}

fn format_time(millis: Millis) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}
