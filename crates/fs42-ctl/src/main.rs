mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use fs42_proto::config::Config;
use fs42_proto::protocol::{Channel, ImportAction, StationConf};
use fs42_proto::schedule::{Day, Schedule, Slot, SlotAddr};
use fs42_store::{ChannelStore, Directory, StoreEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()
        .with_context(|| format!("failed to load {}", Config::config_path().display()))?;
    if let Some(url) = cli.api_url.clone() {
        config.backend.base_url = url;
    }

    let log_path = init_logging(&config.paths.log_dir)?;
    eprintln!("fs42ctl log: {}", log_path.display());
    info!("fs42ctl starting, backend {}", config.backend.base_url);

    let store = ChannelStore::new(&config).context("failed to set up channel store")?;
    let result = run(&store, cli.command, cli.json).await;
    store.shutdown();
    result
}

fn init_logging(log_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("fs42ctl.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    // HTTP client internals are noisy at debug.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,fs42_store=debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    Ok(log_path)
}

async fn run(store: &ChannelStore, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Channels => {
            let dir = store.list_channels().await?;
            print_directory(&dir, json)?;
        }
        Command::Create { network_type, name } => {
            let conf = match store.get_baseline(&network_type).await? {
                Some(baseline) => baseline,
                None => {
                    warn!("no baseline for {:?}, creating from scratch", network_type);
                    let mut conf = StationConf::default();
                    conf.insert("network_type", network_type.as_str());
                    conf
                }
            }
            .with_network_name(name.as_str());
            let dir = store.create_channel(&conf).await?;
            report_change(&dir, &name);
        }
        Command::Update { old_name, conf } => {
            let conf: StationConf = read_json(&conf)?;
            let name = conf.network_name().unwrap_or(&old_name).to_string();
            let dir = store.update_channel(&old_name, &conf).await?;
            report_change(&dir, &name);
        }
        Command::Rename { old_name, new_name } => {
            let dir = store.rename_channel(&old_name, &new_name).await?;
            report_change(&dir, &new_name);
        }
        Command::Delete { name } => {
            let dir = store.delete_channel(&name).await?;
            if dir.contains(&name) {
                bail!("{:?} is still listed after delete", name);
            }
            println!("deleted {:?} ({} channels left)", name, dir.len());
        }
        Command::Normalize => {
            let dir = store.normalize_channels().await?;
            print_directory(&dir, json)?;
        }
        Command::Baseline { network_type } => match store.get_baseline(&network_type).await? {
            Some(conf) => print_json(&conf)?,
            None => bail!("no baseline for network type {:?}", network_type),
        },
        Command::Schedule { name } => {
            let schedule = store.get_schedule(&name).await?;
            if json {
                print_json(&schedule)?;
            } else {
                print_schedule(&schedule);
            }
        }
        Command::ReplaceSchedule { name, file } => {
            let schedule: Schedule = read_json(&file)?;
            for tag in schedule.undeclared_tags() {
                warn!("slot tag {:?} is not declared in the schedule's tags", tag);
            }
            store.replace_schedule(&name, &schedule).await?;
            println!("replaced schedule of {:?} ({} slots)", name, schedule.grid.len());
        }
        Command::Patch {
            name,
            day,
            hour,
            tag,
            content,
        } => {
            let mut slot = tag.map(Slot::tagged).unwrap_or_else(Slot::off_air);
            if let Some(content) = content {
                slot = slot.with_content(content);
            }
            let addr = SlotAddr::new(day, hour);
            store.patch_slot(&name, addr, &slot).await?;
            println!("{} {}: {}", name, addr, slot.tag().unwrap_or("off air"));
        }
        Command::Bumps { name } => {
            let files = store.list_bump_files(&name).await?;
            if json {
                print_json(&files)?;
            } else {
                for file in &files {
                    println!("{}", file.file_name());
                }
            }
        }
        Command::RuntimeFiles => {
            let files = store.list_runtime_files().await?;
            if json {
                print_json(&files)?;
            } else {
                for file in &files {
                    println!("{}", file);
                }
            }
        }
        Command::Import {
            name,
            target,
            move_files,
            files,
        } => {
            let action = if move_files {
                ImportAction::Move
            } else {
                ImportAction::Copy
            };
            let outcome = store.import_files(&name, files, &target, action).await?;
            if json {
                print_json(&outcome)?;
            } else {
                for file in &outcome.files {
                    println!("{}", file);
                }
            }
        }
        Command::LaunchScanner => match store.launch_scanner().await? {
            Some(launch) => println!("{}", launch.url),
            None => bail!("scanner did not start"),
        },
        Command::HotStart => {
            store.hot_start().await?;
            println!("hot start requested");
        }
        Command::Watch { interval } => watch(store, Duration::from_secs(interval.max(1)), json).await?,
    }
    Ok(())
}

/// Refresh on a timer and print every directory the store publishes until
/// interrupted.
async fn watch(store: &ChannelStore, every: Duration, json: bool) -> anyhow::Result<()> {
    let mut events = store.subscribe();
    let mut ticker = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("watch interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {
                let poller = store.clone();
                tokio::spawn(async move {
                    if let Err(e) = poller.list_channels().await {
                        warn!("watch refresh failed: {}", e);
                    }
                });
            }
            evt = events.recv() => match evt {
                Ok(StoreEvent::DirectoryUpdated { rev }) => {
                    let dir = store.directory().await;
                    if dir.rev == rev {
                        print_directory(&dir, json)?;
                    }
                }
                Ok(StoreEvent::SyncStateChanged(state)) => {
                    info!("sync state {:?}", state);
                }
                Err(RecvError::Lagged(n)) => warn!("watch lagged by {} events", n),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_change(dir: &Directory, name: &str) {
    match dir.find(name) {
        Some(channel) => println!("{} ({} channels)", describe(channel), dir.len()),
        None => println!("{:?} not listed after reload", name),
    }
}

fn describe(channel: &Channel) -> String {
    let kind = channel
        .station_conf
        .get("network_type")
        .and_then(|v| v.as_str())
        .unwrap_or("?");
    format!("{} [{}]", channel.name, kind)
}

fn print_directory(dir: &Directory, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&dir.channels);
    }
    if dir.degraded {
        println!("(directory incomplete, see log)");
    }
    for channel in &dir.channels {
        if channel.empty_folders.is_empty() {
            println!("{}", describe(channel));
        } else {
            println!(
                "{}  empty: {}",
                describe(channel),
                channel.empty_folders.join(", ")
            );
        }
    }
    Ok(())
}

fn print_schedule(schedule: &Schedule) {
    if schedule.is_empty() {
        println!("(no schedule)");
        return;
    }
    for day in Day::ALL {
        let slots: Vec<_> = schedule.grid.day(day).collect();
        if slots.is_empty() {
            continue;
        }
        println!("{}", day);
        for (hour, slot) in slots {
            let tag = slot.tag().unwrap_or("off air");
            let color = schedule.color_for(tag).unwrap_or("-");
            match &slot.content {
                Some(content) => println!("  {:>2}:00  {} ({})  {}", hour.value(), tag, color, content),
                None => println!("  {:>2}:00  {} ({})", hour.value(), tag, color),
            }
        }
    }
}
