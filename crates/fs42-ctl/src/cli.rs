use clap::{Parser, Subcommand};
use fs42_proto::schedule::{Day, Hour};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fs42ctl", version, about = "Manage FieldStation42 channels and schedules")]
pub struct Cli {
    /// Backend root, e.g. http://127.0.0.1:4343. Overrides config and FS42_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Print JSON instead of plain listings.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List channels with their empty content folders
    Channels,
    /// Create a channel from the backend's baseline for a network type
    Create {
        #[arg(long = "type", default_value = "standard")]
        network_type: String,
        #[arg(long)]
        name: String,
    },
    /// Replace a channel's station conf with the JSON object in a file
    Update {
        old_name: String,
        #[arg(long)]
        conf: PathBuf,
    },
    /// Rename a channel, keeping the rest of its conf
    Rename { old_name: String, new_name: String },
    /// Delete a channel
    Delete { name: String },
    /// Ask the backend to reconcile channel names and directories
    Normalize,
    /// Show the baseline station conf for a network type
    Baseline { network_type: String },
    /// Show a channel's weekly schedule
    Schedule { name: String },
    /// Overwrite a channel's whole schedule from a JSON file
    ReplaceSchedule {
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Set one slot; day is a weekday name or 0-6 (0 = Monday), hour 0-23
    Patch {
        name: String,
        day: Day,
        hour: Hour,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// List a channel's bump files
    Bumps { name: String },
    /// List video files in the backend's runtime directory
    RuntimeFiles,
    /// Copy or move files into a channel's content directory
    Import {
        name: String,
        #[arg(long)]
        target: String,
        #[arg(long = "move")]
        move_files: bool,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Start the catalog scanner and print its URL
    LaunchScanner,
    /// Restart playout with the current configuration
    HotStart,
    /// Print the directory every time it is refreshed
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
}
