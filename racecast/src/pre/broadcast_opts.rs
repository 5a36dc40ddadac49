use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "racecast",
    about = "Broadcasts the live state of a multi-stage race from the timing system's race file"
)]
pub struct BroadcastOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the JSON configuration file
    #[clap(short, long, default_value = "config.json")]
    pub config_path: PathBuf,

    /// Override the time acceleration of the configuration (1 for a real race)
    #[clap(short, long)]
    pub tick_step: Option<f64>,

    /// Override the delay in seconds between two reads of the race file
    #[clap(short, long)]
    pub poll_interval: Option<f64>,
}
