use anyhow::Context;
use clap::Parser;
use racecast::core::handle_broadcast::handle_broadcast;
use racecast::core::race::Race;
use racecast::interfaces::transport_interface::{
    event_queue, Outbound, StopToken, EVENT_QUEUE_CAPACITY,
};
use racecast::pre::broadcast_opts::BroadcastOpts;
use racecast::pre::race_file::RaceFile;
use racecast::pre::read_config::read_config;
use racecast::pre::read_route::read_route;
use std::io::Write;
use std::thread;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    let opts: BroadcastOpts = BroadcastOpts::parse();
    init_logging(opts.debug);

    info!("Reading configuration from {:?}", opts.config_path);
    let mut config = read_config(&opts.config_path)?;
    if let Some(tick_step) = opts.tick_step {
        config.tick_step = tick_step;
    }
    if let Some(poll_interval) = opts.poll_interval {
        config.poll_interval = poll_interval;
    }
    let stages = config.validate()?;

    info!("Reading route from {:?}", config.route_file);
    let route = read_route(&config.route_file, &stages)?;

    let mut race = Race::new(
        &config.race_name,
        route,
        stages,
        config.tick_step,
        config.default_pace,
    )
    .context("Route does not match the configured stages!")?;
    let mut race_file = RaceFile::new(&config.race_file, &config.encoding)?;

    info!(
        "Broadcasting {} from {:?} every {}s (tick step {})",
        config.race_name, config.race_file, config.poll_interval, config.tick_step
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let (queue, handle) = event_queue(EVENT_QUEUE_CAPACITY);
    let stop = StopToken::new();

    let stop_handler = stop.clone();
    ctrlc::set_handler(move || stop_handler.stop())
        .context("Failed to install the Ctrl-C handler!")?;

    let poll_interval = config.poll_interval();
    let broadcaster = thread::spawn(move || {
        handle_broadcast(&mut race, &mut race_file, poll_interval, &queue, &stop)
    });

    // POST-PROCESSING -----------------------------------------------------------------------------
    let stdout = std::io::stdout();
    for item in handle.rx.iter() {
        match item {
            Outbound::Batch(batch) => {
                let line = serde_json::to_string(&batch).context("Failed to serialize events!")?;
                let mut out = stdout.lock();
                writeln!(out, "{}", line).context("Failed to write events!")?;
                out.flush().context("Failed to write events!")?;
            }
            Outbound::Closed => break,
        }
    }

    match broadcaster.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Broadcast thread panicked!"),
    }
}
