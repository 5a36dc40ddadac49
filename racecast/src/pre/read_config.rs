use crate::core::stage::{build_stages, Stage, StagePars};
use anyhow::Context;
use encoding_rs::Encoding;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// * `race_name` - Name of the race, sent with every status event
/// * `race_file` - Path to the race file written by the timing system
/// * `route_file` - Path to the GPX route file
/// * `encoding` - Text encoding of the race file
/// * `tick_step` - Time acceleration of the race (1 for a real race)
/// * `default_pace` - (s/km) Pace assumed before the first checkpoint
/// * `poll_interval` - (s) Delay between two reads of the race file
/// * `stages` - Ordered stage descriptors
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastConfig {
    pub race_name: String,
    pub race_file: PathBuf,
    pub route_file: PathBuf,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_tick_step")]
    pub tick_step: f64,
    #[serde(default = "default_pace")]
    pub default_pace: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    pub stages: Vec<StagePars>,
}

fn default_encoding() -> String {
    "utf-8".to_owned()
}

fn default_tick_step() -> f64 {
    1.0
}

fn default_pace() -> f64 {
    300.0
}

fn default_poll_interval() -> f64 {
    2.0
}

impl BroadcastConfig {
    /// validate checks the configured values and returns the stage sequence.
    pub fn validate(&self) -> anyhow::Result<Vec<Stage>> {
        if self.race_name.trim().is_empty() {
            anyhow::bail!("raceName must not be empty!");
        }
        if !(self.tick_step > 0.0) {
            anyhow::bail!("tickStep must be strictly positive, got {}!", self.tick_step);
        }
        if !(self.default_pace > 0.0) {
            anyhow::bail!("defaultPace must be strictly positive, got {}!", self.default_pace);
        }
        if !(self.poll_interval >= 0.0) || !self.poll_interval.is_finite() {
            anyhow::bail!("pollInterval must be positive, got {}!", self.poll_interval);
        }
        let is_gpx = self
            .route_file
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("gpx"));
        if !is_gpx {
            anyhow::bail!("routeFile must be a .gpx file, got {}!", self.route_file.display());
        }
        if Encoding::for_label(self.encoding.trim().as_bytes()).is_none() {
            anyhow::bail!("Unknown encoding {}!", self.encoding);
        }

        build_stages(&self.stages).context("Invalid stages in configuration!")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }
}

/// read_config reads the JSON file and decodes the JSON string into the broadcast configuration.
pub fn read_config(filepath: &Path) -> anyhow::Result<BroadcastConfig> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open configuration file {}!",
            filepath.display()
        ))?;
    let config = serde_json::from_reader(&fh).context(format!(
        "Failed to parse configuration file {}!",
        filepath.display()
    ))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"{
        "raceName": "Raid du Blanc",
        "raceFile": "race.txt",
        "routeFile": "route.gpx",
        "encoding": "windows-1252",
        "stages": [
            { "name": "Trail", "length": 12000, "timed": true },
            { "name": "Transfer", "length": 800, "timed": false },
            { "name": "Canoe", "length": 6000, "timed": true }
        ]
    }"#;

    fn parse(json: &str) -> BroadcastConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(CONFIG);
        assert_eq!(config.tick_step, 1.0);
        assert_eq!(config.default_pace, 300.0);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));

        let stages = config.validate().unwrap();
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[2].dst_from_start, 12800.0);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = parse(CONFIG);
        config.default_pace = 0.0;
        assert!(config.validate().is_err());

        let mut config = parse(CONFIG);
        config.tick_step = -1.0;
        assert!(config.validate().is_err());

        let mut config = parse(CONFIG);
        config.encoding = "no-such-encoding".to_owned();
        assert!(config.validate().is_err());

        let mut config = parse(CONFIG);
        config.route_file = PathBuf::from("route.csv");
        assert!(config.validate().is_err());

        let mut config = parse(CONFIG);
        config.stages.swap(0, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.race_name, "Raid du Blanc");
        assert_eq!(config.encoding, "windows-1252");
    }

    #[test]
    fn test_read_config_errors() {
        assert!(read_config(Path::new("does/not/exist.json")).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ \"raceName\": 3 }").unwrap();
        assert!(read_config(file.path()).is_err());
    }
}
