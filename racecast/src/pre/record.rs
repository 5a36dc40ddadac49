//! Field extraction for one row of the race file.
//!
//! Per-stage values are stored in runs of columns suffixed with a 1-based stage number. A run
//! ends at the first absent column, the first empty marker or the first value that cannot be
//! converted; the values read before that point are kept.

use crate::error::TrackerError;
use chrono::NaiveTime;
use std::collections::HashMap;

/// One row of the race file, keyed by column header.
pub type Record = HashMap<String, String>;

pub const BIB_NUMBER_COLUMN: &str = "Numéro";
pub const TEAM_NAME_COLUMN: &str = "Nom";
pub const DISTANCE_COLUMN: &str = "Distance";
pub const EMPTY_VALUE: &str = "0";

pub fn split_time_column(n: usize) -> String {
    format!("Interm (S{})", n)
}

pub fn stage_rank_column(n: usize) -> String {
    format!("Clt Interm-1 (S{})", n)
}

pub fn stage_start_column(n: usize) -> String {
    format!("2{}|1", n)
}

pub fn stage_end_column(n: usize) -> String {
    format!("3{}|1", n)
}

/// RawRecord contains the fields of one participant as found in a race file row. Timing runs
/// only describe timed stages.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub bib_number: u32,
    pub name: String,
    pub split_times: Vec<i64>,
    pub stage_ranks: Vec<u32>,
    pub stage_start_times: Vec<NaiveTime>,
    pub stage_end_times: Vec<NaiveTime>,
}

/// parse_record extracts the participant fields from a row. Only a missing or invalid bib
/// number rejects the row, truncated timing runs are expected while the race is running.
pub fn parse_record(record: &Record) -> Result<RawRecord, TrackerError> {
    let bib_number: u32 = get_field(record, BIB_NUMBER_COLUMN)?;
    if bib_number == 0 {
        return Err(TrackerError::InvalidField {
            field: BIB_NUMBER_COLUMN.to_owned(),
            value: "0".to_owned(),
        });
    }

    Ok(RawRecord {
        bib_number,
        name: record
            .get(TEAM_NAME_COLUMN)
            .map(|name| name.trim().to_owned())
            .unwrap_or_default(),
        split_times: read_split_times(record),
        stage_ranks: read_stage_ranks(record),
        stage_start_times: read_stage_start_times(record),
        stage_end_times: read_stage_end_times(record),
    })
}

/// get_field reads and converts a single column.
pub fn get_field<T: std::str::FromStr>(record: &Record, column: &str) -> Result<T, TrackerError> {
    let raw = record
        .get(column)
        .ok_or_else(|| TrackerError::MissingField(column.to_owned()))?;

    raw.trim().parse::<T>().map_err(|_| TrackerError::InvalidField {
        field: column.to_owned(),
        value: raw.to_owned(),
    })
}

/// read_distance returns the race distance in km.
pub fn read_distance(record: &Record) -> Result<f64, TrackerError> {
    get_field(record, DISTANCE_COLUMN)
}

/// count_timed_stages returns the number of consecutive split duration columns, which is the
/// number of timed stages the timing system knows about.
pub fn count_timed_stages(record: &Record) -> usize {
    (1..)
        .take_while(|&n| record.contains_key(&split_time_column(n)))
        .count()
}

pub fn read_split_times(record: &Record) -> Vec<i64> {
    read_values(record, split_time_column, parse_duration)
}

pub fn read_stage_ranks(record: &Record) -> Vec<u32> {
    read_values(record, stage_rank_column, |s| s.parse().ok())
}

pub fn read_stage_start_times(record: &Record) -> Vec<NaiveTime> {
    read_values(record, stage_start_column, parse_time)
}

pub fn read_stage_end_times(record: &Record) -> Vec<NaiveTime> {
    read_values(record, stage_end_column, parse_time)
}

/// parse_duration converts HH:MM:ss into seconds. Hours may exceed 24.
pub fn parse_duration(input: &str) -> Option<i64> {
    let mut parts = input.split(':');
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().ok()?;
    let seconds: i64 = parts.next()?.trim().parse().ok()?;

    if parts.next().is_some() || hours < 0 || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }

    Some(hours * 3600 + minutes * 60 + seconds)
}

/// parse_time converts a HH:MM:ss time of day.
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input, "%H:%M:%S").ok()
}

fn read_values<T, C, F>(record: &Record, column: C, convert: F) -> Vec<T>
where
    C: Fn(usize) -> String,
    F: Fn(&str) -> Option<T>,
{
    let mut values = Vec::new();

    for n in 1.. {
        let raw = match record.get(&column(n)) {
            Some(raw) => raw.trim(),
            None => break,
        };

        if raw == EMPTY_VALUE {
            break;
        }

        match convert(raw) {
            Some(value) => values.push(value),
            None => break,
        }
    }

    values
}
