//! Events sent to the transport layer and the functions building them.
//!
//! On the wire an event is `{"id": <event id>, "payload": {...}}`.

use crate::core::race::Race;
use crate::core::race_snapshot::RaceStatus;
use crate::core::route::RoutePoint;
use crate::core::stage::Stage;
use crate::core::team::{Team, TeamView};
use crate::core::team_snapshot::TeamSnapshot;
use crate::error::TrackerError;
use chrono::NaiveTime;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

pub const RACE_SETUP: u8 = 0;
pub const RACE_STATUS: u8 = 1;
pub const TEAM_START: u8 = 2;
pub const TEAM_CHECKPOINT: u8 = 3;
pub const TEAM_END: u8 = 4;
pub const TEAM_OVERTAKE: u8 = 5;

/// Complete race description, sent once after the first read and to consumers joining late.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceSetupPayload {
    pub name: String,
    pub distance: f64,
    pub stages: Vec<Stage>,
    pub race_points: Vec<Vec<RoutePoint>>,
    pub start_time: i64,
    pub teams: Vec<TeamView>,
    pub status: RaceStatus,
    pub tick_step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceStatusPayload {
    pub race: String,
    pub status: RaceStatus,
    pub start_time: i64,
    pub tick_step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStartPayload {
    pub bib_number: u32,
    pub start_time: NaiveTime,
}

/// * `split_time` - (s) Time spent in the stage just completed
/// * `average_pace` - (s/km) Pace in the stage just completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCheckpointPayload {
    pub bib_number: u32,
    pub current_stage: usize,
    pub last_stage: usize,
    pub split_time: i64,
    pub average_pace: f64,
    pub covered_distance: f64,
    pub pos: (f64, f64),
    pub stage_rank: u32,
}

/// * `total_time` - (s) Time spent in the timed stages
/// * `average_pace` - (s/km) Pace over the timed stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamEndPayload {
    pub bib_number: u32,
    pub total_time: i64,
    pub average_pace: f64,
}

/// `teams` contains the bib numbers of the overtaken teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamOvertakePayload {
    pub bib_number: u32,
    pub old_rank: u32,
    pub rank: u32,
    pub teams: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RaceSetup(RaceSetupPayload),
    RaceStatus(RaceStatusPayload),
    TeamStart(TeamStartPayload),
    TeamCheckpoint(TeamCheckpointPayload),
    TeamEnd(TeamEndPayload),
    TeamOvertake(TeamOvertakePayload),
}

impl Event {
    pub fn id(&self) -> u8 {
        match self {
            Event::RaceSetup(_) => RACE_SETUP,
            Event::RaceStatus(_) => RACE_STATUS,
            Event::TeamStart(_) => TEAM_START,
            Event::TeamCheckpoint(_) => TEAM_CHECKPOINT,
            Event::TeamEnd(_) => TEAM_END,
            Event::TeamOvertake(_) => TEAM_OVERTAKE,
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Event", 2)?;
        state.serialize_field("id", &self.id())?;
        match self {
            Event::RaceSetup(payload) => state.serialize_field("payload", payload)?,
            Event::RaceStatus(payload) => state.serialize_field("payload", payload)?,
            Event::TeamStart(payload) => state.serialize_field("payload", payload)?,
            Event::TeamCheckpoint(payload) => state.serialize_field("payload", payload)?,
            Event::TeamEnd(payload) => state.serialize_field("payload", payload)?,
            Event::TeamOvertake(payload) => state.serialize_field("payload", payload)?,
        }
        state.end()
    }
}

pub fn create_race_setup_event(race: &Race) -> Event {
    Event::RaceSetup(race.serialize())
}

pub fn create_race_status_event(race: &Race) -> Event {
    Event::RaceStatus(RaceStatusPayload {
        race: race.name.to_owned(),
        status: race.status,
        start_time: race.start_time,
        tick_step: race.tick_step,
    })
}

/// create_team_start_event requires the team to have a start time.
pub fn create_team_start_event(team_snapshot: &TeamSnapshot) -> Result<Event, TrackerError> {
    let start_time = team_snapshot.start_time.ok_or_else(|| {
        TrackerError::InvalidValue(format!(
            "team {} has no start time",
            team_snapshot.bib_number
        ))
    })?;

    Ok(Event::TeamStart(TeamStartPayload {
        bib_number: team_snapshot.bib_number,
        start_time,
    }))
}

/// create_team_end_stage_event notifies that a team completed the stage before its current
/// one. The team must have started and have at least one split time.
pub fn create_team_end_stage_event(
    team: &Team,
    team_snapshot: &TeamSnapshot,
    stages: &[Stage],
) -> Result<Event, TrackerError> {
    if team_snapshot.start_time.is_none() {
        return Err(TrackerError::InvalidValue(format!(
            "team {} finished a stage without start time",
            team.bib_number
        )));
    }

    let last_split_time = *team_snapshot
        .split_times
        .get(team.current_time_index)
        .ok_or_else(|| {
            TrackerError::InvalidValue(format!(
                "team {} has no split time for checkpoint {}",
                team.bib_number, team.current_time_index
            ))
        })?;

    let last_stage = team
        .current_stage_index
        .checked_sub(1)
        .and_then(|i| stages.get(i))
        .ok_or_else(|| {
            TrackerError::InvalidValue(format!(
                "team {} has not completed any stage",
                team.bib_number
            ))
        })?;

    // pace: seconds for 1 km
    let average_pace = last_split_time as f64 * 1000.0 / last_stage.length;

    Ok(Event::TeamCheckpoint(TeamCheckpointPayload {
        bib_number: team.bib_number,
        current_stage: team.current_stage_index,
        last_stage: last_stage.id,
        split_time: last_split_time,
        average_pace,
        covered_distance: team.covered_distance(),
        pos: team.current_location(),
        stage_rank: team.last_stage_rank(),
    }))
}

/// create_team_end_race_event notifies that a team finished the race. Only timed stages count
/// for the total time.
pub fn create_team_end_race_event(race: &Race, team_snapshot: &TeamSnapshot) -> Event {
    let total_time: i64 = team_snapshot
        .split_times
        .iter()
        .zip(race.stages.iter())
        .filter(|(_, stage)| stage.is_timed)
        .map(|(split_time, _)| split_time)
        .sum();

    let average_pace = if race.length > 0.0 {
        total_time as f64 * 1000.0 / race.length
    } else {
        0.0
    };

    Event::TeamEnd(TeamEndPayload {
        bib_number: team_snapshot.bib_number,
        total_time,
        average_pace,
    })
}

/// create_team_rank_event notifies that a team overtook one or more teams.
pub fn create_team_rank_event<'a, I>(team: &Team, teams: I) -> Event
where
    I: IntoIterator<Item = &'a Team>,
{
    Event::TeamOvertake(TeamOvertakePayload {
        bib_number: team.bib_number,
        old_rank: team.old_rank,
        rank: team.rank(),
        teams: team.compute_overtaken_teams(teams),
    })
}
