use crate::core::distance::EstimationPars;
use crate::core::stage::Stage;
use crate::core::team_snapshot::{TeamSnapshot, TransitionTime};
use crate::core::watched::WatchedValue;
use crate::error::TrackerError;
use crate::pre::record::{count_timed_stages, parse_record, read_distance, Record};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceStatus {
    Unknown,
    Waiting,
    Running,
    Finished,
}

impl Default for RaceStatus {
    fn default() -> Self {
        RaceStatus::Unknown
    }
}

impl RaceStatus {
    /// Wire code of the status.
    pub fn code(self) -> i8 {
        match self {
            RaceStatus::Unknown => -1,
            RaceStatus::Waiting => 0,
            RaceStatus::Running => 1,
            RaceStatus::Finished => 2,
        }
    }

    pub fn from_code(code: i8) -> Option<RaceStatus> {
        match code {
            -1 => Some(RaceStatus::Unknown),
            0 => Some(RaceStatus::Waiting),
            1 => Some(RaceStatus::Running),
            2 => Some(RaceStatus::Finished),
            _ => None,
        }
    }
}

impl Serialize for RaceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

impl<'de> Deserialize<'de> for RaceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i8::deserialize(deserializer)?;
        RaceStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown race status {}", code)))
    }
}

/// get_race_status maps the two flags computed over all teams of a read to the race status.
/// A finished race nobody started is contradictory and reported as unknown.
pub fn get_race_status(race_started: bool, race_finished: bool) -> RaceStatus {
    match (race_started, race_finished) {
        (false, false) => RaceStatus::Waiting,
        (true, false) => RaceStatus::Running,
        (true, true) => RaceStatus::Finished,
        (false, true) => RaceStatus::Unknown,
    }
}

/// get_current_stage_index returns the index of the stage a team is in, given the number of
/// timed stages it started and completed. The race file only has times for timed stages, the
/// index however counts every stage. The stage sequence must start with a timed stage and
/// alternate afterwards.
pub fn get_current_stage_index(
    started_stages: i64,
    completed_stages: i64,
    stages: &[Stage],
) -> Result<usize, TrackerError> {
    if started_stages < 0 {
        return Err(TrackerError::InvalidValue(format!(
            "number of started stages must be positive, got {}",
            started_stages
        )));
    }

    if completed_stages < 0 {
        return Err(TrackerError::InvalidValue(format!(
            "number of completed stages must be positive, got {}",
            completed_stages
        )));
    }

    if started_stages == 0 || completed_stages == 0 {
        return Ok(0);
    }

    let mut timed_stages = 0;
    let mut stage_index = 0;

    for (i, stage) in stages.iter().enumerate() {
        stage_index = i;
        if timed_stages >= completed_stages {
            break;
        }
        if stage.is_timed {
            timed_stages += 1;
        }
    }

    if started_stages == completed_stages {
        Ok(stage_index)
    } else {
        Ok(stage_index + 1)
    }
}

/// compute_transition_times synthesizes the timing data of every untimed stage located before
/// the current stage: its duration is the gap between the end of the previous timed stage and
/// the start of the next one. Transitions whose boundary times are unknown are skipped.
pub fn compute_transition_times(
    current_stage_index: usize,
    started_stage_times: &[NaiveTime],
    ended_stage_times: &[NaiveTime],
    stages: &[Stage],
) -> Vec<TransitionTime> {
    let mut transitions = Vec::new();
    let mut timed_stage_index = 0;

    for stage in stages.iter().take(current_stage_index) {
        if stage.is_timed {
            timed_stage_index += 1;
            continue;
        }

        let start = started_stage_times.get(timed_stage_index);
        let end = timed_stage_index
            .checked_sub(1)
            .and_then(|i| ended_stage_times.get(i));

        if let (Some(&start), Some(&end)) = (start, end) {
            let split_time = (start - end).num_seconds();
            if split_time < 0 {
                warn!(
                    stage = stage.id,
                    "Stage {} entered at {} before the previous one ended at {}",
                    stage.name, start, end
                );
            }
            transitions.push(TransitionTime {
                split_time,
                inter_time: start,
                relative_index: timed_stage_index,
            });
        }
    }

    transitions
}

/// RaceSnapshot is the state of the whole race derived from one read of the race file.
///
/// * `timed_stages_number` - Number of timed stages found in the race file header
/// * `distance` - (km) Race distance found in the race file
#[derive(Debug, Clone)]
pub struct RaceSnapshot {
    pub timed_stages_number: usize,
    pub distance: f64,
    pub teams: Vec<TeamSnapshot>,
    pub status: WatchedValue<RaceStatus>,
    bib_index: HashMap<u32, usize>,
}

impl RaceSnapshot {
    pub fn new(last_snapshot: Option<&RaceSnapshot>) -> RaceSnapshot {
        RaceSnapshot {
            timed_stages_number: last_snapshot.map_or(0, |s| s.timed_stages_number),
            distance: last_snapshot.map_or(0.0, |s| s.distance),
            teams: Vec::new(),
            status: WatchedValue::new(last_snapshot.map_or(RaceStatus::Unknown, |s| s.status.value())),
            bib_index: HashMap::new(),
        }
    }

    pub fn update_race_status(&mut self, race_started: bool, race_finished: bool) {
        self.status.set(get_race_status(race_started, race_finished));
    }

    pub fn team(&self, bib_number: u32) -> Option<&TeamSnapshot> {
        self.bib_index.get(&bib_number).map(|&i| &self.teams[i])
    }

    /// The method adds a team snapshot. A bib number that is already present is rejected and
    /// false is returned.
    pub fn add_team(&mut self, team: TeamSnapshot) -> bool {
        if self.bib_index.contains_key(&team.bib_number) {
            return false;
        }
        self.bib_index.insert(team.bib_number, self.teams.len());
        self.teams.push(team);
        true
    }
}

/// read_race_snapshot derives the race state from the rows of the race file. Rows without a
/// valid bib number are skipped. The previous snapshot provides the values the change flags are
/// computed against.
pub fn read_race_snapshot(
    records: &[Record],
    stages: &[Stage],
    pars: &EstimationPars,
    last_snapshot: Option<&RaceSnapshot>,
) -> Result<RaceSnapshot, TrackerError> {
    if stages.is_empty() {
        return Err(TrackerError::InvalidStages(
            "at least one stage is required".to_owned(),
        ));
    }

    let mut snapshot = RaceSnapshot::new(last_snapshot);

    if last_snapshot.is_none() {
        if let Some(first) = records.first() {
            snapshot.timed_stages_number = resolve_timed_stages_number(first, stages);
            match read_distance(first) {
                Ok(distance) => snapshot.distance = distance,
                Err(e) => warn!("Could not read race distance: {}", e),
            }
        }
    }

    let mut race_started = false;
    let mut race_finished = true;

    for record in records.iter() {
        let raw = match parse_record(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping race file row: {}", e);
                continue;
            }
        };

        let team_started = !raw.stage_start_times.is_empty();
        let team_finished = raw.stage_end_times.len() >= snapshot.timed_stages_number;

        let current_stage = if team_finished {
            stages.len() - 1
        } else {
            get_current_stage_index(
                raw.stage_start_times.len() as i64,
                raw.stage_end_times.len() as i64,
                stages,
            )?
            .min(stages.len() - 1)
        };

        let last_team = last_snapshot.and_then(|s| s.team(raw.bib_number));
        let mut team = TeamSnapshot::new(raw.bib_number, &raw.name, last_team)?;

        team.current_stage.set(current_stage);
        team.finished.set(team_finished);
        team.started.set(team_started);
        team.start_time = raw.stage_start_times.first().copied();
        team.current_time_index = if raw.stage_end_times.is_empty() {
            0
        } else {
            current_stage.saturating_sub(1)
        };
        team.intermediate_times = raw.stage_end_times.clone();
        team.split_times = raw.split_times;
        team.stage_ranks = raw.stage_ranks;

        let transition_times = compute_transition_times(
            current_stage,
            &raw.stage_start_times,
            &raw.stage_end_times,
            stages,
        );
        team.update_stage_times(&transition_times);
        team.update_covered_distance(stages, pars)?;

        let bib_number = team.bib_number;
        if snapshot.add_team(team) {
            race_started |= team_started;
            race_finished &= team_finished;
        } else {
            warn!(bib = bib_number, "Skipping duplicated bib number in race file");
        }
    }

    if snapshot.teams.is_empty() {
        return Err(TrackerError::EmptyRaceFile);
    }

    // teams without a usable row keep their last known state, also for the race status
    if let Some(last_snapshot) = last_snapshot {
        for team in last_snapshot.teams.iter() {
            if snapshot.team(team.bib_number).is_none() {
                debug!(bib = team.bib_number, "Team missing from race file, keeping its last state");
                race_started |= team.started.value();
                race_finished &= team.finished.value();
                snapshot.add_team(team.carried_forward());
            }
        }
    }

    snapshot.update_race_status(race_started, race_finished);
    debug!(
        teams = snapshot.teams.len(),
        status = ?snapshot.status.value(),
        "Read race snapshot"
    );

    Ok(snapshot)
}

fn resolve_timed_stages_number(record: &Record, stages: &[Stage]) -> usize {
    let configured = stages.iter().filter(|s| s.is_timed).count();
    let found = count_timed_stages(record);

    if found == 0 {
        warn!(
            "Race file has no split time column, assuming {} timed stages",
            configured
        );
        return configured;
    }
    if found != configured {
        warn!(
            "Race file has {} timed stages but {} are configured",
            found, configured
        );
    }
    found
}
