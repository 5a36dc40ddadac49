use crate::core::distance::{estimate_covered_distance, EstimationPars};
use crate::core::stage::Stage;
use crate::core::watched::WatchedValue;
use crate::error::TrackerError;
use chrono::NaiveTime;

/// TransitionTime holds the timing data synthesized for an untimed stage.
///
/// * `split_time` - (s) Time spent in the untimed stage
/// * `inter_time` - Time of day the untimed stage was left (start of the next timed stage)
/// * `relative_index` - Number of timed stages before the untimed stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionTime {
    pub split_time: i64,
    pub inter_time: NaiveTime,
    pub relative_index: usize,
}

/// TeamSnapshot is the state of one team derived from a single read of the race file. The
/// watched fields are seeded with the values of the previous read, so their change flags
/// describe what happened between the two reads.
///
/// `intermediate_times`, `split_times` and `stage_ranks` hold one slot per stage once the
/// transition times were inserted. `intermediate_times[i]` is the time stage `i` was left.
#[derive(Debug, Clone)]
pub struct TeamSnapshot {
    pub bib_number: u32,
    pub name: String,
    pub current_stage: WatchedValue<usize>,
    pub rank: WatchedValue<u32>,
    pub finished: WatchedValue<bool>,
    pub started: WatchedValue<bool>,
    pub start_time: Option<NaiveTime>,
    pub covered_distance: f64,
    pub intermediate_times: Vec<NaiveTime>,
    pub split_times: Vec<i64>,
    pub stage_ranks: Vec<u32>,
    pub current_time_index: usize,
}

impl TeamSnapshot {
    pub fn new(
        bib_number: u32,
        name: &str,
        last_snapshot: Option<&TeamSnapshot>,
    ) -> Result<TeamSnapshot, TrackerError> {
        if bib_number == 0 {
            return Err(TrackerError::InvalidValue(
                "bib number must be strictly positive".to_owned(),
            ));
        }

        Ok(TeamSnapshot {
            bib_number,
            name: name.to_owned(),
            current_stage: WatchedValue::new(last_snapshot.map_or(0, |s| s.current_stage.value())),
            rank: WatchedValue::new(last_snapshot.map_or(0, |s| s.rank.value())),
            finished: WatchedValue::new(last_snapshot.map_or(false, |s| s.finished.value())),
            started: WatchedValue::new(last_snapshot.map_or(false, |s| s.started.value())),
            start_time: None,
            covered_distance: last_snapshot.map_or(0.0, |s| s.covered_distance),
            intermediate_times: Vec::new(),
            split_times: Vec::new(),
            stage_ranks: Vec::new(),
            current_time_index: 0,
        })
    }

    /// update_stage_times inserts the synthesized transition times into the per-stage lists.
    /// Untimed stages never get a rank, their slot is filled with 0.
    pub fn update_stage_times(&mut self, transition_times: &[TransitionTime]) {
        for (i, transition_time) in transition_times.iter().enumerate() {
            let idx = transition_time.relative_index + i;

            self.intermediate_times
                .insert(idx.min(self.intermediate_times.len()), transition_time.inter_time);
            self.split_times
                .insert(idx.min(self.split_times.len()), transition_time.split_time);
            self.stage_ranks.insert(idx.min(self.stage_ranks.len()), 0);
        }
    }

    /// update_covered_distance replaces the covered distance with the estimate for this read.
    pub fn update_covered_distance(
        &mut self,
        stages: &[Stage],
        pars: &EstimationPars,
    ) -> Result<(), TrackerError> {
        self.covered_distance = estimate_covered_distance(self, stages, pars)?;
        Ok(())
    }

    /// carried_forward returns a copy of the snapshot for a read in which the row of the team
    /// was missing or unusable. The watched fields are settled, no change is reported.
    pub fn carried_forward(&self) -> TeamSnapshot {
        let mut team = self.clone();
        team.current_stage = WatchedValue::new(self.current_stage.value());
        team.rank = WatchedValue::new(self.rank.value());
        team.finished = WatchedValue::new(self.finished.value());
        team.started = WatchedValue::new(self.started.value());
        team
    }

    /// The method returns the time of day the current stage was entered, if known.
    pub fn current_stage_entry(&self) -> Option<NaiveTime> {
        if self.intermediate_times.is_empty() {
            return None;
        }
        self.intermediate_times.get(self.current_time_index).copied()
    }
}
