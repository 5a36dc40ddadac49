use crate::core::stage::{race_length, Stage};
use crate::core::team_snapshot::TeamSnapshot;
use crate::error::TrackerError;

/// * `tick_step` - Time acceleration of the race (1 for a real race)
/// * `loop_time` - (s) Wall-clock time since the previous read of the race file
/// * `default_pace` - (s/km) Pace assumed before a team crossed its first checkpoint
#[derive(Debug, Clone, Copy)]
pub struct EstimationPars {
    pub tick_step: f64,
    pub loop_time: f64,
    pub default_pace: f64,
}

/// estimate_covered_distance returns an estimate of the distance (m) covered by a team.
///
/// Ground truth only exists when a checkpoint is crossed, in between the distance is
/// extrapolated from the average speed the team had up to its last checkpoint:
/// * not started: 0
/// * finished: end of the last stage
/// * no split time yet: previous distance advanced at the default pace
/// * stage changed since the previous read: start of the new stage
/// * otherwise: previous distance advanced at the average speed
pub fn estimate_covered_distance(
    team: &TeamSnapshot,
    stages: &[Stage],
    pars: &EstimationPars,
) -> Result<f64, TrackerError> {
    if !(pars.default_pace > 0.0) {
        return Err(TrackerError::InvalidValue(format!(
            "default pace must be strictly positive, got {}",
            pars.default_pace
        )));
    }

    let start_time = match team.start_time {
        Some(start_time) => start_time,
        None => return Ok(0.0),
    };

    if team.finished.value() {
        return Ok(race_length(stages));
    }

    if team.split_times.is_empty() {
        return Ok(team.covered_distance + pars.loop_time * pars.tick_step * 1000.0 / pars.default_pace);
    }

    let stage = match stages.get(team.current_stage.value()) {
        Some(stage) => stage,
        None => return Ok(team.covered_distance),
    };

    if team.current_stage.has_changed() {
        return Ok(stage.dst_from_start);
    }

    let elapsed = match team.current_stage_entry() {
        Some(entry) => (entry - start_time).num_seconds() as f64,
        None => return Ok(team.covered_distance),
    };

    if elapsed <= 0.0 {
        return Ok(team.covered_distance);
    }

    let average_speed = stage.dst_from_start / elapsed;
    Ok(team.covered_distance + average_speed * pars.loop_time * pars.tick_step)
}
