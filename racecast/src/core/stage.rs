use crate::error::TrackerError;
use serde::{Deserialize, Serialize};

/// * `name` - Stage name, e.g. Canoe Le Blanc
/// * `length` - (m) Length of the stage
/// * `timed` - True if the stage is scored, false for transfer segments between timed stages
#[derive(Debug, Deserialize, Clone)]
pub struct StagePars {
    pub name: String,
    pub length: f64,
    pub timed: bool,
}

/// * `id` - Index of the stage in the race
/// * `dst_from_start` - (m) Distance between the start line and the beginning of the stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: usize,
    pub name: String,
    pub dst_from_start: f64,
    pub length: f64,
    pub is_timed: bool,
}

impl Stage {
    /// The method returns the distance between the start line and the end of the stage.
    pub fn dst_to_end(&self) -> f64 {
        self.dst_from_start + self.length
    }
}

/// build_stages validates the raw stage descriptors and returns the stage sequence with
/// cumulative offsets. The first stage must be timed, lengths must be positive and timed and
/// untimed stages must alternate.
pub fn build_stages(stage_pars: &[StagePars]) -> Result<Vec<Stage>, TrackerError> {
    if stage_pars.is_empty() {
        return Err(TrackerError::InvalidStages(
            "at least one stage is required".to_owned(),
        ));
    }

    let mut stages: Vec<Stage> = Vec::with_capacity(stage_pars.len());

    for (i, pars) in stage_pars.iter().enumerate() {
        if !(pars.length > 0.0) {
            return Err(TrackerError::InvalidStages(format!(
                "stage {} ({}) must have a strictly positive length, got {}",
                i, pars.name, pars.length
            )));
        }

        let dst_from_start = match stages.last() {
            None => {
                if !pars.timed {
                    return Err(TrackerError::InvalidStages(
                        "the first stage must be timed".to_owned(),
                    ));
                }
                0.0
            }
            Some(prev) => {
                if prev.is_timed == pars.timed {
                    return Err(TrackerError::InvalidStages(format!(
                        "stages {} and {} are both {}",
                        i - 1,
                        i,
                        if pars.timed { "timed" } else { "untimed" }
                    )));
                }
                prev.dst_to_end()
            }
        };

        stages.push(Stage {
            id: i,
            name: pars.name.to_owned(),
            dst_from_start,
            length: pars.length,
            is_timed: pars.timed,
        });
    }

    Ok(stages)
}

/// timed_length returns the summed length of all timed stages.
pub fn timed_length(stages: &[Stage]) -> f64 {
    stages.iter().filter(|s| s.is_timed).map(|s| s.length).sum()
}

/// race_length returns the distance between the start line and the end of the last stage.
pub fn race_length(stages: &[Stage]) -> f64 {
    stages.last().map_or(0.0, Stage::dst_to_end)
}
