use crate::core::route::Route;
use crate::core::team_snapshot::TeamSnapshot;
use crate::error::TrackerError;
use serde::{Deserialize, Serialize};

/// TeamView is the serialized form of a team sent to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    pub bib_number: u32,
    pub name: String,
    pub rank: u32,
    pub old_rank: u32,
    pub current_stage: usize,
    pub covered_distance: f64,
    pub progression: f64,
    pub pace: u32,
    pub pos: (f64, f64),
    pub stage_ranks: Vec<u32>,
}

/// Team is the persistent state of a participant during the broadcast.
///
/// * `old_rank` - Rank before the last call to `set_rank` (0 if not ranked yet)
/// * `pace` - (s/km) Average pace up to the last checkpoint
/// * `current_time_index` - Index of the last checkpoint time in the per-stage lists
#[derive(Debug, Clone)]
pub struct Team {
    pub bib_number: u32,
    pub name: String,
    pub old_rank: u32,
    pub stage_ranks: Vec<u32>,
    pub pace: u32,
    pub current_stage_index: usize,
    pub current_time_index: usize,
    rank: u32,
    covered_distance: f64,
    progression: f64,
    current_location: (f64, f64),
}

impl Team {
    pub fn new(bib_number: u32, name: &str, route: &Route, default_pace: u32) -> Team {
        Team {
            bib_number,
            name: name.to_owned(),
            old_rank: 0,
            stage_ranks: Vec::new(),
            pace: default_pace,
            current_stage_index: 0,
            current_time_index: 0,
            rank: 0,
            covered_distance: 0.0,
            progression: 0.0,
            current_location: route.start_coords(),
        }
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    /// The method sets a new rank and keeps the current one as old rank.
    pub fn set_rank(&mut self, rank: u32) -> Result<(), TrackerError> {
        if rank == 0 {
            return Err(TrackerError::InvalidValue(
                "rank must be strictly positive".to_owned(),
            ));
        }
        self.old_rank = self.rank;
        self.rank = rank;
        Ok(())
    }

    pub fn covered_distance(&self) -> f64 {
        self.covered_distance
    }

    /// Race progression between 0 and 1.
    pub fn progression(&self) -> f64 {
        self.progression
    }

    pub fn current_location(&self) -> (f64, f64) {
        self.current_location
    }

    /// The method sets the covered distance (m) and updates the progression and the location
    /// on the route. The location is kept if the current stage has no route point.
    pub fn set_covered_distance(
        &mut self,
        covered_distance: f64,
        race_distance: f64,
        route: &Route,
    ) -> Result<(), TrackerError> {
        if !(covered_distance >= 0.0) {
            return Err(TrackerError::InvalidValue(format!(
                "covered distance must be positive, got {}",
                covered_distance
            )));
        }

        self.covered_distance = covered_distance;
        self.progression = if race_distance > 0.0 {
            covered_distance / race_distance
        } else {
            0.0
        };

        if let Some(location) = route.position(self.current_stage_index, covered_distance) {
            self.current_location = location;
        }
        Ok(())
    }

    /// The method returns the rank of the team on its last completed stage, 0 if unknown.
    pub fn last_stage_rank(&self) -> u32 {
        self.stage_ranks
            .get(self.current_time_index)
            .copied()
            .unwrap_or(0)
    }

    /// compute_overtaken_teams returns the bib numbers of the teams that were ahead of this team
    /// before the last ranking and are behind it now.
    pub fn compute_overtaken_teams<'a, I>(&self, teams: I) -> Vec<u32>
    where
        I: IntoIterator<Item = &'a Team>,
    {
        teams
            .into_iter()
            .filter(|team| {
                team.bib_number != self.bib_number
                    && self.old_rank > team.old_rank
                    && self.rank < team.rank
            })
            .map(|team| team.bib_number)
            .collect()
    }

    /// The method copies the values derived from a read of the race file. The pace is only
    /// recomputed when a new stage was entered.
    pub fn update_from_snapshot(
        &mut self,
        snapshot: &TeamSnapshot,
        race_distance: f64,
        route: &Route,
    ) -> Result<(), TrackerError> {
        self.current_time_index = snapshot.current_time_index;
        self.current_stage_index = snapshot.current_stage.value();
        self.stage_ranks = snapshot.stage_ranks.clone();
        self.set_covered_distance(snapshot.covered_distance, race_distance, route)?;

        if snapshot.current_stage.has_changed() {
            self.update_pace(snapshot);
        }
        Ok(())
    }

    /// The method updates the pace from the time spent to reach the last checkpoint.
    pub fn update_pace(&mut self, snapshot: &TeamSnapshot) {
        let (start, entry) = match (snapshot.start_time, snapshot.current_stage_entry()) {
            (Some(start), Some(entry)) => (start, entry),
            _ => return,
        };

        let elapsed = (entry - start).num_seconds();
        if elapsed > 0 && self.covered_distance > 0.0 {
            self.pace = (elapsed as f64 * 1000.0 / self.covered_distance) as u32;
        }
    }

    pub fn serialize(&self) -> TeamView {
        TeamView {
            bib_number: self.bib_number,
            name: self.name.to_owned(),
            rank: self.rank,
            old_rank: self.old_rank,
            current_stage: self.current_stage_index,
            covered_distance: self.covered_distance,
            progression: self.progression,
            pace: self.pace,
            pos: self.current_location,
            stage_ranks: self.stage_ranks.to_owned(),
        }
    }
}
