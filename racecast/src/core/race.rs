use crate::core::race_snapshot::{RaceSnapshot, RaceStatus};
use crate::core::route::Route;
use crate::core::stage::{timed_length, Stage};
use crate::core::team::Team;
use crate::core::team_snapshot::TeamSnapshot;
use crate::error::TrackerError;
use crate::post::events::RaceSetupPayload;
use helpers::general::{argsort, SortOrder};
use std::collections::BTreeMap;
use tracing::info;

/// Race is the persistent state of the broadcast race. It is only mutated by the broadcast
/// loop.
///
/// * `distance` - (m) Race distance, set from the first successful read of the race file
/// * `length` - (m) Summed length of the timed stages
/// * `start_time` - (s) Unix time the race status switched to running
/// * `tick_step` - Time acceleration of the race (1 for a real race)
/// * `default_pace` - (s/km) Pace assigned to teams before their first checkpoint
#[derive(Debug)]
pub struct Race {
    pub name: String,
    pub distance: f64,
    pub route: Route,
    pub stages: Vec<Stage>,
    pub length: f64,
    pub status: RaceStatus,
    pub start_time: i64,
    pub tick_step: f64,
    pub default_pace: f64,
    pub teams: BTreeMap<u32, Team>,
}

impl Race {
    pub fn new(
        name: &str,
        route: Route,
        stages: Vec<Stage>,
        tick_step: f64,
        default_pace: f64,
    ) -> Result<Race, TrackerError> {
        if route.stage_count() != stages.len() {
            return Err(TrackerError::RouteMismatch {
                groups: route.stage_count(),
                stages: stages.len(),
            });
        }

        Ok(Race {
            name: name.to_owned(),
            distance: 0.0,
            length: timed_length(&stages),
            route,
            stages,
            status: RaceStatus::Waiting,
            start_time: 0,
            tick_step,
            default_pace,
            teams: BTreeMap::new(),
        })
    }

    pub fn add_team(&mut self, bib_number: u32, name: &str) {
        let team = Team::new(bib_number, name, &self.route, self.default_pace as u32);
        self.teams.insert(bib_number, team);
    }

    /// reset_teams replaces every team by a fresh one with the same bib number and name.
    pub fn reset_teams(&mut self) {
        for team in self.teams.values_mut() {
            *team = Team::new(team.bib_number, &team.name, &self.route, self.default_pace as u32);
        }
    }

    /// rank_teams sorts the teams of the snapshot by covered distance, leader first, and assigns
    /// the resulting ranks to the snapshot and to the persistent teams. Teams tied on distance
    /// keep the order of the race file. The snapshot indices in rank order are returned.
    pub fn rank_teams(&mut self, snapshot: &mut RaceSnapshot) -> Result<Vec<usize>, TrackerError> {
        let distances: Vec<f64> = snapshot.teams.iter().map(|t| t.covered_distance).collect();
        let order = argsort(&distances, SortOrder::Descending);

        for (i, &idx) in order.iter().enumerate() {
            let rank = i as u32 + 1;
            let team_snapshot = &mut snapshot.teams[idx];
            team_snapshot.rank.set(rank);

            let route = &self.route;
            let default_pace = self.default_pace as u32;
            let team = self
                .teams
                .entry(team_snapshot.bib_number)
                .or_insert_with(|| {
                    info!(bib = team_snapshot.bib_number, "New team found in race file");
                    Team::new(team_snapshot.bib_number, &team_snapshot.name, route, default_pace)
                });
            team.set_rank(rank)?;
        }

        Ok(order)
    }

    /// update_team copies the derived values of a team snapshot into the matching team.
    pub fn update_team(&mut self, snapshot: &TeamSnapshot) -> Result<(), TrackerError> {
        let team = self.teams.get_mut(&snapshot.bib_number).ok_or_else(|| {
            TrackerError::InvalidValue(format!("unknown bib number {}", snapshot.bib_number))
        })?;
        team.update_from_snapshot(snapshot, self.distance, &self.route)
    }

    pub fn serialize(&self) -> RaceSetupPayload {
        RaceSetupPayload {
            name: self.name.to_owned(),
            distance: self.distance,
            stages: self.stages.to_owned(),
            race_points: self.route.groups().to_vec(),
            start_time: self.start_time,
            teams: self.teams.values().map(Team::serialize).collect(),
            status: self.status,
            tick_step: self.tick_step,
        }
    }
}
