use crate::core::distance::EstimationPars;
use crate::core::race::Race;
use crate::core::race_snapshot::{read_race_snapshot, RaceSnapshot, RaceStatus};
use crate::error::TrackerError;
use crate::interfaces::transport_interface::{EventQueue, StopToken};
use crate::post::events::{
    create_race_setup_event, create_race_status_event, create_team_end_race_event,
    create_team_end_stage_event, create_team_rank_event, create_team_start_event, Event,
};
use crate::pre::race_file::RaceFileSource;
use crate::pre::record::Record;
use anyhow::Context;
use chrono::Utc;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// CycleOutcome tells the broadcast loop how a poll cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The race file has no usable row yet.
    NotReady,
    /// The race is waiting for its start, the teams were reset.
    Waiting,
    Updated,
    Finished,
}

/// CycleResult holds the event batches of one poll cycle, in sending order.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub batches: Vec<Vec<Event>>,
    pub outcome: CycleOutcome,
}

/// BroadcastState is what the broadcast loop keeps from one cycle to the next.
#[derive(Debug, Default)]
pub struct BroadcastState {
    last_snapshot: Option<RaceSnapshot>,
    setup_sent: bool,
}

impl BroadcastState {
    pub fn new() -> BroadcastState {
        BroadcastState::default()
    }

    /// True once the race setup was sent, i.e. after the first successful read.
    pub fn setup_sent(&self) -> bool {
        self.setup_sent
    }

    pub fn last_snapshot(&self) -> Option<&RaceSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// run_cycle processes the rows of one read of the race file.
    ///
    /// * `loop_time` - (s) Wall-clock time since the previous cycle
    /// * `now` - (s) Current unix time, used as race start time when the race starts running
    pub fn run_cycle(
        &mut self,
        race: &mut Race,
        records: &[Record],
        loop_time: f64,
        now: i64,
    ) -> Result<CycleResult, TrackerError> {
        let pars = EstimationPars {
            tick_step: race.tick_step,
            loop_time,
            default_pace: race.default_pace,
        };

        let mut snapshot =
            match read_race_snapshot(records, &race.stages, &pars, self.last_snapshot.as_ref()) {
                Ok(snapshot) => snapshot,
                Err(e) if e.is_not_ready() => {
                    debug!("Race file not ready: {}", e);
                    return Ok(CycleResult {
                        batches: Vec::new(),
                        outcome: CycleOutcome::NotReady,
                    });
                }
                Err(e) => return Err(e),
            };

        let mut batches = Vec::new();

        if !self.setup_sent {
            race.distance = snapshot.distance * 1000.0;
            for team in snapshot.teams.iter() {
                race.add_team(team.bib_number, &team.name);
            }
            info!(
                teams = race.teams.len(),
                distance = race.distance,
                "Race {} set up",
                race.name
            );
            batches.push(vec![create_race_setup_event(race)]);
            self.setup_sent = true;
        }

        let status = snapshot.status.value();
        if snapshot.status.has_changed() {
            info!(status = ?status, "Race status changed");
            race.status = status;
            if status == RaceStatus::Running {
                race.start_time = now;
            }
            batches.push(vec![create_race_status_event(race)]);

            if status == RaceStatus::Waiting {
                race.reset_teams();
                self.last_snapshot = Some(snapshot);
                return Ok(CycleResult {
                    batches,
                    outcome: CycleOutcome::Waiting,
                });
            }
        }

        let order = race.rank_teams(&mut snapshot)?;
        let mut events = Vec::new();

        for &idx in order.iter() {
            let team_snapshot = &snapshot.teams[idx];
            let bib_number = team_snapshot.bib_number;
            race.update_team(team_snapshot)?;

            let team = match race.teams.get(&bib_number) {
                Some(team) => team,
                None => continue,
            };

            if team_snapshot.started.has_changed() && team_snapshot.started.value() {
                match create_team_start_event(team_snapshot) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(bib = bib_number, "No start event: {}", e),
                }
            }

            if team_snapshot.current_stage.has_changed()
                && !team_snapshot.intermediate_times.is_empty()
                && team_snapshot.start_time.is_some()
            {
                match create_team_end_stage_event(team, team_snapshot, &race.stages) {
                    Ok(event) => events.push(event),
                    Err(e) => warn!(bib = bib_number, "No checkpoint event: {}", e),
                }
            }

            if team_snapshot.finished.has_changed() && team_snapshot.finished.value() {
                events.push(create_team_end_race_event(race, team_snapshot));
            }

            if team_snapshot.rank.has_changed() && team.rank() < team.old_rank {
                let event = create_team_rank_event(team, race.teams.values());
                if !matches!(&event, Event::TeamOvertake(payload) if payload.teams.is_empty()) {
                    events.push(event);
                }
            }
        }

        if !events.is_empty() {
            debug!(events = events.len(), "Team events computed");
            batches.push(events);
        }

        self.last_snapshot = Some(snapshot);

        let outcome = if status == RaceStatus::Finished {
            CycleOutcome::Finished
        } else {
            CycleOutcome::Updated
        };
        Ok(CycleResult { batches, outcome })
    }
}

/// handle_broadcast polls the race file until the race is finished or a stop is requested, and
/// pushes the resulting events onto the queue. The terminal marker is always pushed before
/// returning, also on error.
pub fn handle_broadcast<S: RaceFileSource>(
    race: &mut Race,
    source: &mut S,
    poll_interval: Duration,
    queue: &EventQueue,
    stop: &StopToken,
) -> anyhow::Result<()> {
    info!("Broadcast of race {} started", race.name);
    let result = broadcast_loop(race, source, poll_interval, queue, stop);
    queue.close();

    match &result {
        Ok(()) => info!("Broadcast of race {} ended", race.name),
        Err(e) => error!("Broadcast of race {} aborted: {:#}", race.name, e),
    }
    result
}

fn broadcast_loop<S: RaceFileSource>(
    race: &mut Race,
    source: &mut S,
    poll_interval: Duration,
    queue: &EventQueue,
    stop: &StopToken,
) -> anyhow::Result<()> {
    let mut state = BroadcastState::new();
    let mut t_last = Instant::now();

    while !stop.is_stopped() {
        let t_start = Instant::now();
        let loop_time = t_start.duration_since(t_last).as_secs_f64();
        t_last = t_start;

        let records = source
            .read_records()
            .context("Failed to read race file!")?;
        let cycle = state
            .run_cycle(race, &records, loop_time, Utc::now().timestamp())
            .context("Failed to process race file!")?;

        for batch in cycle.batches {
            queue
                .send_batch(batch)
                .context("Failed to send events to transport!")?;
        }
        if state.setup_sent() {
            queue.publish_race(race.serialize());
        }

        match cycle.outcome {
            CycleOutcome::Finished => {
                info!("Race {} is finished", race.name);
                return Ok(());
            }
            CycleOutcome::NotReady => info!("Waiting for race file content"),
            CycleOutcome::Waiting | CycleOutcome::Updated => {}
        }

        sleep(poll_interval);
    }

    info!("Stop requested");
    Ok(())
}
