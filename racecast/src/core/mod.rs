pub mod distance;
pub mod handle_broadcast;
pub mod race;
pub mod race_snapshot;
pub mod route;
pub mod stage;
pub mod team;
pub mod team_snapshot;
pub mod watched;
