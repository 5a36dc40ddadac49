pub mod broadcast_opts;
pub mod race_file;
pub mod read_config;
pub mod read_route;
pub mod record;
