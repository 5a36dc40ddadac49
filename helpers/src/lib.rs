pub mod general;
pub mod geo;
