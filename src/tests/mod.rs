pub mod common;
mod renewal_scenario;
mod single_flight;
