pub mod assignment;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod generation;
pub mod labor;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod realtime;
pub mod services;
pub mod state_machine;
pub mod web;

pub use config::WmsConfig;
pub use error::{Result, WmsError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_loads_successfully() {
        let config = WmsConfig::default();
        assert_eq!(config.assignment.interval_seconds, 10);
        assert_eq!(config.assignment.batch_size, 200);
        assert_eq!(config.metrics.run_hour, 23);
        assert_eq!(config.metrics.run_minute, 59);
    }
}
