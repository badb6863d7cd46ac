pub mod config;
pub mod error;
pub mod setup;
pub mod metrics;
pub mod results;
pub mod verify;
pub mod stats;
pub mod pipeline;
pub mod report;

pub mod data {
    pub mod trace;
    pub mod source;
    pub mod sqlite;
}
