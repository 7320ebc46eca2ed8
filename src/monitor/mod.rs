pub mod config;
pub mod controller;
pub mod events;
pub mod state;

mod loop_worker;

pub use config::MonitorConfig;
pub use controller::DriveMonitor;
pub use state::{DrivingMode, MonitorSnapshot};
