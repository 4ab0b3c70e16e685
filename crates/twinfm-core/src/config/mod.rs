//! Configuration management for TwinFM.
//!
//! Engine preferences ([`settings::Config`]) are stored as TOML and loaded
//! at startup.

pub mod settings;

pub use settings::{Config, GeneralConfig, OperationsConfig, TrashConfig};
