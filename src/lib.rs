pub mod app;
pub mod cli;
pub mod config;
pub mod remote;
pub mod store;
pub mod timefmt;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use remote::{FetchFailure, RemoteBlobClient, SaveFailure};
pub use store::{StatusEntry, StatusStore};
