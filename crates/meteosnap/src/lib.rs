//! meteosnap - weather snapshot daemon.
//!
//! Polls the Open-Meteo forecast API on a configurable interval, flattens
//! each response into a CSV record, optionally mirrors it to S3 and serves
//! the latest snapshot plus record management over HTTP.

pub mod config;
pub mod encoder;
pub mod http_server;
pub mod mirror;
pub mod openmeteo;
pub mod poller;
pub mod state;
pub mod store;

pub use config::{ConfigError, DaemonConfig, FetchConfig, LocationConfig, S3Config};
pub use encoder::{encode, EncodeError, FlatRecord, WeatherSnapshot};
pub use http_server::{create_router, run_http_server};
pub use mirror::SnapshotMirror;
pub use openmeteo::{FetchError, OpenMeteoClient, WeatherFetcher};
pub use poller::{run_cycle, run_poller, CycleError};
pub use state::{LatestSnapshot, SharedState};
pub use store::{SnapshotStore, StoreError};
