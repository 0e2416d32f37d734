pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod export;
pub mod ingest;
pub mod ml;
pub mod reconcile;
pub mod telemetry;
