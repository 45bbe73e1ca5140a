pub mod analyzers;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod render;
pub mod series;
pub mod services;
pub mod spatial;
