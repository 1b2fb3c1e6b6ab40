pub mod client_cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fixtures;
pub mod matcher;
pub mod model;
pub mod parse;
pub mod pattern;
pub mod providers;

pub mod report;
pub mod storage;
