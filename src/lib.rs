// Kagami image derivative server library

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod path;
pub mod pipeline;
pub mod processor;
pub mod proxy;
pub mod signing;
pub mod storage;
