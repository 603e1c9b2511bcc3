pub mod artifacts;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod processors;
pub mod readers;
pub mod session;
pub mod storage;
pub mod utils;
pub mod writers;

pub use error::{BadspotError, Result};
