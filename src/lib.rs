pub mod cache;
pub mod config;
pub mod delivery;
pub mod error;
mod fs_util;
pub mod gateway;
pub mod memory;
pub mod orchestrator;
pub mod persona;
pub mod prompt;
pub mod provider;
pub mod room;
pub mod secrets;
pub mod types;
pub mod validate;
