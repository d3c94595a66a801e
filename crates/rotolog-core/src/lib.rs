//! rotolog core - shared errors, defaults and configuration records

pub mod config;
pub mod constants;
pub mod error;

pub use config::*;
pub use constants::*;
pub use error::{Error, Result};
