//! Core library components.
//!
//! The secret-resolution and subprocess-execution engine. Library users
//! normally only need [`summon::RunConfig`] and [`summon::run_subprocess`].

pub mod constants;
pub mod env;
pub mod locate;
pub mod materialize;
pub mod process;
pub mod provider;
pub mod resolve;
pub mod secrets_yml;
pub mod summon;
pub mod temp;
pub mod types;
