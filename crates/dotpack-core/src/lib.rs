#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::return_self_not_must_use)]

//! Core types for dotpack.
//!
//! Everything here is runtime-agnostic: the error taxonomy, outcome helpers,
//! the in-process event bus, the state holders shared by the host's handlers,
//! the caller-side stale-response guard and configuration loading.

pub mod config;
pub mod correlation;
pub mod error;
pub mod events;
pub mod outcome;
pub mod paths;
pub mod state;
pub mod version;

pub use config::Config;
pub use correlation::{new_request_id, Channel, StaleGuard, Verdict};
pub use error::{AppError, ConfigError, ErrorKind};
pub use events::{BusEvent, EventBus, Subscription};
pub use outcome::{combine, fail, ok, AppResult};
pub use version::VERSION;
