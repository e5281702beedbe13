#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::type_complexity)]

//! Host side of dotpack.
//!
//! The host admits raw messages from the UI surface, dispatches each one to
//! exactly one handler, and posts notifications back through a
//! [`MessageSink`]. Handlers reach their collaborators through a
//! [`HostContext`] passed in at dispatch time.
//!
//! - [`lifecycle`]: debounce + cancel controllers for search and details
//! - [`mediator`]: admission check and exhaustive dispatch
//! - [`orchestrator`]: one install/uninstall across N projects
//! - [`services`]: collaborator traits and their concrete implementations

pub mod context;
pub mod handlers;
pub mod lifecycle;
pub mod mediator;
pub mod orchestrator;
pub mod services;
pub mod sink;

pub use context::{HostContext, HostState, Services};
pub use lifecycle::{LifecycleController, Phase};
pub use mediator::Mediator;
pub use orchestrator::{run_operation, EmptyTargets, Operation, OperationKind};
pub use sink::{ChannelSink, MessageSink, RecordingSink};
