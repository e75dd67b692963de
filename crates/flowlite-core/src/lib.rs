//! FlowLite: an embeddable workflow engine. Flows are declared as graphs of
//! stages and events via [`flow::FlowBuilder`]; flow instances advance one
//! tick at a time under [`engine::FlowEngine`] control and survive process
//! restarts through four durable collaborators the host application
//! supplies: a [`persister::Persister`], an [`mailbox::EventStore`], a
//! [`scheduler::TickScheduler`], and a [`history::HistoryStore`].
//!
//! This crate defines the data model, the builder, the collaborator traits,
//! the engine, and a diagram renderer. Concrete collaborator implementations
//! (including an in-memory reference set) live in a separate crate.

pub mod macros;

pub mod config;
pub mod diagram;
pub mod engine;
pub mod errors;
pub mod flow;
pub mod history;
pub mod ids;
pub mod instance;
pub mod mailbox;
pub mod persister;
pub mod scheduler;
pub mod status;

pub use config::SchedulerConfig;
pub use engine::FlowEngine;
pub use errors::{ActionError, BuildError, FlowError};
pub use flow::{Action, ConditionDef, ConditionTarget, FlowBuilder, FlowDefinition, StageDef, StageKind};
pub use history::{HistoryEntry, HistoryEntryKind, HistoryStore};
pub use ids::{EventKind, FlowId, InstanceId, StageId};
pub use instance::InstanceData;
pub use mailbox::{EventRowId, EventStore};
pub use persister::{PersistError, Persister};
pub use scheduler::{TickHandler, TickScheduler};
pub use status::StageStatus;
