//! In-memory, async, thread-safe reference implementations of the four
//! FlowLite collaborator traits, for tests, demos, and single-process
//! embedding. Concrete storage engines (a real database, a message broker)
//! are out of scope for this workspace; this crate exists precisely because
//! something has to stand in for them.

pub mod history;
pub mod mailbox;
pub mod persister;
pub mod scheduler;

pub use history::InMemoryHistoryStore;
pub use mailbox::InMemoryEventStore;
pub use persister::InMemoryPersister;
pub use scheduler::InMemoryTickScheduler;
