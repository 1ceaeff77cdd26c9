// src/store/mod.rs — Meeting store: SQLite schema, operations, async handle

pub mod schema;
pub mod store;
pub mod store_server;

pub use store::{MeetingQuery, NewAgent, NewMeeting, SessionStart, Store, WriteOnce};
pub use store_server::{spawn_store_server, StoreHandle};
