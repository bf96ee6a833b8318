//! State persistence across process restarts

pub mod store;

pub use store::{JsonFileStore, NullStore, PersistedState, StateStore, STATE_VERSION};
