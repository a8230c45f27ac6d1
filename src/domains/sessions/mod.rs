pub mod entity;
pub mod process_map;
pub mod registry;
pub mod service;

pub use entity::{PersistedSession, SessionConfig, SessionType};
pub use process_map::{PollerRegistry, ProcessRegistry};
pub use registry::SessionRegistry;
pub use service::SessionManager;
