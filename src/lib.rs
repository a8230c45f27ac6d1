pub mod domains;
pub mod errors;
pub mod infrastructure;

pub use domains::agents::CodingAgent;
pub use domains::sessions::{PersistedSession, SessionConfig, SessionManager, SessionType};
pub use domains::settings::{McpServerConfig, TerminalSettings};
pub use domains::terminal::{TerminalBackend, TerminalManager};
pub use errors::LeitError;
pub use infrastructure::events::{EventBus, LeitEvent};
pub use infrastructure::store::{JsonFileStore, KvStore, MemoryStore};
