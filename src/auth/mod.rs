mod session;
mod store;

pub use session::{AuthSession, DEFAULT_IDLE_TIMEOUT};
pub use store::{SessionStore, SessionStoreError};
