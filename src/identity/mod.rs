//! Identity collaborators and per-request session state for the SSO server.
//! Keep the public surface thin and split implementation across sub-modules.

mod session;
mod provider;
mod request_context;

pub use session::{Session, SessionStore, MemorySessionStore, USER_KEY};
pub use provider::{SsoProvider, StaticProvider, StaticUser, BrokerInfo, AuthRejected, hash_password, verify_password};
pub use request_context::RequestContext;
