//! Single sign-on session linking between one central server and many brokers.
//!
//! The server side (`server`) verifies attach handshakes and resolves broker session ids back
//! to real user sessions through a shared `storage::BridgeCache`. The broker side (`broker`)
//! owns the client token and issues signed RPCs to the server.

pub mod config;
pub mod error;
pub mod linking;
pub mod identity;
pub mod storage;
pub mod server;
pub mod broker;

pub use config::{BrokerConfig, ServerConfig};
pub use error::{AppError, AppResult};

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
