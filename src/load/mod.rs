//! Load generation
//!
//! This module provides:
//! - The HTTP transport seam and its reqwest implementation
//! - The per-attempt dispatcher with retry/backoff
//! - User-Agent rotation

pub mod dispatcher;
pub mod retry;
pub mod transport;
pub mod user_agent;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportRequest};
