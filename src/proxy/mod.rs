//! Outbound proxy handling
//!
//! This module provides:
//! - The proxy pool the dispatcher draws from
//! - Pre-run validation of candidate proxies

pub mod pool;
pub mod validator;

pub use pool::ProxyPool;
pub use validator::ProxyValidator;
