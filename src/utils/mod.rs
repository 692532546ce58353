//! Utility functions for alias generation and request handling.
//!
//! - [`code_generator`] - Alias generation and validation
//! - [`client_ip`] - Client address extraction from HTTP headers

pub mod client_ip;
pub mod code_generator;
