//! Message broker implementations.
//!
//! - [`RedisStreamWriter`] - Publishes click facts to a Redis stream
//! - [`RedisStreamReader`] - Consumer-group reader with dead-letter support

pub mod redis_stream;

pub use redis_stream::{RedisStreamReader, RedisStreamWriter, dead_letter_topic};
