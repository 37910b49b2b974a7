//! Configuration types
//!
//! Motor and board configuration, optionally stored as postcard binary data.

pub mod board;
pub mod motor;

pub use board::*;
pub use motor::*;
