//! Wire contract between the payload console and the device web server.

pub mod domain;
pub mod error;
pub mod protocol;
