#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod pagination;
pub mod permissions;
pub mod progress;
pub mod time;

pub use error::Error;
pub use time::Clock;
