#![forbid(unsafe_code)]

mod locks;
mod statuses;

pub use locks::*;
pub use statuses::*;
