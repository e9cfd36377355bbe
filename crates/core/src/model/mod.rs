#![forbid(unsafe_code)]

mod history;
mod patch;
mod record;

pub use history::*;
pub use patch::*;
pub use record::*;
