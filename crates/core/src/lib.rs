#![forbid(unsafe_code)]

pub mod model;
pub mod progress;
pub mod status;

pub use model::*;
pub use progress::ProgressCounter;
pub use status::{JobStatus, JobStatusError};

pub mod ids {
    use serde::{Deserialize, Serialize};

    /// Primary key of a status record, assigned by the store.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct StatusId(i64);

    impl StatusId {
        pub fn new(value: i64) -> Self {
            Self(value)
        }

        pub fn get(self) -> i64 {
            self.0
        }
    }

    impl std::fmt::Display for StatusId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl From<i64> for StatusId {
        fn from(value: i64) -> Self {
            Self(value)
        }
    }
}
