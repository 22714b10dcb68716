mod accelerated;
pub mod compare;
mod config;
pub mod data;
mod error;
mod handle;
mod harness;
mod kernel;
mod matrix;
mod metadata;
pub mod reference;
mod report;
mod storage;
mod timer;
mod workload;

pub use accelerated::*;
pub use compare::{bit_equal, Verdict};
pub use config::*;
pub use error::*;
pub use handle::*;
pub use harness::*;
pub use kernel::*;
pub use matrix::*;
pub use metadata::*;
pub use report::*;
pub use storage::*;
pub use timer::*;
pub use workload::*;
