pub mod charts;
pub mod constants;
pub mod data;
pub mod env;
pub mod error;
pub mod metrics;
pub mod net;
pub mod rl;
pub mod train;

pub use error::{Error, Result};
