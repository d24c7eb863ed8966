pub mod checkpoint;
pub mod config;
pub mod error;
pub mod executor;
pub mod io;
pub mod lifecycle;
pub mod paths;
pub mod sprint;
pub mod status;

pub use error::{BmadError, Result};
