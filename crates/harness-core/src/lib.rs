pub mod config;
pub mod error;
pub mod event;
pub mod io;
pub mod parser;
pub mod paths;
pub mod report;
pub mod session;
pub mod status;
pub mod verify;

pub use error::{HarnessError, Result};
