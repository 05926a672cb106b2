pub mod agent;
pub mod batch;
pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod extract;
pub mod forms;
pub mod report;
pub mod types;

pub use error::LexError;
pub use types::*;
