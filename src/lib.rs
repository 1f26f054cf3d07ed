pub mod authorization;
pub mod config;
pub mod error;
pub mod server;
pub mod view;

pub use error::{KeySourceError, TermInfoError};
