//! The on-disk credentials file.

pub mod data;
pub mod io;


pub use data::{Config, ConnectionSection, CredentialSection};
pub use io::ConfigError;
