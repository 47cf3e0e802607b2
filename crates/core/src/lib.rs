pub mod config;
pub mod error;
pub mod operation;
pub mod protocol;

pub use config::Config;
pub use error::*;
pub use operation::Operation;
pub use protocol::*;
