//! Command implementations
//!
//! Each command is a module with an execute function that takes parsed CLI
//! args and runs the operation against a manifest.

pub mod config;
pub mod convert;
pub mod list;
pub mod verify;

pub use config::execute as config;
pub use convert::execute as convert;
pub use list::execute as list;
pub use verify::execute as verify;
