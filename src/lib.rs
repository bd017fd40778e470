pub mod cli_interface;
pub mod error;
mod fs;
pub mod mkfs;
pub mod mount;
pub mod shell;
pub mod utils;
pub use error::{ErrorKind, FsError, Result};
pub use fs::*;
