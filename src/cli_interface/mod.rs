//! command line interface of `myfs`
mod cli_struct;
pub use cli_struct::*;
