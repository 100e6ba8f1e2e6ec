pub mod args;
mod structs;

pub use args::CliArgs;
pub use structs::*;
