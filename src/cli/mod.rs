pub mod args;
pub mod commands;

pub use args::{Cli, Commands, PolicyArg, UnseenArg};
pub use commands::run;
