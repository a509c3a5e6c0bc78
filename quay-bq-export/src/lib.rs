pub mod cli;
pub mod load_config;
pub mod warehouse;

pub use cli::{run, Cli, Commands, ExportArgs};
