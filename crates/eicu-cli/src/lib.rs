//! Library side of the `eicu-tuples` command line tool.

pub mod commands;
pub mod logging;
pub mod types;
