//! Terminal presentation: the command line, console output, and notifications.

pub mod cli;
pub mod console;
pub mod notify;
