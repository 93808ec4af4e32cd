pub mod command;
pub mod executor;
