pub mod command;
pub mod processor;

pub use command::{Command, UserCommand};
pub use processor::CommandProcessor;
