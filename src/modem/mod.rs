pub mod command;
pub mod frame;
pub mod scanner;
pub mod transport;
