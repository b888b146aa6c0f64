//! 命令定义和实现

pub mod config;
pub mod list;
pub mod printer;
pub mod watch;

pub use config::ConfigCommand;
pub use list::ListCommand;
pub use printer::{BuzzCommand, CutCommand, PrintCommand, PrinterArgs, SendCommand};
pub use watch::WatchCommand;
