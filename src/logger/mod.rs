//! Background file logger, fed through an mpsc channel.
//!
//! Hand-rolled rather than pulled from `log`/`tracing`: a background
//! thread drains an `mpsc::Receiver<String>` and appends timestamped
//! lines to a log file, so no caller ever blocks on disk I/O.

pub mod error;
pub mod receiver;
pub mod sender;

pub use error::LoggerError;
pub use receiver::Logger;
pub use sender::LoggerSender;
