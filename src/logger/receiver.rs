use std::fs::{self, File};
use std::io::Write;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use chrono::Local;

use super::error::LoggerError;
use super::sender::LoggerSender;

const LOGGER_THREAD_NAME: &str = "logger";

/// A background file logger. Every line sent through a `LoggerSender` is
/// timestamped and appended on a dedicated thread, so no caller ever
/// blocks on disk I/O.
#[derive(Debug)]
pub struct Logger {
    sender: LoggerSender,
}

impl Logger {
    /// Creates (or appends to) a timestamped log file under `dir_path` and
    /// spawns the background writer thread.
    pub fn new(dir_path: &str) -> Result<Self, LoggerError> {
        let (sender, receiver): (Sender<String>, Receiver<String>) = channel();
        let file = Self::create_log_file(dir_path)?;
        Self::spawn_writer(receiver, file)?;
        Ok(Self {
            sender: LoggerSender::new(sender),
        })
    }

    /// A logger that writes straight to stderr instead of a file — used
    /// when `log_directory` is unusable, since logging must never be a
    /// fatal dependency for a download.
    pub fn stderr() -> Self {
        let (sender, receiver): (Sender<String>, Receiver<String>) = channel();
        thread::Builder::new()
            .name(LOGGER_THREAD_NAME.to_string())
            .spawn(move || {
                while let Ok(line) = receiver.recv() {
                    eprintln!("{} {}", Local::now().format("[%Y/%m/%d %H:%M:%S]"), line);
                }
            })
            .expect("spawning the fallback stderr logger thread");
        Self {
            sender: LoggerSender::new(sender),
        }
    }

    pub fn sender(&self) -> LoggerSender {
        self.sender.clone()
    }

    fn spawn_writer(receiver: Receiver<String>, mut file: File) -> Result<(), LoggerError> {
        thread::Builder::new()
            .name(LOGGER_THREAD_NAME.to_string())
            .spawn(move || {
                while let Ok(line) = receiver.recv() {
                    let formatted = format!(
                        "{} {}\n",
                        Local::now().format("[%Y/%m/%d %H:%M:%S]"),
                        line
                    );
                    if let Err(err) = file.write_all(formatted.as_bytes()) {
                        eprintln!("error writing to log file: {err}");
                    }
                }
            })
            .map(|_| ())
            .map_err(|_| LoggerError::SpawnThreadError)
    }

    fn create_log_file(dir_path: &str) -> Result<File, LoggerError> {
        fs::create_dir_all(dir_path)
            .map_err(|_| LoggerError::BadLogPathError(dir_path.to_string()))?;
        let time = Local::now();
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(format!("{}/{}.log", dir_path, time.format("%Y-%m-%d_%H-%M-%S")))
            .map_err(|_| LoggerError::BadLogPathError(dir_path.to_string()))
    }
}
