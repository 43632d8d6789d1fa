use std::sync::mpsc::Sender;

/// A cheap-to-clone handle to a `Logger`'s background writer thread.
#[derive(Debug, Clone)]
pub struct LoggerSender {
    sender: Sender<String>,
}

impl LoggerSender {
    pub(super) fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }

    pub fn info(&self, message: &str) {
        self.send("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        self.send("WARN", message);
    }

    pub fn error(&self, message: &str) {
        self.send("ERROR", message);
    }

    fn send(&self, level: &str, message: &str) {
        // The background thread only ever stops once every LoggerSender
        // clone (and the Logger itself) is dropped, so a send error here
        // would mean a logic bug, not a condition worth propagating.
        let _ = self.sender.send(format!("[{level}] {message}"));
    }
}
