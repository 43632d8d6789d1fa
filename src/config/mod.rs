//! Client configuration: a small `NAME=value` file, read if present.
//!
//! No external config crate, just line-oriented parsing. A missing or
//! malformed config file is not fatal — the client has sensible defaults
//! for every setting and must be runnable with zero configuration.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

const TCP_PORT: &str = "TCP_PORT";
const LOG_DIRECTORY: &str = "LOG_DIRECTORY";
const DOWNLOAD_DIRECTORY: &str = "DOWNLOAD_DIRECTORY";
const MAX_PEERS: &str = "MAX_PEERS";
const PIPELINING_SIZE: &str = "PIPELINING_SIZE";
const READ_WRITE_TIMEOUT_SECS: &str = "READ_WRITE_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct Cfg {
    pub tcp_port: u16,
    pub log_directory: String,
    pub download_directory: String,
    pub max_peers: usize,
    pub pipelining_size: u32,
    pub read_write_timeout_secs: u64,
}

impl Default for Cfg {
    fn default() -> Self {
        Self {
            tcp_port: 6881,
            log_directory: ".".to_string(),
            download_directory: ".".to_string(),
            max_peers: 80,
            pipelining_size: 1,
            read_write_timeout_secs: 30,
        }
    }
}

#[derive(Debug)]
pub enum CfgError {
    Io(io::Error),
    BadLine(String),
    UnknownSetting(String),
    NotANumber { setting: &'static str, value: String },
}

impl Cfg {
    /// Loads settings from `path`, falling back to defaults for anything
    /// not present. Returns an error only for lines that are malformed or
    /// name an unknown setting or a non-numeric value for a numeric one —
    /// a missing file is not an error (see `load_or_default`).
    pub fn load(path: &str) -> Result<Cfg, CfgError> {
        let file = File::open(path).map_err(CfgError::Io)?;
        let reader = BufReader::new(file);
        let mut cfg = Cfg::default();

        for line in reader.lines() {
            let line = line.map_err(CfgError::Io)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, '=');
            let (name, value) = match (parts.next(), parts.next()) {
                (Some(n), Some(v)) => (n, v),
                _ => return Err(CfgError::BadLine(line.to_string())),
            };
            cfg.apply_setting(name, value)?;
        }
        Ok(cfg)
    }

    /// The CLI's entry point: config is optional, so a missing file (or
    /// any read error) silently yields defaults instead of aborting the
    /// download.
    pub fn load_or_default(path: &str) -> Cfg {
        Cfg::load(path).unwrap_or_default()
    }

    fn apply_setting(&mut self, name: &str, value: &str) -> Result<(), CfgError> {
        match name {
            TCP_PORT => self.tcp_port = parse_numeric(TCP_PORT, value)?,
            LOG_DIRECTORY => self.log_directory = value.to_string(),
            DOWNLOAD_DIRECTORY => self.download_directory = value.to_string(),
            MAX_PEERS => self.max_peers = parse_numeric(MAX_PEERS, value)?,
            PIPELINING_SIZE => self.pipelining_size = parse_numeric(PIPELINING_SIZE, value)?,
            READ_WRITE_TIMEOUT_SECS => {
                self.read_write_timeout_secs = parse_numeric(READ_WRITE_TIMEOUT_SECS, value)?
            }
            other => return Err(CfgError::UnknownSetting(other.to_string())),
        }
        Ok(())
    }
}

fn parse_numeric<T: std::str::FromStr>(setting: &'static str, value: &str) -> Result<T, CfgError> {
    value.parse().map_err(|_| CfgError::NotANumber {
        setting,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> String {
        let path = format!("./{name}");
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Cfg::load_or_default("./does_not_exist.cfg");
        assert_eq!(cfg.tcp_port, Cfg::default().tcp_port);
    }

    #[test]
    fn loads_recognized_settings() {
        let path = write_temp(
            "test_cfg_good.cfg",
            "TCP_PORT=7000\nLOG_DIRECTORY=./log\nDOWNLOAD_DIRECTORY=./dl\nMAX_PEERS=10\n",
        );
        let cfg = Cfg::load(&path).unwrap();
        assert_eq!(cfg.tcp_port, 7000);
        assert_eq!(cfg.log_directory, "./log");
        assert_eq!(cfg.download_directory, "./dl");
        assert_eq!(cfg.max_peers, 10);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn unknown_setting_is_an_error() {
        let path = write_temp("test_cfg_bad_setting.cfg", "NOT_A_SETTING=1\n");
        assert!(matches!(Cfg::load(&path), Err(CfgError::UnknownSetting(_))));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        let path = write_temp("test_cfg_bad_port.cfg", "TCP_PORT=abcd\n");
        assert!(matches!(Cfg::load(&path), Err(CfgError::NotANumber { .. })));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn setting_order_does_not_matter() {
        let path = write_temp("test_cfg_order.cfg", "DOWNLOAD_DIRECTORY=./dl2\nTCP_PORT=1234\n");
        let cfg = Cfg::load(&path).unwrap();
        assert_eq!(cfg.tcp_port, 1234);
        assert_eq!(cfg.download_directory, "./dl2");
        std::fs::remove_file(path).unwrap();
    }
}
