use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

pub enum MessageLogMode {
    Full,
    CommandsOnly,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { mode, file })
    }

    pub fn log_login(&mut self, status: u16) {
        if matches!(self.mode, MessageLogMode::CommandsOnly) {
            return;
        }
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "login",
            "status": status,
        });
        self.write_line(&entry);
    }

    pub fn log_fetch(&mut self, status: u16, body: &Value) {
        if matches!(self.mode, MessageLogMode::CommandsOnly) {
            return;
        }
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "fetch",
            "status": status,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, unit_id: &str, payload: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "unit": unit_id,
            "body": payload,
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
