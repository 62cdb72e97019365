/*
 * This file is part of Pifan.
 *
 * Copyright (C) 2025 Pifan contributors
 *
 * Pifan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Pifan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Pifan. If not, see <https://www.gnu.org/licenses/>.
 */

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crossterm::tty::IsTty;
use lazy_static::lazy_static;
use serde_json::{json, Value};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_ENV: &str = "PIFAN_LOG";
pub const SYSLOG_IDENTIFIER: &str = "pifan";

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";
const DEFAULT_EVENT_LOG_PATH: &str = "/var/log/pifan/events.json";
const FALLBACK_EVENT_LOG_PATH: &str = "/tmp/pifan_events.json";

/// Where log lines go. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    /// Interactive: human-readable lines with timestamps on stderr
    Terminal,
    /// Service under systemd
    Journald,
    /// Service without a journal: plain lines, no colors
    Plain,
}

impl LogSink {
    pub fn detect() -> Self {
        Self::choose(std::io::stdout().is_tty(), Path::new(JOURNALD_SOCKET).exists())
    }

    pub fn choose(interactive: bool, journald_available: bool) -> Self {
        match (interactive, journald_available) {
            (true, _) => LogSink::Terminal,
            (false, true) => LogSink::Journald,
            (false, false) => LogSink::Plain,
        }
    }
}

impl fmt::Display for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSink::Terminal => write!(f, "terminal"),
            LogSink::Journald => write!(f, "systemd journal"),
            LogSink::Plain => write!(f, "stderr"),
        }
    }
}

fn env_filter() -> EnvFilter {
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber for `sink`. Returns the sink that
/// was actually installed (journald falls back to plain output).
pub fn init_tracing(sink: LogSink) -> LogSink {
    match sink {
        LogSink::Terminal => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .with_env_filter(env_filter())
                .init();
            LogSink::Terminal
        }
        LogSink::Journald => match tracing_journald::layer() {
            Ok(layer) => {
                tracing_subscriber::registry()
                    .with(layer.with_syslog_identifier(SYSLOG_IDENTIFIER.to_string()))
                    .with(env_filter())
                    .init();
                LogSink::Journald
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stderr", e);
                init_tracing(LogSink::Plain)
            }
        },
        LogSink::Plain => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .without_time()
                .with_target(false)
                .with_level(true)
                .with_env_filter(env_filter())
                .init();
            LogSink::Plain
        }
    }
}

// ============================================================================
// JSON event journal (--logging)
// ============================================================================

lazy_static! {
    static ref EVENT_LOG: Mutex<Option<File>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Open the lifecycle event journal. Falls back to /tmp when the default
/// location is not writable; returns the path in use, if any.
pub fn init_event_log(path: Option<&Path>) -> Option<PathBuf> {
    let candidates = [
        path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_EVENT_LOG_PATH)),
        PathBuf::from(FALLBACK_EVENT_LOG_PATH),
    ];
    for candidate in candidates {
        if let Some(f) = open_append(&candidate) {
            if let Ok(mut guard) = EVENT_LOG.lock() {
                *guard = Some(f);
            }
            return Some(candidate);
        }
    }
    None
}

/// Append one `{ts_ms, event, data}` line. No-op until [`init_event_log`].
pub fn log_event(event: &str, data: Value) {
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    })
    .to_string();

    if let Ok(mut guard) = EVENT_LOG.lock() {
        if let Some(f) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}
