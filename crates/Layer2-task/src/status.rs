//! Status record - completion metadata for one task
//!
//! The on-disk form is a flat list of POSIX shell assignments
//! (`EXIT_CODE=0`, `COMMAND='make test'`, ...). Values are quoted with
//! `shlex` so the file can still be sourced by a shell, while decoding
//! here is a pure tokenizer that never touches any ambient namespace.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use taskmux_foundation::{Error, Result, STAGING_SUFFIX};
use tracing::debug;

const KEY_EXIT_CODE: &str = "EXIT_CODE";
const KEY_COMMAND: &str = "COMMAND";
const KEY_STARTED_AT: &str = "STARTED_AT";
const KEY_FINISHED_AT: &str = "FINISHED_AT";
const KEY_DURATION_SECONDS: &str = "DURATION_SECONDS";
const KEY_LOG_FILE: &str = "LOG_FILE";
const KEY_WORKDIR: &str = "WORKDIR";
const KEY_ENV_VARS: &str = "ENV_VARS";

/// Outcome of one finished task.
///
/// Missing or malformed fields decode to `None` / empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub exit_code: Option<i32>,
    pub command: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub log_file: String,
    pub workdir: String,
    pub env_vars: String,
}

impl StatusRecord {
    /// Check if the task exited 0
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn started_epoch(&self) -> Option<i64> {
        self.started_at.map(|t| t.timestamp())
    }

    pub fn finished_epoch(&self) -> Option<i64> {
        self.finished_at.map(|t| t.timestamp())
    }

    /// Short outcome label for listings
    pub fn outcome(&self) -> String {
        match self.exit_code {
            Some(0) => "ok".to_string(),
            Some(code) => format!("exit {}", code),
            None => "unknown".to_string(),
        }
    }

    fn set(&mut self, key: &str, value: String) {
        match key.to_ascii_uppercase().as_str() {
            KEY_EXIT_CODE => self.exit_code = value.trim().parse().ok(),
            KEY_COMMAND => self.command = value,
            KEY_STARTED_AT => self.started_at = parse_timestamp(&value),
            KEY_FINISHED_AT => self.finished_at = parse_timestamp(&value),
            KEY_DURATION_SECONDS => self.duration_seconds = value.trim().parse().ok(),
            KEY_LOG_FILE => self.log_file = value,
            KEY_WORKDIR => self.workdir = value,
            KEY_ENV_VARS => self.env_vars = value,
            other => debug!("Ignoring unknown status field {}", other),
        }
    }
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn quote(key: &str, value: &str) -> Result<String> {
    shlex::try_quote(value)
        .map(|q| format!("{}={}", key, q))
        .map_err(|e| Error::InvalidArgument(format!("cannot encode {}: {}", key, e)))
}

// ============================================================================
// Codec
// ============================================================================

/// Encode a record as shell assignments, one field per line
pub fn encode(record: &StatusRecord) -> Result<String> {
    let exit_code = record.exit_code.map(|c| c.to_string()).unwrap_or_default();
    let duration = record
        .duration_seconds
        .map(|d| d.to_string())
        .unwrap_or_default();

    let lines = [
        quote(KEY_EXIT_CODE, &exit_code)?,
        quote(KEY_COMMAND, &record.command)?,
        quote(KEY_STARTED_AT, &format_timestamp(record.started_at))?,
        quote(KEY_FINISHED_AT, &format_timestamp(record.finished_at))?,
        quote(KEY_DURATION_SECONDS, &duration)?,
        quote(KEY_LOG_FILE, &record.log_file)?,
        quote(KEY_WORKDIR, &record.workdir)?,
        quote(KEY_ENV_VARS, &record.env_vars)?,
    ];

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// Decode shell assignments into a record. Never fails.
pub fn decode(content: &str) -> StatusRecord {
    let mut record = StatusRecord::default();

    match shlex::split(content) {
        Some(words) => {
            for word in words {
                if let Some((key, value)) = word.split_once('=') {
                    record.set(key.trim(), value.to_string());
                }
            }
        }
        None => {
            // Unbalanced quoting somewhere; salvage what parses line by line
            for line in content.lines() {
                let Some((key, raw)) = line.split_once('=') else {
                    continue;
                };
                let value = shlex::split(raw)
                    .map(|words| words.join(" "))
                    .unwrap_or_else(|| raw.to_string());
                record.set(key.trim(), value);
            }
        }
    }

    record
}

// ============================================================================
// File I/O
// ============================================================================

/// Read a status file. A missing file is `Ok(None)`; an empty one decodes
/// to an empty record.
pub fn read(path: &Path) -> Result<Option<StatusRecord>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(decode(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a status file in a single rename so readers never see a partial record
pub fn write_atomic(path: &Path, record: &StatusRecord) -> Result<()> {
    let content = encode(record)?;
    let staging = staging_path(path);
    std::fs::write(&staging, content)?;
    if let Err(e) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(STAGING_SUFFIX);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> StatusRecord {
        StatusRecord {
            exit_code: Some(3),
            command: r#"echo "it's a test" && grep 'x y' file"#.to_string(),
            started_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            finished_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 30).unwrap()),
            duration_seconds: Some(90),
            log_file: "/tmp/task logs/task-build-1.log".to_string(),
            workdir: "/home/me/my project".to_string(),
            env_vars: "FOO=bar BAZ=two words".to_string(),
        }
    }

    #[test]
    fn test_round_trip_with_quotes_and_spaces() {
        let record = sample();
        let decoded = decode(&encode(&record).unwrap());
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_round_trip_multiline_value() {
        let mut record = sample();
        record.command = "printf 'a\nb'\necho done".to_string();
        assert_eq!(decode(&encode(&record).unwrap()), record);
    }

    #[test]
    fn test_encoding_is_sourceable_assignment_list() {
        let encoded = encode(&sample()).unwrap();
        let keys: Vec<&str> = encoded
            .lines()
            .filter_map(|l| l.split_once('=').map(|(k, _)| k))
            .collect();
        assert_eq!(
            keys,
            vec![
                "EXIT_CODE",
                "COMMAND",
                "STARTED_AT",
                "FINISHED_AT",
                "DURATION_SECONDS",
                "LOG_FILE",
                "WORKDIR",
                "ENV_VARS"
            ]
        );
        assert!(encoded.contains("2024-05-01T12:00:00Z"));
        assert_eq!(sample().started_epoch(), Some(1_714_564_800));
        assert_eq!(sample().finished_epoch(), Some(1_714_564_890));
    }

    #[test]
    fn test_missing_and_unknown_fields() {
        let record = decode("EXIT_CODE=0\nSOMETHING_ELSE='x'\n");
        assert_eq!(record.exit_code, Some(0));
        assert!(record.is_success());
        assert_eq!(record.command, "");
        assert!(record.started_at.is_none());
        assert!(record.duration_seconds.is_none());
    }

    #[test]
    fn test_malformed_values_decode_to_none() {
        let record = decode("EXIT_CODE=abc\nSTARTED_AT=yesterday\nDURATION_SECONDS=\n");
        assert!(record.exit_code.is_none());
        assert!(record.started_at.is_none());
        assert!(record.duration_seconds.is_none());
        assert_eq!(record.outcome(), "unknown");
    }

    #[test]
    fn test_unbalanced_quotes_fall_back_per_line() {
        let record = decode("EXIT_CODE=2\nCOMMAND='broken\nWORKDIR='/srv/app'\n");
        assert_eq!(record.exit_code, Some(2));
        assert_eq!(record.workdir, "/srv/app");
        assert_eq!(record.outcome(), "exit 2");
    }

    #[test]
    fn test_encode_rejects_nul() {
        let mut record = sample();
        record.command = "a\0b".to_string();
        assert!(matches!(encode(&record), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_read_missing_vs_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("task-x-1.status");
        assert!(read(&missing).unwrap().is_none());

        let empty = dir.path().join("task-x-2.status");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(read(&empty).unwrap(), Some(StatusRecord::default()));
    }

    #[test]
    fn test_write_atomic_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-x-3.status");
        write_atomic(&path, &sample()).unwrap();

        assert_eq!(read(&path).unwrap(), Some(sample()));
        assert!(!staging_path(&path).exists());
    }
}
