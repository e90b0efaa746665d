//! Command-line settings and the values remembered between runs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MissionError, Result};
use crate::time_utils::{detect_time_format, get_system_timezone};

/// Default orchestrator streaming endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:8000/ws";

/// Per-user directory under `$HOME`.
pub const APP_DIR: &str = ".mission-control";

const LAST_USED_FILE: &str = "last_used.json";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Launch and supervise a multi-agent mission on a remote orchestrator
#[derive(Parser, Debug, Clone)]
#[command(name = "mission-control", version)]
pub struct Settings {
    /// Orchestrator streaming endpoint (ws:// or wss://)
    #[arg(long, env = "MISSION_CONTROL_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Mission specification JSON file
    #[arg(long, value_name = "FILE")]
    pub mission: Option<PathBuf>,

    /// IANA timezone for transcript timestamps
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Clock style for transcript timestamps
    #[arg(long, default_value = "auto", value_parser = ["12h", "24h", "auto"])]
    pub time_format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Shorthand for --log-level DEBUG
    #[arg(long)]
    pub debug: bool,

    /// Forget remembered values and start from defaults
    #[arg(long)]
    pub clear: bool,
}

impl Settings {
    /// Settings for this process, merged with the values remembered in
    /// `~/.mission-control/last_used.json`.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os(), &ConfigStore::in_home())
    }

    /// Parse `args`, fill unspecified flags from `store`, resolve `auto`
    /// values and remember the outcome for the next run.
    ///
    /// `--clear` wipes the store and nothing is written back.
    pub fn load_from_args<I, T>(args: I, store: &ConfigStore) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Settings::command().get_matches_from(args);
        let mut settings = Settings::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        if settings.clear {
            if let Err(e) = store.forget() {
                warn!(path = %store.path().display(), error = %e, "could not clear remembered settings");
            }
        } else {
            settings.fill_from(store.read(), &matches);
        }

        settings.finalise();

        if !settings.clear {
            if let Err(e) = store.write(&settings.remembered()) {
                debug!(error = %e, "could not remember settings");
            }
        }
        settings
    }

    /// The mission file to launch.
    pub fn mission_path(&self) -> Result<&Path> {
        self.mission.as_deref().ok_or_else(|| {
            MissionError::Config("no mission specification given; pass --mission <FILE>".to_string())
        })
    }

    /// Whether transcript timestamps use a 12-hour clock.
    pub fn twelve_hour(&self) -> bool {
        detect_time_format(&self.timezone, Some(&self.time_format))
    }

    /// Take remembered values for every flag left at its default.
    fn fill_from(&mut self, last: LastUsed, matches: &ArgMatches) {
        let defaulted = |id: &str| {
            !matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            )
        };

        if let Some(url) = last.url.filter(|_| defaulted("url")) {
            self.url = url;
        }
        if self.mission.is_none() {
            self.mission = last.mission;
        }
        if let Some(tz) = last.timezone.filter(|_| defaulted("timezone")) {
            self.timezone = tz;
        }
        // clap ids follow the field name, not the flag spelling.
        if let Some(format) = last.time_format.filter(|_| defaulted("time_format")) {
            self.time_format = format;
        }
    }

    fn finalise(&mut self) {
        if self.timezone == "auto" {
            self.timezone = get_system_timezone();
        }
        if self.time_format == "auto" {
            let twelve = detect_time_format(&self.timezone, None);
            self.time_format = if twelve { "12h" } else { "24h" }.to_string();
        }
        // A remembered relative path would break when run from elsewhere.
        self.mission = self.mission.take().map(|path| match std::env::current_dir() {
            Ok(cwd) if path.is_relative() => cwd.join(path),
            _ => path,
        });
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
    }

    fn remembered(&self) -> LastUsed {
        LastUsed {
            url: Some(self.url.clone()),
            mission: self.mission.clone(),
            timezone: Some(self.timezone.clone()),
            time_format: Some(self.time_format.clone()),
        }
    }
}

// ── LastUsed ───────────────────────────────────────────────────────────────────

/// Values carried over from the previous run.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct LastUsed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_format: Option<String>,
}

// ── ConfigStore ────────────────────────────────────────────────────────────────

/// The file holding [`LastUsed`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// `~/.mission-control/last_used.json`, or relative to the working
    /// directory when there is no home directory.
    pub fn in_home() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::under(&home)
    }

    /// The store rooted at `base`, i.e. `<base>/.mission-control/last_used.json`.
    pub fn under(base: &Path) -> Self {
        Self {
            path: base.join(APP_DIR).join(LAST_USED_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remembered values; empty when the file is absent or unreadable.
    pub fn read(&self) -> LastUsed {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LastUsed::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read remembered settings");
                return LastUsed::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ignoring corrupt remembered settings");
            LastUsed::default()
        })
    }

    /// Replace the file contents. Readers never observe a partial write.
    pub fn write(&self, values: &LastUsed) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        let staging = self.path.with_file_name(format!(".{LAST_USED_FILE}.partial"));
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    /// Delete the file. A missing file is not an error.
    pub fn forget(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> Vec<String> {
        std::iter::once("mission-control")
            .chain(extra.iter().copied())
            .map(String::from)
            .collect()
    }

    fn saved(store: &ConfigStore) -> LastUsed {
        let values = LastUsed {
            url: Some("ws://saved:9000/ws".to_string()),
            mission: Some(PathBuf::from("/missions/saved.json")),
            timezone: Some("UTC".to_string()),
            time_format: Some("24h".to_string()),
        };
        store.write(&values).expect("write");
        values
    }

    // ── ConfigStore ───────────────────────────────────────────────────────────

    #[test]
    fn test_store_path_layout() {
        let store = ConfigStore::under(Path::new("/home/op"));
        assert_eq!(
            store.path(),
            Path::new("/home/op/.mission-control/last_used.json")
        );
    }

    #[test]
    fn test_store_write_then_read() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());
        let values = saved(&store);

        assert_eq!(store.read(), values);
        let leftovers: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1, "staging file must be renamed away");
    }

    #[test]
    fn test_store_missing_or_corrupt_reads_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());
        assert_eq!(store.read(), LastUsed::default());

        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.read(), LastUsed::default());
    }

    #[test]
    fn test_store_partial_file_keeps_known_fields() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), r#"{"timezone":"Asia/Tokyo","unknown":true}"#).unwrap();

        let read = store.read();
        assert_eq!(read.timezone.as_deref(), Some("Asia/Tokyo"));
        assert!(read.url.is_none());
    }

    #[test]
    fn test_store_forget_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());
        saved(&store);
        store.forget().expect("forget");
        assert!(!store.path().exists());
        store.forget().expect("forget again");
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    #[test]
    fn test_cli_defaults() {
        let settings = Settings::parse_from(args(&[]));
        assert_eq!(settings.url, DEFAULT_URL);
        assert!(settings.mission.is_none());
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.time_format, "auto");
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug && !settings.clear);
    }

    #[test]
    fn test_rejects_unknown_time_format() {
        let result = Settings::try_parse_from(args(&["--time-format", "36h"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_remembered_values_fill_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());
        saved(&store);

        let settings = Settings::load_from_args(args(&[]), &store);
        assert_eq!(settings.url, "ws://saved:9000/ws");
        assert_eq!(settings.mission, Some(PathBuf::from("/missions/saved.json")));
        assert_eq!(settings.timezone, "UTC");
        assert!(!settings.twelve_hour());
    }

    #[test]
    fn test_explicit_flags_beat_remembered_values() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());
        saved(&store);

        let settings = Settings::load_from_args(
            args(&["--mission", "/missions/fresh.json", "--time-format", "12h"]),
            &store,
        );
        assert_eq!(settings.mission, Some(PathBuf::from("/missions/fresh.json")));
        assert_eq!(settings.timezone, "UTC");
        assert!(settings.twelve_hour());
        assert_eq!(store.read().time_format.as_deref(), Some("12h"));
    }

    #[test]
    fn test_relative_mission_path_is_absolutised() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());

        let settings = Settings::load_from_args(args(&["--mission", "alpha.json"]), &store);
        let mission = settings.mission.expect("mission");
        assert!(mission.is_absolute());
        assert!(mission.ends_with("alpha.json"));
        assert_eq!(store.read().mission, Some(mission));
    }

    #[test]
    fn test_clear_forgets_and_does_not_rewrite() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());
        saved(&store);

        let settings = Settings::load_from_args(args(&["--clear"]), &store);
        assert!(!store.path().exists());
        assert_eq!(settings.url, DEFAULT_URL);
        assert!(settings.mission.is_none());
    }

    #[test]
    fn test_debug_forces_debug_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_from_args(
            args(&["--debug", "--log-level", "ERROR"]),
            &ConfigStore::under(tmp.path()),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_auto_time_format_resolved_and_remembered() {
        let tmp = TempDir::new().expect("tempdir");
        let store = ConfigStore::under(tmp.path());

        let settings = Settings::load_from_args(args(&["--timezone", "Asia/Tokyo"]), &store);
        assert_eq!(settings.time_format, "24h");

        let remembered = store.read();
        assert_eq!(remembered.timezone.as_deref(), Some("Asia/Tokyo"));
        assert_eq!(remembered.time_format.as_deref(), Some("24h"));
    }

    #[test]
    fn test_mission_path_required() {
        let settings = Settings::parse_from(args(&[]));
        let err = settings.mission_path().unwrap_err();
        assert!(matches!(err, MissionError::Config(_)));

        let settings = Settings::parse_from(args(&["--mission", "m.json"]));
        assert_eq!(settings.mission_path().unwrap(), Path::new("m.json"));
    }
}
