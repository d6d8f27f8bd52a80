use crate::error::CoreError;
use config::{Config as ConfigLoader, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

// Helper for (de)serializing Duration as milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Main configuration structure
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)] // Ensure fields default if missing in config source
pub struct Config {
    pub global: GlobalConfig,
    pub launch: LaunchConfig,
    pub session: SessionConfig,
}

// Global settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// Settings handed to the page launcher
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LaunchConfig {
    pub headless: bool,
    pub user_data_dir: Option<PathBuf>,
    pub args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_data_dir: None,
            args: Vec::new(),
        }
    }
}

/// Identity and behaviour of one session bootstrap.
///
/// A copy of this record travels through the restart loop; restarts derive a
/// new copy (credentials cleared, multi-device forced on) rather than
/// mutating shared state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub id: String,
    pub multi_device: bool,
    /// Base64 encoded credentials to restore the session from.
    pub session_data: Option<String>,
    /// Directory holding `<id>.data.json`, or the path of that file itself.
    pub session_data_path: Option<PathBuf>,
    pub timeouts: TimeoutConfig,
    pub qr: QrConfig,
    pub restart: RestartConfig,

    pub throw_error_on_tos_block: bool,
    pub throw_on_expired_session_data: bool,
    pub ignore_nuke: bool,
    pub delete_session_data_on_logout: bool,
    pub kill_process_on_timeout: bool,
    pub wait_for_ripe_session: bool,
    pub skip_session_save: bool,
    pub skip_patches: bool,
    pub skip_broken_methods_check: bool,
    /// Pause before the session validity check.
    pub safe_mode: bool,
    pub log_internal_events: bool,
    /// Forward page console output at `info` instead of `debug`.
    pub log_console: bool,
    /// Forward page errors at `error` instead of `debug`.
    pub log_console_errors: bool,
    /// Take a screenshot whenever the page logs a console error before the
    /// session is ready.
    pub screenshot_on_init_error: bool,
    /// Relaunch the session when its page crashes after it became ready.
    pub restart_on_crash: bool,
    /// Switch multi-device on when the multi-device profile directory of this
    /// session already exists.
    pub auto_multi_device: bool,
    pub license_key: Option<String>,
    /// Base64 encoded JSON credentials for the session backup bucket.
    pub session_data_bucket_auth: Option<String>,
    /// Root directory for diagnostic screenshots.
    pub screenshot_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: "session".to_string(),
            multi_device: false,
            session_data: None,
            session_data_path: None,
            timeouts: TimeoutConfig::default(),
            qr: QrConfig::default(),
            restart: RestartConfig::default(),
            throw_error_on_tos_block: false,
            throw_on_expired_session_data: false,
            ignore_nuke: false,
            delete_session_data_on_logout: true,
            kill_process_on_timeout: false,
            wait_for_ripe_session: true,
            skip_session_save: false,
            skip_patches: false,
            skip_broken_methods_check: false,
            safe_mode: false,
            log_internal_events: false,
            log_console: false,
            log_console_errors: false,
            screenshot_on_init_error: false,
            restart_on_crash: false,
            auto_multi_device: false,
            license_key: None,
            session_data_bucket_auth: None,
            screenshot_dir: PathBuf::from("logs"),
        }
    }
}

impl SessionConfig {
    /// Bound for the authentication race. `None` means wait forever.
    pub fn auth_timeout(&self) -> Option<Duration> {
        let default = if self.multi_device { 120 } else { 60 };
        secs_or_disabled(self.timeouts.auth_secs, default)
    }

    /// Bound for the QR loop, doubled under multi-device. `None` means wait forever.
    pub fn qr_timeout(&self) -> Option<Duration> {
        let bound = secs_or_disabled(self.timeouts.qr_secs, 60)?;
        Some(if self.multi_device { bound.saturating_mul(2) } else { bound })
    }

    /// Bound for the phone-unreachable probe after an auth timeout.
    pub fn out_of_reach_timeout(&self) -> Option<Duration> {
        secs_or_disabled(self.timeouts.out_of_reach_secs, 60)
    }

    /// Chromium profile directory, isolated per session under multi-device.
    pub fn user_data_dir(&self, launch: &LaunchConfig) -> Option<PathBuf> {
        if launch.user_data_dir.is_none() && !self.multi_device {
            return None;
        }
        Some(self.multi_device_dir(launch))
    }

    /// Where the multi-device profile of this session lives, whether or not
    /// multi-device is on.
    pub fn multi_device_dir(&self, launch: &LaunchConfig) -> PathBuf {
        if let Some(dir) = &launch.user_data_dir {
            return dir.clone();
        }
        let base = self
            .session_data_path
            .as_deref()
            .filter(|p| !p.to_string_lossy().contains(".data.json"))
            .unwrap_or_else(|| Path::new("."));
        base.join(format!("_IGNORE_{}", self.id))
    }
}

// 0 disables the bound, an absent value falls back to `default`
fn secs_or_disabled(configured: Option<u64>, default: u64) -> Option<Duration> {
    match configured {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(Duration::from_secs(default)),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub auth_secs: Option<u64>,
    pub qr_secs: Option<u64>,
    pub out_of_reach_secs: Option<u64>,
    /// Optional bound for reaching the landing page; past it a QR is assumed.
    #[serde(rename = "landing_ms", with = "option_duration_ms_serde")]
    pub landing: Option<Duration>,
    #[serde(rename = "page_ready_ms", with = "duration_ms_serde")]
    pub page_ready: Duration,
    #[serde(rename = "ripe_session_ms", with = "duration_ms_serde")]
    pub ripe_session: Duration,
    #[serde(rename = "validity_ms", with = "duration_ms_serde")]
    pub validity: Duration,
    #[serde(rename = "validity_polling_ms", with = "duration_ms_serde")]
    pub validity_polling: Duration,
    #[serde(rename = "safe_mode_pause_ms", with = "duration_ms_serde")]
    pub safe_mode_pause: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            auth_secs: None,
            qr_secs: None,
            out_of_reach_secs: None,
            landing: None,
            page_ready: Duration::from_secs(30),
            ripe_session: Duration::from_secs(5),
            validity: Duration::from_secs(9),
            validity_polling: Duration::from_millis(200),
            safe_mode_pause: Duration::from_secs(5),
        }
    }
}

mod option_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct QrConfig {
    /// Maximum number of challenges before giving up. `None` is unlimited.
    pub max: Option<u32>,
    /// Do not render challenges in the terminal.
    pub log_skip: bool,
    /// Upload rendered challenges to a QR relay and publish a share URL.
    pub relay: bool,
    pub relay_host: String,
    /// Wait up to 10s for the first challenge right after page load and emit it
    /// before authentication is observed.
    pub emit_first_early: bool,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            max: None,
            log_skip: false,
            relay: false,
            relay_host: "https://qr.openwa.cloud/".to_string(),
            emit_first_early: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RestartConfig {
    /// Total bootstrap attempts, the first one included.
    pub max_attempts: u32,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Loads configuration from default locations and environment variables.
///
/// Looks for `sesame.toml` (or `.json`, `.yaml`, etc.) in the current directory.
/// Overrides with environment variables prefixed with `SESAME_`.
/// (e.g., `SESAME_GLOBAL__LOG_LEVEL=debug`, `SESAME_SESSION__MULTI_DEVICE=true`)
/// Note the double underscore `__` for nested fields when using `Environment`.
pub fn load_config() -> Result<Config, CoreError> {
    load_config_from(None)
}

/// Like [`load_config`], reading `path` instead of `sesame.*` when given.
pub fn load_config_from(path: Option<&Path>) -> Result<Config, CoreError> {
    let file = match path {
        Some(p) => File::from(p).required(true),
        None => File::with_name("sesame").required(false),
    };

    let builder = ConfigLoader::builder()
        // Non-Option defaults; struct defaults cover the rest
        .set_default("global.log_level", "info")?
        .set_default("session.id", "session")?
        .set_default("session.restart.max_attempts", 3u64)?
        .add_source(file)
        // Load from environment variables (e.g., SESAME_SESSION__ID)
        // Use "__" as separator for nested structures
        .add_source(
            Environment::with_prefix("SESAME")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Deserialize the loaded configuration into the Config struct
    builder.try_deserialize().map_err(CoreError::ConfigLoad)
}
