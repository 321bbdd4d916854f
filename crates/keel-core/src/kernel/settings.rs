use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::kernel::constants;
use crate::kernel::error::Result;

/// Raw settings document as written in `<configPath>/kernel.json`.
///
/// Every field is optional: absent keys fall back to the matching
/// environment variable and then to the built-in default, so a missing or
/// empty document is a fully valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSettings {
    pub modules_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub auto_start: Option<bool>,
    pub auto_recovery: Option<bool>,
    pub memory_analysis: RawMemoryAnalysis,
    pub leak_detection: RawLeakDetection,
    pub update_check: RawUpdateCheck,
    pub shutdown_timeout_ms: Option<u64>,
    pub plugins: Vec<PluginSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMemoryAnalysis {
    pub enabled: Option<bool>,
    pub initial_delay_ms: Option<u64>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawLeakDetection {
    pub enabled: Option<bool>,
    pub check_on_shutdown: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawUpdateCheck {
    pub enabled: Option<bool>,
    pub delay_ms: Option<u64>,
}

/// A manager plugin to load at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub options: Value,
}

/// Fully resolved host settings.
#[derive(Debug, Clone)]
pub struct KernelSettings {
    pub modules_path: PathBuf,
    pub config_path: PathBuf,
    pub auto_start: bool,
    pub auto_recovery: bool,
    pub memory_analysis: MemoryAnalysisSettings,
    pub leak_detection: LeakDetectionSettings,
    pub update_check: UpdateCheckSettings,
    pub shutdown_timeout: Duration,
    pub plugins: Vec<PluginSpec>,
}

#[derive(Debug, Clone)]
pub struct MemoryAnalysisSettings {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct LeakDetectionSettings {
    pub enabled: bool,
    pub check_on_shutdown: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateCheckSettings {
    pub enabled: bool,
    pub delay: Duration,
}

impl Default for KernelSettings {
    fn default() -> Self {
        KernelSettings::resolve(RawSettings::default(), Path::new(constants::DEFAULT_CONFIG_DIR))
    }
}

impl KernelSettings {
    /// Load settings from `<config_path>/kernel.json`.
    ///
    /// A missing document is not an error; environment variables and
    /// defaults fill the gaps.
    pub async fn load(config_path: &Path) -> Result<Self> {
        let file = config_path.join(constants::KERNEL_SETTINGS_FILE);
        let raw = match tokio::fs::read_to_string(&file).await {
            Ok(contents) => serde_json::from_str::<RawSettings>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RawSettings::default(),
            Err(e) => return Err(crate::kernel::error::KernelError::io(e, "read", file)),
        };
        Ok(Self::resolve(raw, config_path))
    }

    /// Resolve a raw document against environment fallbacks and defaults.
    ///
    /// Environment values apply only where the corresponding config key is
    /// absent.
    pub fn resolve(raw: RawSettings, config_path: &Path) -> Self {
        let memory_analysis = MemoryAnalysisSettings {
            enabled: raw
                .memory_analysis
                .enabled
                .or_else(|| env_bool("ENABLE_MEMORY_ANALYSIS"))
                .or_else(|| env_bool("ENABLE_PERIODIC_MEMORY_ANALYSIS"))
                .unwrap_or(true),
            initial_delay: Duration::from_millis(
                raw.memory_analysis
                    .initial_delay_ms
                    .or_else(|| env_u64("MEMORY_ANALYSIS_INITIAL_DELAY"))
                    .unwrap_or(60_000),
            ),
            interval: Duration::from_millis(
                raw.memory_analysis
                    .interval_ms
                    .or_else(|| env_u64("MEMORY_ANALYSIS_INTERVAL"))
                    .unwrap_or(1_800_000),
            ),
        };

        let leak_detection = LeakDetectionSettings {
            enabled: raw
                .leak_detection
                .enabled
                .or_else(|| env_bool("ENABLE_LEAK_DETECTION"))
                .unwrap_or(false),
            check_on_shutdown: raw
                .leak_detection
                .check_on_shutdown
                .or_else(|| env_bool("CHECK_LEAKS_ON_SHUTDOWN"))
                .unwrap_or(false),
        };

        let update_check = UpdateCheckSettings {
            enabled: raw.update_check.enabled.unwrap_or(false),
            delay: Duration::from_millis(
                raw.update_check
                    .delay_ms
                    .or_else(|| env_u64("UPDATE_CHECK_DELAY"))
                    .unwrap_or(60_000),
            ),
        };

        KernelSettings {
            modules_path: raw
                .modules_path
                .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_MODULES_DIR)),
            config_path: raw.config_path.unwrap_or_else(|| config_path.to_path_buf()),
            auto_start: raw.auto_start.unwrap_or(true),
            auto_recovery: raw
                .auto_recovery
                .or_else(|| env_bool("AUTO_RECOVERY"))
                .unwrap_or(true),
            memory_analysis,
            leak_detection,
            update_check,
            shutdown_timeout: Duration::from_millis(
                raw.shutdown_timeout_ms
                    .or_else(|| env_u64("SHUTDOWN_TIMEOUT"))
                    .unwrap_or(10_000),
            ),
            plugins: raw.plugins,
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().and_then(|v| match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
