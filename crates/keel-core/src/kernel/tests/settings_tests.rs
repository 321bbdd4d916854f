use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::tempdir;

use crate::kernel::settings::{KernelSettings, RawSettings};

/// Tests below read or write process environment variables; serialize them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    match ENV_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn resolve(raw: RawSettings) -> KernelSettings {
    KernelSettings::resolve(raw, Path::new("config"))
}

#[test]
fn test_defaults() {
    let _env = env_guard();
    let settings = resolve(RawSettings::default());
    assert_eq!(settings.modules_path, Path::new("modules"));
    assert_eq!(settings.config_path, Path::new("config"));
    assert!(settings.auto_start);
    assert!(settings.auto_recovery);
    assert!(settings.memory_analysis.enabled);
    assert!(!settings.leak_detection.enabled);
    assert!(!settings.update_check.enabled);
    assert_eq!(settings.shutdown_timeout, Duration::from_millis(10_000));
    assert!(settings.plugins.is_empty());
}

#[test]
fn test_camel_case_document_overrides_defaults() {
    let raw: RawSettings = serde_json::from_str(
        r#"{
            "modulesPath": "bundles",
            "autoStart": false,
            "autoRecovery": false,
            "memoryAnalysis": { "enabled": false, "intervalMs": 1000 },
            "leakDetection": { "enabled": true, "checkOnShutdown": true },
            "updateCheck": { "enabled": true, "delayMs": 250 },
            "shutdownTimeoutMs": 2500,
            "plugins": [ { "path": "plugins/audit.so", "options": {"level": 2} } ]
        }"#,
    )
    .unwrap();

    let settings = resolve(raw);
    assert_eq!(settings.modules_path, Path::new("bundles"));
    assert!(!settings.auto_start);
    assert!(!settings.auto_recovery);
    assert!(!settings.memory_analysis.enabled);
    assert_eq!(settings.memory_analysis.interval, Duration::from_millis(1000));
    assert!(settings.leak_detection.enabled);
    assert!(settings.leak_detection.check_on_shutdown);
    assert!(settings.update_check.enabled);
    assert_eq!(settings.update_check.delay, Duration::from_millis(250));
    assert_eq!(settings.shutdown_timeout, Duration::from_millis(2500));
    assert_eq!(settings.plugins.len(), 1);
    assert_eq!(settings.plugins[0].path, Path::new("plugins/audit.so"));
}

#[test]
fn test_environment_is_a_fallback_not_an_override() {
    let _env = env_guard();
    std::env::set_var("AUTO_RECOVERY", "false");
    std::env::set_var("SHUTDOWN_TIMEOUT", "1234");
    std::env::set_var("ENABLE_LEAK_DETECTION", "1");

    let from_env = resolve(RawSettings::default());
    assert!(!from_env.auto_recovery);
    assert_eq!(from_env.shutdown_timeout, Duration::from_millis(1234));
    assert!(from_env.leak_detection.enabled);

    // A present config key wins over the environment.
    let raw: RawSettings =
        serde_json::from_str(r#"{ "autoRecovery": true, "shutdownTimeoutMs": 9000 }"#).unwrap();
    let from_file = resolve(raw);
    assert!(from_file.auto_recovery);
    assert_eq!(from_file.shutdown_timeout, Duration::from_millis(9000));

    std::env::remove_var("AUTO_RECOVERY");
    std::env::remove_var("SHUTDOWN_TIMEOUT");
    std::env::remove_var("ENABLE_LEAK_DETECTION");
}

#[tokio::test]
async fn test_load_tolerates_a_missing_document() {
    let dir = tempdir().unwrap();
    let settings = KernelSettings::load(dir.path()).await.unwrap();
    assert_eq!(settings.config_path, dir.path());
    assert!(settings.auto_start);
}

#[tokio::test]
async fn test_load_reads_kernel_json() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("kernel.json"),
        r#"{ "modulesPath": "custom-modules" }"#,
    )
    .unwrap();

    let settings = KernelSettings::load(dir.path()).await.unwrap();
    assert_eq!(settings.modules_path, Path::new("custom-modules"));
}

#[tokio::test]
async fn test_load_rejects_invalid_json() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("kernel.json"), b"{broken").unwrap();
    assert!(KernelSettings::load(dir.path()).await.is_err());
}
