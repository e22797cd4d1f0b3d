use crate::platform::PlatformKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    #[serde(default = "default_report_file_name")]
    pub report_file_name: String,
    #[serde(default = "default_log_file_path")]
    pub log_file_path: PathBuf,
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
    #[serde(default = "default_top_process_count")]
    pub top_process_count: usize,
    #[serde(default)]
    pub network_probe: NetworkProbeConfig,
    #[serde(default)]
    pub critical_processes: CriticalProcessesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkProbeConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,
    #[serde(default = "default_probe_port")]
    pub port: u16,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CriticalProcessesConfig {
    #[serde(default = "default_windows_critical")]
    pub windows: Vec<String>,
    #[serde(default = "default_linux_critical")]
    pub linux: Vec<String>,
    #[serde(default = "default_macos_critical")]
    pub macos: Vec<String>,
}

impl CriticalProcessesConfig {
    pub fn for_platform(&self, platform: PlatformKind) -> &[String] {
        match platform {
            PlatformKind::Windows => &self.windows,
            PlatformKind::Linux => &self.linux,
            PlatformKind::MacOS => &self.macos,
            PlatformKind::Other => &[],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            report_file_name: default_report_file_name(),
            log_file_path: default_log_file_path(),
            max_log_entries: default_max_log_entries(),
            top_process_count: default_top_process_count(),
            network_probe: NetworkProbeConfig::default(),
            critical_processes: CriticalProcessesConfig::default(),
        }
    }
}

impl Default for NetworkProbeConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_probe_port(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for CriticalProcessesConfig {
    fn default() -> Self {
        Self {
            windows: default_windows_critical(),
            linux: default_linux_critical(),
            macos: default_macos_critical(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_directory.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_directory must not be empty".to_string(),
            ));
        }
        if self.report_file_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "report_file_name must not be empty".to_string(),
            ));
        }
        if self.log_file_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "log_file_path must not be empty".to_string(),
            ));
        }
        if self.max_log_entries < 1 {
            return Err(ConfigError::Validation(
                "max_log_entries must be >= 1".to_string(),
            ));
        }
        if self.top_process_count < 1 {
            return Err(ConfigError::Validation(
                "top_process_count must be >= 1".to_string(),
            ));
        }

        validate_network_probe(&self.network_probe)?;
        validate_critical_processes(&self.critical_processes)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_network_probe(cfg: &NetworkProbeConfig) -> Result<(), ConfigError> {
    if cfg.host.trim().is_empty() {
        return Err(ConfigError::Validation(
            "network_probe.host must not be empty".to_string(),
        ));
    }
    if cfg.port == 0 {
        return Err(ConfigError::Validation(
            "network_probe.port must be in 1..65535".to_string(),
        ));
    }
    if cfg.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "network_probe.timeout_ms must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_critical_processes(cfg: &CriticalProcessesConfig) -> Result<(), ConfigError> {
    let lists = [
        ("windows", &cfg.windows),
        ("linux", &cfg.linux),
        ("macos", &cfg.macos),
    ];
    for (platform, names) in lists {
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "critical_processes.{platform} contains an empty name"
            )));
        }
    }
    Ok(())
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

fn default_report_file_name() -> String {
    "system_report.json".to_string()
}

fn default_log_file_path() -> PathBuf {
    PathBuf::from("system_health.log")
}

const fn default_max_log_entries() -> usize {
    100
}

const fn default_top_process_count() -> usize {
    5
}

fn default_probe_host() -> String {
    "8.8.8.8".to_string()
}

const fn default_probe_port() -> u16 {
    53
}

const fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_windows_critical() -> Vec<String> {
    vec![
        "explorer.exe".to_string(),
        "svchost.exe".to_string(),
        "lsass.exe".to_string(),
    ]
}

fn default_linux_critical() -> Vec<String> {
    vec!["systemd".to_string(), "sshd".to_string()]
}

fn default_macos_critical() -> Vec<String> {
    vec!["launchd".to_string()]
}
