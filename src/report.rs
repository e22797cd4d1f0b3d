use crate::collectors::checks::probe_network;
use crate::collectors::processes::{critical_status, top_processes};
use crate::collectors::system::{collect_cpu, collect_disk, collect_memory, collect_uptime};
use crate::collectors::HostQuery;
use crate::config::Config;
use crate::model::Report;
use crate::platform::PlatformKind;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write report {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct Assembler<'a> {
    cfg: &'a Config,
    host: &'a dyn HostQuery,
}

impl<'a> Assembler<'a> {
    pub fn new(cfg: &'a Config, host: &'a dyn HostQuery) -> Self {
        Self { cfg, host }
    }

    pub async fn assemble(&self, platform: PlatformKind) -> Report {
        let timestamp = humantime::format_rfc3339_seconds(self.host.now()).to_string();
        let cpu = collect_cpu(self.host, platform);
        let memory = collect_memory(self.host, platform);
        let disk = collect_disk(self.host, platform);
        let uptime = collect_uptime(self.host, platform);
        let network = probe_network(&self.cfg.network_probe).await;
        let top_processes = top_processes(self.host, platform, self.cfg.top_process_count);
        let critical_processes = critical_status(
            self.host,
            platform,
            self.cfg.critical_processes.for_platform(platform),
        );

        info!(
            %platform,
            cpu = %cpu,
            network = ?network,
            critical = critical_processes.len(),
            "report assembled"
        );

        Report {
            timestamp,
            cpu,
            memory: memory.into(),
            disk: disk.into(),
            uptime,
            network,
            top_processes,
            critical_processes,
        }
    }
}

pub fn write_snapshot(
    report: &Report,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::CreateDir {
        path: dir.display().to_string(),
        source,
    })?;

    let path = dir.join(file_name);
    let json = report.to_pretty_json()?;
    fs::write(&path, json).map_err(|source| ReportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}
