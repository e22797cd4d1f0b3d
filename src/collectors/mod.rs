pub mod checks;
pub mod processes;
pub mod system;

use std::fs;
use std::process::Command;
use std::time::SystemTime;
use sysinfo::{System, SystemExt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpace {
    pub total: u64,
    pub free: u64,
    pub available: u64,
}

pub trait HostQuery {
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;

    fn read_file(&self, path: &str) -> Option<String>;

    fn load_average(&self) -> Option<f64>;

    fn logical_cores(&self) -> Option<usize>;

    fn volume_space(&self, mount: &str) -> Option<VolumeSpace>;

    fn now(&self) -> SystemTime;
}

pub struct LiveHost {
    system: System,
}

impl LiveHost {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        #[cfg(not(unix))]
        {
            system.refresh_disks_list();
            system.refresh_disks();
        }
        Self { system }
    }
}

impl Default for LiveHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostQuery for LiveHost {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = match Command::new(program).args(args).output() {
            Ok(output) => output,
            Err(err) => {
                debug!(program, error = %err, "command could not be started");
                return None;
            }
        };
        if !output.status.success() {
            debug!(program, status = %output.status, "command exited with failure");
            return None;
        }

        let text = decode_cmd_stdout(&output.stdout);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(text.to_string())
    }

    fn read_file(&self, path: &str) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(err) => {
                debug!(path, error = %err, "read failed");
                None
            }
        }
    }

    fn load_average(&self) -> Option<f64> {
        let one = self.system.load_average().one;
        (one.is_finite() && one >= 0.0).then_some(one)
    }

    fn logical_cores(&self) -> Option<usize> {
        let count = self.system.cpus().len();
        if count > 0 {
            return Some(count);
        }
        std::thread::available_parallelism().map(|n| n.get()).ok()
    }

    #[cfg(unix)]
    fn volume_space(&self, mount: &str) -> Option<VolumeSpace> {
        use nix::sys::statvfs::statvfs;

        let stats = match statvfs(mount) {
            Ok(stats) => stats,
            Err(err) => {
                debug!(mount, error = %err, "statvfs failed");
                return None;
            }
        };
        let fragment = stats.fragment_size() as u64;
        Some(VolumeSpace {
            total: (stats.blocks() as u64).saturating_mul(fragment),
            free: (stats.blocks_free() as u64).saturating_mul(fragment),
            available: (stats.blocks_available() as u64).saturating_mul(fragment),
        })
    }

    // No reserved blocks on NTFS, so free and available coincide.
    #[cfg(not(unix))]
    fn volume_space(&self, mount: &str) -> Option<VolumeSpace> {
        use std::path::Path;
        use sysinfo::DiskExt;

        self.system
            .disks()
            .iter()
            .find(|d| d.mount_point() == Path::new(mount))
            .map(|d| VolumeSpace {
                total: d.total_space(),
                free: d.available_space(),
                available: d.available_space(),
            })
    }

    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

pub fn run_powershell(host: &dyn HostQuery, script: &str) -> Option<String> {
    let wrapped_script = format!(
        "[Console]::OutputEncoding=[System.Text.UTF8Encoding]::new($false); $OutputEncoding=[System.Text.UTF8Encoding]::new($false); {script}"
    );
    let args = ["-NoProfile", "-Command", wrapped_script.as_str()];
    host.run("powershell", &args).or_else(|| {
        host.run(
            r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe",
            &args,
        )
    })
}

fn decode_cmd_stdout(bytes: &[u8]) -> String {
    if let Ok(utf8) = std::str::from_utf8(bytes) {
        return utf8.to_string();
    }

    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let u16buf: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&u16buf) {
            return s;
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}
