use crate::collectors::{run_powershell, HostQuery};
use crate::model::{DiskUsage, MemoryUsage, Metric, Percent, Uptime};
use crate::platform::PlatformKind;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, warn};

const MIB: u64 = 1024 * 1024;

const WINDOWS_CPU_SCRIPT: &str =
    "(Get-CimInstance Win32_Processor | Measure-Object LoadPercentage -Average).Average";
const WINDOWS_MEMORY_SCRIPT: &str = "$m=Get-CimInstance Win32_OperatingSystem; [math]::Round(($m.TotalVisibleMemorySize-$m.FreePhysicalMemory)/1024); [math]::Round($m.TotalVisibleMemorySize/1024)";
const WINDOWS_BOOT_SCRIPT: &str = "(Get-CimInstance Win32_OperatingSystem).LastBootUpTime.ToUniversalTime().ToString('s') + 'Z'";

// On Unix this is load average over logical cores and can exceed 100%.
pub fn collect_cpu(host: &dyn HostQuery, platform: PlatformKind) -> Metric<Percent> {
    let value = match platform {
        PlatformKind::Windows => {
            run_powershell(host, WINDOWS_CPU_SCRIPT).and_then(|out| parse_windows_cpu(&out))
        }
        PlatformKind::Linux | PlatformKind::MacOS => {
            match (host.load_average(), host.logical_cores()) {
                (Some(load), Some(cores)) => cpu_from_load(load, cores),
                _ => None,
            }
        }
        PlatformKind::Other => None,
    };
    unavailable_warn("cpu", platform, value)
}

pub fn collect_memory(host: &dyn HostQuery, platform: PlatformKind) -> Metric<MemoryUsage> {
    let value = match platform {
        PlatformKind::Windows => {
            run_powershell(host, WINDOWS_MEMORY_SCRIPT).and_then(|out| parse_windows_memory(&out))
        }
        PlatformKind::Linux => host
            .read_file("/proc/meminfo")
            .and_then(|text| parse_meminfo(&text)),
        PlatformKind::MacOS => collect_macos_memory(host),
        PlatformKind::Other => None,
    };
    unavailable_warn("memory", platform, value)
}

pub fn collect_disk(host: &dyn HostQuery, platform: PlatformKind) -> Metric<DiskUsage> {
    let value = root_mount(platform)
        .and_then(|mount| host.volume_space(mount))
        .and_then(|space| {
            debug!(
                total = space.total,
                free = space.free,
                available = space.available,
                "root volume space"
            );
            DiskUsage::from_bytes(space.total, space.free)
        });
    unavailable_warn("disk", platform, value)
}

pub fn collect_uptime(host: &dyn HostQuery, platform: PlatformKind) -> Metric<Uptime> {
    let now = host.now();
    let secs = match platform {
        PlatformKind::Windows => run_powershell(host, WINDOWS_BOOT_SCRIPT)
            .and_then(|out| humantime::parse_rfc3339(out.trim()).ok())
            .and_then(|boot| now.duration_since(boot).ok())
            .map(|elapsed| elapsed.as_secs()),
        PlatformKind::Linux => host
            .read_file("/proc/uptime")
            .and_then(|text| parse_proc_uptime(&text)),
        PlatformKind::MacOS => host
            .run("sysctl", &["-n", "kern.boottime"])
            .and_then(|out| parse_boottime(&out))
            .and_then(|boot| now.duration_since(UNIX_EPOCH + boot).ok())
            .map(|elapsed| elapsed.as_secs()),
        PlatformKind::Other => None,
    };
    unavailable_warn("uptime", platform, secs.map(Uptime::from_secs))
}

fn unavailable_warn<T>(metric: &str, platform: PlatformKind, value: Option<T>) -> Metric<T> {
    if value.is_none() && platform != PlatformKind::Other {
        warn!(metric, %platform, "metric unavailable");
    }
    value.into()
}

fn root_mount(platform: PlatformKind) -> Option<&'static str> {
    match platform {
        PlatformKind::Windows => Some("C:\\"),
        PlatformKind::Linux | PlatformKind::MacOS => Some("/"),
        PlatformKind::Other => None,
    }
}

fn collect_macos_memory(host: &dyn HostQuery) -> Option<MemoryUsage> {
    let total_bytes = host
        .run("sysctl", &["-n", "hw.memsize"])?
        .trim()
        .parse::<u64>()
        .ok()?;
    let page_size = host
        .run("sysctl", &["-n", "hw.pagesize"])?
        .trim()
        .parse::<u64>()
        .ok()?;
    let free_pages = parse_vm_stat_free_pages(&host.run("vm_stat", &[])?)?;
    debug!(total_bytes, page_size, free_pages, "vm_stat sample");
    Some(memory_from_pages(total_bytes, free_pages, page_size))
}

pub fn cpu_from_load(load_one: f64, cores: usize) -> Option<Percent> {
    if cores == 0 || !load_one.is_finite() || load_one < 0.0 {
        return None;
    }
    Some(Percent((load_one / cores as f64 * 100.0).floor() as u64))
}

pub fn parse_windows_cpu(output: &str) -> Option<Percent> {
    let value = output.trim().replace(',', ".").parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(Percent(value.floor() as u64))
}

pub fn parse_windows_memory(output: &str) -> Option<MemoryUsage> {
    let values: Vec<u64> = output
        .split_whitespace()
        .map(|v| v.parse::<u64>().ok())
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [used, total] if used <= total => Some(MemoryUsage::new(*used, *total)),
        _ => None,
    }
}

pub fn parse_meminfo(content: &str) -> Option<MemoryUsage> {
    let mut total_kb: Option<u64> = None;
    let mut available_kb: Option<u64> = None;

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut total_kb,
            "MemAvailable" => &mut available_kb,
            _ => continue,
        };
        *slot = rest.split_whitespace().next().and_then(|v| v.parse().ok());

        if total_kb.is_some() && available_kb.is_some() {
            break;
        }
    }

    let total_mb = total_kb? / 1024;
    let available_mb = available_kb? / 1024;
    Some(MemoryUsage::new(total_mb.saturating_sub(available_mb), total_mb))
}

pub fn parse_vm_stat_free_pages(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Pages free:")?;
        rest.trim().trim_end_matches('.').parse().ok()
    })
}

pub fn memory_from_pages(total_bytes: u64, free_pages: u64, page_size: u64) -> MemoryUsage {
    let total_mb = total_bytes / MIB;
    let free_mb = free_pages.saturating_mul(page_size) / MIB;
    MemoryUsage::new(total_mb.saturating_sub(free_mb), total_mb)
}

pub fn parse_proc_uptime(content: &str) -> Option<u64> {
    let secs = content.split_whitespace().next()?.parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs as u64)
}

pub fn parse_boottime(content: &str) -> Option<Duration> {
    let after = content.split("sec = ").nth(1)?;
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().map(Duration::from_secs)
}
