use crate::collectors::{run_powershell, HostQuery};
use crate::model::{CriticalProcesses, ProcessEntry, ProcessMetric, ProcessStatus, TopProcesses};
use crate::platform::PlatformKind;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Cpu,
    Memory,
}

impl Ranking {
    fn ps_column(self) -> &'static str {
        match self {
            Self::Cpu => "pid,comm,%cpu",
            Self::Memory => "pid,comm,%mem",
        }
    }

    fn windows_property(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "PM",
        }
    }

    fn metric(self, value: f64) -> ProcessMetric {
        match self {
            Self::Cpu => ProcessMetric::Cpu(value),
            Self::Memory => ProcessMetric::Memory(value),
        }
    }
}

pub fn top_processes(host: &dyn HostQuery, platform: PlatformKind, count: usize) -> TopProcesses {
    TopProcesses {
        cpu: top_by(host, platform, Ranking::Cpu, count),
        memory: top_by(host, platform, Ranking::Memory, count),
    }
}

fn top_by(
    host: &dyn HostQuery,
    platform: PlatformKind,
    ranking: Ranking,
    count: usize,
) -> Vec<ProcessEntry> {
    let entries = match platform {
        PlatformKind::Windows => {
            let property = ranking.windows_property();
            let script = format!(
                "Get-Process | Sort-Object {property} -Descending | Select-Object -First {count} Id,Name,{property} | ConvertTo-Json -Compress"
            );
            run_powershell(host, &script)
                .map(|out| parse_windows_processes(&out, ranking))
                .unwrap_or_default()
        }
        PlatformKind::Linux => {
            let sort = match ranking {
                Ranking::Cpu => "--sort=-%cpu",
                Ranking::Memory => "--sort=-%mem",
            };
            host.run("ps", &["-eo", ranking.ps_column(), sort])
                .map(|out| parse_ps_table(&out, ranking))
                .unwrap_or_default()
        }
        PlatformKind::MacOS => {
            let sort = match ranking {
                Ranking::Cpu => "-r",
                Ranking::Memory => "-m",
            };
            host.run("ps", &["-axo", ranking.ps_column(), sort])
                .map(|out| parse_ps_table(&out, ranking))
                .unwrap_or_default()
        }
        PlatformKind::Other => Vec::new(),
    };
    if entries.is_empty() && platform != PlatformKind::Other {
        warn!(?ranking, %platform, "no process rows collected");
    }
    rank(entries, count)
}

pub fn rank(mut entries: Vec<ProcessEntry>, count: usize) -> Vec<ProcessEntry> {
    entries.sort_by(|a, b| b.metric.value().total_cmp(&a.metric.value()));
    entries.truncate(count);
    entries
}

pub fn parse_ps_table(output: &str, ranking: Ranking) -> Vec<ProcessEntry> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                debug!(line = %line.trim(), "skipping short ps line");
                return None;
            }
            let pid = parts[0].parse::<u32>().ok()?;
            let value = parts[parts.len() - 1].parse::<f64>().ok()?;
            if !value.is_finite() {
                return None;
            }
            Some(ProcessEntry {
                pid,
                name: parts[1..parts.len() - 1].join(" "),
                metric: ranking.metric(value),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct WindowsProcess {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "CPU", default)]
    cpu: Option<f64>,
    #[serde(rename = "PM", default)]
    pm: Option<f64>,
}

pub fn parse_windows_processes(output: &str, ranking: Ranking) -> Vec<ProcessEntry> {
    let records = match serde_json::from_str::<Value>(output) {
        Ok(Value::Array(items)) => items,
        Ok(obj @ Value::Object(_)) => vec![obj],
        Ok(_) => Vec::new(),
        Err(err) => {
            debug!(error = %err, "Get-Process output is not JSON");
            Vec::new()
        }
    };

    records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<WindowsProcess>(record).ok())
        .filter_map(|p| {
            let value = match ranking {
                Ranking::Cpu => p.cpu?,
                Ranking::Memory => p.pm? / MIB,
            };
            Some(ProcessEntry {
                pid: p.id,
                name: p.name,
                metric: ranking.metric(round2(value)),
            })
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn critical_status(
    host: &dyn HostQuery,
    platform: PlatformKind,
    expected: &[String],
) -> CriticalProcesses {
    if expected.is_empty() {
        return CriticalProcesses::new();
    }

    let running = running_process_names(host, platform);
    if running.is_none() {
        warn!(%platform, "process listing unavailable, critical processes reported as not running");
    }
    let running = running.unwrap_or_default();

    expected
        .iter()
        .map(|name| {
            let status = if running.contains(&name.to_lowercase()) {
                ProcessStatus::Running
            } else {
                ProcessStatus::NotRunning
            };
            (name.clone(), status)
        })
        .collect()
}

fn running_process_names(host: &dyn HostQuery, platform: PlatformKind) -> Option<HashSet<String>> {
    match platform {
        PlatformKind::Windows => {
            run_powershell(host, "Get-Process | Select-Object -ExpandProperty Name")
                .map(|out| parse_windows_names(&out))
        }
        PlatformKind::Linux => host
            .run("ps", &["-eo", "comm"])
            .map(|out| parse_unix_names(&out, false)),
        PlatformKind::MacOS => host
            .run("ps", &["-axo", "comm"])
            .map(|out| parse_unix_names(&out, true)),
        PlatformKind::Other => None,
    }
}

pub fn parse_windows_names(output: &str) -> HashSet<String> {
    output
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .map(|name| {
            if name.ends_with(".exe") {
                name
            } else {
                format!("{name}.exe")
            }
        })
        .collect()
}

// macOS `comm` is the full executable path; Linux `comm` may itself contain '/'.
pub fn parse_unix_names(output: &str, basename: bool) -> HashSet<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter_map(|line| {
            if basename {
                line.rsplit('/').next()
            } else {
                Some(line)
            }
        })
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeHost;

    fn entry(pid: u32, name: &str, metric: ProcessMetric) -> ProcessEntry {
        ProcessEntry {
            pid,
            name: name.to_string(),
            metric,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ps_table_drops_header_and_malformed_rows() {
        let out = "    PID COMMAND         %CPU\n  101 firefox         23.5\n  bad row\n  abc bash 1.0\n  202 Web Content     7.25\n  303 idle nan-ish\n";
        let rows = parse_ps_table(out, Ranking::Cpu);
        assert_eq!(
            rows,
            vec![
                entry(101, "firefox", ProcessMetric::Cpu(23.5)),
                entry(202, "Web Content", ProcessMetric::Cpu(7.25)),
            ]
        );
    }

    #[test]
    fn ps_table_tags_memory_rows() {
        let rows = parse_ps_table("PID COMMAND %MEM\n1 systemd 0.1\n", Ranking::Memory);
        assert_eq!(rows, vec![entry(1, "systemd", ProcessMetric::Memory(0.1))]);
    }

    #[test]
    fn rank_is_descending_stable_and_bounded() {
        let rows = vec![
            entry(1, "a", ProcessMetric::Cpu(1.0)),
            entry(2, "b", ProcessMetric::Cpu(5.0)),
            entry(3, "c", ProcessMetric::Cpu(3.0)),
            entry(4, "d", ProcessMetric::Cpu(5.0)),
            entry(5, "e", ProcessMetric::Cpu(3.0)),
            entry(6, "f", ProcessMetric::Cpu(0.0)),
        ];
        let pids: Vec<u32> = rank(rows, 5).iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![2, 4, 3, 5, 1]);
    }

    #[test]
    fn windows_json_array_and_single_object() {
        let many = r#"[{"Id":4,"Name":"System","CPU":1234.5678},{"Id":8,"Name":"Idle","CPU":null},{"Name":"broken"}]"#;
        assert_eq!(
            parse_windows_processes(many, Ranking::Cpu),
            vec![entry(4, "System", ProcessMetric::Cpu(1234.57))]
        );

        let one = r#"{"Id":900,"Name":"chrome","PM":524288000}"#;
        assert_eq!(
            parse_windows_processes(one, Ranking::Memory),
            vec![entry(900, "chrome", ProcessMetric::Memory(500.0))]
        );

        assert!(parse_windows_processes("", Ranking::Cpu).is_empty());
        assert!(parse_windows_processes("42", Ranking::Cpu).is_empty());
    }

    #[test]
    fn top_processes_on_linux_sorts_and_truncates() {
        let cpu_out = "PID COMMAND %CPU\n10 a 1.0\n11 b 9.0\n12 c 4.0\n13 d 9.0\n";
        let mem_out = "PID COMMAND %MEM\n10 a 50.0\n11 b 2.0\n";
        let host = FakeHost::default()
            .command("ps -eo pid,comm,%cpu --sort=-%cpu", cpu_out)
            .command("ps -eo pid,comm,%mem --sort=-%mem", mem_out);

        let top = top_processes(&host, PlatformKind::Linux, 3);
        let cpu: Vec<u32> = top.cpu.iter().map(|e| e.pid).collect();
        assert_eq!(cpu, vec![11, 13, 12]);
        assert_eq!(top.memory.len(), 2);
        assert_eq!(top.memory[0].metric, ProcessMetric::Memory(50.0));
    }

    #[test]
    fn top_processes_on_macos_uses_bsd_flags() {
        let host = FakeHost::default()
            .command("ps -axo pid,comm,%cpu -r", "PID COMM %CPU\n1 /sbin/launchd 0.5\n")
            .command("ps -axo pid,comm,%mem -m", "PID COMM %MEM\n1 /sbin/launchd 0.2\n");
        let top = top_processes(&host, PlatformKind::MacOS, 5);
        assert_eq!(top.cpu, vec![entry(1, "/sbin/launchd", ProcessMetric::Cpu(0.5))]);
        assert_eq!(top.memory.len(), 1);
    }

    #[test]
    fn top_processes_on_windows_parse_json() {
        let host = FakeHost::default()
            .powershell(
                "Sort-Object CPU",
                r#"[{"Id":1,"Name":"a","CPU":2.0},{"Id":2,"Name":"b","CPU":3.0}]"#,
            )
            .powershell("Sort-Object PM", r#"{"Id":3,"Name":"c","PM":1048576}"#);
        let top = top_processes(&host, PlatformKind::Windows, 5);
        assert_eq!(top.cpu[0].pid, 2);
        assert_eq!(top.memory, vec![entry(3, "c", ProcessMetric::Memory(1.0))]);
    }

    #[test]
    fn top_processes_empty_when_unavailable() {
        let host = FakeHost::default();
        for p in [
            PlatformKind::Windows,
            PlatformKind::MacOS,
            PlatformKind::Linux,
            PlatformKind::Other,
        ] {
            assert_eq!(top_processes(&host, p, 5), TopProcesses::default());
        }
    }

    #[test]
    fn windows_names_get_exe_suffix() {
        let set = parse_windows_names("Explorer\r\nsvchost\r\nfoo.EXE\r\n\r\n");
        assert!(set.contains("explorer.exe"));
        assert!(set.contains("svchost.exe"));
        assert!(set.contains("foo.exe"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn macos_names_use_basename() {
        let set = parse_unix_names("COMMAND\n/sbin/launchd\nsystemd\n  sshd  \n", true);
        assert!(set.contains("launchd"));
        assert!(set.contains("systemd"));
        assert!(set.contains("sshd"));
        assert!(!set.contains("command"));
    }

    #[test]
    fn linux_names_keep_slashes() {
        let set = parse_unix_names("COMMAND\nkworker/u4:0-ev\nsystemd\n", false);
        assert!(set.contains("kworker/u4:0-ev"));
        assert!(!set.contains("u4:0-ev"));

        let host = FakeHost::default().command("ps -eo comm", "COMMAND\nkworker/u4:0-ev\n");
        let status = critical_status(&host, PlatformKind::Linux, &names(&["kworker/u4:0-ev"]));
        assert_eq!(status["kworker/u4:0-ev"], ProcessStatus::Running);
    }

    #[test]
    fn critical_status_is_case_insensitive_membership() {
        let host = FakeHost::default().command("ps -eo comm", "COMMAND\nsystemd\nbash\n");
        let status = critical_status(&host, PlatformKind::Linux, &names(&["systemd", "SSHD"]));
        assert_eq!(status.len(), 2);
        assert_eq!(status["systemd"], ProcessStatus::Running);
        assert_eq!(status["SSHD"], ProcessStatus::NotRunning);
    }

    #[test]
    fn critical_status_on_windows() {
        let host = FakeHost::default().powershell("ExpandProperty Name", "explorer\nLSASS\n");
        let status = critical_status(
            &host,
            PlatformKind::Windows,
            &names(&["explorer.exe", "svchost.exe", "lsass.exe"]),
        );
        assert_eq!(status["explorer.exe"], ProcessStatus::Running);
        assert_eq!(status["svchost.exe"], ProcessStatus::NotRunning);
        assert_eq!(status["lsass.exe"], ProcessStatus::Running);
    }

    #[test]
    fn critical_status_keeps_key_set_when_listing_fails() {
        let host = FakeHost::default();
        let status = critical_status(&host, PlatformKind::MacOS, &names(&["launchd"]));
        assert_eq!(status.len(), 1);
        assert_eq!(status["launchd"], ProcessStatus::NotRunning);
    }

    #[test]
    fn critical_status_empty_for_empty_list() {
        let host = FakeHost::default().command("ps -eo comm", "COMMAND\nsystemd\n");
        assert!(critical_status(&host, PlatformKind::Other, &[]).is_empty());
    }
}
