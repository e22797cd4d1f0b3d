use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const UNAVAILABLE: &str = "N/A";

pub const LOG_HEADER: &str =
    "Timestamp|CPU|UsedMemory|TotalMemory|UsedDiskSpace|TotalDiskSpace|DiskUsedPercent|Uptime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric<T> {
    Value(T),
    Unavailable,
}

impl<T> Metric<T> {
    #[cfg(test)]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Metric<U> {
        match self {
            Self::Value(v) => Metric::Value(f(v)),
            Self::Unavailable => Metric::Unavailable,
        }
    }
}

impl<T> From<Option<T>> for Metric<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Unavailable,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Metric<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => v.fmt(f),
            Self::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl<T: fmt::Display> Serialize for Metric<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T> Deserialize<'de> for Metric<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == UNAVAILABLE {
            return Ok(Self::Unavailable);
        }
        text.parse().map(Self::Value).map_err(de::Error::custom)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {kind} value '{input}'")]
pub struct ParseMeasureError {
    kind: &'static str,
    input: String,
}

fn parse_suffixed(
    input: &str,
    suffix: &str,
    kind: &'static str,
) -> Result<u64, ParseMeasureError> {
    input
        .trim()
        .strip_suffix(suffix)
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| ParseMeasureError {
            kind,
            input: input.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(pub u64);

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for Percent {
    type Err = ParseMeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_suffixed(s, "%", "percent").map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Megabytes(pub u64);

impl fmt::Display for Megabytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MB", self.0)
    }
}

impl FromStr for Megabytes {
    type Err = ParseMeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_suffixed(s, "MB", "megabytes").map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Gigabytes(pub u64);

impl fmt::Display for Gigabytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}GB", self.0)
    }
}

impl FromStr for Gigabytes {
    type Err = ParseMeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_suffixed(s, "GB", "gigabytes").map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uptime {
    pub days: u64,
    pub hours: u64,
}

impl Uptime {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            days: secs / 86_400,
            hours: (secs % 86_400) / 3_600,
        }
    }
}

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Days {} Hours", self.days, self.hours)
    }
}

impl FromStr for Uptime {
    type Err = ParseMeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMeasureError {
            kind: "uptime",
            input: s.to_string(),
        };
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [days, "Days", hours, "Hours"] => Ok(Self {
                days: days.parse().map_err(|_| err())?,
                hours: hours.parse().map_err(|_| err())?,
            }),
            _ => Err(err()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: Megabytes,
    pub total: Megabytes,
}

impl MemoryUsage {
    pub fn new(used_mb: u64, total_mb: u64) -> Self {
        Self {
            used: Megabytes(used_mb.min(total_mb)),
            total: Megabytes(total_mb),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub used: Gigabytes,
    pub total: Gigabytes,
    pub percent: Percent,
}

impl DiskUsage {
    const GIB: u64 = 1024 * 1024 * 1024;

    pub fn from_bytes(total_bytes: u64, free_bytes: u64) -> Option<Self> {
        if total_bytes == 0 {
            return None;
        }
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let percent = (used_bytes as u128 * 100 / total_bytes as u128) as u64;
        Some(Self {
            used: Gigabytes(used_bytes / Self::GIB),
            total: Gigabytes(total_bytes / Self::GIB),
            percent: Percent(percent),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProcessMetric {
    #[serde(rename = "cpu")]
    Cpu(f64),
    #[serde(rename = "mem")]
    Memory(f64),
}

impl ProcessMetric {
    pub fn value(self) -> f64 {
        match self {
            Self::Cpu(v) | Self::Memory(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    #[serde(flatten)]
    pub metric: ProcessMetric,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopProcesses {
    pub cpu: Vec<ProcessEntry>,
    pub memory: Vec<ProcessEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Running,
    NotRunning,
}

pub type CriticalProcesses = BTreeMap<String, ProcessStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReport {
    pub used: Metric<Megabytes>,
    pub total: Metric<Megabytes>,
}

impl From<Metric<MemoryUsage>> for MemoryReport {
    fn from(m: Metric<MemoryUsage>) -> Self {
        Self {
            used: m.map(|u| u.used),
            total: m.map(|u| u.total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskReport {
    pub used: Metric<Gigabytes>,
    pub total: Metric<Gigabytes>,
    pub percent: Metric<Percent>,
}

impl From<Metric<DiskUsage>> for DiskReport {
    fn from(d: Metric<DiskUsage>) -> Self {
        Self {
            used: d.map(|u| u.used),
            total: d.map(|u| u.total),
            percent: d.map(|u| u.percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub cpu: Metric<Percent>,
    pub memory: MemoryReport,
    pub disk: DiskReport,
    pub uptime: Metric<Uptime>,
    pub network: NetworkStatus,
    pub top_processes: TopProcesses,
    pub critical_processes: CriticalProcesses,
}

impl Report {
    pub fn log_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.timestamp,
            self.cpu,
            self.memory.used,
            self.memory.total,
            self.disk.used,
            self.disk.total,
            self.disk.percent,
            self.uptime
        )
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
