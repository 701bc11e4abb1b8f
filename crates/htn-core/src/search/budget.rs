// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cooperative time and memory budgets.

use std::time::{Duration, Instant};

use tracing::debug;

use super::SearchStatus;
use crate::config::SearchConfig;

/// Source of the process's resident memory.
pub trait ResourceMonitor {
    /// Resident set size in bytes, if the platform can report it.
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads `VmRSS` from `/proc/self/status` (Linux).
///
/// The kernel reports the field in kB, so the reading does not depend on the
/// page size of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatusMonitor;

impl ProcStatusMonitor {
    /// Parses the `VmRSS:` line of a status file into bytes.
    fn parse(status: &str) -> Option<u64> {
        let rest = status.lines().find_map(|l| l.strip_prefix("VmRSS:"))?;
        let mut fields = rest.split_whitespace();
        let value: u64 = fields.next()?.parse().ok()?;
        match fields.next() {
            Some("kB") => value.checked_mul(1024),
            _ => None,
        }
    }
}

impl ResourceMonitor for ProcStatusMonitor {
    fn resident_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        Self::parse(&status)
    }
}

/// Never reports memory; memory limits are then never hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryMonitor;

impl ResourceMonitor for NoMemoryMonitor {
    fn resident_bytes(&self) -> Option<u64> {
        None
    }
}

/// Periodic budget check driven by the expansion counter.
#[derive(Debug, Clone)]
pub(crate) struct Budget {
    started: Instant,
    time_limit: Option<Duration>,
    memory_limit: Option<u64>,
    interval: u64,
}

impl Budget {
    pub(crate) fn start(config: &SearchConfig) -> Self {
        Self {
            started: Instant::now(),
            time_limit: config.time_limit,
            memory_limit: config.memory_limit_bytes,
            interval: config.check_interval.max(1),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Terminal status once a limit is exceeded; checks only every
    /// `interval` expansions.
    pub(crate) fn check(&self, expanded: u64, monitor: &dyn ResourceMonitor) -> Option<SearchStatus> {
        if expanded == 0 || expanded % self.interval != 0 {
            return None;
        }
        let elapsed = self.elapsed();
        if self.time_limit.is_some_and(|limit| elapsed > limit) {
            debug!(expanded, ?elapsed, "time budget exceeded");
            return Some(SearchStatus::Timeout);
        }
        if let Some(limit) = self.memory_limit {
            let resident = monitor.resident_bytes();
            debug!(expanded, ?resident, limit, "memory check");
            if resident.is_some_and(|bytes| bytes > limit) {
                return Some(SearchStatus::OutOfMemory);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u64);

    impl ResourceMonitor for Fixed {
        fn resident_bytes(&self) -> Option<u64> {
            Some(self.0)
        }
    }

    #[test]
    fn resident_set_is_read_in_kilobytes() {
        let status = "Name:\thtn-plan\nVmPeak:\t  9000 kB\n\
                      VmRSS:\t    2500 kB\nThreads:\t1\n";
        assert_eq!(ProcStatusMonitor::parse(status), Some(2500 * 1024));
        assert_eq!(ProcStatusMonitor::parse("VmRSS:\t12 pages\n"), None);
        assert_eq!(ProcStatusMonitor::parse("Name:\tx\n"), None);
    }

    #[test]
    fn memory_limit_is_checked_on_the_interval_only() {
        let config = SearchConfig {
            memory_limit_bytes: Some(1024),
            check_interval: 10,
            ..SearchConfig::default()
        };
        let budget = Budget::start(&config);
        assert_eq!(budget.check(9, &Fixed(4096)), None);
        assert_eq!(budget.check(10, &Fixed(4096)), Some(SearchStatus::OutOfMemory));
        assert_eq!(budget.check(10, &Fixed(512)), None);
        assert_eq!(budget.check(10, &NoMemoryMonitor), None);
    }

    #[test]
    fn zero_time_limit_trips_at_the_first_check() {
        let config = SearchConfig {
            time_limit: Some(Duration::ZERO),
            check_interval: 1,
            ..SearchConfig::default()
        };
        let budget = Budget::start(&config);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(budget.check(1, &NoMemoryMonitor), Some(SearchStatus::Timeout));
    }
}
