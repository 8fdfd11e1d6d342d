//! Named-section wall-clock profiler.
//!
//! [`crate::api::SimWorld`] owns one when profiling is enabled and times its
//! `input` and `frame` schedules every step. Hosts read the stats back or
//! log a summary table.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Collects timing data for named sections.
#[derive(Debug, Default)]
pub struct Profiler {
    sections: HashMap<String, SectionStats>,
    current_section: Option<(String, Instant)>,
    frames: u64,
}

/// Statistics for a profiled section.
#[derive(Debug, Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a named section. A section still open is closed first.
    pub fn begin_section(&mut self, name: &str) {
        if self.current_section.is_some() {
            self.end_section();
        }
        self.current_section = Some((name.to_string(), Instant::now()));
    }

    /// End the current section and record its duration.
    pub fn end_section(&mut self) {
        if let Some((name, start)) = self.current_section.take() {
            self.sections.entry(name).or_default().record(start.elapsed());
        }
    }

    /// Time a section using a closure.
    pub fn time_section<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.begin_section(name);
        let result = f();
        self.end_section();
        result
    }

    /// Count one simulated frame.
    pub fn tick(&mut self) {
        self.frames += 1;
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn get_section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    /// Section names, slowest first.
    pub fn section_names(&self) -> Vec<&str> {
        self.sorted().into_iter().map(|(name, _)| name.as_str()).collect()
    }

    fn sorted(&self) -> Vec<(&String, &SectionStats)> {
        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time).then_with(|| a.0.cmp(b.0)));
        sections
    }

    /// Summary table of every section, slowest first.
    pub fn summary(&self) -> String {
        let sections = self.sorted();
        let total: Duration = sections.iter().map(|(_, s)| s.total_time).sum();

        let mut out = String::new();
        let _ = writeln!(out, "=== Profiler Summary ({} frames) ===", self.frames);
        let _ = writeln!(
            out,
            "{:<16} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Section", "Total", "Avg", "Min", "Max", "% Time"
        );
        for (name, stats) in &sections {
            let pct = if total.as_nanos() > 0 {
                stats.total_time.as_nanos() as f64 / total.as_nanos() as f64 * 100.0
            } else {
                0.0
            };
            let _ = writeln!(
                out,
                "{:<16} {:>10.2?} {:>10.2?} {:>10.2?} {:>10.2?} {:>7.1}%",
                name,
                stats.total_time,
                stats.avg_time(),
                stats.min_time.unwrap_or(Duration::ZERO),
                stats.max_time.unwrap_or(Duration::ZERO),
                pct
            );
        }
        if self.frames > 0 {
            let per_frame = total / self.frames as u32;
            let _ = writeln!(out, "{:<16} {:>10.2?}", "Avg per frame", per_frame);
        }
        out
    }

    /// Log the summary table at info level.
    pub fn log_summary(&self) {
        for line in self.summary().lines() {
            log::info!("{}", line);
        }
    }

    pub fn reset(&mut self) {
        self.sections.clear();
        self.current_section = None;
        self.frames = 0;
    }
}
