use std::time::Duration;

/// Summary of one reporting window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PerfReport {
    pub frames: usize,
    pub mean_frame_ms: f64,
    /// `1000 / mean_frame_ms`.
    pub fps: f64,
}

/// Frame durations since the last report, plus lifetime totals.
#[derive(Debug)]
pub struct PerformanceSample {
    window: Vec<Duration>,
    elapsed: Duration,
    interval: Duration,
    total_frames: u64,
}

impl Default for PerformanceSample {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl PerformanceSample {
    pub fn new(interval: Duration) -> Self {
        Self {
            window: Vec::with_capacity(128),
            elapsed: Duration::ZERO,
            interval,
            total_frames: 0,
        }
    }

    /// Records one frame. Returns a report, and starts a new window, once the
    /// window covers the reporting interval.
    pub fn record(&mut self, frame_time: Duration) -> Option<PerfReport> {
        self.window.push(frame_time);
        self.elapsed += frame_time;
        self.total_frames += 1;

        if self.elapsed < self.interval {
            return None;
        }

        let report = self.summary();
        self.window.clear();
        self.elapsed = Duration::ZERO;
        report
    }

    /// Summary of the current, unfinished window.
    pub fn summary(&self) -> Option<PerfReport> {
        if self.window.is_empty() {
            return None;
        }
        let total: Duration = self.window.iter().sum();
        let mean_frame_ms = total.as_secs_f64() * 1000.0 / self.window.len() as f64;
        let fps = if mean_frame_ms > 0.0 { 1000.0 / mean_frame_ms } else { 0.0 };
        Some(PerfReport { frames: self.window.len(), mean_frame_ms, fps })
    }

    #[inline]
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_interval() {
        let mut perf = PerformanceSample::default();
        let frame = Duration::from_millis(20);

        let reports: Vec<_> = (0..120).filter_map(|_| perf.record(frame)).collect();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].frames, 50);
        assert!((reports[0].mean_frame_ms - 20.0).abs() < 1e-9);
        assert!((reports[0].fps - 50.0).abs() < 1e-9);
        assert_eq!(perf.total_frames(), 120);
    }

    #[test]
    fn window_resets_after_report() {
        let mut perf = PerformanceSample::new(Duration::from_millis(100));
        for _ in 0..10 {
            perf.record(Duration::from_millis(10));
        }
        assert!(perf.summary().is_none());

        perf.record(Duration::from_millis(30));
        assert_eq!(perf.summary().map(|r| r.frames), Some(1));
    }

    #[test]
    fn fps_derives_from_mean_frame_time() {
        let mut perf = PerformanceSample::new(Duration::from_secs(10));
        perf.record(Duration::from_millis(10));
        perf.record(Duration::from_millis(30));
        let r = perf.summary().unwrap();
        assert!((r.mean_frame_ms - 20.0).abs() < 1e-9);
        assert!((r.fps - 50.0).abs() < 1e-9);
    }
}
