#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

pub const STATS_WINDOW: usize = 60;

/// Wall clock for the frame loop: seconds since start and per-frame delta.
pub struct Clock {
    #[cfg(not(target_arch = "wasm32"))]
    start: Instant,
    #[cfg(target_arch = "wasm32")]
    start_time_ms: f64,
    last_frame_time: f32,
    pub delta_time: f32,
    pub frame_count: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            start: Instant::now(),
            #[cfg(target_arch = "wasm32")]
            start_time_ms: Self::now_ms(),
            last_frame_time: 0.0,
            delta_time: 0.0,
            frame_count: 0,
        }
    }

    pub fn elapsed_seconds(&self) -> f32 {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.start.elapsed().as_secs_f32()
        }

        #[cfg(target_arch = "wasm32")]
        {
            ((Self::now_ms() - self.start_time_ms) / 1000.0) as f32
        }
    }

    /// Advances one frame and returns the elapsed time to feed the scene.
    pub fn tick(&mut self) -> f32 {
        let now = self.elapsed_seconds();
        self.advance_to(now);
        now
    }

    fn advance_to(&mut self, now: f32) {
        self.delta_time = (now - self.last_frame_time).max(0.0);
        self.last_frame_time = now;
        self.frame_count += 1;
    }

    #[cfg(target_arch = "wasm32")]
    fn now_ms() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub fps: f32,
    pub frame_time_ms: f32,
}

/// Rolling frame time window. `record` yields a summary once per
/// `interval` seconds of accumulated frame time.
pub struct StatsAccumulator {
    frame_times: [f32; STATS_WINDOW],
    frame_index: usize,
    recorded: usize,
    update_timer: f32,
    interval: f32,
}

impl StatsAccumulator {
    pub fn new(interval: f32) -> Self {
        Self {
            frame_times: [0.0; STATS_WINDOW],
            frame_index: 0,
            recorded: 0,
            update_timer: 0.0,
            interval,
        }
    }

    pub fn record(&mut self, delta_time: f32) -> Option<FrameStats> {
        self.frame_times[self.frame_index] = delta_time;
        self.frame_index = (self.frame_index + 1) % STATS_WINDOW;
        self.recorded = (self.recorded + 1).min(STATS_WINDOW);
        self.update_timer += delta_time;

        if self.update_timer < self.interval {
            return None;
        }
        self.update_timer = 0.0;

        let avg_frame_time = self.frame_times.iter().sum::<f32>() / self.recorded as f32;
        if avg_frame_time <= 0.0 {
            return None;
        }
        Some(FrameStats {
            fps: 1.0 / avg_frame_time,
            frame_time_ms: avg_frame_time * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_tracks_delta() {
        let mut clock = Clock::new();
        clock.advance_to(0.5);
        clock.advance_to(0.75);
        assert_eq!(clock.delta_time, 0.25);
        assert_eq!(clock.frame_count, 2);
    }

    #[test]
    fn stats_report_on_interval() {
        let mut stats = StatsAccumulator::new(0.75);
        let mut reports = Vec::new();
        for _ in 0..120 {
            if let Some(report) = stats.record(1.0 / 60.0) {
                reports.push(report);
            }
        }
        // 2 seconds of frames at a 0.75 s cadence.
        assert_eq!(reports.len(), 2);
        assert!((reports[0].fps - 60.0).abs() < 0.1);
        assert!((reports[0].frame_time_ms - 16.667).abs() < 0.01);
    }

    #[test]
    fn partial_window_is_not_diluted() {
        let mut stats = StatsAccumulator::new(0.05);
        let report = (0..4).find_map(|_| stats.record(0.02)).unwrap();
        assert!((report.fps - 50.0).abs() < 0.1);
    }
}
