use std::time::{Duration, Instant};
use winit::window::Window;

/// Ticks due in one frame are capped; any larger backlog is dropped.
pub const MAX_CATCH_UP_TICKS: u32 = 5;

const FPS_REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed-step clock so per-tick motion constants are independent of the
/// display refresh rate.
pub struct FrameClock {
    tick: Duration,
    accumulator: Duration,
    last_frame: Option<Instant>,
    last_fps_time: Option<Instant>,
    frame_count: u32,
    base_title: String,
}

impl FrameClock {
    pub fn new(tick_rate_hz: f32, base_title: String) -> Self {
        let tick = Duration::from_secs_f32(1.0 / tick_rate_hz.max(1.0));
        Self {
            tick,
            accumulator: Duration::ZERO,
            last_frame: None,
            last_fps_time: None,
            frame_count: 0,
            base_title,
        }
    }

    #[cfg(test)]
    pub fn tick_duration(&self) -> Duration {
        self.tick
    }

    /// Number of fixed ticks to run for a frame starting at `now`.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let Some(last) = self.last_frame.replace(now) else {
            return 1;
        };
        self.accumulator += now.saturating_duration_since(last);
        let mut ticks = 0;
        while self.accumulator >= self.tick && ticks < MAX_CATCH_UP_TICKS {
            self.accumulator -= self.tick;
            ticks += 1;
        }
        if ticks == MAX_CATCH_UP_TICKS && self.accumulator >= self.tick {
            log::debug!("frame clock dropped {:?} of backlog", self.accumulator);
            self.accumulator = Duration::ZERO;
        }
        ticks
    }

    /// Counts a presented frame; returns the average rate when a report is due.
    pub fn frame_presented(&mut self, now: Instant) -> Option<f32> {
        let since = *self.last_fps_time.get_or_insert(now);
        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(since);
        if elapsed < FPS_REPORT_INTERVAL {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_fps_time = Some(now);
        Some(fps)
    }

    pub fn update_title(&mut self, window: Option<&Window>, now: Instant) {
        if let Some(fps) = self.frame_presented(now) {
            if let Some(window) = window {
                window.set_title(&format!("{} - {:.1} fps", self.base_title, fps));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_runs_one_tick() {
        let mut clock = FrameClock::new(60.0, "t".into());
        assert_eq!(clock.advance(Instant::now()), 1);
    }

    #[test]
    fn ticks_follow_elapsed_time() {
        let mut clock = FrameClock::new(60.0, "t".into());
        let start = Instant::now();
        clock.advance(start);
        assert_eq!(clock.advance(start + clock.tick_duration() / 2), 0);
        assert_eq!(clock.advance(start + clock.tick_duration() * 3), 3);
    }

    #[test]
    fn backlog_is_capped() {
        let mut clock = FrameClock::new(60.0, "t".into());
        let start = Instant::now();
        clock.advance(start);
        assert_eq!(clock.advance(start + Duration::from_secs(2)), MAX_CATCH_UP_TICKS);
        let next = start + Duration::from_secs(2) + clock.tick_duration() / 4;
        assert_eq!(clock.advance(next), 0);
    }

    #[test]
    fn fps_reported_every_half_second() {
        let mut clock = FrameClock::new(60.0, "t".into());
        let start = Instant::now();
        assert_eq!(clock.frame_presented(start), None);
        for i in 1..30 {
            assert_eq!(clock.frame_presented(start + Duration::from_millis(i * 16)), None);
        }
        let fps = clock
            .frame_presented(start + Duration::from_millis(500))
            .unwrap();
        // 31 frames over half a second.
        assert!((fps - 62.0).abs() < 0.5);
    }
}
