//! Debug panel.
//!
//! Read-only: samples engine state at a fixed rate and shows it, along with
//! the latest events seen on the bus. Toggled with F3 when debug mode is on
//! (`--debug` or `show_debug_overlay`).

use std::collections::VecDeque;

use egui::{Color32, Context, RichText};
use reentry_gameplay::{EventBus, EventRecorder, GameEvent};

/// Samples per second.
pub const POLL_HZ: f32 = 10.0;

/// Bus events kept for the panel.
pub const EVENT_LOG_LEN: usize = 8;

/// Values shown in the panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugStats {
    /// Frames per second
    pub fps: f32,
    /// Last frame time in milliseconds
    pub frame_time_ms: f32,
    /// Progress factor
    pub progress: f32,
    /// Visual energy
    pub energy: f32,
    /// Live particles
    pub particles: usize,
    /// Atmosphere stage label
    pub phase: &'static str,
    /// Oxygen label
    pub oxygen: &'static str,
    /// Audio engine state
    pub audio: String,
    /// Sum of tile values
    pub tile_sum: u64,
    /// Latest bus events, newest first
    pub recent_events: Vec<String>,
}

/// FPS from a rolling window of frame times.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frame_times: VecDeque<f32>,
    max_frames: usize,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    /// Default number of frames to average.
    pub const DEFAULT_FRAME_COUNT: usize = 60;

    /// Create a new FPS counter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(Self::DEFAULT_FRAME_COUNT),
            max_frames: Self::DEFAULT_FRAME_COUNT,
        }
    }

    /// Records a frame time in seconds.
    pub fn record(&mut self, dt: f32) {
        self.frame_times.push_back(dt);
        while self.frame_times.len() > self.max_frames {
            self.frame_times.pop_front();
        }
    }

    /// Average FPS over the window.
    #[must_use]
    pub fn fps(&self) -> f32 {
        let total: f32 = self.frame_times.iter().sum();
        if total > 0.0 {
            self.frame_times.len() as f32 / total
        } else {
            0.0
        }
    }

    /// Last frame time in milliseconds.
    #[must_use]
    pub fn last_frame_time_ms(&self) -> f32 {
        self.frame_times.back().map_or(0.0, |dt| dt * 1000.0)
    }
}

/// Debug overlay.
#[derive(Debug, Clone)]
pub struct DebugPanel {
    enabled: bool,
    visible: bool,
    since_poll: f32,
    stats: DebugStats,
    fps: FpsCounter,
    event_log: Option<EventRecorder>,
}

impl DebugPanel {
    /// Creates the panel. Nothing shows unless `enabled`, and only an
    /// enabled panel listens on `bus`.
    #[must_use]
    pub fn new(enabled: bool, bus: &EventBus) -> Self {
        Self {
            enabled,
            visible: enabled,
            // Poll on the first frame.
            since_poll: 1.0 / POLL_HZ,
            stats: DebugStats::default(),
            fps: FpsCounter::new(),
            event_log: enabled.then(|| EventRecorder::attach_bounded(bus, EVENT_LOG_LEN)),
        }
    }

    /// Whether debug mode is on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the panel is showing.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.enabled && self.visible
    }

    /// Shows or hides the panel.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    /// Latest sample.
    #[must_use]
    pub const fn stats(&self) -> &DebugStats {
        &self.stats
    }

    /// Records the frame and resamples when a poll is due.
    ///
    /// Returns whether `sample` ran.
    pub fn update(&mut self, dt: f32, sample: impl FnOnce() -> DebugStats) -> bool {
        self.fps.record(dt);
        if !self.enabled {
            return false;
        }
        self.since_poll += dt;
        if self.since_poll < 1.0 / POLL_HZ {
            return false;
        }
        self.since_poll = 0.0;
        self.stats = DebugStats {
            fps: self.fps.fps(),
            frame_time_ms: self.fps.last_frame_time_ms(),
            recent_events: self.recent_events(),
            ..sample()
        };
        true
    }

    fn recent_events(&self) -> Vec<String> {
        self.event_log.as_ref().map_or_else(Vec::new, |log| {
            log.events().iter().rev().map(describe_event).collect()
        })
    }

    /// Draws the panel.
    pub fn render(&self, ctx: &Context) {
        if !self.is_visible() {
            return;
        }
        let stats = &self.stats;

        egui::Window::new("Debug")
            .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(10.0, -10.0))
            .resizable(false)
            .collapsible(true)
            .show(ctx, |ui| {
                ui.label(
                    RichText::new(format!("FPS: {:.0} ({:.1}ms)", stats.fps, stats.frame_time_ms))
                        .color(fps_color(stats.fps)),
                );
                ui.separator();
                ui.label(format!("Progress: {:.3}", stats.progress));
                ui.label(format!("Phase: {}", stats.phase));
                ui.label(format!("Energy: {:.3}", stats.energy));
                ui.label(format!("Tile sum: {}", stats.tile_sum));
                ui.label(format!("Oxygen: {}", stats.oxygen));
                ui.label(format!("Particles: {}", stats.particles));
                ui.label(format!("Audio: {}", stats.audio));
                ui.separator();
                ui.collapsing("Events", |ui| {
                    for line in &stats.recent_events {
                        ui.monospace(line);
                    }
                });
                ui.separator();
                ui.label(RichText::new("F9 win / F10 lose").color(Color32::GRAY));
            });
    }
}

/// One-line summary of a bus event.
fn describe_event(event: &GameEvent) -> String {
    match event {
        GameEvent::Move { direction } => format!("move {direction:?}"),
        GameEvent::Merge { value } => format!("merge {value}"),
        GameEvent::Milestone { value } => format!("milestone {value}"),
        GameEvent::Won { score } => format!("won ({score})"),
        GameEvent::Over { score } => format!("over ({score})"),
        GameEvent::Progression(p) => format!("progress {:.3}", p.progress_factor),
        GameEvent::OxygenChanged { from, to } => {
            format!("oxygen {} -> {}", from.label(), to.label())
        }
        GameEvent::Restart => "restart".to_string(),
        GameEvent::KeepPlaying => "keep playing".to_string(),
    }
}

/// Returns a color for FPS display based on value.
fn fps_color(fps: f32) -> Color32 {
    if fps >= 55.0 {
        Color32::GREEN
    } else if fps >= 30.0 {
        Color32::YELLOW
    } else {
        Color32::RED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(progress: f32) -> DebugStats {
        DebugStats {
            progress,
            ..DebugStats::default()
        }
    }

    #[test]
    fn test_polls_at_ten_hz() {
        let mut panel = DebugPanel::new(true, &EventBus::new());
        let mut polls = 0;
        for _ in 0..60 {
            if panel.update(1.0 / 60.0, || sample(0.5)) {
                polls += 1;
            }
        }
        // One second at 60 FPS: roughly one sample every 100ms.
        assert!((9..=11).contains(&polls));
        assert!((panel.stats().progress - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_disabled_never_samples() {
        let mut panel = DebugPanel::new(false, &EventBus::new());
        assert!(!panel.update(1.0, || sample(1.0)));
        panel.toggle();
        assert!(!panel.is_visible());
    }

    #[test]
    fn test_toggle() {
        let mut panel = DebugPanel::new(true, &EventBus::new());
        assert!(panel.is_visible());
        panel.toggle();
        assert!(!panel.is_visible());
    }

    #[test]
    fn test_fps_counter() {
        let mut fps = FpsCounter::new();
        for _ in 0..30 {
            fps.record(0.02);
        }
        assert!((fps.fps() - 50.0).abs() < 0.1);
        assert!((fps.last_frame_time_ms() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_samples_recent_bus_events() {
        let bus = EventBus::new();
        let mut panel = DebugPanel::new(true, &bus);

        bus.publish(&GameEvent::Merge { value: 8 });
        for _ in 0..EVENT_LOG_LEN {
            bus.publish(&GameEvent::Restart);
        }
        bus.publish(&GameEvent::Won { score: 2048 });
        assert!(panel.update(0.0, || sample(0.0)));

        let events = &panel.stats().recent_events;
        assert_eq!(events.len(), EVENT_LOG_LEN);
        assert_eq!(events[0], "won (2048)");
        assert!(!events.iter().any(|line| line.starts_with("merge")));
    }

    #[test]
    fn test_disabled_panel_does_not_listen() {
        let bus = EventBus::new();
        let _panel = DebugPanel::new(false, &bus);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
