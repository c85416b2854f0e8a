//! Application lifecycle management.
//!
//! Builds the event bus, the game engine and the two presentation engines,
//! wires them together and drives them from the winit event loop.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use glam::Vec2;
use tracing::{debug, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use reentry_gameplay::{
    EventBus, EventTopic, FileStore, GameCommand, GameEngine, GameEvent, HandlerError,
    HandlerResult, Subscription,
};
use reentry_kernel::{AudioEngine, AudioState, RodioSink, VisualEngine};

use crate::config::EngineConfig;
use crate::debug::{DebugPanel, DebugStats};
use crate::input::InputHandler;
use crate::renderer::Renderer;
use crate::scene::{self, BoardLayout, BoardView, Overlay};

/// Shared handle to a presentation engine reachable from bus handlers.
pub type Shared<T> = Rc<RefCell<T>>;

/// Runs `f` on a shared engine, or reports that it is already borrowed.
fn with_engine<T>(engine: &Shared<T>, f: impl FnOnce(&mut T)) -> HandlerResult {
    let mut engine = engine
        .try_borrow_mut()
        .map_err(|e| HandlerError::new(format!("engine busy: {e}")))?;
    f(&mut engine);
    Ok(())
}

/// Applies one game event to the visual engine.
pub fn apply_visual_event(visuals: &mut VisualEngine, event: &GameEvent) {
    match event {
        GameEvent::Move { direction } => visuals.on_move(*direction),
        GameEvent::Merge { value } => visuals.on_merge(*value),
        GameEvent::Milestone { value } => visuals.on_milestone(*value),
        GameEvent::Won { .. } => visuals.on_victory(),
        GameEvent::Over { .. } => visuals.on_game_over(),
        GameEvent::Progression(state) => visuals.set_progress(state.progress_factor),
        GameEvent::Restart => visuals.reset(),
        GameEvent::KeepPlaying => visuals.on_keep_playing(),
        GameEvent::OxygenChanged { .. } => {}
    }
}

/// Applies one game event to the audio engine.
pub fn apply_audio_event(audio: &mut AudioEngine, event: &GameEvent) {
    match event {
        GameEvent::Move { direction } => audio.on_move(*direction),
        GameEvent::Merge { value } => audio.on_merge(*value),
        GameEvent::Milestone { value } => audio.on_milestone(*value),
        GameEvent::Won { .. } => audio.on_victory(),
        GameEvent::Over { .. } => audio.on_game_over(),
        GameEvent::OxygenChanged { to, .. } => audio.on_oxygen_drop(*to),
        GameEvent::Restart => audio.reset(),
        GameEvent::Progression(_) | GameEvent::KeepPlaying => {}
    }
}

/// Subscribes both presentation engines to every topic.
///
/// Each engine gets its own handler so a failure in one never starves the
/// other.
pub fn wire_presentation(
    bus: &EventBus,
    visuals: &Shared<VisualEngine>,
    audio: &Shared<AudioEngine>,
) -> Vec<Subscription> {
    let mut subscriptions = Vec::with_capacity(EventTopic::ALL.len() * 2);
    for topic in EventTopic::ALL {
        let target = Rc::clone(visuals);
        subscriptions.push(bus.subscribe(topic, move |event| {
            with_engine(&target, |v| apply_visual_event(v, event))
        }));
        let target = Rc::clone(audio);
        subscriptions.push(bus.subscribe(topic, move |event| {
            with_engine(&target, |a| apply_audio_event(a, event))
        }));
    }
    subscriptions
}

/// Application state.
struct ReentryApp {
    /// Engine configuration
    config: EngineConfig,
    /// Window handle (created after resume)
    window: Option<Arc<Window>>,
    /// Renderer (initialized after window creation)
    renderer: Option<Renderer>,

    /// Input handler
    input: InputHandler,
    /// Last update time
    last_update: Instant,

    /// Board rules and state
    game: GameEngine,
    /// Board as last presented
    board: Shared<BoardView>,
    /// Particle and effect simulation
    visuals: Shared<VisualEngine>,
    /// Procedural audio
    audio: Shared<AudioEngine>,
    /// Bus handlers for the presentation engines
    subscriptions: Vec<Subscription>,

    /// Debug panel
    debug: DebugPanel,
    /// Randomness for radio static
    scene_rng: fastrand::Rng,
}

impl ReentryApp {
    /// Creates a new application instance.
    fn new(config: EngineConfig) -> Self {
        let bus = EventBus::new();
        let screen = Vec2::new(config.window.width as f32, config.window.height as f32);

        let visuals = Rc::new(RefCell::new(VisualEngine::new(
            config.visuals.clone(),
            screen,
            fastrand::Rng::new(),
        )));
        let audio = Rc::new(RefCell::new(AudioEngine::new(config.audio.clone())));
        let subscriptions = wire_presentation(&bus, &visuals, &audio);
        let debug = DebugPanel::new(config.debug.show_debug_overlay, &bus);

        let save_dir = config.resolved_save_dir();
        info!("Save directory: {}", save_dir.display());

        let board = Rc::new(RefCell::new(BoardView::new()));
        let mut game = GameEngine::new(
            config.game.clone(),
            bus,
            Box::new(FileStore::new(save_dir)),
            Box::new(Rc::clone(&board)),
            fastrand::Rng::new(),
        );
        game.setup();

        Self {
            input: InputHandler::new(config.debug.show_debug_overlay),
            debug,
            config,
            window: None,
            renderer: None,
            last_update: Instant::now(),
            game,
            board,
            visuals,
            audio,
            subscriptions,
            scene_rng: fastrand::Rng::new(),
        }
    }

    /// Opens the audio device on the first interaction.
    fn ensure_audio(&mut self) {
        let mut audio = self.audio.borrow_mut();
        if audio.state() == AudioState::Uninitialized {
            audio.initialize(RodioSink::open_boxed);
        }
    }

    /// Main update and render loop.
    fn update_and_render(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32().min(0.25);
        self.last_update = now;

        if self.input.debug_toggle_pressed() && self.debug.is_enabled() {
            self.debug.toggle();
            debug!(visible = self.debug.is_visible(), "Debug panel toggled");
        }

        if self.input.has_interacted() {
            self.ensure_audio();
        }

        for command in self.input.drain_commands() {
            self.handle_command(command);
        }

        self.visuals.borrow_mut().tick(dt);
        {
            let visual_energy = self.visuals.borrow().energy();
            let progress = self.game.progress().progress_factor;
            let mut audio = self.audio.borrow_mut();
            audio.set_energy(progress.max(visual_energy));
            audio.tick(dt);
        }
        self.board.borrow_mut().advance(dt);

        let (game, visuals, audio) = (&self.game, &self.visuals, &self.audio);
        self.debug.update(dt, || {
            let progress = game.progress();
            let visuals = visuals.borrow();
            DebugStats {
                progress: progress.progress_factor,
                energy: visuals.energy(),
                particles: visuals.particle_count(),
                phase: progress.stage().label(),
                oxygen: progress.oxygen().label(),
                audio: format!("{:?}", audio.borrow().state()),
                tile_sum: progress.tile_sum,
                ..DebugStats::default()
            }
        });

        self.render();
        self.input.end_frame();
    }

    fn handle_command(&mut self, command: GameCommand) {
        if command.is_debug() && !self.debug.is_enabled() {
            return;
        }
        self.game.handle_command(command);
    }

    /// Render the frame.
    fn render(&mut self) {
        let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) else {
            return;
        };

        let frame = self.visuals.borrow().frame();
        let board = self.board.borrow();
        let progress = self.game.progress();
        let overlay = Overlay::select(&board, self.input.has_interacted());
        let debug_panel = &self.debug;
        let rng = &mut self.scene_rng;

        let result = renderer.render_with_ui(window, frame.background, |ctx| {
            let rect = ctx.screen_rect();
            let screen = Vec2::new(rect.width(), rect.height());
            let painter = ctx.layer_painter(egui::LayerId::background());
            let layout = BoardLayout::fit(screen);

            scene::paint_backdrop(&painter, &frame, screen, rng);
            scene::paint_board(&painter, &board, &layout, &frame.transform);
            scene::paint_hud(&painter, &board, &progress, screen);
            scene::paint_overlays(&painter, &frame, overlay, screen);

            debug_panel.render(ctx);
        });

        if let Err(e) = result {
            warn!("Render error: {e}");
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        // Minimized.
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size);
        }
        if let Some(window) = &self.window {
            let logical = new_size.to_logical::<f32>(window.scale_factor());
            self.visuals
                .borrow_mut()
                .resize(Vec2::new(logical.width, logical.height));
        }
        self.config.window.width = new_size.width;
        self.config.window.height = new_size.height;
    }

    fn shutdown(&mut self) {
        if let Some(renderer) = &self.renderer {
            info!(frames = renderer.frame_count(), "Renderer stopped");
        }
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        // Command-line switches are per session; only the window size sticks.
        let mut saved = EngineConfig::load();
        saved.window = self.config.window.clone();
        if let Err(e) = saved.save() {
            warn!("Failed to save config: {e}");
        }
    }
}

impl ApplicationHandler for ReentryApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        info!("Application resumed, creating window...");

        let window_attrs = Window::default_attributes()
            .with_title("Reentry")
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        match event_loop.create_window(window_attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                info!("Window created successfully");

                let vsync = self.config.window.vsync;
                match pollster::block_on(Renderer::new(Arc::clone(&window), vsync)) {
                    Ok(renderer) => self.renderer = Some(renderer),
                    Err(e) => {
                        warn!("Failed to initialize renderer: {e}");
                        event_loop.exit();
                        return;
                    }
                }

                let size = window.inner_size();
                self.window = Some(window);
                self.resize(size);
                self.last_update = Instant::now();

                info!(
                    "Reentry ready - {}x{}",
                    self.config.window.width, self.config.window.height
                );
            }
            Err(e) => {
                warn!("Failed to create window: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
            renderer.handle_event(window, &event);
        }
        self.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down...");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => self.resize(new_size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.set_scale_factor(scale_factor);
                }
            }
            WindowEvent::RedrawRequested => {
                self.update_and_render();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Runs the main application loop.
pub fn run(mut config: EngineConfig) -> Result<()> {
    config.validate();

    info!("Configuration loaded:");
    info!("  Window: {}x{}", config.window.width, config.window.height);
    info!("  VSync: {}", config.window.vsync);
    info!("  Board: {}x{}", config.game.size, config.game.size);
    info!("  Debug: {}", config.debug.show_debug_overlay);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ReentryApp::new(config);

    info!("Starting event loop...");
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reentry_gameplay::{GameConfig, MemoryStore};
    use reentry_kernel::{AudioConfig, VisualConfig};

    struct Harness {
        game: GameEngine,
        visuals: Shared<VisualEngine>,
        audio: Shared<AudioEngine>,
        board: Shared<BoardView>,
        _subscriptions: Vec<Subscription>,
    }

    fn harness() -> Harness {
        let bus = EventBus::new();
        let visuals = Rc::new(RefCell::new(VisualEngine::new(
            VisualConfig::default(),
            Vec2::new(720.0, 900.0),
            fastrand::Rng::with_seed(1),
        )));
        let audio = Rc::new(RefCell::new(AudioEngine::new(AudioConfig::default())));
        let subscriptions = wire_presentation(&bus, &visuals, &audio);
        let board = Rc::new(RefCell::new(BoardView::new()));
        let mut game = GameEngine::new(
            GameConfig::default(),
            bus,
            Box::new(MemoryStore::new()),
            Box::new(Rc::clone(&board)),
            fastrand::Rng::with_seed(2),
        );
        game.setup();
        Harness {
            game,
            visuals,
            audio,
            board,
            _subscriptions: subscriptions,
        }
    }

    #[test]
    fn test_every_topic_has_two_handlers() {
        let h = harness();
        for topic in EventTopic::ALL {
            assert_eq!(h.game.bus().topic_subscriber_count(topic), 2);
        }
    }

    #[test]
    fn test_setup_reaches_board_and_visuals() {
        let h = harness();
        assert_eq!(h.board.borrow().tiles().len(), 2);
        let expected = h.game.progress().progress_factor;
        assert!((h.visuals.borrow().progress() - expected).abs() < f32::EPSILON);
    }

    #[test]
    fn test_game_over_then_restart_clears_effects() {
        let mut h = harness();
        h.game.debug_force_lose();
        assert!(h.game.is_over());
        assert!(h.visuals.borrow().pending_tasks() > 0);
        assert!((h.visuals.borrow().energy() - 1.0).abs() < f32::EPSILON);
        assert!(h.board.borrow().meta().over);

        h.game.handle_command(GameCommand::Restart);
        assert_eq!(h.visuals.borrow().pending_tasks(), 0);
        assert!(!h.board.borrow().meta().over);
    }

    #[test]
    fn test_win_shows_message_until_keep_playing() {
        let mut h = harness();
        h.game.debug_force_win();
        assert!(h.board.borrow().show_won());

        h.game.handle_command(GameCommand::KeepPlaying);
        assert!(!h.board.borrow().show_won());
    }

    #[test]
    fn test_keep_playing_restores_progress_background() {
        let mut h = harness();
        h.game.debug_force_win();
        for _ in 0..90 {
            h.visuals.borrow_mut().tick(1.0 / 60.0);
        }
        assert_eq!(h.visuals.borrow().frame().background, reentry_kernel::OCEAN_BLUE);

        h.game.handle_command(GameCommand::KeepPlaying);
        for _ in 0..90 {
            h.visuals.borrow_mut().tick(1.0 / 60.0);
        }
        let visuals = h.visuals.borrow();
        assert_eq!(
            visuals.frame().background,
            reentry_kernel::background_for_progress(visuals.progress())
        );
    }

    #[test]
    fn test_busy_engine_does_not_block_other() {
        let h = harness();
        let before = h.board.borrow().updates();
        let _held = h.audio.borrow_mut();
        // The audio handler fails while borrowed; visuals still hear the event.
        let delivered = h.game.bus().publish(&GameEvent::Restart);
        assert_eq!(delivered, 1);
        assert_eq!(h.visuals.borrow().pending_tasks(), 0);
        assert_eq!(h.board.borrow().updates(), before);
    }
}
