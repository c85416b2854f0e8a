//! Progress-driven visual engine.
//!
//! [`VisualEngine`] owns the background simulation: ambient particles, decaying
//! flash/energy/heat scalars, radar rings, radio static and the board
//! transform. Game events only perturb this state; [`VisualEngine::tick`]
//! advances it once per rendered frame and [`VisualEngine::frame`] exposes what
//! the renderer needs to draw.

use glam::Vec2;
use reentry_gameplay::{tile_rank, AtmosphereStage, Direction};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::palette::{background_for_progress, tier_color, tier_hue, Rgb, EXPLOSION_RED, OCEAN_BLUE};
use crate::particles::{BurstSpec, ParticleEffect, ParticleSystem};
use crate::scheduler::Scheduler;

/// Visual engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Maximum number of live particles.
    pub max_particles: usize,
    /// Ambient particles kept alive at all times.
    pub ambient_floor: usize,
    /// Ambient particles spawned per second while below the floor.
    pub ambient_spawn_rate: f32,
    /// Shake the board (disable for accessibility).
    pub screen_shake: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            max_particles: 800,
            ambient_floor: 120,
            ambient_spawn_rate: 40.0,
            screen_shake: true,
        }
    }
}

impl VisualConfig {
    /// Create config with a particle ceiling.
    #[must_use]
    pub const fn with_max_particles(mut self, max: usize) -> Self {
        self.max_particles = max;
        self
    }

    /// Create config with screen shake enabled/disabled.
    #[must_use]
    pub const fn with_screen_shake(mut self, enabled: bool) -> Self {
        self.screen_shake = enabled;
        self
    }

    /// Keeps the floor under the ceiling.
    pub fn validate(&mut self) {
        self.max_particles = self.max_particles.clamp(1, crate::particles::MAX_PARTICLES);
        self.ambient_floor = self.ambient_floor.min(self.max_particles);
        self.ambient_spawn_rate = self.ambient_spawn_rate.max(0.0);
    }
}

/// Deferred visual effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisualTask {
    /// One calm particle wave after a win.
    SplashWave {
        /// Wave number, starting at 0
        index: u32,
    },
    /// One violent particle wave after game over.
    ExplosionWave {
        /// Relative strength in `[0, 1]`
        intensity: f32,
    },
}

/// Expanding radar ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    /// Ring center in pixels.
    pub center: Vec2,
    /// Current radius in pixels.
    pub radius: f32,
    /// Current alpha.
    pub alpha: f32,
    /// Stroke color.
    pub color: Rgb,
}

/// Offset, scale and rotation applied to the board when drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardTransform {
    /// Translation in pixels.
    pub offset: Vec2,
    /// Uniform scale around the board center.
    pub scale: f32,
    /// Rotation in radians.
    pub rotation: f32,
}

impl Default for BoardTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

/// Particle ready for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSprite {
    /// Center in pixels.
    pub position: Vec2,
    /// Radius in pixels.
    pub size: f32,
    /// Fill color.
    pub color: Rgb,
    /// Opacity.
    pub alpha: f32,
}

/// Everything the renderer reads for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualFrame {
    /// Particles to draw.
    pub particles: Vec<ParticleSprite>,
    /// Clear color.
    pub background: Rgb,
    /// Board transform.
    pub transform: BoardTransform,
    /// White overlay opacity.
    pub flash_alpha: f32,
    /// Milestone overlay opacity.
    pub milestone_flash: f32,
    /// Milestone overlay color.
    pub milestone_color: Rgb,
    /// Radar rings.
    pub rings: Vec<Ring>,
    /// Radio static intensity in `[0, 1]`.
    pub static_intensity: f32,
    /// Heat distortion in `[0, 1]`.
    pub heat: f32,
    /// Current energy.
    pub energy: f32,
    /// Current progress factor.
    pub progress: f32,
}

#[derive(Debug, Clone, Copy)]
struct BackgroundFade {
    from: Rgb,
    to: Rgb,
    elapsed: f32,
    duration: f32,
    /// Fading back to the progress gradient; `to` follows progress and the
    /// fade is dropped once finished.
    release: bool,
}

impl BackgroundFade {
    fn color(&self) -> Rgb {
        if self.elapsed >= self.duration {
            return self.to;
        }
        self.from.lerp(self.to, self.elapsed / self.duration)
    }

    fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

const FLASH_DECAY: f32 = 4.0;
const ENERGY_DECAY: f32 = 1.2;
const MILESTONE_DECAY: f32 = 2.5;
const HEAT_DECAY: f32 = 0.25;
const STATIC_DECAY: f32 = 6.0;
const FORCE_DECAY: f32 = 2.0;
const RING_SPEED: f32 = 140.0;
const RING_FADE: f32 = 0.45;
const VICTORY_FADE_SECONDS: f32 = 1.0;
const SHAKE_MAX_PX: f32 = 14.0;
const GAME_OVER_SHAKE_DECAY: f32 = 0.8;

/// Background simulation driven by game events and progress.
#[derive(Debug)]
pub struct VisualEngine {
    config: VisualConfig,
    particles: ParticleSystem,
    scheduler: Scheduler<VisualTask>,
    rng: fastrand::Rng,
    time: f32,
    progress: f32,
    flash: f32,
    energy: f32,
    milestone_flash: f32,
    milestone_color: Rgb,
    heat: f32,
    static_level: f32,
    force: Vec2,
    rings: Vec<Ring>,
    ring_timer: f32,
    background_fade: Option<BackgroundFade>,
    shake_started: Option<f32>,
    calm: bool,
}

impl VisualEngine {
    /// Creates an engine for a viewport of `size` pixels.
    #[must_use]
    pub fn new(mut config: VisualConfig, size: Vec2, mut rng: fastrand::Rng) -> Self {
        config.validate();
        let mut particles = ParticleSystem::new(size, config.max_particles, config.ambient_floor);
        particles.fill_ambient(&mut rng);
        debug!(
            max = config.max_particles,
            floor = config.ambient_floor,
            "Visual engine created"
        );
        Self {
            config,
            particles,
            scheduler: Scheduler::new(),
            rng,
            time: 0.0,
            progress: 0.0,
            flash: 0.0,
            energy: 0.0,
            milestone_flash: 0.0,
            milestone_color: Rgb::WHITE,
            heat: 0.0,
            static_level: 0.0,
            force: Vec2::ZERO,
            rings: Vec::new(),
            ring_timer: 0.0,
            background_fade: None,
            shake_started: None,
            calm: false,
        }
    }

    /// Viewport size changed.
    pub fn resize(&mut self, size: Vec2) {
        self.particles.set_bounds(size);
    }

    fn center(&self) -> Vec2 {
        self.particles.bounds() * 0.5
    }

    /// Sets the progress factor used to scale every effect.
    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 1.0);
    }

    /// Nudges the drift and bumps flash and energy.
    pub fn on_move(&mut self, direction: Direction) {
        self.force += direction.unit() * (20.0 + 60.0 * self.progress);
        self.flash = (self.flash + 0.04 + 0.2 * self.progress).min(1.0);
        self.energy = (self.energy + 0.06 + 0.3 * self.progress).min(1.0);
    }

    /// Explosion burst from the board center.
    pub fn on_merge(&mut self, value: u32) {
        let rank = tile_rank(value) as f32;
        let scale = 0.5 + self.progress;
        let count = ((4.0 + rank * 3.0) * scale).round() as usize;
        let speed = (40.0 + rank * 14.0) * (1.0 + self.progress);

        let spec = BurstSpec::new(ParticleEffect::Explosion, self.center())
            .with_count(count)
            .with_speed(speed * 0.4, speed)
            .with_hue(tier_hue(value), 12.0);
        let spawned = self.particles.burst(&spec, &mut self.rng);
        self.energy = (self.energy + 0.02 * rank).min(1.0);
        trace!(value, spawned, "Merge burst");
    }

    /// Overlay flash, ring burst and, for big tiles, heat.
    pub fn on_milestone(&mut self, value: u32) {
        let color = tier_color(value);
        self.milestone_flash = 1.0;
        self.milestone_color = color;

        let rank = tile_rank(value);
        let spec = BurstSpec::new(ParticleEffect::Ring, self.center())
            .with_count(24 + rank as usize * 2)
            .with_speed(120.0, 160.0 + rank as f32 * 10.0)
            .with_hue(tier_hue(value), 4.0);
        self.particles.burst(&spec, &mut self.rng);
        self.spawn_ring(color);

        if value >= 256 {
            self.heat = (self.heat + 0.25 + 0.1 * (rank as f32 - 8.0)).min(1.0);
        }
        debug!(value, "Milestone effect");
    }

    /// Fades to ocean blue and sends calm splash waves.
    pub fn on_victory(&mut self) {
        self.background_fade = Some(BackgroundFade {
            from: self.background(),
            to: OCEAN_BLUE,
            elapsed: 0.0,
            duration: VICTORY_FADE_SECONDS,
            release: false,
        });
        self.calm = true;
        self.shake_started = None;
        self.scheduler
            .schedule_all((0..4).map(|i| (i as f32 * 0.35, VisualTask::SplashWave { index: i })));
        debug!("Victory visuals");
    }

    /// Leaves the calm victory scene and fades back to the altitude gradient.
    pub fn on_keep_playing(&mut self) {
        if !self.calm {
            return;
        }
        self.calm = false;
        self.background_fade = Some(BackgroundFade {
            from: self.background(),
            to: background_for_progress(self.progress),
            elapsed: 0.0,
            duration: VICTORY_FADE_SECONDS,
            release: true,
        });
        debug!("Resuming descent visuals");
    }

    /// Maximum flash, red background, debris waves and a decaying shake.
    pub fn on_game_over(&mut self) {
        self.flash = 1.0;
        self.energy = 1.0;
        self.background_fade = Some(BackgroundFade {
            from: EXPLOSION_RED,
            to: EXPLOSION_RED,
            elapsed: 0.0,
            duration: 0.0,
            release: false,
        });
        self.calm = false;
        self.shake_started = Some(self.time);
        self.scheduler.schedule_all([
            (0.0, VisualTask::ExplosionWave { intensity: 1.0 }),
            (0.25, VisualTask::ExplosionWave { intensity: 0.8 }),
            (0.55, VisualTask::ExplosionWave { intensity: 0.6 }),
            (0.9, VisualTask::ExplosionWave { intensity: 0.4 }),
        ]);
        debug!("Game over visuals");
    }

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, 0.25);
        self.time += dt;

        for task in self.scheduler.advance(dt) {
            self.run_task(task);
        }

        self.flash *= (-FLASH_DECAY * dt).exp();
        self.energy *= (-ENERGY_DECAY * dt).exp();
        self.milestone_flash *= (-MILESTONE_DECAY * dt).exp();
        self.heat *= (-HEAT_DECAY * dt).exp();
        self.static_level *= (-STATIC_DECAY * dt).exp();
        self.force *= (-FORCE_DECAY * dt).exp();

        if let Some(fade) = &mut self.background_fade {
            fade.elapsed = (fade.elapsed + dt).min(fade.duration);
            if fade.release {
                fade.to = background_for_progress(self.progress);
            }
        }
        if self
            .background_fade
            .as_ref()
            .is_some_and(|fade| fade.release && fade.finished())
        {
            self.background_fade = None;
        }

        self.update_rings(dt);
        self.update_static(dt);

        self.particles
            .maintain_ambient(dt, self.config.ambient_spawn_rate, &mut self.rng);
        self.particles.update(dt, self.force, &mut self.rng);
    }

    fn run_task(&mut self, task: VisualTask) {
        let center = self.center();
        let spec = match task {
            VisualTask::SplashWave { index } => BurstSpec::new(ParticleEffect::Splash, center)
                .with_count(30)
                .with_speed(30.0 + index as f32 * 15.0, 60.0 + index as f32 * 20.0)
                .with_hue(200.0, 15.0)
                .with_saturation(0.7),
            VisualTask::ExplosionWave { intensity } => BurstSpec::new(ParticleEffect::Debris, center)
                .with_count((60.0 * intensity).round() as usize)
                .with_speed(120.0 * intensity, 420.0 * intensity)
                .with_hue(18.0, 18.0),
        };
        self.particles.burst(&spec, &mut self.rng);
    }

    fn spawn_ring(&mut self, color: Rgb) {
        self.rings.push(Ring {
            center: self.center(),
            radius: 0.0,
            alpha: 0.8,
            color,
        });
    }

    fn update_rings(&mut self, dt: f32) {
        for ring in &mut self.rings {
            ring.radius += RING_SPEED * dt;
            ring.alpha -= RING_FADE * dt;
        }
        self.rings.retain(|r| r.alpha > 0.0);

        // Radar sweep once the descent is underway.
        if self.progress >= 0.3 && !self.calm {
            self.ring_timer += dt;
            let interval = 4.0 - 3.0 * self.progress;
            if self.ring_timer >= interval {
                self.ring_timer = 0.0;
                self.spawn_ring(Rgb::new(0.4, 0.9, 0.6));
            }
        } else {
            self.ring_timer = 0.0;
        }
    }

    fn update_static(&mut self, dt: f32) {
        if self.progress < 0.45 || self.calm {
            return;
        }
        // Expected bursts per second grow with progress.
        if self.rng.f32() < self.progress * 0.8 * dt {
            self.static_level = self.static_level.max(0.3 + 0.5 * self.rng.f32());
        }
    }

    fn background(&self) -> Rgb {
        match &self.background_fade {
            Some(fade) => fade.color(),
            None => background_for_progress(self.progress),
        }
    }

    fn transform(&self) -> BoardTransform {
        let breathe = 1.0 + 0.008 * (self.time * 1.6).sin() * (0.5 + self.energy);
        if !self.config.screen_shake || self.calm {
            return BoardTransform {
                scale: breathe,
                ..BoardTransform::default()
            };
        }

        let mut amplitude = self.energy * self.progress * 5.0;
        if let Some(started) = self.shake_started {
            amplitude += SHAKE_MAX_PX * (-(self.time - started) * GAME_OVER_SHAKE_DECAY).exp();
        }

        let t = self.time;
        let offset = Vec2::new(
            (t * 37.0).sin() + 0.5 * (t * 71.0).sin(),
            (t * 43.0).cos() + 0.5 * (t * 59.0).sin(),
        ) * (amplitude / 1.5);

        BoardTransform {
            offset,
            scale: breathe,
            rotation: (t * 29.0).sin() * amplitude * 0.002,
        }
    }

    /// Render view of the current state.
    #[must_use]
    pub fn frame(&self) -> VisualFrame {
        VisualFrame {
            particles: self
                .particles
                .particles()
                .iter()
                .map(|p| ParticleSprite {
                    position: p.position,
                    size: p.size,
                    color: p.color(),
                    alpha: p.alpha(),
                })
                .collect(),
            background: self.background(),
            transform: self.transform(),
            flash_alpha: self.flash.clamp(0.0, 1.0) * 0.6,
            milestone_flash: self.milestone_flash.clamp(0.0, 1.0) * 0.45,
            milestone_color: self.milestone_color,
            rings: self.rings.clone(),
            static_intensity: self.static_level.clamp(0.0, 1.0),
            heat: self.heat.clamp(0.0, 1.0),
            energy: self.energy,
            progress: self.progress,
        }
    }

    /// Cancels pending waves and zeroes every decaying effect.
    pub fn reset(&mut self) {
        self.scheduler.clear();
        self.particles.reset();
        self.particles.fill_ambient(&mut self.rng);
        self.flash = 0.0;
        self.energy = 0.0;
        self.milestone_flash = 0.0;
        self.heat = 0.0;
        self.static_level = 0.0;
        self.force = Vec2::ZERO;
        self.rings.clear();
        self.ring_timer = 0.0;
        self.background_fade = None;
        self.shake_started = None;
        self.calm = false;
        debug!("Visual state reset");
    }

    /// Current energy.
    #[must_use]
    pub const fn energy(&self) -> f32 {
        self.energy
    }

    /// Current progress factor.
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    /// Atmosphere stage of the current progress.
    #[must_use]
    pub fn stage(&self) -> AtmosphereStage {
        AtmosphereStage::from_progress(self.progress)
    }

    /// Number of live particles.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of deferred waves not yet started.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &VisualConfig {
        &self.config
    }
}
