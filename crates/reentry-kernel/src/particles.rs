//! CPU particle simulation for the background.
//!
//! A pool of ambient "star" particles drifts across a toroidal field and never
//! drops below a configured floor. Discrete events add bursts on top; bursts
//! are truncated to the remaining capacity instead of failing.

use glam::Vec2;
use tracing::trace;

use crate::palette::Rgb;

/// Hard upper bound on the particle count.
pub const MAX_PARTICLES: usize = 4096;

/// Type of particle effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticleEffect {
    /// Slow background drift.
    #[default]
    Ambient,
    /// Merge explosion from the board.
    Explosion,
    /// Evenly spaced ring from a milestone.
    Ring,
    /// Calm wave after a win.
    Splash,
    /// Violent debris after game over.
    Debris,
}

impl ParticleEffect {
    /// Returns default lifetime range in seconds for this effect type.
    #[must_use]
    pub const fn default_lifetime(&self) -> (f32, f32) {
        match self {
            Self::Ambient => (8.0, 20.0),
            Self::Explosion => (0.6, 1.4),
            Self::Ring => (0.9, 1.2),
            Self::Splash => (1.8, 3.0),
            Self::Debris => (1.0, 2.2),
        }
    }

    /// Returns default size range in pixels for this effect type.
    #[must_use]
    pub const fn default_size(&self) -> (f32, f32) {
        match self {
            Self::Ambient => (0.8, 2.4),
            Self::Explosion => (1.5, 4.0),
            Self::Ring => (2.0, 3.0),
            Self::Splash => (1.5, 3.5),
            Self::Debris => (2.0, 5.5),
        }
    }

    /// Velocity damping per second.
    #[must_use]
    pub const fn damping(&self) -> f32 {
        match self {
            Self::Ambient => 0.05,
            Self::Explosion | Self::Debris => 1.6,
            Self::Ring => 0.9,
            Self::Splash => 0.6,
        }
    }

    /// Whether the particle fades out over its whole life.
    #[must_use]
    pub const fn fades(&self) -> bool {
        !matches!(self, Self::Ambient)
    }
}

/// A single particle.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    /// Position in pixels.
    pub position: Vec2,
    /// Velocity in pixels per second.
    pub velocity: Vec2,
    /// Size in pixels.
    pub size: f32,
    /// Seconds since spawn.
    pub age: f32,
    /// Lifetime in seconds.
    pub max_age: f32,
    /// Hue in degrees.
    pub hue: f32,
    /// Saturation.
    pub saturation: f32,
    /// Alpha before twinkle and fade.
    pub base_alpha: f32,
    /// Twinkle oscillator phase.
    pub twinkle_phase: f32,
    /// Twinkle speed in radians per second.
    pub twinkle_rate: f32,
    /// Effect type.
    pub effect: ParticleEffect,
}

impl Particle {
    /// Whether the particle outlived its lifetime.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.age >= self.max_age
    }

    /// Life progress in `[0, 1]`.
    #[must_use]
    pub fn life_fraction(&self) -> f32 {
        (self.age / self.max_age).clamp(0.0, 1.0)
    }

    /// Current alpha including twinkle and fades.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        let twinkle = 0.65 + 0.35 * self.twinkle_phase.sin();
        let fade = if self.effect.fades() {
            1.0 - self.life_fraction()
        } else {
            // Ambient particles fade in and out over one second.
            self.age.min(self.max_age - self.age).clamp(0.0, 1.0)
        };
        (self.base_alpha * twinkle * fade).clamp(0.0, 1.0)
    }

    /// Current color.
    #[must_use]
    pub fn color(&self) -> Rgb {
        Rgb::from_hsl(self.hue, self.saturation, 0.65)
    }

    fn ambient(bounds: Vec2, rng: &mut fastrand::Rng) -> Self {
        let (life_min, life_max) = ParticleEffect::Ambient.default_lifetime();
        let (size_min, size_max) = ParticleEffect::Ambient.default_size();
        Self {
            position: Vec2::new(rng.f32() * bounds.x, rng.f32() * bounds.y),
            velocity: Vec2::new(range(rng, -8.0, 8.0), range(rng, -8.0, 8.0)),
            size: range(rng, size_min, size_max),
            age: 0.0,
            max_age: range(rng, life_min, life_max),
            hue: range(rng, 195.0, 235.0),
            saturation: 0.25,
            base_alpha: range(rng, 0.3, 0.8),
            twinkle_phase: rng.f32() * std::f32::consts::TAU,
            twinkle_rate: range(rng, 0.8, 3.0),
            effect: ParticleEffect::Ambient,
        }
    }
}

fn range(rng: &mut fastrand::Rng, min: f32, max: f32) -> f32 {
    min + rng.f32() * (max - min)
}

/// Parameters of a particle burst.
#[derive(Debug, Clone, Copy)]
pub struct BurstSpec {
    /// Effect type of the spawned particles.
    pub effect: ParticleEffect,
    /// Spawn point.
    pub origin: Vec2,
    /// Requested particle count.
    pub count: usize,
    /// Minimum initial speed.
    pub speed_min: f32,
    /// Maximum initial speed.
    pub speed_max: f32,
    /// Base hue in degrees.
    pub hue: f32,
    /// Random hue spread in degrees.
    pub hue_jitter: f32,
    /// Saturation.
    pub saturation: f32,
    /// Evenly spaced angles instead of random ones.
    pub even_spread: bool,
}

impl BurstSpec {
    /// Creates a burst with defaults for `effect`.
    #[must_use]
    pub const fn new(effect: ParticleEffect, origin: Vec2) -> Self {
        Self {
            effect,
            origin,
            count: 16,
            speed_min: 40.0,
            speed_max: 120.0,
            hue: 30.0,
            hue_jitter: 15.0,
            saturation: 0.9,
            even_spread: matches!(effect, ParticleEffect::Ring),
        }
    }

    /// Sets the particle count.
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the speed range.
    #[must_use]
    pub const fn with_speed(mut self, min: f32, max: f32) -> Self {
        self.speed_min = min;
        self.speed_max = max;
        self
    }

    /// Sets the hue and its jitter.
    #[must_use]
    pub const fn with_hue(mut self, hue: f32, jitter: f32) -> Self {
        self.hue = hue;
        self.hue_jitter = jitter;
        self
    }

    /// Sets the saturation.
    #[must_use]
    pub const fn with_saturation(mut self, saturation: f32) -> Self {
        self.saturation = saturation;
        self
    }
}

/// Particle pool with an ambient floor and a hard ceiling.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    bounds: Vec2,
    max_particles: usize,
    ambient_floor: usize,
    spawn_accumulator: f32,
}

impl ParticleSystem {
    /// Creates an empty system.
    ///
    /// The floor is clamped to the ceiling, and the ceiling to [`MAX_PARTICLES`].
    #[must_use]
    pub fn new(bounds: Vec2, max_particles: usize, ambient_floor: usize) -> Self {
        let max_particles = max_particles.min(MAX_PARTICLES);
        Self {
            particles: Vec::with_capacity(max_particles),
            bounds: bounds.max(Vec2::ONE),
            max_particles,
            ambient_floor: ambient_floor.min(max_particles),
            spawn_accumulator: 0.0,
        }
    }

    /// Field size used for wrap-around.
    #[must_use]
    pub const fn bounds(&self) -> Vec2 {
        self.bounds
    }

    /// Resizes the field. Particles outside are wrapped back in on the next update.
    pub fn set_bounds(&mut self, bounds: Vec2) {
        self.bounds = bounds.max(Vec2::ONE);
    }

    /// Live particles.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Number of live particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether no particle is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Configured ceiling.
    #[must_use]
    pub const fn max_particles(&self) -> usize {
        self.max_particles
    }

    /// Configured ambient floor.
    #[must_use]
    pub const fn ambient_floor(&self) -> usize {
        self.ambient_floor
    }

    /// Slots left before the ceiling.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.max_particles.saturating_sub(self.particles.len())
    }

    /// Fills the pool up to the ambient floor at once.
    pub fn fill_ambient(&mut self, rng: &mut fastrand::Rng) {
        while self.particles.len() < self.ambient_floor {
            self.particles.push(Particle::ambient(self.bounds, rng));
        }
    }

    /// Spawns ambient particles at `rate` per second while below the floor.
    pub fn maintain_ambient(&mut self, dt: f32, rate: f32, rng: &mut fastrand::Rng) {
        if self.particles.len() >= self.ambient_floor {
            self.spawn_accumulator = 0.0;
            return;
        }
        self.spawn_accumulator += rate.max(0.0) * dt;
        while self.spawn_accumulator >= 1.0 && self.particles.len() < self.ambient_floor {
            self.particles.push(Particle::ambient(self.bounds, rng));
            self.spawn_accumulator -= 1.0;
        }
    }

    /// Spawns a burst, truncated to the remaining capacity.
    ///
    /// Returns the number of particles actually spawned.
    pub fn burst(&mut self, spec: &BurstSpec, rng: &mut fastrand::Rng) -> usize {
        let count = spec.count.min(self.remaining_capacity());
        let (life_min, life_max) = spec.effect.default_lifetime();
        let (size_min, size_max) = spec.effect.default_size();

        for i in 0..count {
            let angle = if spec.even_spread {
                std::f32::consts::TAU * i as f32 / count as f32
            } else {
                rng.f32() * std::f32::consts::TAU
            };
            let speed = if spec.even_spread {
                spec.speed_max
            } else {
                range(rng, spec.speed_min, spec.speed_max)
            };

            self.particles.push(Particle {
                position: spec.origin,
                velocity: Vec2::from_angle(angle) * speed,
                size: range(rng, size_min, size_max),
                age: 0.0,
                max_age: range(rng, life_min, life_max),
                hue: spec.hue + range(rng, -spec.hue_jitter, spec.hue_jitter),
                saturation: spec.saturation,
                base_alpha: range(rng, 0.7, 1.0),
                twinkle_phase: rng.f32() * std::f32::consts::TAU,
                twinkle_rate: range(rng, 4.0, 10.0),
                effect: spec.effect,
            });
        }

        if count < spec.count {
            trace!(requested = spec.count, spawned = count, "Particle burst truncated");
        }
        count
    }

    /// Advances the simulation.
    ///
    /// `force` accelerates ambient particles. Expired particles are removed
    /// oldest first while the pool is above its floor; the rest are renewed
    /// as ambient particles.
    pub fn update(&mut self, dt: f32, force: Vec2, rng: &mut fastrand::Rng) {
        let bounds = self.bounds;
        for p in &mut self.particles {
            p.age += dt;
            if p.effect == ParticleEffect::Ambient {
                p.velocity += force * dt;
            }
            p.velocity *= (-p.effect.damping() * dt).exp();
            p.position += p.velocity * dt;
            p.position.x = p.position.x.rem_euclid(bounds.x);
            p.position.y = p.position.y.rem_euclid(bounds.y);
            p.twinkle_phase += p.twinkle_rate * dt;
        }

        self.cull_expired(rng);
    }

    fn cull_expired(&mut self, rng: &mut fastrand::Rng) {
        let mut expired: Vec<usize> = (0..self.particles.len())
            .filter(|&i| self.particles[i].is_expired())
            .collect();
        if expired.is_empty() {
            return;
        }

        // Oldest first.
        expired.sort_by(|&a, &b| self.particles[b].age.total_cmp(&self.particles[a].age));

        let removable = self.particles.len().saturating_sub(self.ambient_floor);
        let (remove, renew) = expired.split_at(removable.min(expired.len()));

        for &i in renew {
            let position = self.particles[i].position;
            self.particles[i] = Particle {
                position,
                ..Particle::ambient(self.bounds, rng)
            };
        }

        let mut remove = remove.to_vec();
        remove.sort_unstable_by(|a, b| b.cmp(a));
        for i in remove {
            self.particles.swap_remove(i);
        }
    }

    /// Drops event particles and trims back to the ambient floor.
    pub fn reset(&mut self) {
        self.particles.retain(|p| p.effect == ParticleEffect::Ambient);
        self.particles.truncate(self.ambient_floor);
        self.spawn_accumulator = 0.0;
    }

    /// Removes every particle.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.spawn_accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(max: usize, floor: usize) -> (ParticleSystem, fastrand::Rng) {
        (
            ParticleSystem::new(Vec2::new(200.0, 100.0), max, floor),
            fastrand::Rng::with_seed(7),
        )
    }

    #[test]
    fn test_fill_ambient_reaches_floor() {
        let (mut ps, mut rng) = system(50, 20);
        ps.fill_ambient(&mut rng);
        assert_eq!(ps.len(), 20);
        assert!(ps.particles().iter().all(|p| p.effect == ParticleEffect::Ambient));
    }

    #[test]
    fn test_burst_truncated_at_ceiling() {
        let (mut ps, mut rng) = system(30, 20);
        ps.fill_ambient(&mut rng);

        let spec = BurstSpec::new(ParticleEffect::Explosion, Vec2::new(100.0, 50.0)).with_count(25);
        assert_eq!(ps.burst(&spec, &mut rng), 10);
        assert_eq!(ps.len(), 30);
        assert_eq!(ps.burst(&spec, &mut rng), 0);
    }

    #[test]
    fn test_toroidal_wrap() {
        let (mut ps, mut rng) = system(10, 0);
        let spec = BurstSpec::new(ParticleEffect::Ring, Vec2::new(199.0, 50.0))
            .with_count(1)
            .with_speed(100.0, 100.0);
        ps.burst(&spec, &mut rng);

        ps.update(0.1, Vec2::ZERO, &mut rng);
        let p = ps.particles()[0];
        assert!(p.position.x >= 0.0 && p.position.x < 200.0);
        assert!(p.position.x < 20.0);
    }

    #[test]
    fn test_expired_culled_above_floor() {
        let (mut ps, mut rng) = system(100, 5);
        ps.fill_ambient(&mut rng);
        let spec = BurstSpec::new(ParticleEffect::Explosion, Vec2::ZERO).with_count(10);
        ps.burst(&spec, &mut rng);
        assert_eq!(ps.len(), 15);

        // Every burst particle expires well before any ambient one.
        ps.update(2.0, Vec2::ZERO, &mut rng);
        assert_eq!(ps.len(), 5);
        assert!(ps.particles().iter().all(|p| p.effect == ParticleEffect::Ambient));
    }

    #[test]
    fn test_expired_renewed_at_floor() {
        let (mut ps, mut rng) = system(100, 8);
        ps.fill_ambient(&mut rng);

        ps.update(25.0, Vec2::ZERO, &mut rng);
        assert_eq!(ps.len(), 8);
        assert!(ps.particles().iter().all(|p| !p.is_expired()));
    }

    #[test]
    fn test_reset_keeps_ambient_floor() {
        let (mut ps, mut rng) = system(100, 10);
        ps.fill_ambient(&mut rng);
        let spec = BurstSpec::new(ParticleEffect::Debris, Vec2::ZERO).with_count(40);
        ps.burst(&spec, &mut rng);

        ps.reset();
        assert_eq!(ps.len(), 10);
    }

    #[test]
    fn test_maintain_ambient_rate() {
        let (mut ps, mut rng) = system(100, 50);
        ps.maintain_ambient(0.5, 20.0, &mut rng);
        assert_eq!(ps.len(), 10);
        ps.maintain_ambient(10.0, 20.0, &mut rng);
        assert_eq!(ps.len(), 50);
    }

    #[test]
    fn test_alpha_in_range() {
        let (mut ps, mut rng) = system(100, 10);
        ps.fill_ambient(&mut rng);
        for _ in 0..20 {
            ps.update(0.25, Vec2::new(3.0, 0.0), &mut rng);
            assert!(ps.particles().iter().all(|p| (0.0..=1.0).contains(&p.alpha())));
        }
    }
}
