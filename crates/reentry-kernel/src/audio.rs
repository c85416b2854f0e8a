//! Procedural audio model.
//!
//! Nothing here touches a sound device. [`AudioEngine`] turns game events and
//! the progress factor into [`DroneParams`] targets and one-shot [`SoundSpec`]s,
//! and pushes both into an [`AudioSink`]. The rodio implementation lives in
//! [`audio_backend`](crate::audio_backend); tests use a recording sink.
//!
//! # Drone
//!
//! The drone is always on. Its targets follow a three-band piecewise-linear
//! curve over energy (calm, building, intense) and the sink glides towards them
//! with a one-pole smoother ([`SmoothedParam`]). Distortion only engages above
//! [`DISTORTION_THRESHOLD`].
//!
//! # One-shots
//!
//! Every event sound is oscillators, an optional filter and an
//! attack/exponential-decay envelope that ends the voice by itself.
//! Multi-layer sequences (game over, victory) are staggered through a
//! [`Scheduler`].

use reentry_common::ReentryError;
use reentry_gameplay::{tile_rank, Direction, OxygenLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::scheduler::Scheduler;

/// Audio engine error types.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device.
    #[error("Failed to initialize audio device: {0}")]
    DeviceInitFailed(String),

    /// Failed to create the playback sink.
    #[error("Failed to create audio sink: {0}")]
    SinkCreationFailed(String),

    /// Audio engine not initialized.
    #[error("Audio engine not initialized")]
    NotInitialized,
}

impl From<AudioError> for ReentryError {
    fn from(e: AudioError) -> Self {
        Self::Audio(e.to_string())
    }
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Energy above which the drone distorts.
pub const DISTORTION_THRESHOLD: f32 = 0.75;

/// Default drone smoothing time constant in seconds.
pub const DEFAULT_SMOOTHING: f32 = 0.5;

/// Audio configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Master volume (0.0-1.0).
    pub master_volume: f32,
    /// Silence everything.
    pub mute: bool,
    /// Drone smoothing time constant in seconds.
    pub smoothing: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            mute: false,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl AudioConfig {
    /// Create config with master volume.
    #[must_use]
    pub const fn with_volume(mut self, volume: f32) -> Self {
        self.master_volume = volume;
        self
    }

    /// Create config muted/unmuted.
    #[must_use]
    pub const fn with_mute(mut self, mute: bool) -> Self {
        self.mute = mute;
        self
    }

    /// Clamps values into range.
    pub fn validate(&mut self) {
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
        self.smoothing = self.smoothing.clamp(0.01, 10.0);
    }

    /// Volume actually applied.
    #[must_use]
    pub fn effective_volume(&self) -> f32 {
        if self.mute {
            0.0
        } else {
            self.master_volume
        }
    }
}

/// Parameters of the ambient drone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DroneParams {
    /// Base pitch in Hz.
    pub frequency: f32,
    /// Pulsation (LFO) rate in Hz.
    pub pulse_rate: f32,
    /// Pulsation depth in `[0, 1]`.
    pub pulse_depth: f32,
    /// Output gain.
    pub gain: f32,
    /// Wet/dry distortion mix in `[0, 1]`.
    pub distortion: f32,
}

impl DroneParams {
    /// Calm drone, as at zero energy.
    pub const CALM: Self = Self {
        frequency: 55.0,
        pulse_rate: 0.2,
        pulse_depth: 0.2,
        gain: 0.05,
        distortion: 0.0,
    };

    fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            frequency: mix(self.frequency, other.frequency),
            pulse_rate: mix(self.pulse_rate, other.pulse_rate),
            pulse_depth: mix(self.pulse_depth, other.pulse_depth),
            gain: mix(self.gain, other.gain),
            distortion: mix(self.distortion, other.distortion),
        }
    }
}

impl Default for DroneParams {
    fn default() -> Self {
        Self::CALM
    }
}

/// Band edges and the drone at each edge (calm 0-0.3, building 0.3-0.7,
/// intense 0.7-1.0).
const DRONE_BANDS: [(f32, DroneParams); 4] = [
    (0.0, DroneParams::CALM),
    (
        0.3,
        DroneParams {
            frequency: 65.0,
            pulse_rate: 0.5,
            pulse_depth: 0.3,
            gain: 0.08,
            distortion: 0.0,
        },
    ),
    (
        0.7,
        DroneParams {
            frequency: 82.0,
            pulse_rate: 1.5,
            pulse_depth: 0.45,
            gain: 0.12,
            distortion: 0.0,
        },
    ),
    (
        1.0,
        DroneParams {
            frequency: 110.0,
            pulse_rate: 4.0,
            pulse_depth: 0.6,
            gain: 0.18,
            distortion: 0.0,
        },
    ),
];

/// Maximum distortion mix at full energy.
const MAX_DISTORTION: f32 = 0.6;

/// Drone targets for an energy level.
#[must_use]
pub fn drone_targets(energy: f32) -> DroneParams {
    let energy = energy.clamp(0.0, 1.0);
    let mut params = DRONE_BANDS[DRONE_BANDS.len() - 1].1;
    for pair in DRONE_BANDS.windows(2) {
        let (start, from) = pair[0];
        let (end, to) = pair[1];
        if energy <= end {
            params = from.lerp(to, (energy - start) / (end - start));
            break;
        }
    }

    params.distortion = if energy > DISTORTION_THRESHOLD {
        (energy - DISTORTION_THRESHOLD) / (1.0 - DISTORTION_THRESHOLD) * MAX_DISTORTION
    } else {
        0.0
    };
    params
}

/// One-pole smoother with a time constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedParam {
    value: f32,
    target: f32,
    time_constant: f32,
}

impl SmoothedParam {
    /// Starts at rest on `value`.
    #[must_use]
    pub const fn new(value: f32, time_constant: f32) -> Self {
        Self {
            value,
            target: value,
            time_constant,
        }
    }

    /// Sets the value to glide to.
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Advances by `dt` seconds and returns the new value.
    pub fn step(&mut self, dt: f32) -> f32 {
        let alpha = 1.0 - (-dt / self.time_constant.max(1e-4)).exp();
        self.value += (self.target - self.value) * alpha;
        self.value
    }

    /// Current value.
    #[must_use]
    pub const fn value(&self) -> f32 {
        self.value
    }

    /// Current target.
    #[must_use]
    pub const fn target(&self) -> f32 {
        self.target
    }
}

/// Oscillator waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// Pure tone
    Sine,
    /// Soft odd harmonics
    Triangle,
    /// Hollow odd harmonics
    Square,
    /// Bright, every harmonic
    Sawtooth,
    /// White noise
    Noise,
}

/// One oscillator of a voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscSpec {
    /// Waveform.
    pub waveform: Waveform,
    /// Start frequency in Hz (ignored for noise).
    pub frequency: f32,
    /// End frequency of an exponential glide, if any.
    pub sweep_to: Option<f32>,
    /// Mix level.
    pub gain: f32,
}

impl OscSpec {
    /// Steady oscillator.
    #[must_use]
    pub const fn new(waveform: Waveform, frequency: f32, gain: f32) -> Self {
        Self {
            waveform,
            frequency,
            sweep_to: None,
            gain,
        }
    }

    /// Glides to `frequency` over the voice duration.
    #[must_use]
    pub const fn sweeping_to(mut self, frequency: f32) -> Self {
        self.sweep_to = Some(frequency);
        self
    }
}

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Keeps lows
    LowPass,
    /// Keeps highs
    HighPass,
    /// Keeps a band
    BandPass,
}

/// Biquad filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    /// Filter type.
    pub kind: FilterKind,
    /// Cutoff or center frequency in Hz.
    pub cutoff: f32,
    /// Resonance.
    pub q: f32,
}

impl FilterSpec {
    /// Low-pass at `cutoff`.
    #[must_use]
    pub const fn low_pass(cutoff: f32) -> Self {
        Self {
            kind: FilterKind::LowPass,
            cutoff,
            q: 0.707,
        }
    }

    /// High-pass at `cutoff`.
    #[must_use]
    pub const fn high_pass(cutoff: f32) -> Self {
        Self {
            kind: FilterKind::HighPass,
            cutoff,
            q: 0.707,
        }
    }

    /// Band-pass around `center`.
    #[must_use]
    pub const fn band_pass(center: f32, q: f32) -> Self {
        Self {
            kind: FilterKind::BandPass,
            cutoff: center,
            q,
        }
    }
}

/// Linear attack followed by exponential decay to silence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Attack time in seconds.
    pub attack: f32,
    /// Decay time in seconds, after which the voice is silent.
    pub decay: f32,
}

/// Level at which a decaying envelope counts as silent (-60 dB).
const SILENCE: f32 = 0.001;

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(attack: f32, decay: f32) -> Self {
        Self { attack, decay }
    }

    /// Total length in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.attack.max(0.0) + self.decay.max(0.0)
    }

    /// Amplitude at `t` seconds, 0 once the envelope has ended.
    #[must_use]
    pub fn amplitude(&self, t: f32) -> f32 {
        if t < 0.0 || t >= self.duration() {
            return 0.0;
        }
        if t < self.attack {
            return t / self.attack;
        }
        let k = -SILENCE.ln() / self.decay.max(1e-4);
        (-(t - self.attack) * k).exp()
    }
}

/// A self-terminating one-shot sound.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundSpec {
    /// Short name for logs.
    pub name: &'static str,
    /// Oscillators summed together.
    pub oscillators: Vec<OscSpec>,
    /// Optional filter after the mix.
    pub filter: Option<FilterSpec>,
    /// Gain envelope.
    pub envelope: Envelope,
    /// Output gain.
    pub gain: f32,
}

impl SoundSpec {
    /// Length of the sound in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.envelope.duration()
    }
}

/// Short blip for a move. Pitch depends on direction.
#[must_use]
pub fn move_blip(direction: Direction) -> SoundSpec {
    let frequency = match direction {
        Direction::Up => 660.0,
        Direction::Right => 620.0,
        Direction::Down => 520.0,
        Direction::Left => 580.0,
    };
    SoundSpec {
        name: "move",
        oscillators: vec![OscSpec::new(Waveform::Sine, frequency, 1.0).sweeping_to(frequency * 0.8)],
        filter: None,
        envelope: Envelope::new(0.005, 0.08),
        gain: 0.12,
    }
}

/// Chord for a merge. Pitch and timbre rise with the tile value.
#[must_use]
pub fn merge_chord(value: u32) -> SoundSpec {
    let rank = tile_rank(value).max(1);
    let root = 110.0 * 2f32.powf(rank as f32 / 6.0);

    // Higher tiles get richer waveforms.
    let (main, extra) = match rank {
        0..=3 => (Waveform::Sine, None),
        4..=6 => (Waveform::Triangle, None),
        7..=9 => (Waveform::Triangle, Some(Waveform::Sawtooth)),
        _ => (Waveform::Sawtooth, Some(Waveform::Square)),
    };

    let mut oscillators = vec![
        OscSpec::new(main, root, 1.0),
        OscSpec::new(main, root * 1.26, 0.7),
        OscSpec::new(main, root * 1.5, 0.6),
    ];
    if rank >= 6 {
        oscillators.push(OscSpec::new(main, root * 2.0, 0.4));
    }
    if let Some(waveform) = extra {
        oscillators.push(OscSpec::new(waveform, root * 0.5, 0.35));
    }

    SoundSpec {
        name: "merge",
        oscillators,
        filter: Some(FilterSpec::low_pass(800.0 + rank as f32 * 400.0)),
        envelope: Envelope::new(0.01, 0.3 + rank as f32 * 0.03),
        gain: 0.1,
    }
}

/// Bell-like chime for a milestone.
#[must_use]
pub fn milestone_chime(value: u32) -> SoundSpec {
    let rank = tile_rank(value).max(1) as f32;
    let base = 440.0 * 2f32.powf((rank - 6.0) / 12.0);
    SoundSpec {
        name: "milestone",
        oscillators: vec![
            OscSpec::new(Waveform::Sine, base * 2.0, 1.0),
            OscSpec::new(Waveform::Sine, base * 4.0, 0.5),
            OscSpec::new(Waveform::Triangle, base * 3.0, 0.3),
        ],
        filter: None,
        envelope: Envelope::new(0.005, 1.2),
        gain: 0.12,
    }
}

/// Warning beep for an oxygen drop. Pitch rises with severity.
#[must_use]
pub fn alert_beep(level: OxygenLevel) -> SoundSpec {
    let frequency = 440.0 + f32::from(level.severity()) * 220.0;
    SoundSpec {
        name: "alert",
        oscillators: vec![OscSpec::new(Waveform::Square, frequency, 1.0)],
        filter: Some(FilterSpec::low_pass(2400.0)),
        envelope: Envelope::new(0.01, 0.25),
        gain: 0.08,
    }
}

/// Layers of the game-over sequence as `(delay, sound)`.
#[must_use]
pub fn catastrophe_sequence() -> Vec<(f32, SoundSpec)> {
    let rumble = SoundSpec {
        name: "rumble",
        oscillators: vec![
            OscSpec::new(Waveform::Sawtooth, 42.0, 1.0).sweeping_to(28.0),
            OscSpec::new(Waveform::Sine, 30.0, 0.8),
        ],
        filter: Some(FilterSpec::low_pass(220.0)),
        envelope: Envelope::new(0.05, 3.5),
        gain: 0.35,
    };
    let noise_burst = |cutoff: f32, decay: f32| SoundSpec {
        name: "noise burst",
        oscillators: vec![OscSpec::new(Waveform::Noise, 0.0, 1.0)],
        filter: Some(FilterSpec::low_pass(cutoff)),
        envelope: Envelope::new(0.002, decay),
        gain: 0.3,
    };
    let falling_tone = SoundSpec {
        name: "falling tone",
        oscillators: vec![OscSpec::new(Waveform::Square, 420.0, 1.0).sweeping_to(55.0)],
        filter: Some(FilterSpec::band_pass(600.0, 2.0)),
        envelope: Envelope::new(0.02, 2.4),
        gain: 0.15,
    };

    vec![
        (0.0, rumble),
        (0.0, noise_burst(4000.0, 0.8)),
        (0.3, noise_burst(2500.0, 0.6)),
        (0.5, falling_tone),
        (0.7, noise_burst(1500.0, 0.9)),
        (1.2, noise_burst(800.0, 1.5)),
    ]
}

/// Layers of the victory sequence as `(delay, sound)`.
#[must_use]
pub fn victory_sequence() -> Vec<(f32, SoundSpec)> {
    let note = |frequency: f32| SoundSpec {
        name: "arpeggio",
        oscillators: vec![
            OscSpec::new(Waveform::Triangle, frequency, 1.0),
            OscSpec::new(Waveform::Sine, frequency * 2.0, 0.3),
        ],
        filter: None,
        envelope: Envelope::new(0.01, 0.6),
        gain: 0.12,
    };
    let pad = SoundSpec {
        name: "pad",
        oscillators: vec![
            OscSpec::new(Waveform::Sawtooth, 261.63, 0.6),
            OscSpec::new(Waveform::Sawtooth, 329.63, 0.5),
            OscSpec::new(Waveform::Sawtooth, 392.0, 0.5),
        ],
        filter: Some(FilterSpec::low_pass(1200.0)),
        envelope: Envelope::new(0.4, 3.0),
        gain: 0.08,
    };
    let shimmer = SoundSpec {
        name: "shimmer",
        oscillators: vec![OscSpec::new(Waveform::Noise, 0.0, 1.0)],
        filter: Some(FilterSpec::high_pass(6000.0)),
        envelope: Envelope::new(0.3, 2.0),
        gain: 0.04,
    };

    vec![
        (0.0, note(523.25)),
        (0.15, note(659.25)),
        (0.3, note(783.99)),
        (0.45, note(1046.5)),
        (0.6, pad),
        (0.6, shimmer),
    ]
}

/// Output stage for the engine.
pub trait AudioSink {
    /// New drone targets. The sink glides to them with its smoother.
    fn set_drone_target(&mut self, params: &DroneParams);

    /// Starts a one-shot sound.
    fn play(&mut self, sound: &SoundSpec);

    /// Applies the master volume (0 when muted).
    fn set_volume(&mut self, volume: f32);
}

/// Lifecycle of the audio engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    /// No user interaction yet
    Uninitialized,
    /// Sink is live
    Running,
    /// No usable output; every call is a no-op
    Unsupported,
}

/// Event-driven procedural audio.
pub struct AudioEngine {
    state: AudioState,
    config: AudioConfig,
    sink: Option<Box<dyn AudioSink>>,
    energy: f32,
    drone_target: DroneParams,
    scheduler: Scheduler<SoundSpec>,
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("state", &self.state)
            .field("energy", &self.energy)
            .field("pending", &self.scheduler.len())
            .finish_non_exhaustive()
    }
}

impl AudioEngine {
    /// Creates an uninitialized engine.
    #[must_use]
    pub fn new(mut config: AudioConfig) -> Self {
        config.validate();
        Self {
            state: AudioState::Uninitialized,
            config,
            sink: None,
            energy: 0.0,
            drone_target: DroneParams::CALM,
            scheduler: Scheduler::new(),
        }
    }

    /// Opens the output on first use.
    ///
    /// Only the first call does anything. A failing factory leaves the engine
    /// [`AudioState::Unsupported`] for good.
    pub fn initialize<F>(&mut self, open: F) -> AudioState
    where
        F: FnOnce(&AudioConfig) -> AudioResult<Box<dyn AudioSink>>,
    {
        if self.state != AudioState::Uninitialized {
            return self.state;
        }
        match open(&self.config) {
            Ok(mut sink) => {
                sink.set_volume(self.config.effective_volume());
                sink.set_drone_target(&self.drone_target);
                self.sink = Some(sink);
                self.state = AudioState::Running;
                info!("Audio initialized");
            }
            Err(e) => {
                self.state = AudioState::Unsupported;
                warn!("Audio unavailable, continuing silently: {e}");
            }
        }
        self.state
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> AudioState {
        self.state
    }

    /// Current drone energy.
    #[must_use]
    pub const fn energy(&self) -> f32 {
        self.energy
    }

    /// Current drone targets.
    #[must_use]
    pub const fn drone_target(&self) -> DroneParams {
        self.drone_target
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Retargets the drone for a new energy level.
    pub fn set_energy(&mut self, energy: f32) {
        self.energy = energy.clamp(0.0, 1.0);
        let target = drone_targets(self.energy);
        if target == self.drone_target {
            return;
        }
        self.drone_target = target;
        if let Some(sink) = self.live_sink() {
            sink.set_drone_target(&target);
        }
    }

    /// Changes volume and mute.
    pub fn set_volume(&mut self, volume: f32, mute: bool) {
        self.config.master_volume = volume.clamp(0.0, 1.0);
        self.config.mute = mute;
        let effective = self.config.effective_volume();
        if let Some(sink) = self.live_sink() {
            sink.set_volume(effective);
        }
    }

    /// Releases due sequence layers.
    pub fn tick(&mut self, dt: f32) {
        let due = self.scheduler.advance(dt);
        for sound in &due {
            self.play(sound);
        }
    }

    /// Move blip.
    pub fn on_move(&mut self, direction: Direction) {
        self.play(&move_blip(direction));
    }

    /// Merge chord.
    pub fn on_merge(&mut self, value: u32) {
        self.play(&merge_chord(value));
    }

    /// Milestone chime.
    pub fn on_milestone(&mut self, value: u32) {
        self.play(&milestone_chime(value));
    }

    /// Alert beep for an oxygen drop; critical beeps twice.
    pub fn on_oxygen_drop(&mut self, level: OxygenLevel) {
        self.play(&alert_beep(level));
        if level == OxygenLevel::Critical && self.state == AudioState::Running {
            self.scheduler.schedule(0.3, alert_beep(level));
        }
    }

    /// Game-over sequence.
    pub fn on_game_over(&mut self) {
        self.schedule_sequence(catastrophe_sequence());
    }

    /// Victory sequence.
    pub fn on_victory(&mut self) {
        self.schedule_sequence(victory_sequence());
    }

    /// Drops pending layers and sends the drone back to calm.
    pub fn reset(&mut self) {
        self.scheduler.clear();
        self.set_energy(0.0);
        debug!("Audio reset");
    }

    /// Number of sequence layers not yet started.
    #[must_use]
    pub fn pending_layers(&self) -> usize {
        self.scheduler.len()
    }

    fn schedule_sequence(&mut self, layers: Vec<(f32, SoundSpec)>) {
        if self.state != AudioState::Running {
            return;
        }
        self.scheduler.schedule_all(layers);
        // Layers due now start immediately.
        self.tick(0.0);
    }

    fn play(&mut self, sound: &SoundSpec) {
        let muted = self.config.mute;
        if let Some(sink) = self.live_sink() {
            if !muted {
                trace!(sound = sound.name, "Playing sound");
                sink.play(sound);
            }
        }
    }

    fn live_sink(&mut self) -> Option<&mut Box<dyn AudioSink>> {
        if self.state == AudioState::Running {
            self.sink.as_mut()
        } else {
            None
        }
    }
}
