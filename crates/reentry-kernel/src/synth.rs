//! Sample generators for the rodio backend.
//!
//! [`Voice`] renders one [`SoundSpec`] and ends when its envelope does.
//! [`DroneSource`] never ends; it polls a shared parameter block and glides
//! towards it.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::Source;

use crate::audio::{
    DroneParams, FilterKind, FilterSpec, OscSpec, SmoothedParam, SoundSpec, Waveform,
};

/// Output sample rate of generated sources.
pub const SAMPLE_RATE: u32 = 44_100;

/// Generated sources are mono.
pub const CHANNELS: u16 = 1;

/// Samples between drone parameter updates.
const DRONE_BLOCK: u32 = 64;

/// Naive waveform value for a phase in `[0, 1)`.
fn waveform_sample(waveform: Waveform, phase: f32, rng: &mut fastrand::Rng) -> f32 {
    match waveform {
        Waveform::Sine => (TAU * phase).sin(),
        Waveform::Triangle => 4.0 * (phase - 0.5).abs() - 1.0,
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Noise => rng.f32() * 2.0 - 1.0,
    }
}

/// RBJ biquad, direct form I.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Designs a filter for `sample_rate`.
    #[must_use]
    pub fn new(spec: &FilterSpec, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let cutoff = spec.cutoff.clamp(10.0, nyquist * 0.99);
        let w0 = TAU * cutoff / sample_rate as f32;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * spec.q.max(0.05));

        let (b0, b1, b2) = match spec.kind {
            FilterKind::LowPass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            FilterKind::HighPass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
            FilterKind::BandPass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Filters one sample.
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// One oscillator with its running phase.
#[derive(Debug, Clone)]
struct Oscillator {
    spec: OscSpec,
    phase: f32,
}

impl Oscillator {
    fn frequency_at(&self, t: f32, duration: f32) -> f32 {
        match self.spec.sweep_to {
            Some(end) if duration > 0.0 && self.spec.frequency > 0.0 && end > 0.0 => {
                let progress = (t / duration).min(1.0);
                self.spec.frequency * (end / self.spec.frequency).powf(progress)
            }
            _ => self.spec.frequency,
        }
    }
}

/// A finished-by-itself sound.
pub struct Voice {
    oscillators: Vec<Oscillator>,
    filter: Option<Biquad>,
    envelope: crate::audio::Envelope,
    gain: f32,
    duration: f32,
    position: u32,
    total: u32,
    sample_rate: u32,
    rng: fastrand::Rng,
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("position", &self.position)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl Voice {
    /// Prepares a voice for `sound`.
    #[must_use]
    pub fn new(sound: &SoundSpec, sample_rate: u32, seed: u64) -> Self {
        let duration = sound.duration();
        let oscillators = sound
            .oscillators
            .iter()
            .map(|spec| Oscillator {
                spec: *spec,
                phase: 0.0,
            })
            .collect::<Vec<_>>();
        // Keep the summed level in range however many oscillators there are.
        let total_gain: f32 = sound.oscillators.iter().map(|o| o.gain).sum();
        let gain = sound.gain / total_gain.max(1.0);

        Self {
            oscillators,
            filter: sound.filter.as_ref().map(|f| Biquad::new(f, sample_rate)),
            envelope: sound.envelope,
            gain,
            duration,
            position: 0,
            total: (duration * sample_rate as f32).ceil() as u32,
            sample_rate,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Samples left to render.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.position)
    }
}

impl Iterator for Voice {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.total {
            return None;
        }
        let sr = self.sample_rate as f32;
        let t = self.position as f32 / sr;

        let mut mix = 0.0;
        for osc in &mut self.oscillators {
            mix += waveform_sample(osc.spec.waveform, osc.phase, &mut self.rng) * osc.spec.gain;
            let frequency = osc.frequency_at(t, self.duration);
            osc.phase = (osc.phase + frequency / sr).fract();
        }
        if let Some(filter) = &mut self.filter {
            mix = filter.process(mix);
        }

        self.position += 1;
        Some(mix * self.envelope.amplitude(t) * self.gain)
    }
}

impl Source for Voice {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(self.duration))
    }
}

/// Shared drone targets written by the game thread.
pub type SharedDroneParams = Arc<Mutex<DroneParams>>;

/// Endless drone: a root and a fifth, pulsed by an LFO, with optional
/// soft-clip distortion.
pub struct DroneSource {
    targets: SharedDroneParams,
    frequency: SmoothedParam,
    pulse_rate: SmoothedParam,
    pulse_depth: SmoothedParam,
    gain: SmoothedParam,
    distortion: SmoothedParam,
    root_phase: f32,
    fifth_phase: f32,
    lfo_phase: f32,
    counter: u32,
    sample_rate: u32,
}

impl std::fmt::Debug for DroneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DroneSource")
            .field("frequency", &self.frequency.value())
            .field("gain", &self.gain.value())
            .finish_non_exhaustive()
    }
}

impl DroneSource {
    /// Starts at the current targets.
    #[must_use]
    pub fn new(targets: SharedDroneParams, smoothing: f32, sample_rate: u32) -> Self {
        let start = *targets.lock();
        Self {
            targets,
            frequency: SmoothedParam::new(start.frequency, smoothing),
            pulse_rate: SmoothedParam::new(start.pulse_rate, smoothing),
            pulse_depth: SmoothedParam::new(start.pulse_depth, smoothing),
            gain: SmoothedParam::new(start.gain, smoothing),
            distortion: SmoothedParam::new(start.distortion, smoothing),
            root_phase: 0.0,
            fifth_phase: 0.0,
            lfo_phase: 0.0,
            counter: 0,
            sample_rate,
        }
    }

    /// Smoothed parameters currently in use.
    #[must_use]
    pub fn current(&self) -> DroneParams {
        DroneParams {
            frequency: self.frequency.value(),
            pulse_rate: self.pulse_rate.value(),
            pulse_depth: self.pulse_depth.value(),
            gain: self.gain.value(),
            distortion: self.distortion.value(),
        }
    }

    fn update_block(&mut self) {
        let target = *self.targets.lock();
        let dt = DRONE_BLOCK as f32 / self.sample_rate as f32;
        for (param, value) in [
            (&mut self.frequency, target.frequency),
            (&mut self.pulse_rate, target.pulse_rate),
            (&mut self.pulse_depth, target.pulse_depth),
            (&mut self.gain, target.gain),
            (&mut self.distortion, target.distortion),
        ] {
            param.set_target(value);
            param.step(dt);
        }
    }
}

impl Iterator for DroneSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.counter % DRONE_BLOCK == 0 {
            self.update_block();
        }
        self.counter = self.counter.wrapping_add(1);

        let sr = self.sample_rate as f32;
        let frequency = self.frequency.value();
        let tone = (TAU * self.root_phase).sin() + 0.5 * (TAU * self.fifth_phase).sin();
        self.root_phase = (self.root_phase + frequency / sr).fract();
        self.fifth_phase = (self.fifth_phase + frequency * 1.5 / sr).fract();

        let depth = self.pulse_depth.value();
        let lfo = 1.0 - depth * (0.5 + 0.5 * (TAU * self.lfo_phase).sin());
        self.lfo_phase = (self.lfo_phase + self.pulse_rate.value() / sr).fract();

        let dry = tone * lfo / 1.5;
        let wet = (dry * 4.0).tanh();
        let mix = self.distortion.value().clamp(0.0, 1.0);
        Some((dry * (1.0 - mix) + wet * mix) * self.gain.value())
    }
}

impl Source for DroneSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{merge_chord, move_blip, Envelope};
    use reentry_gameplay::Direction;

    #[test]
    fn test_voice_ends_with_envelope() {
        let sound = move_blip(Direction::Up);
        let voice = Voice::new(&sound, SAMPLE_RATE, 1);
        let expected = (sound.duration() * SAMPLE_RATE as f32).ceil() as usize;
        assert_eq!(voice.count(), expected);
    }

    #[test]
    fn test_voice_stays_in_range() {
        let voice = Voice::new(&merge_chord(2048), SAMPLE_RATE, 7);
        assert!(voice.into_iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn test_noise_voice_is_seeded() {
        let sound = SoundSpec {
            name: "noise",
            oscillators: vec![OscSpec::new(Waveform::Noise, 0.0, 1.0)],
            filter: None,
            envelope: Envelope::new(0.0, 0.01),
            gain: 1.0,
        };
        let a: Vec<f32> = Voice::new(&sound, SAMPLE_RATE, 3).collect();
        let b: Vec<f32> = Voice::new(&sound, SAMPLE_RATE, 3).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_low_pass_attenuates_high_tone() {
        let mut filter = Biquad::new(&FilterSpec::low_pass(200.0), SAMPLE_RATE);
        let mut peak: f32 = 0.0;
        for i in 0..SAMPLE_RATE {
            let x = (TAU * 8000.0 * i as f32 / SAMPLE_RATE as f32).sin();
            let y = filter.process(x);
            if i > SAMPLE_RATE / 2 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.01);
    }

    #[test]
    fn test_drone_glides_to_targets() {
        let shared: SharedDroneParams = Arc::new(Mutex::new(DroneParams::CALM));
        let mut drone = DroneSource::new(Arc::clone(&shared), 0.05, SAMPLE_RATE);
        *shared.lock() = DroneParams {
            frequency: 110.0,
            ..DroneParams::CALM
        };

        let first = drone.next().map(|_| drone.current().frequency);
        assert!(first.is_some_and(|f| f > 55.0 && f < 110.0));

        for _ in 0..SAMPLE_RATE {
            drone.next();
        }
        assert!((drone.current().frequency - 110.0).abs() < 0.01);
    }

    #[test]
    fn test_drone_is_endless() {
        let shared: SharedDroneParams = Arc::new(Mutex::new(DroneParams::CALM));
        let drone = DroneSource::new(shared, 0.5, SAMPLE_RATE);
        assert_eq!(drone.total_duration(), None);
        assert_eq!(drone.take(10_000).count(), 10_000);
    }
}
