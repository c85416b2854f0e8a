//! Rodio output for the procedural audio engine.
//!
//! ```text
//!  AudioEngine ──► RodioSink ──► drone Sink ◄── DroneSource (reads SharedDroneParams)
//!                      │
//!                      └──────► play_raw(Voice) per one-shot
//! ```
//!
//! The output stream lives on the thread that opened it; rodio mixes on its
//! own thread. The only state shared with that thread is the drone parameter
//! block.

use std::sync::Arc;

use parking_lot::Mutex;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::audio::{AudioConfig, AudioError, AudioResult, AudioSink, DroneParams, SoundSpec};
use crate::synth::{DroneSource, SharedDroneParams, Voice, SAMPLE_RATE};

/// Wraps rodio's output stream for audio playback.
pub struct AudioDevice {
    /// The output stream (must be kept alive).
    _stream: OutputStream,
    /// Handle for creating sinks.
    handle: OutputStreamHandle,
}

impl std::fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDevice").finish_non_exhaustive()
    }
}

impl AudioDevice {
    /// Opens the default output.
    pub fn new() -> AudioResult<Self> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        info!("Audio device initialized");

        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    /// Get a reference to the output stream handle.
    #[must_use]
    pub fn handle(&self) -> &OutputStreamHandle {
        &self.handle
    }

    /// Create a new sink for audio playback.
    pub fn create_sink(&self) -> AudioResult<Sink> {
        Sink::try_new(&self.handle).map_err(|e| AudioError::SinkCreationFailed(e.to_string()))
    }
}

/// [`AudioSink`] backed by the default rodio output.
pub struct RodioSink {
    device: AudioDevice,
    drone: Sink,
    drone_params: SharedDroneParams,
    volume: f32,
    voice_seed: u64,
}

impl std::fmt::Debug for RodioSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioSink")
            .field("volume", &self.volume)
            .field("drone", &*self.drone_params.lock())
            .finish_non_exhaustive()
    }
}

impl RodioSink {
    /// Opens the device and starts the drone.
    pub fn open(config: &AudioConfig) -> AudioResult<Self> {
        let device = AudioDevice::new()?;
        let drone_params: SharedDroneParams = Arc::new(Mutex::new(DroneParams::CALM));

        let drone = device.create_sink()?;
        drone.append(DroneSource::new(
            Arc::clone(&drone_params),
            config.smoothing,
            SAMPLE_RATE,
        ));
        let volume = config.effective_volume();
        drone.set_volume(volume);
        drone.play();

        debug!(smoothing = config.smoothing, "Drone started");

        Ok(Self {
            device,
            drone,
            drone_params,
            volume,
            voice_seed: fastrand::u64(..),
        })
    }

    /// Boxed, for [`AudioEngine::initialize`](crate::audio::AudioEngine::initialize).
    pub fn open_boxed(config: &AudioConfig) -> AudioResult<Box<dyn AudioSink>> {
        Ok(Box::new(Self::open(config)?))
    }
}

impl AudioSink for RodioSink {
    fn set_drone_target(&mut self, params: &DroneParams) {
        *self.drone_params.lock() = *params;
    }

    fn play(&mut self, sound: &SoundSpec) {
        if self.volume <= 0.0 {
            return;
        }
        let seed = self.voice_seed;
        self.voice_seed = self.voice_seed.wrapping_add(1);
        let voice = Voice::new(sound, SAMPLE_RATE, seed).amplify(self.volume);
        if let Err(e) = self.device.handle().play_raw(voice) {
            warn!(sound = sound.name, "Failed to play sound: {e}");
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.drone.set_volume(self.volume);
    }
}
