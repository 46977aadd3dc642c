//! Audio analysis sources.
//!
//! The visualizer only needs a byte frequency snapshot per frame. Live mode
//! captures system output with cpal (auto-selecting a PulseAudio/PipeWire
//! monitor like CAVA does) and runs it through spectrum-analyzer; demo mode
//! and tests use [`SyntheticSource`].

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Frequency-domain audio provider polled once per frame.
pub trait AudioSource {
    /// Byte magnitudes for the lowest `max_bins` frequency bins.
    fn frequency_data(&mut self, max_bins: usize) -> Vec<u8>;

    /// True when the source cannot currently deliver audio.
    fn is_suspended(&self) -> bool;

    /// Playback gain applied before analysis (fades and volume).
    fn set_gain(&mut self, _gain: f32) {}
}

/// Lifecycle signal from an audio source.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioStatus {
    Loaded,
    LoadError { code: i32, message: String },
}

impl AudioStatus {
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => AudioStatus::Loaded,
            Err(e) => AudioStatus::LoadError { code: e.code(), message: e.to_string() },
        }
    }
}

mod constants {
    /// Ring buffer length; covers the largest FFT (1024 bins).
    pub const BUFFER_SIZE: usize = 2048;
    /// Decibel window mapped onto 0..=255.
    pub const MIN_DECIBELS: f32 = -100.0;
    pub const MAX_DECIBELS: f32 = -30.0;
    /// Weight of the previous frame in the magnitude smoothing.
    pub const SMOOTHING: f32 = 0.8;
}

use constants::*;

/// Converts time-domain samples into smoothed byte frequency data.
#[derive(Debug, Clone, Default)]
pub struct ByteAnalyser {
    smoothed: Vec<f32>,
}

impl ByteAnalyser {
    /// Analyse the newest `2 * max_bins` samples.
    ///
    /// `max_bins` must be a power of two.
    pub fn analyse(&mut self, samples: &[f32], sample_rate: u32, max_bins: usize) -> Vec<u8> {
        let fft_size = max_bins * 2;
        if max_bins == 0 || samples.len() < fft_size || !fft_size.is_power_of_two() {
            return vec![0; max_bins];
        }
        let window = hann_window(&samples[samples.len() - fft_size..]);
        let spectrum = match samples_fft_to_spectrum(
            &window,
            sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(s) => s,
            Err(e) => {
                debug!("spectrum analysis failed: {:?}", e);
                return vec![0; max_bins];
            }
        };

        if self.smoothed.len() != max_bins {
            self.smoothed = vec![0.0; max_bins];
        }

        let data = spectrum.data();
        for (i, slot) in self.smoothed.iter_mut().enumerate() {
            let magnitude = data.get(i).map(|(_, v)| v.val()).unwrap_or(0.0);
            *slot = SMOOTHING * *slot + (1.0 - SMOOTHING) * magnitude;
        }

        self.smoothed.iter().map(|&m| magnitude_to_byte(m)).collect()
    }
}

/// Map a linear magnitude onto the byte scale.
pub fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 / (MAX_DECIBELS - MIN_DECIBELS) * (db - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

/// Mono ring buffer shared with the capture callback.
struct MonoBuffer {
    samples: Vec<f32>,
    write_pos: usize,
}

impl MonoBuffer {
    fn new() -> Self {
        Self {
            samples: vec![0.0; BUFFER_SIZE],
            write_pos: 0,
        }
    }

    /// Push interleaved frames, averaging channels down to mono.
    fn push_interleaved(&mut self, data: &[f32], channels: usize) {
        for frame in data.chunks(channels.max(1)) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            self.samples[self.write_pos] = mono;
            self.write_pos = (self.write_pos + 1) % BUFFER_SIZE;
        }
    }

    /// Copy oldest-to-newest into `out`.
    fn copy_samples(&self, out: &mut [f32]) {
        for (i, slot) in out.iter_mut().enumerate().take(BUFFER_SIZE) {
            *slot = self.samples[(self.write_pos + i) % BUFFER_SIZE];
        }
    }
}

/// RAII guard silencing stderr while ALSA enumerates devices.
struct StderrSuppressor {
    saved_fd: i32,
    _dev_null: File,
}

impl StderrSuppressor {
    fn new() -> Option<Self> {
        let dev_null = File::open("/dev/null").ok()?;

        let saved_fd = unsafe { libc::dup(2) };
        if saved_fd < 0 {
            return None;
        }

        if unsafe { libc::dup2(dev_null.as_raw_fd(), 2) } < 0 {
            unsafe {
                libc::close(saved_fd);
            }
            return None;
        }

        Some(Self { saved_fd, _dev_null: dev_null })
    }
}

impl Drop for StderrSuppressor {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved_fd, 2);
            libc::close(self.saved_fd);
        }
    }
}

/// PulseAudio source names: alphanumerics plus `. - _ : @`.
fn is_valid_source_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '@'))
}

fn pactl(args: &[&str]) -> Option<String> {
    std::process::Command::new("pactl")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

/// Point the default input at the monitor of the default sink.
///
/// Returns the previous default source when a monitor was selected.
fn select_monitor_source() -> Option<String> {
    let original = pactl(&["get-default-source"]).filter(|s| is_valid_source_name(s))?;
    let sink = pactl(&["get-default-sink"]).filter(|s| is_valid_source_name(s));
    let sources = pactl(&["list", "sources", "short"])?;

    let names: Vec<&str> = sources
        .lines()
        .filter_map(|line| line.split('\t').nth(1))
        .filter(|name| is_valid_source_name(name))
        .collect();

    let wanted = sink.map(|s| format!("{}.monitor", s));
    let monitor = names
        .iter()
        .find(|n| Some(n.to_string()) == wanted)
        .or_else(|| names.iter().find(|n| n.contains(".monitor")))
        .copied()?;

    pactl(&["set-default-source", monitor])?;
    debug!(monitor = %monitor, original = %original, "selected monitor source");
    Some(original)
}

/// Restores the original default source on drop.
struct MonitorSourceGuard {
    original: Option<String>,
}

impl Drop for MonitorSourceGuard {
    fn drop(&mut self) {
        if let Some(ref orig) = self.original {
            let _ = pactl(&["set-default-source", orig]);
        }
    }
}

/// Live system-audio capture.
pub struct CaptureSource {
    _stream: cpal::Stream,
    _monitor: MonitorSourceGuard,
    buffer: Arc<Mutex<MonoBuffer>>,
    suspended: Arc<AtomicBool>,
    scratch: Vec<f32>,
    sample_rate: u32,
    analyser: ByteAnalyser,
    gain: f32,
}

impl CaptureSource {
    pub fn open() -> Result<Self> {
        let stderr_guard = StderrSuppressor::new();
        let monitor = MonitorSourceGuard { original: select_monitor_source() };

        let host = cpal::default_host();
        debug!(host = ?host.id(), "audio host");
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::AudioDevice("no audio input device found".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| Error::AudioDevice(format!("no supported config: {}", e)))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        if channels == 0 {
            return Err(Error::AudioDevice("device reported 0 channels".into()));
        }

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(Mutex::new(MonoBuffer::new()));
        let writer = Arc::clone(&buffer);
        let suspended = Arc::new(AtomicBool::new(false));
        let suspended_flag = Arc::clone(&suspended);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = writer.lock() {
                        buf.push_interleaved(data, channels as usize);
                    }
                },
                move |err| {
                    warn!("audio stream error: {}", err);
                    suspended_flag.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::AudioStream(e.to_string()))?;

        stream.play().map_err(|e| Error::AudioStream(e.to_string()))?;
        drop(stderr_guard);

        info!(device = %device_name, sample_rate, channels, "audio capture started");

        Ok(Self {
            _stream: stream,
            _monitor: monitor,
            buffer,
            suspended,
            scratch: vec![0.0; BUFFER_SIZE],
            sample_rate,
            analyser: ByteAnalyser::default(),
            gain: 1.0,
        })
    }
}

impl AudioSource for CaptureSource {
    fn frequency_data(&mut self, max_bins: usize) -> Vec<u8> {
        match self.buffer.lock() {
            Ok(buf) => buf.copy_samples(&mut self.scratch),
            Err(_) => self.scratch.fill(0.0),
        }
        let gain = self.gain;
        for s in &mut self.scratch {
            *s *= gain;
        }
        self.analyser.analyse(&self.scratch, self.sample_rate, max_bins)
    }

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }
}

/// Seeded fake spectrum with a steady beat, for the demo and tests.
pub struct SyntheticSource {
    rng: StdRng,
    frame: u64,
    beat_period: u64,
    gain: f32,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            frame: 0,
            beat_period: 30,
            gain: 1.0,
        }
    }
}

impl AudioSource for SyntheticSource {
    fn frequency_data(&mut self, max_bins: usize) -> Vec<u8> {
        self.frame += 1;
        let on_beat = self.frame % self.beat_period < 5;
        let pulse = if on_beat { 1.0 } else { 0.55 };
        let falloff = (max_bins as f32 * 0.3).max(1.0);

        (0..max_bins)
            .map(|i| {
                let envelope = 230.0 * (-(i as f32) / falloff).exp();
                let jitter: f32 = self.rng.gen_range(0.8..1.0);
                (envelope * pulse * jitter * self.gain).clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    fn is_suspended(&self) -> bool {
        false
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }
}
