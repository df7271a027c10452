//! Live audio output using cpal
//!
//! The render pipeline is moved into the backend's data callback, which
//! feeds it through a preallocated scratch buffer. The controller thread only
//! reads the atomics in `FeedStatus`; the callback takes no locks and does
//! not log.

use super::{Sink, SinkReport};
use crate::error::{Error, Result};
use crate::playback::{PipelineBuilder, RenderPipeline};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the controller checks on the stream.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Frames rendered per pipeline call inside the callback. Larger device
/// buffers are filled in several calls.
pub const SCRATCH_FRAMES: usize = 4096;

/// Progress flags shared between the callback and the controller.
#[derive(Debug, Default)]
pub struct FeedStatus {
    finished: AtomicBool,
    drained: AtomicBool,
    error: AtomicBool,
    frames: AtomicU64,
}

impl FeedStatus {
    /// The pipeline delivered its final block.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// The device asked for more audio after the final block.
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }

    /// The backend reported a stream error.
    pub fn has_error(&self) -> bool {
        self.error.load(Ordering::Acquire)
    }

    /// Frames produced by the Module Source so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn set_error(&self) {
        self.error.store(true, Ordering::Release);
    }
}

/// Callback-side state: the pipeline plus its scratch buffer.
pub struct DeviceFeed {
    pipeline: RenderPipeline,
    scratch: Vec<i16>,
    device_channels: usize,
    status: Arc<FeedStatus>,
}

impl DeviceFeed {
    /// # Arguments
    /// - `pipeline`: built at the device sample rate
    /// - `device_channels`: interleaved channels of the device buffer
    /// - `max_frames`: largest block rendered per pipeline call
    pub fn new(
        pipeline: RenderPipeline,
        device_channels: usize,
        max_frames: usize,
        status: Arc<FeedStatus>,
    ) -> Self {
        let scratch = vec![0; max_frames.max(1) * pipeline.layout().count()];
        Self {
            pipeline,
            scratch,
            device_channels: device_channels.max(1),
            status,
        }
    }

    pub fn status(&self) -> Arc<FeedStatus> {
        Arc::clone(&self.status)
    }

    /// Fill one device buffer.
    ///
    /// After the block that finishes the pipeline, the next call outputs
    /// silence and marks the feed drained.
    pub fn fill<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<i16>,
    {
        if self.status.is_finished() {
            data.fill(T::EQUILIBRIUM);
            self.status.drained.store(true, Ordering::Release);
            return;
        }

        let channels = self.pipeline.layout().count();
        let max_frames = self.scratch.len() / channels;
        for chunk in data.chunks_mut(max_frames * self.device_channels) {
            let frames = chunk.len() / self.device_channels;
            let block = &mut self.scratch[..frames * channels];

            let result = self.pipeline.render_block(block);
            self.status
                .frames
                .fetch_add(result.frames_produced as u64, Ordering::Relaxed);
            if result.is_finished {
                self.status.finished.store(true, Ordering::Release);
            }

            for (frame, samples) in chunk
                .chunks_exact_mut(self.device_channels)
                .zip(block.chunks_exact(channels))
            {
                for (index, slot) in frame.iter_mut().enumerate() {
                    *slot = T::from_sample(route(samples, index, self.device_channels));
                }
            }
        }
    }
}

/// Sample for device channel `index` from one rendered frame.
///
/// Mono is copied to every device channel; stereo is averaged onto a mono
/// device and leaves extra device channels silent.
fn route(frame: &[i16], index: usize, device_channels: usize) -> i16 {
    match frame {
        [mono] => *mono,
        [left, right] if device_channels == 1 => ((*left as i32 + *right as i32) / 2) as i16,
        _ => frame.get(index).copied().unwrap_or(0),
    }
}

/// Live playback on an output device.
pub struct LiveDevice {
    requested_device: Option<String>,
    stream: Option<Stream>,
    status: Arc<FeedStatus>,
    sample_rate: u32,
    channels: u16,
    poll_interval: Duration,
}

impl LiveDevice {
    /// Sink for the named device, or the default device when `None`.
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            requested_device: device_name,
            stream: None,
            status: Arc::new(FeedStatus::default()),
            sample_rate: 0,
            channels: 0,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Names of the available output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Requested device, falling back to the default device.
    fn open_device(&self) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = self.requested_device.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                info!("Using audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    pub fn status(&self) -> Arc<FeedStatus> {
        Arc::clone(&self.status)
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut feed: DeviceFeed,
    status: Arc<FeedStatus>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<i16>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| feed.fill(data),
            move |err| {
                error!("Audio stream error: {}", err);
                status.set_error();
            },
            None,
        )
        .map_err(|e| Error::Device(format!("Failed to build stream: {}", e)))
}

impl Sink for LiveDevice {
    fn start(&mut self, pipeline: PipelineBuilder) -> Result<()> {
        let device = self.open_device()?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::Device(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config = supported.config();

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        self.status = Arc::new(FeedStatus::default());
        self.sample_rate = config.sample_rate.0;
        self.channels = pipeline.layout().count() as u16;

        let feed = DeviceFeed::new(
            pipeline.build(self.sample_rate),
            config.channels as usize,
            SCRATCH_FRAMES,
            Arc::clone(&self.status),
        );
        let status = Arc::clone(&self.status);

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, feed, status)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, feed, status)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &config, feed, status)?,
            sample_format => {
                return Err(Error::Device(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);

        info!("Audio stream started at {} Hz", self.sample_rate);
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        if self.status.has_error() {
            return Err(Error::Device("stream error reported by the audio backend".to_string()));
        }
        std::thread::sleep(self.poll_interval);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.stream.is_some() && !self.status.is_drained() && !self.status.has_error()
    }

    fn stop(&mut self) -> Result<SinkReport> {
        if let Some(stream) = self.stream.take() {
            debug!("Stopping audio stream");
            if let Err(e) = stream.pause() {
                warn!("Failed to pause stream: {}", e);
            }
            // Drops the callback, its pipeline and the Module Source
            drop(stream);
        }

        Ok(SinkReport {
            frames: self.status.frames(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            data_bytes: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_matching_layouts() {
        assert_eq!(route(&[10, 20], 0, 2), 10);
        assert_eq!(route(&[10, 20], 1, 2), 20);
        assert_eq!(route(&[10], 0, 1), 10);
    }

    #[test]
    fn test_route_mono_to_stereo_device() {
        assert_eq!(route(&[-300], 0, 2), -300);
        assert_eq!(route(&[-300], 1, 2), -300);
    }

    #[test]
    fn test_route_stereo_to_mono_device() {
        assert_eq!(route(&[100, 300], 0, 1), 200);
        assert_eq!(route(&[i16::MAX, i16::MAX], 0, 1), i16::MAX);
    }

    #[test]
    fn test_route_surround_device() {
        assert_eq!(route(&[1, 2], 2, 6), 0);
        assert_eq!(route(&[1, 2], 5, 6), 0);
    }
}
