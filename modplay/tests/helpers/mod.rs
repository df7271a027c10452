//! Shared helpers for modplay integration tests
//!
//! - `ScriptedSource`: deterministic Module Source with loop / end / speed
//!   zero at fixed frame positions
//! - WAV inspection through hound plus raw header fields
//! - Writers that fail on demand

#![allow(dead_code)]

use modplay::error::Result;
use modplay::{PipelineBuilder, Sink, SinkReport};
use modplay_common::{ChannelLayout, ModuleEvent, ModuleSource, RenderRequest};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

/// Module Source whose output depends only on the frame position and the
/// requested volume.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    loop_every: Option<usize>,
    end_after: Option<usize>,
    speed_zero_at: Option<usize>,
    position: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a loop event every `frames` frames.
    pub fn loop_every(mut self, frames: usize) -> Self {
        self.loop_every = Some(frames);
        self
    }

    /// Stop producing after `frames` frames.
    pub fn end_after(mut self, frames: usize) -> Self {
        self.end_after = Some(frames);
        self
    }

    /// Raise speed zero after `frames` frames and stop producing.
    pub fn speed_zero_at(mut self, frames: usize) -> Self {
        self.speed_zero_at = Some(frames);
        self
    }

    pub fn boxed(self) -> Box<dyn ModuleSource> {
        Box::new(self)
    }
}

/// Unscaled sample of `channel` at frame `position`.
pub fn scripted_sample(position: usize, channel: usize) -> f32 {
    let level = ((position * 37) % 2000) as f32 - 1000.0;
    if channel == 0 {
        level
    } else {
        -level
    }
}

impl ModuleSource for ScriptedSource {
    fn mixed_channels(&self) -> usize {
        4
    }

    fn render(
        &mut self,
        request: &RenderRequest,
        out: &mut [i16],
        events: &mut dyn FnMut(ModuleEvent),
    ) -> usize {
        let channels = request.layout.count();
        let mut produced = 0;

        while produced < request.frame_count {
            if self.end_after == Some(self.position) || self.speed_zero_at == Some(self.position) {
                break;
            }
            for channel in 0..channels {
                let value = scripted_sample(self.position, channel) * request.volume;
                out[produced * channels + channel] = value.round() as i16;
            }
            produced += 1;
            self.position += 1;

            if let Some(every) = self.loop_every {
                if self.position % every == 0 {
                    events(ModuleEvent::Loop);
                }
            }
            if self.speed_zero_at == Some(self.position) {
                events(ModuleEvent::SpeedZero);
            }
        }
        produced
    }
}

pub fn pipeline(source: ScriptedSource, layout: ChannelLayout) -> PipelineBuilder {
    PipelineBuilder::new(source.boxed(), layout)
}

/// Drive a sink to completion without a transport controller.
pub fn drain<S: Sink>(sink: &mut S, builder: PipelineBuilder) -> Result<SinkReport> {
    sink.start(builder)?;
    while sink.is_active() {
        sink.poll()?;
    }
    sink.stop()
}

/// RIFF size and data size fields of a WAV file image.
pub fn header_sizes(bytes: &[u8]) -> (u32, u32) {
    let riff = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let data = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
    (riff, data)
}

/// Samples following the 44-byte header.
pub fn pcm_samples(bytes: &[u8]) -> Vec<i16> {
    bytes[44..]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Read a WAV file back with hound.
pub fn read_wav(path: &Path) -> (hound::WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::open(path).expect("Failed to open WAV");
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .expect("Failed to read samples");
    (spec, samples)
}

/// In-memory writer that fails once more than `limit` bytes are written.
pub struct FailingWriter {
    inner: Cursor<Vec<u8>>,
    limit: usize,
}

impl FailingWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Cursor::new(Vec::new()),
            limit,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.inner.get_ref()
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Accept what fits below the limit, then fail.
        let room = self.limit.saturating_sub(self.inner.position() as usize);
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.inner.write(&buf[..buf.len().min(room)])
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FailingWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
