//! WAV file rendering sink
//!
//! Writes a placeholder header, appends every produced frame as 16-bit
//! little-endian PCM, then seeks back and patches the header with the final
//! data size.
//!
//! After a failed sample write the patched `data_size` covers only the blocks
//! written in full; a partial block that reached the file is not counted.

use super::wav::{WavHeader, HEADER_LEN};
use super::{Sink, SinkReport, BLOCK_FRAMES, FILE_SAMPLE_RATE};
use crate::error::{Error, Result};
use crate::playback::{PipelineBuilder, RenderPipeline};
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Renders the pipeline into a WAV stream as fast as possible.
pub struct FileWriter<W: Write + Seek = BufWriter<File>> {
    path: PathBuf,
    opener: Option<fn(&Path) -> io::Result<W>>,
    writer: Option<W>,
    pipeline: Option<RenderPipeline>,
    block_frames: usize,
    block: Vec<i16>,
    bytes: Vec<u8>,
    channels: u16,
    frames: u64,
    data_bytes: u64,
    active: bool,
}

impl FileWriter<BufWriter<File>> {
    /// Sink that creates (or truncates) `path` on `start`.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self::with_parts(path.into(), Some(create_file), None)
    }
}

fn patch_header<W: Write + Seek>(writer: &mut W, header: &WavHeader) -> io::Result<()> {
    writer.flush()?;
    writer.seek(SeekFrom::Start(0))?;
    header.write_to(writer)?;
    writer.flush()
}

fn create_file(path: &Path) -> io::Result<BufWriter<File>> {
    File::create(path).map(BufWriter::new)
}

impl<W: Write + Seek> FileWriter<W> {
    /// Sink over an already open writer. `label` names it in diagnostics.
    pub fn from_writer(writer: W, label: impl Into<PathBuf>) -> Self {
        Self::with_parts(label.into(), None, Some(writer))
    }

    fn with_parts(path: PathBuf, opener: Option<fn(&Path) -> io::Result<W>>, writer: Option<W>) -> Self {
        Self {
            path,
            opener,
            writer,
            pipeline: None,
            block_frames: BLOCK_FRAMES,
            block: Vec::new(),
            bytes: Vec::new(),
            channels: 0,
            frames: 0,
            data_bytes: 0,
            active: false,
        }
    }

    /// Override the frames rendered per block.
    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample bytes written so far.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    /// Recover the underlying writer.
    pub fn into_inner(mut self) -> Option<W> {
        self.writer.take()
    }

    fn write_error(&self, source: io::Error) -> Error {
        Error::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn header(&self) -> WavHeader {
        let data_size = u32::try_from(self.data_bytes).unwrap_or_else(|_| {
            warn!("{} exceeds the WAV size limit, header is clamped", self.path.display());
            u32::MAX
        });
        WavHeader::new(self.channels, FILE_SAMPLE_RATE, data_size)
    }

    fn report(&self) -> SinkReport {
        SinkReport {
            frames: self.frames,
            sample_rate: FILE_SAMPLE_RATE,
            channels: self.channels,
            data_bytes: self.data_bytes,
        }
    }
}

impl<W: Write + Seek> Sink for FileWriter<W> {
    fn start(&mut self, pipeline: PipelineBuilder) -> Result<()> {
        let mut writer = match (self.writer.take(), self.opener) {
            (Some(writer), _) => writer,
            (None, Some(open)) => open(&self.path).map_err(|e| self.write_error(e))?,
            (None, None) => {
                return Err(self.write_error(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no output writer",
                )))
            }
        };

        let channels = pipeline.layout().count();
        self.channels = channels as u16;
        self.frames = 0;
        self.data_bytes = 0;

        // Placeholder until the data size is known
        let placeholder = WavHeader::new(self.channels, FILE_SAMPLE_RATE, 0);
        placeholder
            .write_to(&mut writer)
            .map_err(|e| self.write_error(e))?;
        self.writer = Some(writer);

        self.block = vec![0; self.block_frames * channels];
        self.bytes = Vec::with_capacity(self.block.len() * 2);
        self.pipeline = Some(pipeline.build(FILE_SAMPLE_RATE));
        self.active = true;

        info!(
            "Rendering to {} ({} Hz, {} channels, {} frames per block)",
            self.path.display(),
            FILE_SAMPLE_RATE,
            channels,
            self.block_frames
        );
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let (Some(pipeline), Some(writer)) = (self.pipeline.as_mut(), self.writer.as_mut()) else {
            self.active = false;
            return Ok(());
        };

        let result = pipeline.render_block(&mut self.block);
        let samples = result.frames_produced * self.channels as usize;

        self.bytes.clear();
        for sample in &self.block[..samples] {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }
        if let Err(source) = writer.write_all(&self.bytes) {
            self.active = false;
            return Err(Error::Write {
                path: self.path.clone(),
                source,
            });
        }

        self.frames += result.frames_produced as u64;
        self.data_bytes += self.bytes.len() as u64;

        if result.is_finished {
            debug!("Pipeline finished after {} frames", self.frames);
            self.active = false;
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) -> Result<SinkReport> {
        self.active = false;
        // Ends the render session
        self.pipeline = None;

        let header = self.header();
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = patch_header(writer, &header) {
                return Err(self.write_error(e));
            }
            debug!(
                "Patched header of {}: {} data bytes, {} bytes total",
                self.path.display(),
                self.data_bytes,
                self.data_bytes + HEADER_LEN as u64
            );
        }

        Ok(self.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modplay_common::{ChannelLayout, ModuleEvent, ModuleSource, RenderRequest};
    use std::io::Cursor;

    /// Produces `total` frames of a constant level, then ends.
    struct Finite {
        remaining: usize,
    }

    impl ModuleSource for Finite {
        fn mixed_channels(&self) -> usize {
            4
        }

        fn render(
            &mut self,
            request: &RenderRequest,
            out: &mut [i16],
            _events: &mut dyn FnMut(ModuleEvent),
        ) -> usize {
            let frames = request.frame_count.min(self.remaining);
            self.remaining -= frames;
            out[..frames * request.layout.count()].fill(0x0102);
            frames
        }
    }

    fn builder(total: usize, layout: ChannelLayout) -> PipelineBuilder {
        PipelineBuilder::new(Box::new(Finite { remaining: total }), layout)
    }

    #[test]
    fn test_writes_only_produced_frames() {
        let mut sink = FileWriter::from_writer(Cursor::new(Vec::new()), "memory.wav");
        sink.start(builder(700, ChannelLayout::Stereo)).unwrap();
        while sink.is_active() {
            sink.poll().unwrap();
        }
        let report = sink.stop().unwrap();

        assert_eq!(report.frames, 700);
        assert_eq!(report.data_bytes, 700 * 4);

        let bytes = sink.into_inner().unwrap().into_inner();
        assert_eq!(bytes.len(), HEADER_LEN + 700 * 4);
        assert_eq!(&bytes[40..44], &(700u32 * 4).to_le_bytes());
        assert_eq!(&bytes[44..46], &[0x02, 0x01]);
    }

    #[test]
    fn test_mono_block_size() {
        let mut sink = FileWriter::from_writer(Cursor::new(Vec::new()), "memory.wav")
            .with_block_frames(100);
        sink.start(builder(250, ChannelLayout::Mono)).unwrap();

        sink.poll().unwrap();
        assert_eq!(sink.data_bytes(), 200);
        sink.poll().unwrap();
        sink.poll().unwrap();
        assert!(!sink.is_active());

        let report = sink.stop().unwrap();
        assert_eq!(report.channels, 1);
        assert_eq!(report.data_bytes, 500);
    }

    #[test]
    fn test_stop_before_start_is_harmless() {
        let mut sink = FileWriter::from_writer(Cursor::new(Vec::new()), "memory.wav");
        let report = sink.stop().unwrap();
        assert_eq!(report.frames, 0);
    }
}
