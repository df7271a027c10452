//! Canonical 44-byte PCM WAV header

use std::io::{self, Write};

/// Size of the header preceding the sample data.
pub const HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;

/// Header of a 16-bit PCM WAV file with a single `data` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    /// Bytes of sample data following the header.
    pub data_size: u32,
}

impl WavHeader {
    pub fn new(channels: u16, sample_rate: u32, data_size: u32) -> Self {
        Self {
            channels,
            sample_rate,
            data_size,
        }
    }

    /// Bytes per frame.
    pub fn block_align(&self) -> u16 {
        self.channels * BITS_PER_SAMPLE / 8
    }

    /// Bytes per second of audio.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// RIFF chunk size: everything after the first 8 bytes.
    pub fn riff_size(&self) -> u32 {
        self.data_size.saturating_add(36)
    }

    /// Serialize the header, little endian.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];

        // RIFF header
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.riff_size().to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");

        // fmt chunk
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes()); // Chunk size (16 for PCM)
        header[20..22].copy_from_slice(&1u16.to_le_bytes()); // Audio format (1 = PCM)
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

        // data chunk
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_size.to_le_bytes());

        header
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}
