//! MOD file parsing
//!
//! Layout: 20-byte title, 31 instrument headers of 30 bytes, song length,
//! restart byte, 128-entry order list, 4-byte signature at offset 1080,
//! pattern data (64 rows × channels × 4 bytes per pattern), then signed
//! 8-bit sample data for each instrument in order. FLT8 files store each
//! pattern as two 4-channel halves and are joined on load.

use crate::error::LoadError;
use std::path::Path;

/// Largest channel count accepted.
pub const MAX_CHANNELS: usize = 32;

/// Rows in every pattern.
pub const ROWS_PER_PATTERN: usize = 64;

const HEADER_LEN: usize = 1084;
const SIGNATURE_OFFSET: usize = 1080;
const ORDERS_OFFSET: usize = 952;
const ORDER_ENTRIES: usize = 128;
const INSTRUMENT_COUNT: usize = 31;

/// One sampled instrument.
///
/// Positions are in samples. A non-looping instrument has `loop_length == 0`
/// and `loop_start == data.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instrument {
    pub volume: u8,
    /// Index into the fine-tune table, 8 = no fine-tune.
    pub fine_tune: u8,
    pub loop_start: usize,
    pub loop_length: usize,
    pub data: Vec<i8>,
}

impl Instrument {
    pub fn is_looped(&self) -> bool {
        self.loop_length > 0
    }

    /// First sample position past the playable region.
    pub fn loop_end(&self) -> usize {
        self.loop_start + self.loop_length
    }
}

/// One decoded pattern cell.
///
/// Extended `Exy` effects are remapped to `0x10 | x` with parameter `y`, and
/// arpeggio (effect 0 with a non-zero parameter) to `0xE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Note {
    pub key: u16,
    pub instrument: u8,
    pub effect: u8,
    pub param: u8,
}

/// A parsed module.
#[derive(Debug, Clone)]
pub struct Module {
    title: String,
    channels: usize,
    song_length: usize,
    sequence: Vec<usize>,
    pattern_data: Vec<u8>,
    /// Index 0 is an empty instrument so pattern numbers index directly.
    instruments: Vec<Instrument>,
}

impl Module {
    /// Read and parse a module file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    /// Parse a module from its bytes.
    pub fn parse(data: &[u8]) -> Result<Self, LoadError> {
        if data.len() < HEADER_LEN {
            return Err(LoadError::TooShort { len: data.len() });
        }

        let signature = &data[SIGNATURE_OFFSET..HEADER_LEN];
        let channels = detect_channels(signature).ok_or(LoadError::UnknownFormat)?;
        // Startrekker 8-channel modules store each pattern as two 4-channel
        // halves and number their orders in halves.
        let split_patterns = signature == b"FLT8";

        let song_length = (data[950] & 0x7F) as usize;
        if song_length == 0 {
            return Err(LoadError::EmptySong);
        }

        let sequence: Vec<usize> = data[ORDERS_OFFSET..ORDERS_OFFSET + ORDER_ENTRIES]
            .iter()
            .map(|&entry| {
                let entry = (entry & 0x7F) as usize;
                if split_patterns {
                    entry / 2
                } else {
                    entry
                }
            })
            .collect();
        let num_patterns = sequence.iter().copied().max().unwrap_or(0) + 1;

        let pattern_end = HEADER_LEN + num_patterns * ROWS_PER_PATTERN * channels * 4;
        if data.len() < pattern_end {
            return Err(LoadError::Truncated {
                expected: pattern_end,
                found: data.len(),
            });
        }
        let pattern_data = if split_patterns {
            join_pattern_halves(&data[HEADER_LEN..pattern_end], num_patterns)
        } else {
            data[HEADER_LEN..pattern_end].to_vec()
        };

        let mut instruments = Vec::with_capacity(INSTRUMENT_COUNT + 1);
        instruments.push(Instrument::default());
        let mut sample_offset = pattern_end;
        for index in 0..INSTRUMENT_COUNT {
            let header = &data[20 + index * 30..20 + (index + 1) * 30];
            let instrument = parse_instrument(header, data, sample_offset);
            sample_offset += word_length(header, 22);
            instruments.push(instrument);
        }

        let title = String::from_utf8_lossy(&data[..20])
            .trim_end_matches('\0')
            .trim()
            .to_string();

        Ok(Self {
            title,
            channels,
            song_length,
            sequence,
            pattern_data,
            instruments,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of entries in the order list that are played.
    pub fn song_length(&self) -> usize {
        self.song_length
    }

    /// Pattern number played at order `position`.
    pub fn pattern_at(&self, position: usize) -> usize {
        self.sequence[position % ORDER_ENTRIES]
    }

    /// Instrument by pattern number (1..=31); 0 and out-of-range give the
    /// empty instrument.
    pub fn instrument(&self, index: usize) -> &Instrument {
        self.instruments.get(index).unwrap_or(&self.instruments[0])
    }

    /// Decode the cell at `pattern`, `row`, `channel`.
    pub fn note(&self, pattern: usize, row: usize, channel: usize) -> Note {
        let offset = ((pattern * ROWS_PER_PATTERN + row) * self.channels + channel) * 4;
        let cell = &self.pattern_data[offset..offset + 4];

        let key = (((cell[0] & 0x0F) as u16) << 8) | cell[1] as u16;
        let instrument = (cell[2] >> 4) | (cell[0] & 0x10);
        let mut effect = cell[2] & 0x0F;
        let mut param = cell[3];
        if effect == 0x0E {
            effect = 0x10 | (param >> 4);
            param &= 0x0F;
        }
        if effect == 0 && param > 0 {
            effect = 0x0E;
        }

        Note {
            key,
            instrument,
            effect,
            param,
        }
    }
}

/// Channel count from the 4-byte signature at offset 1080.
fn detect_channels(signature: &[u8]) -> Option<usize> {
    let channels = match signature {
        b"M.K." | b"M!K!" | b"M&K!" | b"N.T." | b"FLT4" => 4,
        b"FLT8" | b"OCTA" | b"CD81" => 8,
        [d, b'C', b'H', b'N'] if d.is_ascii_digit() => (d - b'0') as usize,
        [d1, d2, b'C', b'H'] if d1.is_ascii_digit() && d2.is_ascii_digit() => {
            ((d1 - b'0') * 10 + (d2 - b'0')) as usize
        }
        _ => return None,
    };
    (1..=MAX_CHANNELS).contains(&channels).then_some(channels)
}

/// Interleave FLT8 pattern halves (channels 0-3, then 4-7) into 8-channel rows.
fn join_pattern_halves(data: &[u8], num_patterns: usize) -> Vec<u8> {
    const HALF_ROW: usize = 4 * 4;
    const HALF_PATTERN: usize = ROWS_PER_PATTERN * HALF_ROW;

    let mut joined = Vec::with_capacity(data.len());
    for pattern in 0..num_patterns {
        let left = &data[2 * pattern * HALF_PATTERN..(2 * pattern + 1) * HALF_PATTERN];
        let right = &data[(2 * pattern + 1) * HALF_PATTERN..(2 * pattern + 2) * HALF_PATTERN];
        for row in 0..ROWS_PER_PATTERN {
            joined.extend_from_slice(&left[row * HALF_ROW..(row + 1) * HALF_ROW]);
            joined.extend_from_slice(&right[row * HALF_ROW..(row + 1) * HALF_ROW]);
        }
    }
    joined
}

/// Big-endian word at `offset`, doubled (lengths are stored in words).
fn word_length(header: &[u8], offset: usize) -> usize {
    u16::from_be_bytes([header[offset], header[offset + 1]]) as usize * 2
}

fn parse_instrument(header: &[u8], data: &[u8], sample_offset: usize) -> Instrument {
    let declared_length = word_length(header, 22);
    let fine_tune = header[24] & 0x0F;
    let fine_tune = ((fine_tune & 0x7) as i8 - (fine_tune & 0x8) as i8 + 8) as u8;
    let volume = (header[25] & 0x7F).min(64);
    let mut loop_start = word_length(header, 26);
    let mut loop_length = word_length(header, 28);

    // Truncated files keep whatever sample data is present.
    let available = data.len().saturating_sub(sample_offset);
    let length = declared_length.min(available);
    let samples: Vec<i8> = data[sample_offset.min(data.len())..]
        .iter()
        .take(length)
        .map(|&b| b as i8)
        .collect();

    if loop_start + loop_length > length {
        // Some trackers store the loop start in bytes rather than words.
        if loop_start / 2 + loop_length <= length {
            loop_start /= 2;
        } else {
            loop_length = length.saturating_sub(loop_start);
        }
    }
    if loop_length < 4 {
        loop_start = length;
        loop_length = 0;
    }

    Instrument {
        volume,
        fine_tune,
        loop_start,
        loop_length,
        data: samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_channels() {
        assert_eq!(detect_channels(b"M.K."), Some(4));
        assert_eq!(detect_channels(b"FLT4"), Some(4));
        assert_eq!(detect_channels(b"6CHN"), Some(6));
        assert_eq!(detect_channels(b"FLT8"), Some(8));
        assert_eq!(detect_channels(b"OCTA"), Some(8));
        assert_eq!(detect_channels(b"CD81"), Some(8));
        assert_eq!(detect_channels(b"16CH"), Some(16));
        assert_eq!(detect_channels(b"0CHN"), None);
        assert_eq!(detect_channels(b"64CH"), None);
        assert_eq!(detect_channels(b"IMPM"), None);
    }

    #[test]
    fn test_flt8_joins_pattern_halves() {
        let half_pattern = ROWS_PER_PATTERN * 4 * 4;
        let mut data = vec![0u8; HEADER_LEN];
        data[950] = 2;
        data[ORDERS_OFFSET] = 0;
        data[ORDERS_OFFSET + 1] = 2;
        data[SIGNATURE_OFFSET..HEADER_LEN].copy_from_slice(b"FLT8");

        // Four stored halves make two 8-channel patterns.
        let mut halves = vec![0u8; 4 * half_pattern];
        // Half 1, row 3, channel 2: C-2 with instrument 1.
        let cell = half_pattern + (3 * 4 + 2) * 4;
        halves[cell..cell + 4].copy_from_slice(&[0x01, 0xAC, 0x10, 0x00]);
        // Half 2, row 0, channel 0: speed 6.
        let cell = 2 * half_pattern;
        halves[cell..cell + 4].copy_from_slice(&[0x00, 0x00, 0x0F, 0x06]);
        data.extend_from_slice(&halves);

        let module = Module::parse(&data).expect("FLT8 module should parse");
        assert_eq!(module.channels(), 8);
        assert_eq!(module.pattern_at(0), 0);
        assert_eq!(module.pattern_at(1), 1);

        let note = module.note(0, 3, 6);
        assert_eq!(note.key, 428);
        assert_eq!(note.instrument, 1);
        assert_eq!(module.note(0, 3, 2).key, 0);

        let note = module.note(1, 0, 0);
        assert_eq!((note.effect, note.param), (0xF, 6));
    }

    #[test]
    fn test_octa_uses_interleaved_patterns() {
        let mut data = vec![0u8; HEADER_LEN];
        data[950] = 1;
        data[SIGNATURE_OFFSET..HEADER_LEN].copy_from_slice(b"OCTA");
        let mut pattern = vec![0u8; ROWS_PER_PATTERN * 8 * 4];
        let cell = (3 * 8 + 6) * 4;
        pattern[cell..cell + 4].copy_from_slice(&[0x01, 0xAC, 0x10, 0x00]);
        data.extend_from_slice(&pattern);

        let module = Module::parse(&data).expect("OCTA module should parse");
        assert_eq!(module.channels(), 8);
        assert_eq!(module.note(0, 3, 6).key, 428);
    }

    #[test]
    fn test_fine_tune_mapping() {
        let mut header = [0u8; 30];
        header[24] = 0x00;
        assert_eq!(parse_instrument(&header, &[], 0).fine_tune, 8);
        header[24] = 0x07;
        assert_eq!(parse_instrument(&header, &[], 0).fine_tune, 15);
        header[24] = 0x08;
        assert_eq!(parse_instrument(&header, &[], 0).fine_tune, 0);
        header[24] = 0x0F;
        assert_eq!(parse_instrument(&header, &[], 0).fine_tune, 7);
    }

    #[test]
    fn test_short_loop_disables_looping() {
        let mut header = [0u8; 30];
        header[22..24].copy_from_slice(&8u16.to_be_bytes()); // 16 samples
        header[26..28].copy_from_slice(&2u16.to_be_bytes()); // loop start 4
        header[28..30].copy_from_slice(&1u16.to_be_bytes()); // loop length 2
        let data = vec![0u8; 16];

        let instrument = parse_instrument(&header, &data, 0);
        assert!(!instrument.is_looped());
        assert_eq!(instrument.loop_start, 16);
        assert_eq!(instrument.loop_end(), 16);
    }

    #[test]
    fn test_byte_loop_start_is_halved() {
        let mut header = [0u8; 30];
        header[22..24].copy_from_slice(&8u16.to_be_bytes()); // 16 samples
        header[26..28].copy_from_slice(&6u16.to_be_bytes()); // loop start 12
        header[28..30].copy_from_slice(&4u16.to_be_bytes()); // loop length 8
        let data = vec![0u8; 16];

        let instrument = parse_instrument(&header, &data, 0);
        assert_eq!(instrument.loop_start, 6);
        assert_eq!(instrument.loop_length, 8);
    }
}
