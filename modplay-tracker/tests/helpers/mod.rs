//! Test helpers for building MOD files in memory

#![allow(dead_code)]

/// Amiga period for C-2.
pub const PERIOD_C2: u16 = 428;

struct InstrumentDef {
    data: Vec<i8>,
    volume: u8,
    loop_region: Option<(usize, usize)>,
}

/// Builder for minimal 31-instrument MOD files.
pub struct ModBuilder {
    channels: usize,
    orders: Vec<u8>,
    patterns: Vec<Vec<u8>>,
    instruments: Vec<InstrumentDef>,
}

impl ModBuilder {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            orders: vec![0],
            patterns: vec![vec![0; 64 * channels * 4]],
            instruments: Vec::new(),
        }
    }

    /// Add an instrument; returns its pattern number via the builder order (1-based).
    pub fn instrument(mut self, data: Vec<i8>, volume: u8, loop_region: Option<(usize, usize)>) -> Self {
        self.instruments.push(InstrumentDef {
            data,
            volume,
            loop_region,
        });
        self
    }

    pub fn add_pattern(mut self) -> Self {
        self.patterns.push(vec![0; 64 * self.channels * 4]);
        self
    }

    pub fn orders(mut self, orders: &[u8]) -> Self {
        self.orders = orders.to_vec();
        self
    }

    pub fn note(
        mut self,
        pattern: usize,
        row: usize,
        channel: usize,
        period: u16,
        instrument: u8,
        effect: u8,
        param: u8,
    ) -> Self {
        let offset = (row * self.channels + channel) * 4;
        let cell = &mut self.patterns[pattern][offset..offset + 4];
        cell[0] = (instrument & 0xF0) | ((period >> 8) as u8 & 0x0F);
        cell[1] = (period & 0xFF) as u8;
        cell[2] = ((instrument & 0x0F) << 4) | (effect & 0x0F);
        cell[3] = param;
        self
    }

    /// Effect-only cell.
    pub fn effect(self, pattern: usize, row: usize, channel: usize, effect: u8, param: u8) -> Self {
        self.note(pattern, row, channel, 0, 0, effect, param)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::new();

        let mut title = b"test module".to_vec();
        title.resize(20, 0);
        data.extend_from_slice(&title);

        for index in 0..31 {
            let mut header = [0u8; 30];
            if let Some(def) = self.instruments.get(index) {
                header[22..24].copy_from_slice(&((def.data.len() / 2) as u16).to_be_bytes());
                header[25] = def.volume;
                let (start, length) = def.loop_region.unwrap_or((0, 2));
                header[26..28].copy_from_slice(&((start / 2) as u16).to_be_bytes());
                header[28..30].copy_from_slice(&((length / 2) as u16).to_be_bytes());
            }
            data.extend_from_slice(&header);
        }

        data.push(self.orders.len() as u8);
        data.push(127);
        let mut orders = self.orders.clone();
        orders.resize(128, 0);
        data.extend_from_slice(&orders);

        let signature = match self.channels {
            4 => "M.K.".to_string(),
            n if n < 10 => format!("{}CHN", n),
            n => format!("{}CH", n),
        };
        data.extend_from_slice(signature.as_bytes());

        for pattern in &self.patterns {
            data.extend_from_slice(pattern);
        }
        for def in &self.instruments {
            data.extend(def.data.iter().map(|&s| s as u8));
        }
        data
    }
}

/// Looping sawtooth ramp, 64 samples.
pub fn ramp_instrument() -> Vec<i8> {
    (0..64).map(|i| (i * 4 - 128) as i8).collect()
}

/// Single-order module: instrument 1 playing C-2 on channels 0 and 1,
/// speed 1, pattern break on row 1. Loops every two ticks.
pub fn looping_module() -> Vec<u8> {
    ModBuilder::new(4)
        .instrument(ramp_instrument(), 64, Some((0, 64)))
        .note(0, 0, 0, PERIOD_C2, 1, 0xF, 1)
        .note(0, 0, 1, PERIOD_C2, 1, 0, 0)
        .effect(0, 1, 2, 0xD, 0)
        .build()
}
