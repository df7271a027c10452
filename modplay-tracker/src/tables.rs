//! Period and waveform lookup tables

/// Period multipliers (<< 11) for fine-tune values -8..7, indexed 0..15 with 8 = none.
pub(crate) const FINE_TUNING: [u16; 16] = [
    4340, 4308, 4277, 4247, 4216, 4186, 4156, 4126, 4096, 4067, 4037, 4008, 3979, 3951, 3922,
    3894,
];

/// Period multipliers (<< 12) for arpeggio offsets of 0..15 semitones.
pub(crate) const ARP_TUNING: [u16; 16] = [
    4096, 3866, 3649, 3444, 3251, 3069, 2896, 2734, 2580, 2435, 2299, 2170, 2048, 1933, 1825,
    1722,
];

/// Half a sine period in 32 steps.
pub(crate) const SINE_TABLE: [u8; 32] = [
    0, 24, 49, 74, 97, 120, 141, 161, 180, 197, 212, 224, 235, 244, 250, 253, 255, 253, 250, 244,
    235, 224, 212, 197, 180, 161, 141, 120, 97, 74, 49, 24,
];
