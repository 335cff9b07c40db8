//! Tone packets and themes.
//!
//! A theme is a fixed list of packets that lives in constant storage for the
//! lifetime of the program. Nothing here is mutable once built.

/// One unit of buzzer output.
///
/// A frequency of 0 is a timed rest: the buzzer stays silent for `duration`
/// milliseconds while the sequence keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TonePacket {
    /// Tone frequency in Hz, 0 for a rest
    pub frequency: u16,
    /// Duration in milliseconds
    pub duration: u16,
}

impl TonePacket {
    pub const fn new(frequency: u16, duration: u16) -> Self {
        Self { frequency, duration }
    }

    /// A silent packet that only takes time.
    pub const fn rest(duration: u16) -> Self {
        Self { frequency: 0, duration }
    }

    pub const fn is_rest(&self) -> bool {
        self.frequency == 0
    }
}

/// An ordered, immutable sequence of tone packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneTheme {
    tones: &'static [TonePacket],
}

impl ToneTheme {
    pub const fn new(tones: &'static [TonePacket]) -> Self {
        Self { tones }
    }

    /// Get the packet at `index` by value.
    pub fn tone(&self, index: usize) -> Option<TonePacket> {
        self.tones.get(index).copied()
    }

    pub const fn len(&self) -> usize {
        self.tones.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TonePacket> + '_ {
        self.tones.iter().copied()
    }

    /// Sum of all packet durations in milliseconds, rests included.
    pub fn total_duration(&self) -> u32 {
        self.tones.iter().map(|t| t.duration as u32).sum()
    }
}

/// Default theme set.
pub mod themes {
    use super::{TonePacket, ToneTheme};

    pub const BUTTON_NEXT_PREV: ToneTheme = ToneTheme::new(&[TonePacket::new(3000, 1)]);

    pub const BUTTON_OK: ToneTheme = ToneTheme::new(&[TonePacket::new(3000, 10)]);

    pub const BUTTON_RESET: ToneTheme =
        ToneTheme::new(&[TonePacket::new(6500, 50), TonePacket::new(7500, 80)]);

    pub const NOTIFY_WARNING: ToneTheme = ToneTheme::new(&[TonePacket::new(1000, 300)]);

    pub const NOTIFY_ERROR: ToneTheme = ToneTheme::new(&[
        TonePacket::new(3050, 150),
        TonePacket::new(7200, 100),
        TonePacket::new(3050, 150),
        TonePacket::new(2000, 100),
        TonePacket::new(3050, 150),
    ]);

    pub const NOTIFY_CONFIRM: ToneTheme =
        ToneTheme::new(&[TonePacket::new(3050, 50), TonePacket::new(4000, 30)]);
}
