//! The RAM-resident active configuration consumed by the display and the cyclocomputer.
//!
//! Discriminants of the enums below are shared with the BLE register interface and are persisted
//! verbatim, so they must not be renumbered.

use core::fmt;

/// Number of display sides (top and bottom LED rows).
pub const SIDES: usize = 2;
/// Number of display positions per side.
pub const SLOTS: usize = 3;

/// Label length including the null terminator.
pub const LABEL_LEN: usize = 40;
const MAX_LABEL_TEXT: usize = LABEL_LEN - 1;

#[derive(strum::FromRepr, strum::EnumIter, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Side {
    Top = 0,
    Bottom = 1,
}

#[derive(strum::FromRepr, strum::EnumIter, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Slot {
    Upper = 0,
    Lower = 1,
    Bling = 2,
}

#[derive(strum::FromRepr, strum::EnumIter, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DisplayMode {
    Cyclocomputer = 0,
    String = 1,
    Image = 2,
    Light = 3,
    Blank = 4,
}

#[derive(strum::FromRepr, strum::EnumIter, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CycloMode {
    CurrentSpeed = 0,
    MaximumSpeed = 1,
    AverageSpeed = 2,
    TripDistance = 3,
    TotalDistance = 4,
    CurrentAltitude = 5,
    TripElevationGain = 6,
    TotalElevationGain = 7,
    MaxAltitude = 8,
    Incline = 9,
    Temperature = 10,
    PedalingCadence = 11,
    CurrentTime = 12,
    CurrentDate = 13,
    TripTime = 14,
    TotalTime = 15,
    ChronoTime = 16,
    NoCyclo = 17,
}

#[derive(strum::FromRepr, strum::EnumIter, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LedColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

/// Enums persisted as a single byte.
pub(crate) trait ByteRepr: Copy {
    fn to_byte(self) -> u8;
    fn from_byte(value: u8) -> Option<Self>;
}

macro_rules! impl_byte_repr {
    ($($t:ty),* $(,)?) => {
        $(
            impl ByteRepr for $t {
                fn to_byte(self) -> u8 {
                    self as u8
                }

                fn from_byte(value: u8) -> Option<Self> {
                    <$t>::from_repr(value)
                }
            }
        )*
    };
}

impl_byte_repr!(DisplayMode, CycloMode, LedColor);

/// A 40-byte, null-padded text shown in `DisplayMode::String`. At most 39 bytes of text, the
/// last byte is always the null terminator.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Label([u8; LABEL_LEN]);

impl Label {
    pub const EMPTY: Label = Label([0u8; LABEL_LEN]);

    /// Creates a label from a string, truncated to 39 bytes on a char boundary.
    ///
    /// Tip: use a const context if possible to ensure that the label is built at compile time:
    ///   `let label = const { Label::from_str("Hello") };`
    pub const fn from_str(s: &str) -> Self {
        let src = s.as_bytes();
        let mut len = if src.len() > MAX_LABEL_TEXT {
            MAX_LABEL_TEXT
        } else {
            src.len()
        };
        // back off to the start of a multi-byte sequence
        while len > 0 && len < src.len() && (src[len] & 0xC0) == 0x80 {
            len -= 1;
        }

        let mut dst = [0u8; LABEL_LEN];
        let mut i = 0;
        while i < len {
            dst[i] = src[i];
            i += 1;
        }
        Self(dst)
    }

    /// Accepts raw bytes only if they carry the null terminator.
    pub(crate) const fn from_raw(raw: [u8; LABEL_LEN]) -> Option<Self> {
        if raw[MAX_LABEL_TEXT] == 0 {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub const fn as_bytes(&self) -> &[u8; LABEL_LEN] {
        &self.0
    }

    /// The text up to the first null byte. Invalid UTF-8 is cut at the last valid character.
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(LABEL_LEN);
        let text = &self.0[..end];
        match core::str::from_utf8(text) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&text[..e.valid_up_to()]).unwrap_or_default(),
        }
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label(b\"")?;
        for &byte in self.0.iter().take_while(|&&b| b != 0) {
            write!(f, "{}", core::ascii::escape_default(byte))?;
        }
        write!(f, "\")")
    }
}

/// Settings of one display position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionSettings {
    pub display_mode: DisplayMode,
    pub cyclo_mode: CycloMode,
    pub label: Label,
    pub color: LedColor,
    /// Image shown in `DisplayMode::Image`. Persisted verbatim, the image writer owns its range.
    pub image: i32,
}

/// Calendar time as kept by the real-time clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub day_of_week: u8,
}

/// Working copy of the configuration. The store reads it on save and overwrites it on load, the
/// caller owns it and must not modify it while a save is running.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActiveConfig {
    /// Wheel circumference in metres.
    pub circumference: f64,

    pub imperial_units: bool,
    pub delay_front: f64,
    pub between_front: f64,
    pub delay_rear: f64,
    pub between_rear: f64,
    pub right: bool,
    pub front: bool,
    pub stretch: f64,
    pub bling_step: i16,

    pub positions: [[PositionSettings; SLOTS]; SIDES],

    pub current_script: i32,
    pub script_execution: bool,

    pub max_speed: f64,
    pub trip_distance: f64,
    pub total_distance: f64,
    pub trip_elevation_gain: f64,
    pub total_elevation_gain: f64,
    pub max_altitude: f64,
    pub altimeter_offset: f64,

    pub trip_time: f64,
    pub watch_time: WatchTime,

    pub oled_debug: bool,

    pub slow_hall_present: bool,
}

impl ActiveConfig {
    pub fn position(&self, side: Side, slot: Slot) -> &PositionSettings {
        &self.positions[side as usize][slot as usize]
    }

    pub fn position_mut(&mut self, side: Side, slot: Slot) -> &mut PositionSettings {
        &mut self.positions[side as usize][slot as usize]
    }
}

const DEFAULT_UPPER: PositionSettings = PositionSettings {
    display_mode: DisplayMode::Cyclocomputer,
    cyclo_mode: CycloMode::CurrentSpeed,
    label: Label::from_str("Velo Bling-Bling"),
    color: LedColor::White,
    image: 0,
};

const DEFAULT_LOWER: PositionSettings = PositionSettings {
    cyclo_mode: CycloMode::TripDistance,
    ..DEFAULT_UPPER
};

const DEFAULT_BLING: PositionSettings = PositionSettings {
    display_mode: DisplayMode::Light,
    cyclo_mode: CycloMode::NoCyclo,
    color: LedColor::Blue,
    ..DEFAULT_UPPER
};

impl Default for ActiveConfig {
    /// The compiled-in defaults installed when flash holds no valid record.
    fn default() -> Self {
        Self {
            circumference: 2.155,
            imperial_units: false,
            delay_front: 0.0,
            between_front: 2.0,
            delay_rear: 0.0,
            between_rear: 2.0,
            right: true,
            front: true,
            stretch: 1.0,
            bling_step: 1,
            positions: [[DEFAULT_UPPER, DEFAULT_LOWER, DEFAULT_BLING]; SIDES],
            current_script: 0,
            script_execution: false,
            max_speed: 0.0,
            trip_distance: 0.0,
            total_distance: 0.0,
            trip_elevation_gain: 0.0,
            total_elevation_gain: 0.0,
            max_altitude: 0.0,
            altimeter_offset: 0.0,
            trip_time: 0.0,
            watch_time: WatchTime {
                year: 2014,
                month: 1,
                day: 1,
                hour: 0,
                minute: 0,
                second: 0,
                day_of_week: 3,
            },
            oled_debug: false,
            slow_hall_present: false,
        }
    }
}
