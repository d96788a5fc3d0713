//! Byte layout of the persisted configuration record.
//!
//! The record is the little-endian serialization of [`ActiveConfig`] in field order followed by
//! the one-byte validity tag:
//!
//! ```text
//! | config fields (CONFIG_LEN) | tag (0x55) |
//! ```
//!
//! The field list exists once, in [`visit_config`], and is walked in both directions: a
//! [`Writer`] copies fields into the record, a [`Reader`] copies the record into fields. A change
//! of any field's width changes `RECORD_LEN` and moves the tag, so records of the old shape read
//! as invalid instead of being reinterpreted.

use crate::config::{
    ActiveConfig, ByteRepr, LABEL_LEN, Label, PositionSettings, SIDES, SLOTS, WatchTime,
};
use crate::error::Error;

/// Marks a record written by this exact record shape.
pub const VALID_TAG: u8 = 0x55;

/// Erased flash reads as all ones.
pub(crate) const ERASED_BYTE: u8 = 0xFF;

/// Largest read or write granularity a flash driver may report.
pub(crate) const MAX_ALIGN: usize = 32;

const F64_LEN: usize = 8;
const POSITION_LEN: usize = 1 + 1 + LABEL_LEN + 1 + 4;
const WATCH_TIME_LEN: usize = 2 + 6;

/// Serialized size of [`ActiveConfig`].
pub const CONFIG_LEN: usize = F64_LEN // circumference
    + 1 // imperial units
    + 4 * F64_LEN // front/rear delay and between
    + 2 // right, front
    + F64_LEN // stretch
    + 2 // bling step
    + SIDES * SLOTS * POSITION_LEN
    + 4 // current script
    + 1 // script execution
    + 7 * F64_LEN // speed, distances, elevation, altitude, altimeter offset
    + F64_LEN // trip time
    + WATCH_TIME_LEN
    + 1 // oled debug
    + 1; // slow hall present

/// Size of the persisted record: configuration plus validity tag.
pub const RECORD_LEN: usize = CONFIG_LEN + 1;

/// A log record is three f32: trip distance, altitude, temperature.
pub const LOG_RECORD_LEN: usize = 12;

pub(crate) const RECORD_BUF_LEN: usize = RECORD_LEN + MAX_ALIGN;

/// Direction-agnostic access to the next field of a record.
pub(crate) trait FieldVisitor {
    /// Transfers `value.len()` bytes between the record and the field.
    fn bytes(&mut self, value: &mut [u8]);

    /// The bytes just transferred don't form a valid value for the field.
    fn reject(&mut self);
}

pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
    overflow: bool,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            overflow: false,
        }
    }

    /// Number of bytes written, `None` if the fields didn't fit.
    pub(crate) fn finish(self) -> Option<usize> {
        if self.overflow { None } else { Some(self.pos) }
    }
}

impl FieldVisitor for Writer<'_> {
    fn bytes(&mut self, value: &mut [u8]) {
        match self.buf.get_mut(self.pos..self.pos + value.len()) {
            Some(dst) => dst.copy_from_slice(value),
            None => self.overflow = true,
        }
        self.pos += value.len();
    }

    fn reject(&mut self) {}
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    invalid: bool,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            invalid: false,
        }
    }

    /// Fails if a field was rejected or the record length doesn't match the field list.
    pub(crate) fn finish(self) -> Result<(), Error> {
        if self.invalid || self.pos != self.buf.len() {
            return Err(Error::InvalidRecord);
        }
        Ok(())
    }
}

impl FieldVisitor for Reader<'_> {
    fn bytes(&mut self, value: &mut [u8]) {
        match self.buf.get(self.pos..self.pos + value.len()) {
            Some(src) => value.copy_from_slice(src),
            None => self.invalid = true,
        }
        self.pos += value.len();
    }

    fn reject(&mut self) {
        self.invalid = true;
    }
}

fn f64_field<V: FieldVisitor>(v: &mut V, value: &mut f64) {
    let mut raw = value.to_le_bytes();
    v.bytes(&mut raw);
    *value = f64::from_le_bytes(raw);
}

fn i32_field<V: FieldVisitor>(v: &mut V, value: &mut i32) {
    let mut raw = value.to_le_bytes();
    v.bytes(&mut raw);
    *value = i32::from_le_bytes(raw);
}

fn i16_field<V: FieldVisitor>(v: &mut V, value: &mut i16) {
    let mut raw = value.to_le_bytes();
    v.bytes(&mut raw);
    *value = i16::from_le_bytes(raw);
}

fn u16_field<V: FieldVisitor>(v: &mut V, value: &mut u16) {
    let mut raw = value.to_le_bytes();
    v.bytes(&mut raw);
    *value = u16::from_le_bytes(raw);
}

fn u8_field<V: FieldVisitor>(v: &mut V, value: &mut u8) {
    let mut raw = [*value];
    v.bytes(&mut raw);
    *value = raw[0];
}

fn bool_field<V: FieldVisitor>(v: &mut V, value: &mut bool) {
    let mut raw = [*value as u8];
    v.bytes(&mut raw);
    match raw[0] {
        0 => *value = false,
        1 => *value = true,
        _ => v.reject(),
    }
}

fn enum_field<V: FieldVisitor, E: ByteRepr>(v: &mut V, value: &mut E) {
    let mut raw = [value.to_byte()];
    v.bytes(&mut raw);
    match E::from_byte(raw[0]) {
        Some(e) => *value = e,
        None => v.reject(),
    }
}

fn label_field<V: FieldVisitor>(v: &mut V, value: &mut Label) {
    let mut raw = *value.as_bytes();
    v.bytes(&mut raw);
    match Label::from_raw(raw) {
        Some(label) => *value = label,
        None => v.reject(),
    }
}

fn position_fields<V: FieldVisitor>(v: &mut V, p: &mut PositionSettings) {
    enum_field(v, &mut p.display_mode);
    enum_field(v, &mut p.cyclo_mode);
    label_field(v, &mut p.label);
    enum_field(v, &mut p.color);
    i32_field(v, &mut p.image);
}

fn watch_time_fields<V: FieldVisitor>(v: &mut V, t: &mut WatchTime) {
    u16_field(v, &mut t.year);
    u8_field(v, &mut t.month);
    u8_field(v, &mut t.day);
    u8_field(v, &mut t.hour);
    u8_field(v, &mut t.minute);
    u8_field(v, &mut t.second);
    u8_field(v, &mut t.day_of_week);
}

/// The persisted field list, in flash order.
pub(crate) fn visit_config<V: FieldVisitor>(v: &mut V, c: &mut ActiveConfig) {
    f64_field(v, &mut c.circumference);

    bool_field(v, &mut c.imperial_units);
    f64_field(v, &mut c.delay_front);
    f64_field(v, &mut c.between_front);
    f64_field(v, &mut c.delay_rear);
    f64_field(v, &mut c.between_rear);
    bool_field(v, &mut c.right);
    bool_field(v, &mut c.front);
    f64_field(v, &mut c.stretch);
    i16_field(v, &mut c.bling_step);

    for side in c.positions.iter_mut() {
        for position in side.iter_mut() {
            position_fields(v, position);
        }
    }

    i32_field(v, &mut c.current_script);
    bool_field(v, &mut c.script_execution);

    f64_field(v, &mut c.max_speed);
    f64_field(v, &mut c.trip_distance);
    f64_field(v, &mut c.total_distance);
    f64_field(v, &mut c.trip_elevation_gain);
    f64_field(v, &mut c.total_elevation_gain);
    f64_field(v, &mut c.max_altitude);
    f64_field(v, &mut c.altimeter_offset);

    f64_field(v, &mut c.trip_time);
    watch_time_fields(v, &mut c.watch_time);

    bool_field(v, &mut c.oled_debug);

    bool_field(v, &mut c.slow_hall_present);
}

/// Byte image of the persisted configuration record.
#[derive(Clone, PartialEq, Eq)]
pub struct ParamRecord([u8; RECORD_LEN]);

impl ParamRecord {
    /// A record as found on freshly erased flash.
    pub const ERASED: ParamRecord = ParamRecord([ERASED_BYTE; RECORD_LEN]);

    pub const fn from_bytes(raw: [u8; RECORD_LEN]) -> Self {
        Self(raw)
    }

    pub const fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8; RECORD_LEN] {
        &mut self.0
    }

    pub const fn tag(&self) -> u8 {
        self.0[RECORD_LEN - 1]
    }

    pub const fn is_valid(&self) -> bool {
        self.tag() == VALID_TAG
    }

    pub(crate) fn config_bytes(&self) -> &[u8] {
        &self.0[..CONFIG_LEN]
    }

    pub(crate) fn config_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0[..CONFIG_LEN]
    }

    pub(crate) fn set_tag(&mut self, tag: u8) {
        self.0[RECORD_LEN - 1] = tag;
    }
}

impl core::fmt::Debug for ParamRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let tag = self.tag();
        f.write_fmt(format_args!(
            "ParamRecord {{ len: {RECORD_LEN}, tag: 0x{tag:0>2x} }}"
        ))
    }
}
