//! Fixed-size log records persisted through the external [`Logger`]
//! interface and the CSV formatting used by the log-dump command.
//!
//! Every record occupies exactly [`MAX_LOG_SIZE`] bytes on storage: a common
//! header followed by a type-specific payload, little-endian scalar fields.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::constants::MAX_LOG_SIZE;
use crate::timeutil::CalendarTime;

/// Serialized size of [`LogHeader`].
pub const LOG_HEADER_SIZE: usize = 9;
/// Payload capacity of a record.
pub const MAX_LOG_PAYLOAD: usize = MAX_LOG_SIZE - LOG_HEADER_SIZE;

/// A raw persisted record.
pub type LogRecord = [u8; MAX_LOG_SIZE];

/// Record discriminator stored in the header.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogType {
    Gps = 0,
    Startup = 1,
    Artic = 2,
    Underwater = 3,
    Battery = 4,
    State = 5,
    Zone = 6,
    OtaUpdate = 7,
    Ble = 8,
    Error = 9,
    Warn = 10,
    Info = 11,
    Trace = 12,
    Sensor = 13,
}

impl LogType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => LogType::Gps,
            1 => LogType::Startup,
            2 => LogType::Artic,
            3 => LogType::Underwater,
            4 => LogType::Battery,
            5 => LogType::State,
            6 => LogType::Zone,
            7 => LogType::OtaUpdate,
            8 => LogType::Ble,
            9 => LogType::Error,
            10 => LogType::Warn,
            11 => LogType::Info,
            12 => LogType::Trace,
            13 => LogType::Sensor,
            _ => return None,
        })
    }
}

/// Common record header: UTC wall-clock stamp, type and payload size.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    pub day: u8,
    pub month: u8,
    pub year: u16,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub log_type: LogType,
    pub payload_size: u8,
}

impl LogHeader {
    /// Header stamped from epoch seconds.
    pub fn with_time(log_type: LogType, epoch: i64) -> Self {
        let t = CalendarTime::from_epoch(epoch);
        Self {
            day: t.day,
            month: t.month,
            year: t.year,
            hours: t.hour,
            minutes: t.min,
            seconds: t.sec,
            log_type,
            payload_size: 0,
        }
    }

    fn write(&self, w: &mut ByteWriter<'_>) {
        w.u8(self.day);
        w.u8(self.month);
        w.u16(self.year);
        w.u8(self.hours);
        w.u8(self.minutes);
        w.u8(self.seconds);
        w.u8(self.log_type as u8);
        w.u8(self.payload_size);
    }

    fn read(r: &mut ByteReader<'_>) -> Option<Self> {
        Some(Self {
            day: r.u8(),
            month: r.u8(),
            year: r.u16(),
            hours: r.u8(),
            minutes: r.u8(),
            seconds: r.u8(),
            log_type: LogType::from_u8(r.u8())?,
            payload_size: r.u8(),
        })
    }
}

bitflags! {
    /// Fix status flags reported by the GNSS receiver (first flags byte).
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FixFlags: u8 {
        /// Position and velocity are valid and within the configured masks.
        const FIX_OK = 0x01;
        /// Differential corrections were applied.
        const DIFF_SOLN = 0x02;
        /// Vehicle heading is valid.
        const HEAD_VEH_VALID = 0x20;
        const CARR_SOLN_FLOAT = 0x40;
        const CARR_SOLN_FIXED = 0x80;
    }
}

/// GNSS cycle outcome carried in a [`GpsLogEntry`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GpsEventType {
    On = 0,
    Off = 1,
    Update = 2,
    Fix = 3,
    NoFix = 4,
}

impl GpsEventType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => GpsEventType::On,
            1 => GpsEventType::Off,
            2 => GpsEventType::Update,
            3 => GpsEventType::Fix,
            4 => GpsEventType::NoFix,
            _ => return None,
        })
    }
}

/// Position/velocity/time solution plus acquisition bookkeeping.
///
/// Linear fields keep the receiver's native units: mm for heights and
/// accuracies, mm/s for velocities, degrees for angles.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsInfo {
    pub event_type: GpsEventType,
    pub batt_voltage: u16,
    pub itow: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub valid: bool,
    /// Time the receiver was powered for this cycle, ms.
    pub on_time: u32,
    /// Time to first fix, ms.
    pub ttff: u32,
    pub fix_type: u8,
    pub flags: FixFlags,
    pub flags2: u8,
    pub flags3: u8,
    pub num_sv: u8,
    pub lon: f64,
    pub lat: f64,
    pub height: i32,
    pub h_msl: i32,
    pub h_acc: u32,
    pub v_acc: u32,
    pub vel_n: i32,
    pub vel_e: i32,
    pub vel_d: i32,
    pub g_speed: i32,
    pub head_mot: f32,
    pub s_acc: u32,
    pub head_acc: f32,
    pub p_dop: f32,
    pub v_dop: f32,
    pub h_dop: f32,
    pub head_veh: f32,
    /// Epoch seconds of the schedule that produced this cycle.
    pub sched_time: i64,
}

impl Default for GpsInfo {
    fn default() -> Self {
        Self {
            event_type: GpsEventType::NoFix,
            batt_voltage: 0,
            itow: 0,
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            min: 0,
            sec: 0,
            valid: false,
            on_time: 0,
            ttff: 0,
            fix_type: 0,
            flags: FixFlags::empty(),
            flags2: 0,
            flags3: 0,
            num_sv: 0,
            lon: 0.0,
            lat: 0.0,
            height: 0,
            h_msl: 0,
            h_acc: 0,
            v_acc: 0,
            vel_n: 0,
            vel_e: 0,
            vel_d: 0,
            g_speed: 0,
            head_mot: 0.0,
            s_acc: 0,
            head_acc: 0.0,
            p_dop: 0.0,
            v_dop: 0.0,
            h_dop: 0.0,
            head_veh: 0.0,
            sched_time: 0,
        }
    }
}

/// Serialized size of [`GpsInfo`].
const GPS_INFO_SIZE: usize = 112;
const _: () = assert!(GPS_INFO_SIZE <= MAX_LOG_PAYLOAD);

/// One GNSS acquisition cycle as persisted to the sensor log.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsLogEntry {
    pub header: LogHeader,
    pub info: GpsInfo,
}

impl GpsLogEntry {
    pub fn to_record(&self) -> LogRecord {
        let mut rec = [0u8; MAX_LOG_SIZE];
        let mut header = self.header;
        header.payload_size = GPS_INFO_SIZE as u8;
        let mut w = ByteWriter::new(&mut rec);
        header.write(&mut w);
        let i = &self.info;
        w.u8(i.event_type as u8);
        w.u16(i.batt_voltage);
        w.u32(i.itow);
        w.u16(i.year);
        w.u8(i.month);
        w.u8(i.day);
        w.u8(i.hour);
        w.u8(i.min);
        w.u8(i.sec);
        w.u8(u8::from(i.valid));
        w.u32(i.on_time);
        w.u32(i.ttff);
        w.u8(i.fix_type);
        w.u8(i.flags.bits());
        w.u8(i.flags2);
        w.u8(i.flags3);
        w.u8(i.num_sv);
        w.f64(i.lon);
        w.f64(i.lat);
        w.i32(i.height);
        w.i32(i.h_msl);
        w.u32(i.h_acc);
        w.u32(i.v_acc);
        w.i32(i.vel_n);
        w.i32(i.vel_e);
        w.i32(i.vel_d);
        w.i32(i.g_speed);
        w.f32(i.head_mot);
        w.u32(i.s_acc);
        w.f32(i.head_acc);
        w.f32(i.p_dop);
        w.f32(i.v_dop);
        w.f32(i.h_dop);
        w.f32(i.head_veh);
        w.i64(i.sched_time);
        rec
    }

    pub fn from_record(rec: &LogRecord) -> Option<Self> {
        let mut r = ByteReader::new(rec);
        let header = LogHeader::read(&mut r)?;
        if header.log_type != LogType::Gps {
            return None;
        }
        let info = GpsInfo {
            event_type: GpsEventType::from_u8(r.u8())?,
            batt_voltage: r.u16(),
            itow: r.u32(),
            year: r.u16(),
            month: r.u8(),
            day: r.u8(),
            hour: r.u8(),
            min: r.u8(),
            sec: r.u8(),
            valid: r.u8() != 0,
            on_time: r.u32(),
            ttff: r.u32(),
            fix_type: r.u8(),
            flags: FixFlags::from_bits_retain(r.u8()),
            flags2: r.u8(),
            flags3: r.u8(),
            num_sv: r.u8(),
            lon: r.f64(),
            lat: r.f64(),
            height: r.i32(),
            h_msl: r.i32(),
            h_acc: r.u32(),
            v_acc: r.u32(),
            vel_n: r.i32(),
            vel_e: r.i32(),
            vel_d: r.i32(),
            g_speed: r.i32(),
            head_mot: r.f32(),
            s_acc: r.u32(),
            head_acc: r.f32(),
            p_dop: r.f32(),
            v_dop: r.f32(),
            h_dop: r.f32(),
            head_veh: r.f32(),
            sched_time: r.i64(),
        };
        Some(Self { header, info })
    }
}

/// Wet/dry transition record.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnderwaterEvent {
    Dry = 0,
    Wet = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderwaterLogEntry {
    pub header: LogHeader,
    pub event: UnderwaterEvent,
}

impl UnderwaterLogEntry {
    pub fn to_record(&self) -> LogRecord {
        let mut rec = [0u8; MAX_LOG_SIZE];
        let mut header = self.header;
        header.payload_size = 1;
        let mut w = ByteWriter::new(&mut rec);
        header.write(&mut w);
        w.u8(self.event as u8);
        rec
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatteryEvent {
    VoltageUpdate = 0,
    LowThreshold = 1,
    ChargingOn = 2,
    ChargingOff = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryLogEntry {
    pub header: LogHeader,
    pub event: BatteryEvent,
    pub voltage: u16,
}

impl BatteryLogEntry {
    pub fn to_record(&self) -> LogRecord {
        let mut rec = [0u8; MAX_LOG_SIZE];
        let mut header = self.header;
        header.payload_size = 3;
        let mut w = ByteWriter::new(&mut rec);
        header.write(&mut w);
        w.u8(self.event as u8);
        w.u16(self.voltage);
        rec
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StateChangeEvent {
    Boot = 0,
    Configuration = 1,
    Operational = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeLogEntry {
    pub header: LogHeader,
    pub event: StateChangeEvent,
}

impl StateChangeLogEntry {
    pub fn to_record(&self) -> LogRecord {
        let mut rec = [0u8; MAX_LOG_SIZE];
        let mut header = self.header;
        header.payload_size = 1;
        let mut w = ByteWriter::new(&mut rec);
        header.write(&mut w);
        w.u8(self.event as u8);
        rec
    }
}

/// Aggregated auxiliary-sensor sample, one value per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorLogEntry {
    pub header: LogHeader,
    pub num_channels: u8,
    pub values: [f64; 5],
}

impl SensorLogEntry {
    pub fn to_record(&self) -> LogRecord {
        let mut rec = [0u8; MAX_LOG_SIZE];
        let mut header = self.header;
        header.payload_size = 1 + 5 * 8;
        let mut w = ByteWriter::new(&mut rec);
        header.write(&mut w);
        w.u8(self.num_channels);
        for value in self.values {
            w.f64(value);
        }
        rec
    }

    pub fn from_record(rec: &LogRecord) -> Option<Self> {
        let mut r = ByteReader::new(rec);
        let header = LogHeader::read(&mut r)?;
        if header.log_type != LogType::Sensor {
            return None;
        }
        let num_channels = r.u8();
        let mut values = [0.0f64; 5];
        for value in &mut values {
            *value = r.f64();
        }
        Some(Self {
            header,
            num_channels,
            values,
        })
    }
}

/// CSV formatter for the auxiliary-sensor logs.
pub struct SensorLogFormatter;

impl LogFormatter for SensorLogFormatter {
    fn header(&self) -> String {
        "log_datetime,ch0,ch1,ch2,ch3,ch4\r\n".to_string()
    }

    fn format(&self, record: &LogRecord) -> String {
        let Some(e) = SensorLogEntry::from_record(record) else {
            return String::new();
        };
        let h = &e.header;
        format!(
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02},{:.6},{:.6},{:.6},{:.6},{:.6}\r\n",
            h.day,
            h.month,
            h.year,
            h.hours,
            h.minutes,
            h.seconds,
            e.values[0],
            e.values[1],
            e.values[2],
            e.values[3],
            e.values[4],
        )
    }
}

/// CSV rendering of a log stream, used by the chunked log-dump command.
pub trait LogFormatter {
    /// CSV header line including the trailing CRLF.
    fn header(&self) -> String;
    /// One CSV line for `record`, including the trailing CRLF.
    fn format(&self, record: &LogRecord) -> String;
}

/// CSV formatter for the GNSS sensor log.
pub struct GpsLogFormatter;

impl LogFormatter for GpsLogFormatter {
    fn header(&self) -> String {
        "log_datetime,batt_voltage,iTOW,fix_datetime,valid,onTime,ttff,fixType,flags,flags2,\
         flags3,numSV,lon,lat,height,hMSL,hAcc,vAcc,velN,velE,velD,gSpeed,headMot,sAcc,headAcc,\
         pDOP,vDOP,hDOP,headVeh\r\n"
            .to_string()
    }

    fn format(&self, record: &LogRecord) -> String {
        let Some(e) = GpsLogEntry::from_record(record) else {
            return String::new();
        };
        let h = &e.header;
        let i = &e.info;
        format!(
            "{:02}/{:02}/{:04} {:02}:{:02}:{:02},{:.6},{},{:02}/{:02}/{:04} \
             {:02}:{:02}:{:02},{},{},{},{},{},{},{},{},{:.6},{:.6},{:.3},{:.3},{:.3},{:.3},{:.3},\
             {:.3},{:.3},{:.3},{:.6},{:.3},{:.6},{:.6},{:.6},{:.6},{:.6}\r\n",
            h.day,
            h.month,
            h.year,
            h.hours,
            h.minutes,
            h.seconds,
            f64::from(i.batt_voltage) / 1000.0,
            i.itow,
            i.day,
            i.month,
            i.year,
            i.hour,
            i.min,
            i.sec,
            u8::from(i.valid),
            i.on_time,
            i.ttff,
            i.fix_type,
            i.flags.bits(),
            i.flags2,
            i.flags3,
            i.num_sv,
            i.lon,
            i.lat,
            f64::from(i.height) / 1000.0,
            f64::from(i.h_msl) / 1000.0,
            f64::from(i.h_acc) / 1000.0,
            f64::from(i.v_acc) / 1000.0,
            f64::from(i.vel_n) / 1000.0,
            f64::from(i.vel_e) / 1000.0,
            f64::from(i.vel_d) / 1000.0,
            f64::from(i.g_speed) / 1000.0,
            i.head_mot,
            f64::from(i.s_acc) / 1000.0,
            i.head_acc,
            i.p_dop,
            i.v_dop,
            i.h_dop,
            i.head_veh,
        )
    }
}

/// Named loggers and their formatters, as exposed to the log-dump and
/// erase commands.
#[derive(Default)]
pub struct LogRegistry {
    entries: Vec<(Rc<RefCell<dyn crate::hal::Logger>>, Rc<dyn LogFormatter>)>,
}

impl LogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        logger: Rc<RefCell<dyn crate::hal::Logger>>,
        formatter: Rc<dyn LogFormatter>,
    ) {
        self.entries.push((logger, formatter));
    }

    pub fn find(
        &self,
        name: &str,
    ) -> Option<(Rc<RefCell<dyn crate::hal::Logger>>, Rc<dyn LogFormatter>)> {
        self.entries
            .iter()
            .find(|(logger, _)| logger.borrow().name() == name)
            .map(|(logger, formatter)| (logger.clone(), formatter.clone()))
    }

    /// Truncate every registered log.
    pub fn truncate_all(&mut self) {
        for (logger, _) in &self.entries {
            let _ = logger.borrow_mut().truncate();
        }
    }
}

struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf[self.pos..self.pos + v.len()].copy_from_slice(v);
        self.pos += v.len();
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.bytes(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.bytes(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.bytes(&v.to_le_bytes());
    }
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn chunk<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.chunk())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.chunk())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.chunk())
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.chunk())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.chunk())
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.chunk())
    }
}
