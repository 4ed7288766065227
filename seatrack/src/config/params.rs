//! Parameter identifiers, value types and per-parameter metadata.
//!
//! Every parameter has a compile-time metadata record: its human name, the
//! five-character wire key used by the control protocol (`<group><T|P><nn>`,
//! `T` for technical/status keys, `P` for configuration keys), the argument
//! encoding, writability and an implemented flag for legacy keys that are
//! accepted but ignored.

use core::fmt;

/// Argos transmission strategy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArgosMode {
    Off = 0,
    PassPrediction = 1,
    Legacy = 2,
    DutyCycle = 3,
}

impl ArgosMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => ArgosMode::Off,
            1 => ArgosMode::PassPrediction,
            2 => ArgosMode::Legacy,
            3 => ArgosMode::DutyCycle,
            _ => return None,
        })
    }
}

impl fmt::Display for ArgosMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgosMode::Off => "OFF",
            ArgosMode::PassPrediction => "PASS_PREDICTION",
            ArgosMode::Legacy => "LEGACY",
            ArgosMode::DutyCycle => "DUTY_CYCLE",
        };
        f.write_str(s)
    }
}

/// Argos transmit power level.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArgosPower {
    Mw3 = 1,
    Mw40 = 2,
    Mw200 = 3,
    Mw350 = 4,
    Mw500 = 5,
}

impl ArgosPower {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => ArgosPower::Mw3,
            2 => ArgosPower::Mw40,
            3 => ArgosPower::Mw200,
            4 => ArgosPower::Mw350,
            5 => ArgosPower::Mw500,
            _ => return None,
        })
    }

    /// Map a milliwatt figure from the control protocol onto the nearest
    /// supported level.
    pub fn from_milliwatts(mw: u32) -> Self {
        match mw {
            0..=3 => ArgosPower::Mw3,
            4..=40 => ArgosPower::Mw40,
            41..=200 => ArgosPower::Mw200,
            201..=350 => ArgosPower::Mw350,
            _ => ArgosPower::Mw500,
        }
    }

    pub fn milliwatts(self) -> u32 {
        match self {
            ArgosPower::Mw3 => 3,
            ArgosPower::Mw40 => 40,
            ArgosPower::Mw200 => 200,
            ArgosPower::Mw350 => 350,
            ArgosPower::Mw500 => 500,
        }
    }
}

/// Depth pile size selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DepthPile {
    D1 = 1,
    D2 = 2,
    D3 = 3,
    D4 = 4,
    D8 = 8,
    D12 = 12,
    D16 = 16,
    D20 = 20,
    D24 = 24,
}

impl DepthPile {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => DepthPile::D1,
            2 => DepthPile::D2,
            3 => DepthPile::D3,
            4 => DepthPile::D4,
            8 => DepthPile::D8,
            12 => DepthPile::D12,
            16 => DepthPile::D16,
            20 => DepthPile::D20,
            24 => DepthPile::D24,
            _ => return None,
        })
    }
}

/// Period between GNSS positions as encoded into the long uplink frame.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeltaTimeLoc {
    T10Min = 1,
    T15Min = 2,
    T30Min = 3,
    T1Hr = 4,
    T2Hr = 5,
    T3Hr = 6,
    T4Hr = 7,
    T6Hr = 8,
    T12Hr = 9,
    T24Hr = 10,
}

impl DeltaTimeLoc {
    /// Monotone staircase over the nominal GNSS period in seconds.
    pub fn from_period_secs(dloc_arg_nom: u32) -> Self {
        const HOUR: u32 = 3600;
        const MINUTE: u32 = 60;
        if dloc_arg_nom >= 24 * HOUR {
            DeltaTimeLoc::T24Hr
        } else if dloc_arg_nom >= 12 * HOUR {
            DeltaTimeLoc::T12Hr
        } else if dloc_arg_nom >= 6 * HOUR {
            DeltaTimeLoc::T6Hr
        } else if dloc_arg_nom >= 4 * HOUR {
            DeltaTimeLoc::T4Hr
        } else if dloc_arg_nom >= 3 * HOUR {
            DeltaTimeLoc::T3Hr
        } else if dloc_arg_nom >= 2 * HOUR {
            DeltaTimeLoc::T2Hr
        } else if dloc_arg_nom >= HOUR {
            DeltaTimeLoc::T1Hr
        } else if dloc_arg_nom >= 30 * MINUTE {
            DeltaTimeLoc::T30Min
        } else if dloc_arg_nom >= 15 * MINUTE {
            DeltaTimeLoc::T15Min
        } else {
            DeltaTimeLoc::T10Min
        }
    }
}

/// GNSS fix mode.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GnssFixMode {
    Fix2D = 1,
    Fix3D = 2,
    Auto = 3,
}

impl GnssFixMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => GnssFixMode::Fix2D,
            2 => GnssFixMode::Fix3D,
            3 => GnssFixMode::Auto,
            _ => return None,
        })
    }
}

/// GNSS dynamic platform model.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GnssDynModel {
    Portable = 0,
    Stationary = 2,
    Pedestrian = 3,
    Automotive = 4,
    Sea = 5,
    Airborne1G = 6,
    Airborne2G = 7,
    Airborne4G = 8,
    WristWornWatch = 9,
    Bike = 10,
}

impl GnssDynModel {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => GnssDynModel::Portable,
            2 => GnssDynModel::Stationary,
            3 => GnssDynModel::Pedestrian,
            4 => GnssDynModel::Automotive,
            5 => GnssDynModel::Sea,
            6 => GnssDynModel::Airborne1G,
            7 => GnssDynModel::Airborne2G,
            8 => GnssDynModel::Airborne4G,
            9 => GnssDynModel::WristWornWatch,
            10 => GnssDynModel::Bike,
            _ => return None,
        })
    }
}

/// Indicator LED policy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LedMode {
    Off = 0,
    Hrs24 = 1,
    Always = 3,
}

impl LedMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => LedMode::Off,
            1 => LedMode::Hrs24,
            3 => LedMode::Always,
            _ => return None,
        })
    }
}

/// Geofence zone geometry.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ZoneType {
    Circle = 1,
}

impl ZoneType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ZoneType::Circle),
            _ => None,
        }
    }
}

/// Aggregation applied to sensor samples piggy-backed on transmissions.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorTxMode {
    Off = 0,
    Oneshot = 1,
    Mean = 2,
    Median = 3,
}

impl SensorTxMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => SensorTxMode::Off,
            1 => SensorTxMode::Oneshot,
            2 => SensorTxMode::Mean,
            3 => SensorTxMode::Median,
            _ => return None,
        })
    }
}

/// Wet/dry decision source of the underwater detector.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnderwaterSource {
    Sws = 0,
    PressureSensor = 1,
    Gnss = 2,
}

impl UnderwaterSource {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => UnderwaterSource::Sws,
            1 => UnderwaterSource::PressureSensor,
            2 => UnderwaterSource::Gnss,
            _ => return None,
        })
    }
}

/// Argos modulation family.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArgosModulation {
    A2 = 0,
    A3 = 1,
    A4 = 2,
}

impl ArgosModulation {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => ArgosModulation::A2,
            1 => ArgosModulation::A3,
            2 => ArgosModulation::A4,
            _ => return None,
        })
    }
}

impl fmt::Display for ArgosModulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgosModulation::A2 => "A2",
            ArgosModulation::A3 => "A3",
            ArgosModulation::A4 => "A4",
        };
        f.write_str(s)
    }
}

/// Pressure sensor logging policy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PressureLogMode {
    Always = 0,
    WhenSubmerged = 1,
}

impl PressureLogMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => PressureLogMode::Always,
            1 => PressureLogMode::WhenSubmerged,
            _ => return None,
        })
    }
}

/// Debug output routing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DebugMode {
    Off = 0,
    Uart = 1,
    Ble = 2,
}

impl DebugMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => DebugMode::Off,
            1 => DebugMode::Uart,
            2 => DebugMode::Ble,
            _ => return None,
        })
    }
}

/// Tagged parameter value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Uint(u32),
    Int(i32),
    Float(f64),
    Text(String),
    /// Epoch seconds.
    DateTime(i64),
    Bool(bool),
    ArgosMode(ArgosMode),
    ArgosPower(ArgosPower),
    DepthPile(DepthPile),
    GnssFixMode(GnssFixMode),
    GnssDynModel(GnssDynModel),
    LedMode(LedMode),
    ZoneType(ZoneType),
    SensorTxMode(SensorTxMode),
    UnderwaterSource(UnderwaterSource),
    ArgosModulation(ArgosModulation),
    PressureLogMode(PressureLogMode),
    DebugMode(DebugMode),
}

/// Conversion between a typed view and the tagged union.
pub trait ParamConvert: Sized {
    fn from_value(value: &ParamValue) -> Option<Self>;
    fn into_value(self) -> ParamValue;
}

macro_rules! impl_param_convert {
    ($ty:ty, $arm:ident) => {
        impl ParamConvert for $ty {
            fn from_value(value: &ParamValue) -> Option<Self> {
                match value {
                    ParamValue::$arm(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> ParamValue {
                ParamValue::$arm(self)
            }
        }
    };
}

impl_param_convert!(u32, Uint);
impl_param_convert!(i32, Int);
impl_param_convert!(f64, Float);
impl_param_convert!(String, Text);
impl_param_convert!(i64, DateTime);
impl_param_convert!(bool, Bool);
impl_param_convert!(ArgosMode, ArgosMode);
impl_param_convert!(ArgosPower, ArgosPower);
impl_param_convert!(DepthPile, DepthPile);
impl_param_convert!(GnssFixMode, GnssFixMode);
impl_param_convert!(GnssDynModel, GnssDynModel);
impl_param_convert!(LedMode, LedMode);
impl_param_convert!(ZoneType, ZoneType);
impl_param_convert!(SensorTxMode, SensorTxMode);
impl_param_convert!(UnderwaterSource, UnderwaterSource);
impl_param_convert!(ArgosModulation, ArgosModulation);
impl_param_convert!(PressureLogMode, PressureLogMode);
impl_param_convert!(DebugMode, DebugMode);

/// Argument encoding on the control protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Decimal,
    Hexadecimal,
    Text,
    Datestring,
    Base64,
    Boolean,
    Uint,
    Float,
    ArgosMode,
    ArgosPower,
    DepthPile,
    AqPeriod,
    ArgosFreq,
    GnssFixMode,
    GnssDynModel,
    LedMode,
    ZoneType,
    SensorTxMode,
    UnderwaterSource,
    ArgosModulation,
    PressureLogMode,
    DebugMode,
    KeyList,
    KeyValueList,
}

/// Compile-time description of one parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamMeta {
    pub name: &'static str,
    /// Five-character wire key; `key.as_bytes()[2] == b'T'` marks a
    /// technical/status key reported by STATR instead of PARMR.
    pub key: &'static str,
    pub encoding: Encoding,
    pub writable: bool,
    pub implemented: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

macro_rules! params {
    ($( $variant:ident => ($key:literal, $encoding:ident, $writable:literal, $implemented:literal, $min:expr, $max:expr) ),+ $(,)?) => {
        /// Parameter identifier. Ordering defines the persisted layout.
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ParamId {
            $($variant),+
        }

        impl ParamId {
            /// All parameters in persisted order.
            pub const ALL: &'static [ParamId] = &[ $(ParamId::$variant),+ ];

            pub const fn meta(self) -> ParamMeta {
                match self {
                    $(
                        ParamId::$variant => ParamMeta {
                            name: stringify!($variant),
                            key: $key,
                            encoding: Encoding::$encoding,
                            writable: $writable,
                            implemented: $implemented,
                            min: $min,
                            max: $max,
                        },
                    )+
                }
            }

            pub fn from_key(key: &str) -> Option<Self> {
                $(
                    if key == $key {
                        return Some(ParamId::$variant);
                    }
                )+
                None
            }
        }
    };
}

params! {
    ArgosDecId => ("IDT06", Decimal, true, true, None, None),
    ArgosHexId => ("IDT07", Hexadecimal, true, true, None, None),
    DeviceModel => ("IDT02", Text, false, true, None, None),
    FwAppVersion => ("IDT03", Text, false, true, None, None),
    LastTx => ("ART01", Datestring, false, true, None, None),
    TxCounter => ("ART02", Uint, false, true, None, None),
    BattSoc => ("POT03", Uint, false, true, None, None),
    LastFullChargeDate => ("POT05", Datestring, false, true, None, None),
    ProfileName => ("IDP11", Text, true, true, None, None),
    AopStatus => ("ART07", Uint, false, false, None, None),
    ArgosAopDate => ("ART03", Datestring, false, true, None, None),
    ArgosFreq => ("ARP03", ArgosFreq, true, true, Some(401.62), Some(401.68)),
    ArgosPower => ("ARP04", ArgosPower, true, true, None, None),
    TrNom => ("ARP05", AqPeriod, true, true, Some(30.0), Some(1200.0)),
    ArgosMode => ("ARP01", ArgosMode, true, true, None, None),
    NtryPerMessage => ("ARP19", Uint, true, true, Some(0.0), Some(86400.0)),
    DutyCycle => ("ARP18", Hexadecimal, true, true, Some(0.0), Some(16777215.0)),
    GnssEn => ("GNP01", Boolean, true, true, None, None),
    DlocArgNom => ("ARP11", AqPeriod, true, true, None, None),
    ArgosDepthPile => ("ARP16", DepthPile, true, true, None, None),
    GpsConstSelect => ("GNP08", Uint, true, false, None, None),
    GlonassConstSelect => ("GNP09", Uint, true, false, None, None),
    GnssHdopFiltEn => ("GNP02", Boolean, true, true, None, None),
    GnssHdopFiltThr => ("GNP03", Uint, true, true, Some(2.0), Some(15.0)),
    GnssAcqTimeout => ("GNP05", Uint, true, true, Some(10.0), Some(600.0)),
    GnssNtry => ("GNP10", Uint, true, false, None, None),
    UnderwaterEn => ("UNP01", Boolean, true, true, None, None),
    DryTimeBeforeTx => ("UNP02", Uint, true, true, Some(1.0), Some(1440.0)),
    SamplingUnderFreq => ("UNP03", Uint, true, true, Some(1.0), Some(1440.0)),
    LbEn => ("LBP01", Boolean, true, true, None, None),
    LbThreshold => ("LBP02", Uint, true, true, Some(0.0), Some(100.0)),
    LbArgosPower => ("LBP03", ArgosPower, true, true, None, None),
    TrLb => ("LBP04", AqPeriod, true, true, Some(30.0), Some(1200.0)),
    LbArgosMode => ("LBP05", ArgosMode, true, true, None, None),
    LbArgosDutyCycle => ("LBP06", Hexadecimal, true, true, Some(0.0), Some(16777215.0)),
    LbGnssEn => ("LBP07", Boolean, true, true, None, None),
    DlocArgLb => ("LBP08", AqPeriod, true, true, None, None),
    LbGnssHdopFiltThr => ("LBP09", Uint, true, true, Some(2.0), Some(15.0)),
    LbArgosDepthPile => ("LBP10", DepthPile, true, true, None, None),
    LbGnssAcqTimeout => ("LBP11", Uint, true, true, Some(10.0), Some(600.0)),
    SamplingSurfFreq => ("UNP04", Uint, true, true, Some(1.0), Some(1440.0)),
    PpMinElevation => ("PPP01", Float, true, true, Some(0.0), Some(90.0)),
    PpMaxElevation => ("PPP02", Float, true, true, Some(0.0), Some(90.0)),
    PpMinDuration => ("PPP03", Uint, true, true, Some(0.0), Some(3600.0)),
    PpMaxPasses => ("PPP04", Uint, true, true, Some(1.0), Some(10000.0)),
    PpLinearMargin => ("PPP05", Uint, true, true, Some(0.0), Some(3600.0)),
    PpCompStep => ("PPP06", Uint, true, true, Some(1.0), Some(1000.0)),
    GnssColdAcqTimeout => ("GNP11", Uint, true, true, Some(10.0), Some(1200.0)),
    GnssFixMode => ("GNP12", GnssFixMode, true, true, None, None),
    GnssDynModel => ("GNP13", GnssDynModel, true, true, None, None),
    GnssHaccFiltEn => ("GNP14", Boolean, true, true, None, None),
    GnssHaccFiltThr => ("GNP15", Uint, true, true, Some(5.0), Some(1000.0)),
    GnssMinNumFixes => ("GNP16", Uint, true, true, Some(1.0), Some(10.0)),
    GnssColdStartRetryPeriod => ("GNP17", Uint, true, true, Some(0.0), Some(86400.0)),
    ArgosTimeSyncBurstEn => ("ARP32", Boolean, true, true, None, None),
    LedMode => ("LDP01", LedMode, true, true, None, None),
    ArgosTxJitterEn => ("ARP33", Boolean, true, true, None, None),
    ArgosRxEn => ("ARP34", Boolean, true, true, None, None),
    ArgosRxMaxWindow => ("ARP35", Uint, true, true, Some(0.0), Some(3600.0)),
    ArgosRxAopUpdatePeriod => ("ARP36", Uint, true, true, Some(0.0), Some(365.0)),
    ArgosRxCounter => ("ART04", Uint, false, true, None, None),
    ArgosRxTime => ("ART05", Uint, false, true, None, None),
    GnssAssistNowEn => ("GNP20", Boolean, true, true, None, None),
    LbGnssHaccFiltThr => ("LBP12", Uint, true, true, Some(5.0), Some(1000.0)),
    LbNtryPerMessage => ("LBP13", Uint, true, true, Some(0.0), Some(86400.0)),
    ZoneType => ("ZOP01", ZoneType, true, true, None, None),
    ZoneEnableOutOfZoneDetectionMode => ("ZOP02", Boolean, true, true, None, None),
    ZoneEnableActivationDate => ("ZOP03", Boolean, true, true, None, None),
    ZoneActivationDate => ("ZOP04", Datestring, true, true, None, None),
    ZoneArgosDepthPile => ("ZOP05", DepthPile, true, true, None, None),
    ZoneArgosPower => ("ZOP06", ArgosPower, true, true, None, None),
    ZoneArgosRepetitionSeconds => ("ZOP07", AqPeriod, true, true, Some(30.0), Some(1200.0)),
    ZoneArgosMode => ("ZOP08", ArgosMode, true, true, None, None),
    ZoneArgosDutyCycle => ("ZOP09", Hexadecimal, true, true, Some(0.0), Some(16777215.0)),
    ZoneArgosNtryPerMessage => ("ZOP10", Uint, true, true, Some(0.0), Some(86400.0)),
    ZoneGnssDeltaArgLocArgosSeconds => ("ZOP11", AqPeriod, true, true, None, None),
    ZoneGnssHdopFiltThr => ("ZOP12", Uint, true, true, Some(2.0), Some(15.0)),
    ZoneGnssHaccFiltThr => ("ZOP13", Uint, true, true, Some(5.0), Some(1000.0)),
    ZoneGnssAcqTimeout => ("ZOP14", Uint, true, true, Some(10.0), Some(600.0)),
    ZoneCenterLongitude => ("ZOP15", Float, true, true, Some(-180.0), Some(180.0)),
    ZoneCenterLatitude => ("ZOP16", Float, true, true, Some(-90.0), Some(90.0)),
    ZoneRadius => ("ZOP17", Uint, true, true, Some(1.0), Some(40000000.0)),
    CertTxEnable => ("CTP01", Boolean, true, true, None, None),
    CertTxPayload => ("CTP02", Text, true, true, None, None),
    CertTxModulation => ("CTP03", ArgosModulation, true, true, None, None),
    CertTxRepetition => ("CTP04", Uint, true, true, Some(1.0), Some(86400.0)),
    HwVersion => ("IDT04", Text, false, true, None, None),
    BattVoltage => ("POT04", Float, false, true, None, None),
    ArgosTcxoWarmupTime => ("ARP37", Uint, true, true, Some(0.0), Some(60.0)),
    DeviceDecId => ("IDT08", Decimal, false, true, None, None),
    GnssTriggerOnSurfaced => ("GNP21", Boolean, true, true, None, None),
    GnssTriggerOnAxlWakeup => ("GNP22", Boolean, true, true, None, None),
    UnderwaterDetectSource => ("UNP05", UnderwaterSource, true, true, None, None),
    UnderwaterDetectThresh => ("UNP06", Float, true, true, Some(0.0), Some(100.0)),
    PhSensorEnable => ("PHP01", Boolean, true, true, None, None),
    PhSensorPeriodic => ("PHP02", Uint, true, true, Some(0.0), Some(86400.0)),
    PhSensorValue => ("PHT01", Float, false, true, None, None),
    SeaTempSensorEnable => ("STP01", Boolean, true, true, None, None),
    SeaTempSensorPeriodic => ("STP02", Uint, true, true, Some(0.0), Some(86400.0)),
    SeaTempSensorValue => ("STT01", Float, false, true, None, None),
    AlsSensorEnable => ("ALP01", Boolean, true, true, None, None),
    AlsSensorPeriodic => ("ALP02", Uint, true, true, Some(0.0), Some(86400.0)),
    AlsSensorValue => ("ALT01", Float, false, true, None, None),
    CdtSensorEnable => ("CDP01", Boolean, true, true, None, None),
    CdtSensorPeriodic => ("CDP02", Uint, true, true, Some(0.0), Some(86400.0)),
    CdtSensorConductivity => ("CDT01", Float, false, true, None, None),
    CdtSensorDepth => ("CDT02", Float, false, true, None, None),
    CdtSensorTemperature => ("CDT03", Float, false, true, None, None),
    ExtLedMode => ("LDP02", LedMode, true, true, None, None),
    AxlSensorEnable => ("AXP01", Boolean, true, true, None, None),
    AxlSensorPeriodic => ("AXP02", Uint, true, true, Some(0.0), Some(86400.0)),
    AxlSensorWakeupThreshold => ("AXP03", Float, true, true, Some(0.0), Some(16.0)),
    AxlSensorWakeupSamples => ("AXP04", Uint, true, true, Some(1.0), Some(100.0)),
    PressureSensorEnable => ("PRP01", Boolean, true, true, None, None),
    PressureSensorPeriodic => ("PRP02", Uint, true, true, Some(0.0), Some(86400.0)),
    DebugOutputMode => ("DBP01", DebugMode, true, true, None, None),
    GnssAssistNowOfflineEn => ("GNP23", Boolean, true, true, None, None),
    WchgStatus => ("POT06", Text, false, true, None, None),
    UwMaxSamples => ("UNP07", Uint, true, true, Some(1.0), Some(100.0)),
    UwMinDrySamples => ("UNP08", Uint, true, true, Some(1.0), Some(100.0)),
    UwSampleGap => ("UNP09", Uint, true, true, Some(10.0), Some(60000.0)),
    UwPinSampleDelay => ("UNP10", Uint, true, true, Some(1.0), Some(1000.0)),
    UwDiveModeEnable => ("UNP11", Boolean, true, false, None, None),
    UwDiveModeStartTime => ("UNP12", Uint, true, false, None, None),
    UwGnssDrySampling => ("UNP13", Uint, true, true, Some(1.0), Some(86400.0)),
    UwGnssWetSampling => ("UNP14", Uint, true, true, Some(1.0), Some(86400.0)),
    UwGnssMaxSamples => ("UNP15", Uint, true, true, Some(1.0), Some(100.0)),
    UwGnssMinDrySamples => ("UNP16", Uint, true, true, Some(1.0), Some(100.0)),
    UwGnssDetectThresh => ("UNP17", Uint, true, true, Some(1.0), Some(7.0)),
    LbCriticalThresh => ("LBP14", Float, true, true, Some(0.0), Some(5.0)),
    PressureSensorLoggingMode => ("PRP03", PressureLogMode, true, true, None, None),
    GnssTriggerColdStartOnSurfaced => ("GNP24", Boolean, true, true, None, None),
    SeaTempSensorEnableTxMode => ("STP03", SensorTxMode, true, true, None, None),
    SeaTempSensorEnableTxMaxSamples => ("STP04", Uint, true, true, Some(1.0), Some(100.0)),
    SeaTempSensorEnableTxSamplePeriod => ("STP05", Uint, true, true, Some(10.0), Some(60000.0)),
    PhSensorEnableTxMode => ("PHP03", SensorTxMode, true, true, None, None),
    PhSensorEnableTxMaxSamples => ("PHP04", Uint, true, true, Some(1.0), Some(100.0)),
    PhSensorEnableTxSamplePeriod => ("PHP05", Uint, true, true, Some(10.0), Some(60000.0)),
    AlsSensorEnableTxMode => ("ALP03", SensorTxMode, true, true, None, None),
    AlsSensorEnableTxMaxSamples => ("ALP04", Uint, true, true, Some(1.0), Some(100.0)),
    AlsSensorEnableTxSamplePeriod => ("ALP05", Uint, true, true, Some(10.0), Some(60000.0)),
    PressureSensorEnableTxMode => ("PRP04", SensorTxMode, true, true, None, None),
    PressureSensorEnableTxMaxSamples => ("PRP05", Uint, true, true, Some(1.0), Some(100.0)),
    PressureSensorEnableTxSamplePeriod => ("PRP06", Uint, true, true, Some(10.0), Some(60000.0)),
}

/// Reported device model string.
pub const DEVICE_MODEL_NAME: &str = "SEATRACK";
/// Reported application firmware version.
pub const FW_APP_VERSION_STR: &str = "V0.4.0";

impl ParamId {
    /// True for technical/status keys (reported by STATR).
    pub fn is_technical(self) -> bool {
        self.meta().key.as_bytes()[2] == b'T'
    }

    /// Factory default value.
    pub fn default_value(self) -> ParamValue {
        use ParamValue as V;
        match self {
            ParamId::ArgosDecId => V::Uint(0),
            ParamId::ArgosHexId => V::Uint(0),
            ParamId::DeviceModel => V::Text(DEVICE_MODEL_NAME.to_string()),
            ParamId::FwAppVersion => V::Text(FW_APP_VERSION_STR.to_string()),
            ParamId::LastTx => V::DateTime(0),
            ParamId::TxCounter => V::Uint(0),
            ParamId::BattSoc => V::Uint(0),
            ParamId::LastFullChargeDate => V::DateTime(0),
            ParamId::ProfileName => V::Text("FACTORY".to_string()),
            ParamId::AopStatus => V::Uint(0),
            ParamId::ArgosAopDate => V::DateTime(1_633_646_474),
            ParamId::ArgosFreq => V::Float(401.65),
            ParamId::ArgosPower => V::ArgosPower(ArgosPower::Mw350),
            ParamId::TrNom => V::Uint(60),
            ParamId::ArgosMode => V::ArgosMode(ArgosMode::Legacy),
            ParamId::NtryPerMessage => V::Uint(0),
            ParamId::DutyCycle => V::Uint(0),
            ParamId::GnssEn => V::Bool(true),
            ParamId::DlocArgNom => V::Uint(10 * 60),
            ParamId::ArgosDepthPile => V::DepthPile(DepthPile::D16),
            ParamId::GpsConstSelect => V::Uint(0),
            ParamId::GlonassConstSelect => V::Uint(0),
            ParamId::GnssHdopFiltEn => V::Bool(true),
            ParamId::GnssHdopFiltThr => V::Uint(2),
            ParamId::GnssAcqTimeout => V::Uint(120),
            ParamId::GnssNtry => V::Uint(0),
            ParamId::UnderwaterEn => V::Bool(false),
            ParamId::DryTimeBeforeTx => V::Uint(1),
            ParamId::SamplingUnderFreq => V::Uint(60),
            ParamId::LbEn => V::Bool(false),
            ParamId::LbThreshold => V::Uint(10),
            ParamId::LbArgosPower => V::ArgosPower(ArgosPower::Mw350),
            ParamId::TrLb => V::Uint(240),
            ParamId::LbArgosMode => V::ArgosMode(ArgosMode::Legacy),
            ParamId::LbArgosDutyCycle => V::Uint(0),
            ParamId::LbGnssEn => V::Bool(true),
            ParamId::DlocArgLb => V::Uint(60 * 60),
            ParamId::LbGnssHdopFiltThr => V::Uint(2),
            ParamId::LbArgosDepthPile => V::DepthPile(DepthPile::D1),
            ParamId::LbGnssAcqTimeout => V::Uint(120),
            ParamId::SamplingSurfFreq => V::Uint(60),
            ParamId::PpMinElevation => V::Float(15.0),
            ParamId::PpMaxElevation => V::Float(90.0),
            ParamId::PpMinDuration => V::Uint(30),
            ParamId::PpMaxPasses => V::Uint(1000),
            ParamId::PpLinearMargin => V::Uint(300),
            ParamId::PpCompStep => V::Uint(10),
            ParamId::GnssColdAcqTimeout => V::Uint(530),
            ParamId::GnssFixMode => V::GnssFixMode(GnssFixMode::Auto),
            ParamId::GnssDynModel => V::GnssDynModel(GnssDynModel::Portable),
            ParamId::GnssHaccFiltEn => V::Bool(true),
            ParamId::GnssHaccFiltThr => V::Uint(5),
            ParamId::GnssMinNumFixes => V::Uint(1),
            ParamId::GnssColdStartRetryPeriod => V::Uint(60),
            ParamId::ArgosTimeSyncBurstEn => V::Bool(true),
            ParamId::LedMode => V::LedMode(LedMode::Hrs24),
            ParamId::ArgosTxJitterEn => V::Bool(true),
            ParamId::ArgosRxEn => V::Bool(true),
            ParamId::ArgosRxMaxWindow => V::Uint(15 * 60),
            ParamId::ArgosRxAopUpdatePeriod => V::Uint(90),
            ParamId::ArgosRxCounter => V::Uint(0),
            ParamId::ArgosRxTime => V::Uint(0),
            ParamId::GnssAssistNowEn => V::Bool(true),
            ParamId::LbGnssHaccFiltThr => V::Uint(5),
            ParamId::LbNtryPerMessage => V::Uint(4),
            ParamId::ZoneType => V::ZoneType(ZoneType::Circle),
            ParamId::ZoneEnableOutOfZoneDetectionMode => V::Bool(false),
            ParamId::ZoneEnableActivationDate => V::Bool(true),
            ParamId::ZoneActivationDate => V::DateTime(1_577_836_800),
            ParamId::ZoneArgosDepthPile => V::DepthPile(DepthPile::D1),
            ParamId::ZoneArgosPower => V::ArgosPower(ArgosPower::Mw350),
            ParamId::ZoneArgosRepetitionSeconds => V::Uint(240),
            ParamId::ZoneArgosMode => V::ArgosMode(ArgosMode::Legacy),
            ParamId::ZoneArgosDutyCycle => V::Uint(0xFF_FFFF),
            ParamId::ZoneArgosNtryPerMessage => V::Uint(0),
            ParamId::ZoneGnssDeltaArgLocArgosSeconds => V::Uint(3600),
            ParamId::ZoneGnssHdopFiltThr => V::Uint(2),
            ParamId::ZoneGnssHaccFiltThr => V::Uint(5),
            ParamId::ZoneGnssAcqTimeout => V::Uint(240),
            ParamId::ZoneCenterLongitude => V::Float(-123.3925),
            ParamId::ZoneCenterLatitude => V::Float(-48.8752),
            ParamId::ZoneRadius => V::Uint(1000),
            ParamId::CertTxEnable => V::Bool(false),
            ParamId::CertTxPayload => {
                V::Text("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF".to_string())
            },
            ParamId::CertTxModulation => V::ArgosModulation(ArgosModulation::A2),
            ParamId::CertTxRepetition => V::Uint(60),
            ParamId::HwVersion => V::Text(String::new()),
            ParamId::BattVoltage => V::Float(0.0),
            ParamId::ArgosTcxoWarmupTime => V::Uint(5),
            ParamId::DeviceDecId => V::Uint(0),
            ParamId::GnssTriggerOnSurfaced => V::Bool(true),
            ParamId::GnssTriggerOnAxlWakeup => V::Bool(false),
            ParamId::UnderwaterDetectSource => V::UnderwaterSource(UnderwaterSource::Sws),
            ParamId::UnderwaterDetectThresh => V::Float(1.1),
            ParamId::PhSensorEnable => V::Bool(false),
            ParamId::PhSensorPeriodic => V::Uint(0),
            ParamId::PhSensorValue => V::Float(0.0),
            ParamId::SeaTempSensorEnable => V::Bool(false),
            ParamId::SeaTempSensorPeriodic => V::Uint(0),
            ParamId::SeaTempSensorValue => V::Float(0.0),
            ParamId::AlsSensorEnable => V::Bool(false),
            ParamId::AlsSensorPeriodic => V::Uint(0),
            ParamId::AlsSensorValue => V::Float(0.0),
            ParamId::CdtSensorEnable => V::Bool(false),
            ParamId::CdtSensorPeriodic => V::Uint(0),
            ParamId::CdtSensorConductivity => V::Float(0.0),
            ParamId::CdtSensorDepth => V::Float(0.0),
            ParamId::CdtSensorTemperature => V::Float(0.0),
            ParamId::ExtLedMode => V::LedMode(LedMode::Always),
            ParamId::AxlSensorEnable => V::Bool(false),
            ParamId::AxlSensorPeriodic => V::Uint(0),
            ParamId::AxlSensorWakeupThreshold => V::Float(0.0),
            ParamId::AxlSensorWakeupSamples => V::Uint(5),
            ParamId::PressureSensorEnable => V::Bool(false),
            ParamId::PressureSensorPeriodic => V::Uint(0),
            ParamId::DebugOutputMode => V::DebugMode(DebugMode::Uart),
            ParamId::GnssAssistNowOfflineEn => V::Bool(false),
            ParamId::WchgStatus => V::Text(String::new()),
            ParamId::UwMaxSamples => V::Uint(5),
            ParamId::UwMinDrySamples => V::Uint(1),
            ParamId::UwSampleGap => V::Uint(1000),
            ParamId::UwPinSampleDelay => V::Uint(1),
            ParamId::UwDiveModeEnable => V::Bool(true),
            ParamId::UwDiveModeStartTime => V::Uint(0),
            ParamId::UwGnssDrySampling => V::Uint(4 * 3600),
            ParamId::UwGnssWetSampling => V::Uint(4 * 3600),
            ParamId::UwGnssMaxSamples => V::Uint(10),
            ParamId::UwGnssMinDrySamples => V::Uint(1),
            ParamId::UwGnssDetectThresh => V::Uint(1),
            ParamId::LbCriticalThresh => V::Float(2.8),
            ParamId::PressureSensorLoggingMode => V::PressureLogMode(PressureLogMode::Always),
            ParamId::GnssTriggerColdStartOnSurfaced => V::Bool(false),
            ParamId::SeaTempSensorEnableTxMode => V::SensorTxMode(SensorTxMode::Off),
            ParamId::SeaTempSensorEnableTxMaxSamples => V::Uint(1),
            ParamId::SeaTempSensorEnableTxSamplePeriod => V::Uint(1000),
            ParamId::PhSensorEnableTxMode => V::SensorTxMode(SensorTxMode::Off),
            ParamId::PhSensorEnableTxMaxSamples => V::Uint(1),
            ParamId::PhSensorEnableTxSamplePeriod => V::Uint(1000),
            ParamId::AlsSensorEnableTxMode => V::SensorTxMode(SensorTxMode::Off),
            ParamId::AlsSensorEnableTxMaxSamples => V::Uint(1),
            ParamId::AlsSensorEnableTxSamplePeriod => V::Uint(1000),
            ParamId::PressureSensorEnableTxMode => V::SensorTxMode(SensorTxMode::Off),
            ParamId::PressureSensorEnableTxMaxSamples => V::Uint(1),
            ParamId::PressureSensorEnableTxSamplePeriod => V::Uint(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_five_chars_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for &id in ParamId::ALL {
            let key = id.meta().key;
            assert_eq!(key.len(), 5, "bad key length for {:?}", id);
            assert!(seen.insert(key), "duplicate key {key}");
        }
    }

    #[test]
    fn key_lookup_roundtrip() {
        for &id in ParamId::ALL {
            assert_eq!(ParamId::from_key(id.meta().key), Some(id));
        }
        assert_eq!(ParamId::from_key("ZZZ99"), None);
    }

    #[test]
    fn technical_keys_are_read_only_values() {
        assert!(ParamId::TxCounter.is_technical());
        assert!(!ParamId::TxCounter.meta().writable);
        assert!(!ParamId::TrNom.is_technical());
        assert!(ParamId::TrNom.meta().writable);
    }

    #[test]
    fn defaults_match_declared_arms() {
        for &id in ParamId::ALL {
            let v = id.default_value();
            // A second conversion through the typed accessors must succeed
            // for the declared arm.
            match v {
                ParamValue::Uint(x) => assert_eq!(u32::from_value(&id.default_value()), Some(x)),
                ParamValue::Text(ref s) => {
                    assert_eq!(String::from_value(&id.default_value()).as_deref(), Some(s.as_str()));
                },
                _ => {},
            }
        }
    }

    #[test]
    fn delta_time_loc_staircase_boundaries() {
        assert_eq!(DeltaTimeLoc::from_period_secs(29 * 60), DeltaTimeLoc::T10Min);
        assert_eq!(DeltaTimeLoc::from_period_secs(30 * 60), DeltaTimeLoc::T30Min);
        assert_eq!(DeltaTimeLoc::from_period_secs(15 * 60), DeltaTimeLoc::T15Min);
        assert_eq!(DeltaTimeLoc::from_period_secs(3600), DeltaTimeLoc::T1Hr);
        assert_eq!(DeltaTimeLoc::from_period_secs(24 * 3600), DeltaTimeLoc::T24Hr);
        assert_eq!(DeltaTimeLoc::from_period_secs(0), DeltaTimeLoc::T10Min);
    }
}
