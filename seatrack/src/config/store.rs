//! The configuration store and its mode-dependent runtime projections.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::{debug, info, trace, warn};

use crate::codec::haversine::haversine_distance;
use crate::config::aop;
use crate::config::params::{
    ArgosMode, ArgosModulation, ArgosPower, DeltaTimeLoc, DepthPile, GnssDynModel, GnssFixMode,
    ParamConvert, ParamId, ParamValue, ZoneType, FW_APP_VERSION_STR,
};
use crate::constants::CONFIG_VERSION_CODE;
use crate::error::ConfigError;
use crate::hal::{BatteryGauge, ConfigPersistence, SensorHub, SensorKind, WirelessCharger};
use crate::logging::GpsInfo;
use crate::prepass::PassPredict;
use crate::timeutil::CalendarTime;

/// Active configuration profile, observable only through the projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Normal,
    LowBattery,
    OutOfZone,
}

bitflags! {
    /// Per-sensor "piggy-back on transmissions" mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SensorTxFlags: u32 {
        const PH = 0x01;
        const SEA_TEMP = 0x02;
        const ALS = 0x04;
        const PRESSURE = 0x08;
    }
}

/// Runtime GNSS configuration projected from the active profile.
#[derive(Debug, Clone, PartialEq)]
pub struct GnssConfig {
    pub enable: bool,
    pub hdop_filter_enable: bool,
    pub hdop_filter_threshold: u32,
    pub hacc_filter_enable: bool,
    pub hacc_filter_threshold: u32,
    pub acquisition_timeout_cold_start: u32,
    pub acquisition_timeout: u32,
    pub dloc_arg_nom: u32,
    pub underwater_en: bool,
    pub battery_voltage: u16,
    pub fix_mode: GnssFixMode,
    pub dyn_model: GnssDynModel,
    pub is_out_of_zone: bool,
    pub is_lb: bool,
    pub min_num_fixes: u32,
    pub cold_start_retry_period: u32,
    pub assistnow_enable: bool,
    pub trigger_on_surfaced: bool,
    pub assistnow_offline_enable: bool,
}

/// Runtime Argos configuration projected from the active profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgosConfig {
    pub tx_counter: u32,
    pub frequency: f64,
    pub power: ArgosPower,
    pub tr_nom: u32,
    pub mode: ArgosMode,
    pub ntry_per_message: u32,
    pub duty_cycle: u32,
    pub depth_pile: DepthPile,
    pub delta_time_loc: DeltaTimeLoc,
    pub dry_time_before_tx: u32,
    pub argos_id: u32,
    pub underwater_en: bool,
    pub prepass_min_elevation: f64,
    pub prepass_max_elevation: f64,
    pub prepass_min_duration: u32,
    pub prepass_max_passes: u32,
    pub prepass_linear_margin: u32,
    pub prepass_comp_step: u32,
    pub is_out_of_zone: bool,
    pub is_lb: bool,
    pub time_sync_burst_en: bool,
    pub argos_tx_jitter_en: bool,
    pub argos_rx_en: bool,
    pub argos_rx_max_window: u32,
    pub gnss_en: bool,
    pub argos_rx_aop_update_period: u32,
    pub last_aop_update: i64,
    pub cert_tx_enable: bool,
    pub cert_tx_payload: String,
    pub cert_tx_modulation: ArgosModulation,
    pub cert_tx_repetition: u32,
    pub argos_tcxo_warmup_time: u32,
    pub sensor_tx_enable: SensorTxFlags,
}

impl Default for ArgosConfig {
    /// Factory-default profile values.
    fn default() -> Self {
        Self {
            tx_counter: 0,
            frequency: 401.65,
            power: ArgosPower::Mw350,
            tr_nom: 60,
            mode: ArgosMode::Legacy,
            ntry_per_message: 0,
            duty_cycle: 0,
            depth_pile: DepthPile::D16,
            delta_time_loc: DeltaTimeLoc::T10Min,
            dry_time_before_tx: 1,
            argos_id: 0,
            underwater_en: false,
            prepass_min_elevation: 15.0,
            prepass_max_elevation: 90.0,
            prepass_min_duration: 30,
            prepass_max_passes: 1000,
            prepass_linear_margin: 300,
            prepass_comp_step: 10,
            is_out_of_zone: false,
            is_lb: false,
            time_sync_burst_en: true,
            argos_tx_jitter_en: true,
            argos_rx_en: true,
            argos_rx_max_window: 15 * 60,
            gnss_en: true,
            argos_rx_aop_update_period: 90,
            last_aop_update: 0,
            cert_tx_enable: false,
            cert_tx_payload: String::new(),
            cert_tx_modulation: ArgosModulation::A2,
            cert_tx_repetition: 60,
            argos_tcxo_warmup_time: 5,
            sensor_tx_enable: SensorTxFlags::empty(),
        }
    }
}

/// Live inputs for the computed-on-read parameters.
pub struct Dynamics {
    pub gauge: Rc<RefCell<dyn BatteryGauge>>,
    pub charger: Option<Rc<RefCell<dyn WirelessCharger>>>,
    pub sensors: SensorHub,
    pub hardware_version: String,
    pub device_id: u32,
}

/// Typed, persisted parameter store.
pub struct ConfigStore {
    params: Vec<ParamValue>,
    valid: bool,
    last_mode: ConfigMode,
    last_gps: Option<GpsInfo>,
    battery_voltage_mv: u16,
    battery_level: u8,
    battery_low: bool,
    pass_predict: PassPredict,
    persistence: Box<dyn ConfigPersistence>,
    dynamics: Dynamics,
}

impl ConfigStore {
    pub fn new(persistence: Box<dyn ConfigPersistence>, dynamics: Dynamics) -> Self {
        Self {
            params: ParamId::ALL.iter().map(|id| id.default_value()).collect(),
            valid: false,
            last_mode: ConfigMode::Normal,
            last_gps: None,
            battery_voltage_mv: 0,
            battery_level: 0,
            battery_low: false,
            pass_predict: aop::default_pass_predict(),
            persistence,
            dynamics,
        }
    }

    /// Load the persisted parameter set, falling back to factory defaults
    /// with the store marked invalid.
    pub fn init(&mut self) {
        match self.persistence.load_params() {
            Some(blob) => match decode_params(&blob) {
                Some(params) => {
                    self.params = params;
                    self.valid = true;
                    info!("configuration store loaded from persisted image");
                },
                None => {
                    warn!("persisted configuration rejected, using factory defaults");
                    self.reset_to_defaults();
                    self.valid = false;
                },
            },
            None => {
                info!("no persisted configuration, using factory defaults");
                self.reset_to_defaults();
                self.valid = false;
            },
        }

        if let Some(blob) = self.persistence.load_pass_predict() {
            if let Some(pp) = aop::decode_pass_predict(&blob) {
                self.pass_predict = pp;
            } else {
                warn!("persisted pass-predict table rejected, keeping factory table");
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    fn reset_to_defaults(&mut self) {
        self.params = ParamId::ALL.iter().map(|id| id.default_value()).collect();
    }

    /// Restore defaults, persist them, and mark the store valid.
    pub fn factory_reset(&mut self) -> Result<(), ConfigError> {
        info!("factory reset");
        self.reset_to_defaults();
        self.pass_predict = aop::default_pass_predict();
        self.valid = true;
        self.save()?;
        self.persistence
            .save_pass_predict(&aop::encode_pass_predict(&self.pass_predict))
            .map_err(|_| ConfigError::StoreCorrupted)?;
        Ok(())
    }

    /// Commit the parameter set to persistence.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        let blob = encode_params(&self.params);
        self.persistence
            .save_params(&blob)
            .map_err(|_| ConfigError::StoreCorrupted)
    }

    fn refresh_dynamic(&mut self, id: ParamId) -> bool {
        let idx = id as usize;
        match id {
            ParamId::BattSoc => {
                self.update_battery_level();
                self.params[idx] = ParamValue::Uint(u32::from(self.battery_level));
            },
            ParamId::BattVoltage => {
                self.update_battery_level();
                self.params[idx] = ParamValue::Float(f64::from(self.battery_voltage_mv) / 1000.0);
            },
            ParamId::FwAppVersion => {
                self.params[idx] = ParamValue::Text(FW_APP_VERSION_STR.to_string());
            },
            ParamId::HwVersion => {
                self.params[idx] = ParamValue::Text(self.dynamics.hardware_version.clone());
            },
            ParamId::DeviceModel => {
                self.params[idx] =
                    ParamValue::Text(crate::config::params::DEVICE_MODEL_NAME.to_string());
            },
            ParamId::DeviceDecId => {
                self.params[idx] = ParamValue::Uint(self.dynamics.device_id);
            },
            ParamId::ArgosDecId | ParamId::ArgosHexId => {},
            ParamId::PhSensorValue => self.refresh_sensor_value(idx, SensorKind::Ph, 0),
            ParamId::SeaTempSensorValue => self.refresh_sensor_value(idx, SensorKind::SeaTemp, 0),
            ParamId::AlsSensorValue => self.refresh_sensor_value(idx, SensorKind::Als, 1),
            ParamId::CdtSensorConductivity => self.refresh_sensor_value(idx, SensorKind::Cdt, 0),
            ParamId::CdtSensorDepth => self.refresh_sensor_value(idx, SensorKind::Cdt, 1),
            ParamId::CdtSensorTemperature => self.refresh_sensor_value(idx, SensorKind::Cdt, 2),
            ParamId::WchgStatus => {
                let status = self
                    .dynamics
                    .charger
                    .as_ref()
                    .and_then(|c| c.borrow_mut().chip_status())
                    .unwrap_or_else(|| "NOTFITTED".to_string());
                self.params[idx] = ParamValue::Text(status);
            },
            _ => return false,
        }
        true
    }

    fn refresh_sensor_value(&mut self, idx: usize, kind: SensorKind, channel: usize) {
        let value = self
            .dynamics
            .sensors
            .read(kind, channel)
            .unwrap_or(f64::NAN);
        self.params[idx] = ParamValue::Float(value);
    }

    /// Untyped read; dynamic parameters are refreshed and always available.
    pub fn read_value(&mut self, id: ParamId) -> Result<ParamValue, ConfigError> {
        let dynamic = self.refresh_dynamic(id);
        if !dynamic && !self.valid {
            return Err(ConfigError::StoreCorrupted);
        }
        Ok(self.params[id as usize].clone())
    }

    /// Typed read through the declared arm.
    pub fn read<T: ParamConvert>(&mut self, id: ParamId) -> Result<T, ConfigError> {
        let value = self.read_value(id)?;
        T::from_value(&value).ok_or(ConfigError::WrongType {
            param: id.meta().name,
        })
    }

    /// Untyped write; the value must match the declared arm.
    pub fn write_value(&mut self, id: ParamId, value: ParamValue) -> Result<(), ConfigError> {
        if !self.valid {
            return Err(ConfigError::StoreCorrupted);
        }
        if core::mem::discriminant(&value) != core::mem::discriminant(&id.default_value()) {
            return Err(ConfigError::WrongType {
                param: id.meta().name,
            });
        }
        self.params[id as usize] = value;
        Ok(())
    }

    /// Typed write.
    pub fn write<T: ParamConvert>(&mut self, id: ParamId, value: T) -> Result<(), ConfigError> {
        self.write_value(id, value.into_value())
    }

    pub fn increment_tx_counter(&mut self) -> Result<(), ConfigError> {
        let counter: u32 = self.read(ParamId::TxCounter)?;
        self.write(ParamId::TxCounter, counter + 1)
    }

    pub fn increment_rx_counter(&mut self) -> Result<(), ConfigError> {
        let counter: u32 = self.read(ParamId::ArgosRxCounter)?;
        self.write(ParamId::ArgosRxCounter, counter + 1)
    }

    pub fn increment_rx_time(&mut self, inc_secs: u32) -> Result<(), ConfigError> {
        let time: u32 = self.read(ParamId::ArgosRxTime)?;
        self.write(ParamId::ArgosRxTime, time + inc_secs)
    }

    pub fn read_pass_predict(&self) -> &PassPredict {
        &self.pass_predict
    }

    pub fn write_pass_predict(&mut self, pp: PassPredict) -> Result<(), ConfigError> {
        self.pass_predict = pp;
        self.persistence
            .save_pass_predict(&aop::encode_pass_predict(&self.pass_predict))
            .map_err(|_| ConfigError::StoreCorrupted)
    }

    /// Record the latest GNSS fix for zone evaluation and prepass seeding.
    pub fn notify_gps_location(&mut self, info: &GpsInfo) {
        self.last_gps = Some(*info);
    }

    pub fn last_gps_location(&self) -> Option<&GpsInfo> {
        self.last_gps.as_ref()
    }

    fn update_battery_level(&mut self) {
        let mut gauge = self.dynamics.gauge.borrow_mut();
        self.battery_voltage_mv = gauge.voltage_mv();
        self.battery_level = gauge.level_percent();
        let threshold = match &self.params[ParamId::LbThreshold as usize] {
            ParamValue::Uint(v) => *v,
            _ => 10,
        };
        self.battery_low = u32::from(self.battery_level) <= threshold;
    }

    pub fn battery_voltage_mv(&mut self) -> u16 {
        self.update_battery_level();
        self.battery_voltage_mv
    }

    pub fn is_battery_level_low(&mut self) -> bool {
        self.update_battery_level();
        self.battery_low
    }

    /// Zone-exclusion criterion: enabled circular zone, valid last fix past
    /// the activation date, and a fix further than the zone radius from the
    /// zone centre.
    pub fn is_zone_exclusion(&mut self) -> bool {
        let enabled = self
            .read::<bool>(ParamId::ZoneEnableOutOfZoneDetectionMode)
            .unwrap_or(false);
        let zone_type = self
            .read::<ZoneType>(ParamId::ZoneType)
            .unwrap_or(ZoneType::Circle);
        let Some(fix) = self.last_gps.filter(|g| g.valid) else {
            return false;
        };
        if !enabled || zone_type != ZoneType::Circle {
            return false;
        }

        trace!("zone exclusion enabled with valid GPS fix");

        let activation_enabled = self
            .read::<bool>(ParamId::ZoneEnableActivationDate)
            .unwrap_or(true);
        let activation_date = self
            .read::<i64>(ParamId::ZoneActivationDate)
            .unwrap_or(0);
        let fix_time =
            CalendarTime::new(fix.year, fix.month, fix.day, fix.hour, fix.min, 0).to_epoch();
        let activated = !activation_enabled || fix_time.is_some_and(|t| activation_date <= t);
        if !activated {
            return false;
        }

        let center_lon = self.read::<f64>(ParamId::ZoneCenterLongitude).unwrap_or(0.0);
        let center_lat = self.read::<f64>(ParamId::ZoneCenterLatitude).unwrap_or(0.0);
        let radius_m = self.read::<u32>(ParamId::ZoneRadius).unwrap_or(0);

        let d_km = haversine_distance(center_lon, center_lat, fix.lon, fix.lat);
        let out = d_km > f64::from(radius_m) / 1000.0;
        debug!(d_km, out, "zone exclusion evaluated");
        out
    }

    fn note_mode(&mut self, mode: ConfigMode) {
        if self.last_mode != mode {
            info!(?mode, "configuration mode change");
            self.last_mode = mode;
        }
    }

    pub fn last_config_mode(&self) -> ConfigMode {
        self.last_mode
    }

    /// Project the GNSS runtime configuration from the active profile.
    pub fn gnss_configuration(&mut self) -> Result<GnssConfig, ConfigError> {
        let cert_tx_enable: bool = self.read(ParamId::CertTxEnable)?;
        let lb_en: bool = self.read(ParamId::LbEn)?;
        self.update_battery_level();

        let is_out_of_zone = self.is_zone_exclusion();
        let is_lb = lb_en && self.battery_low;

        let (dloc, acq_timeout, hdop_thr, hacc_thr, enable) = if is_lb {
            self.note_mode(ConfigMode::LowBattery);
            (
                self.read::<u32>(ParamId::DlocArgLb)?,
                self.read::<u32>(ParamId::LbGnssAcqTimeout)?,
                self.read::<u32>(ParamId::LbGnssHdopFiltThr)?,
                self.read::<u32>(ParamId::LbGnssHaccFiltThr)?,
                self.read::<bool>(ParamId::LbGnssEn)?,
            )
        } else if is_out_of_zone {
            self.note_mode(ConfigMode::OutOfZone);
            (
                self.read::<u32>(ParamId::ZoneGnssDeltaArgLocArgosSeconds)?,
                self.read::<u32>(ParamId::ZoneGnssAcqTimeout)?,
                self.read::<u32>(ParamId::ZoneGnssHdopFiltThr)?,
                self.read::<u32>(ParamId::ZoneGnssHaccFiltThr)?,
                self.read::<bool>(ParamId::GnssEn)?,
            )
        } else {
            self.note_mode(ConfigMode::Normal);
            (
                self.read::<u32>(ParamId::DlocArgNom)?,
                self.read::<u32>(ParamId::GnssAcqTimeout)?,
                self.read::<u32>(ParamId::GnssHdopFiltThr)?,
                self.read::<u32>(ParamId::GnssHaccFiltThr)?,
                self.read::<bool>(ParamId::GnssEn)?,
            )
        };

        let mut config = GnssConfig {
            enable,
            hdop_filter_enable: self.read(ParamId::GnssHdopFiltEn)?,
            hdop_filter_threshold: hdop_thr,
            hacc_filter_enable: self.read(ParamId::GnssHaccFiltEn)?,
            hacc_filter_threshold: hacc_thr,
            acquisition_timeout_cold_start: self.read(ParamId::GnssColdAcqTimeout)?,
            acquisition_timeout: acq_timeout,
            dloc_arg_nom: dloc,
            underwater_en: self.read(ParamId::UnderwaterEn)?,
            battery_voltage: self.battery_voltage_mv,
            fix_mode: self.read(ParamId::GnssFixMode)?,
            dyn_model: self.read(ParamId::GnssDynModel)?,
            is_out_of_zone,
            is_lb,
            min_num_fixes: self.read(ParamId::GnssMinNumFixes)?,
            cold_start_retry_period: self.read(ParamId::GnssColdStartRetryPeriod)?,
            assistnow_enable: self.read(ParamId::GnssAssistNowEn)?,
            trigger_on_surfaced: self.read(ParamId::GnssTriggerOnSurfaced)?,
            assistnow_offline_enable: self.read(ParamId::GnssAssistNowOfflineEn)?,
        };

        // Certification transmissions own the radio; force GNSS off
        if cert_tx_enable {
            trace!("certification TX enabled, disabling GNSS");
            config.enable = false;
        }

        Ok(config)
    }

    /// Project the Argos runtime configuration from the active profile.
    pub fn argos_configuration(&mut self) -> Result<ArgosConfig, ConfigError> {
        let lb_en: bool = self.read(ParamId::LbEn)?;
        self.update_battery_level();

        let is_out_of_zone = self.is_zone_exclusion();
        let is_lb = lb_en && self.battery_low;

        let (mode, depth_pile, duty_cycle, ntry, power, tr_nom, dloc) = if is_lb {
            self.note_mode(ConfigMode::LowBattery);
            (
                self.read::<ArgosMode>(ParamId::LbArgosMode)?,
                self.read::<DepthPile>(ParamId::LbArgosDepthPile)?,
                self.read::<u32>(ParamId::LbArgosDutyCycle)?,
                self.read::<u32>(ParamId::LbNtryPerMessage)?,
                self.read::<ArgosPower>(ParamId::LbArgosPower)?,
                self.read::<u32>(ParamId::TrLb)?,
                self.read::<u32>(ParamId::DlocArgLb)?,
            )
        } else if is_out_of_zone {
            self.note_mode(ConfigMode::OutOfZone);
            (
                self.read::<ArgosMode>(ParamId::ZoneArgosMode)?,
                self.read::<DepthPile>(ParamId::ZoneArgosDepthPile)?,
                self.read::<u32>(ParamId::ZoneArgosDutyCycle)?,
                self.read::<u32>(ParamId::ZoneArgosNtryPerMessage)?,
                self.read::<ArgosPower>(ParamId::ZoneArgosPower)?,
                self.read::<u32>(ParamId::ZoneArgosRepetitionSeconds)?,
                self.read::<u32>(ParamId::ZoneGnssDeltaArgLocArgosSeconds)?,
            )
        } else {
            self.note_mode(ConfigMode::Normal);
            (
                self.read::<ArgosMode>(ParamId::ArgosMode)?,
                self.read::<DepthPile>(ParamId::ArgosDepthPile)?,
                self.read::<u32>(ParamId::DutyCycle)?,
                self.read::<u32>(ParamId::NtryPerMessage)?,
                self.read::<ArgosPower>(ParamId::ArgosPower)?,
                self.read::<u32>(ParamId::TrNom)?,
                self.read::<u32>(ParamId::DlocArgNom)?,
            )
        };

        let cert_tx_enable: bool = self.read(ParamId::CertTxEnable)?;
        let mut gnss_en: bool = self.read(ParamId::GnssEn)?;
        if cert_tx_enable {
            gnss_en = false;
        }

        let mut sensor_tx_enable = SensorTxFlags::empty();
        if gnss_en {
            use crate::config::params::SensorTxMode;
            let mut probe = |enable_id, mode_id, flag| -> Result<(), ConfigError> {
                let enabled: bool = self.read(enable_id)?;
                let tx_mode: SensorTxMode = self.read(mode_id)?;
                if enabled && tx_mode != SensorTxMode::Off {
                    sensor_tx_enable |= flag;
                }
                Ok(())
            };
            probe(
                ParamId::PhSensorEnable,
                ParamId::PhSensorEnableTxMode,
                SensorTxFlags::PH,
            )?;
            probe(
                ParamId::SeaTempSensorEnable,
                ParamId::SeaTempSensorEnableTxMode,
                SensorTxFlags::SEA_TEMP,
            )?;
            probe(
                ParamId::AlsSensorEnable,
                ParamId::AlsSensorEnableTxMode,
                SensorTxFlags::ALS,
            )?;
            probe(
                ParamId::PressureSensorEnable,
                ParamId::PressureSensorEnableTxMode,
                SensorTxFlags::PRESSURE,
            )?;
        }

        Ok(ArgosConfig {
            tx_counter: self.read(ParamId::TxCounter)?,
            frequency: self.read(ParamId::ArgosFreq)?,
            power,
            tr_nom,
            mode,
            ntry_per_message: ntry,
            duty_cycle,
            depth_pile,
            delta_time_loc: DeltaTimeLoc::from_period_secs(dloc),
            dry_time_before_tx: self.read(ParamId::DryTimeBeforeTx)?,
            argos_id: self.read(ParamId::ArgosHexId)?,
            underwater_en: self.read(ParamId::UnderwaterEn)?,
            prepass_min_elevation: self.read(ParamId::PpMinElevation)?,
            prepass_max_elevation: self.read(ParamId::PpMaxElevation)?,
            prepass_min_duration: self.read(ParamId::PpMinDuration)?,
            prepass_max_passes: self.read(ParamId::PpMaxPasses)?,
            prepass_linear_margin: self.read(ParamId::PpLinearMargin)?,
            prepass_comp_step: self.read(ParamId::PpCompStep)?,
            is_out_of_zone,
            is_lb,
            time_sync_burst_en: self.read(ParamId::ArgosTimeSyncBurstEn)?,
            argos_tx_jitter_en: self.read(ParamId::ArgosTxJitterEn)?,
            argos_rx_en: self.read(ParamId::ArgosRxEn)?,
            argos_rx_max_window: self.read(ParamId::ArgosRxMaxWindow)?,
            gnss_en,
            argos_rx_aop_update_period: self.read(ParamId::ArgosRxAopUpdatePeriod)?,
            last_aop_update: self.read(ParamId::ArgosAopDate)?,
            cert_tx_enable,
            cert_tx_payload: self.read(ParamId::CertTxPayload)?,
            cert_tx_modulation: self.read(ParamId::CertTxModulation)?,
            cert_tx_repetition: self.read(ParamId::CertTxRepetition)?,
            argos_tcxo_warmup_time: self.read(ParamId::ArgosTcxoWarmupTime)?,
            sensor_tx_enable,
        })
    }
}

fn encode_params(params: &[ParamValue]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1024);
    out.extend_from_slice(&CONFIG_VERSION_CODE.to_le_bytes());
    for value in params {
        match value {
            ParamValue::Uint(v) => out.extend_from_slice(&v.to_le_bytes()),
            ParamValue::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            ParamValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            ParamValue::DateTime(v) => out.extend_from_slice(&v.to_le_bytes()),
            ParamValue::Bool(v) => out.push(u8::from(*v)),
            ParamValue::Text(s) => {
                out.extend_from_slice(&(s.len() as u16).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            },
            ParamValue::ArgosMode(v) => out.push(*v as u8),
            ParamValue::ArgosPower(v) => out.push(*v as u8),
            ParamValue::DepthPile(v) => out.push(*v as u8),
            ParamValue::GnssFixMode(v) => out.push(*v as u8),
            ParamValue::GnssDynModel(v) => out.push(*v as u8),
            ParamValue::LedMode(v) => out.push(*v as u8),
            ParamValue::ZoneType(v) => out.push(*v as u8),
            ParamValue::SensorTxMode(v) => out.push(*v as u8),
            ParamValue::UnderwaterSource(v) => out.push(*v as u8),
            ParamValue::ArgosModulation(v) => out.push(*v as u8),
            ParamValue::PressureLogMode(v) => out.push(*v as u8),
            ParamValue::DebugMode(v) => out.push(*v as u8),
        }
    }
    out
}

fn decode_params(blob: &[u8]) -> Option<Vec<ParamValue>> {
    use crate::config::params::{
        ArgosModulation, DebugMode, GnssDynModel, GnssFixMode, LedMode, PressureLogMode,
        SensorTxMode, UnderwaterSource, ZoneType,
    };

    if blob.len() < 4 {
        return None;
    }
    let version = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
    if version != CONFIG_VERSION_CODE {
        return None;
    }

    fn take<'a>(blob: &'a [u8], pos: &mut usize, n: usize) -> Option<&'a [u8]> {
        if *pos + n > blob.len() {
            return None;
        }
        let s = &blob[*pos..*pos + n];
        *pos += n;
        Some(s)
    }

    let mut pos = 4usize;
    let mut params = Vec::with_capacity(ParamId::ALL.len());
    for id in ParamId::ALL {
        let value = match id.default_value() {
            ParamValue::Uint(_) => {
                ParamValue::Uint(u32::from_le_bytes(take(blob, &mut pos, 4)?.try_into().ok()?))
            },
            ParamValue::Int(_) => ParamValue::Int(i32::from_le_bytes(take(blob, &mut pos, 4)?.try_into().ok()?)),
            ParamValue::Float(_) => {
                ParamValue::Float(f64::from_le_bytes(take(blob, &mut pos, 8)?.try_into().ok()?))
            },
            ParamValue::DateTime(_) => {
                ParamValue::DateTime(i64::from_le_bytes(take(blob, &mut pos, 8)?.try_into().ok()?))
            },
            ParamValue::Bool(_) => ParamValue::Bool(take(blob, &mut pos, 1)?[0] != 0),
            ParamValue::Text(_) => {
                let len = u16::from_le_bytes(take(blob, &mut pos, 2)?.try_into().ok()?) as usize;
                ParamValue::Text(String::from_utf8(take(blob, &mut pos, len)?.to_vec()).ok()?)
            },
            ParamValue::ArgosMode(_) => {
                ParamValue::ArgosMode(ArgosMode::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::ArgosPower(_) => {
                ParamValue::ArgosPower(ArgosPower::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::DepthPile(_) => {
                ParamValue::DepthPile(DepthPile::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::GnssFixMode(_) => {
                ParamValue::GnssFixMode(GnssFixMode::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::GnssDynModel(_) => {
                ParamValue::GnssDynModel(GnssDynModel::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::LedMode(_) => ParamValue::LedMode(LedMode::from_u8(take(blob, &mut pos, 1)?[0])?),
            ParamValue::ZoneType(_) => ParamValue::ZoneType(ZoneType::from_u8(take(blob, &mut pos, 1)?[0])?),
            ParamValue::SensorTxMode(_) => {
                ParamValue::SensorTxMode(SensorTxMode::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::UnderwaterSource(_) => {
                ParamValue::UnderwaterSource(UnderwaterSource::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::ArgosModulation(_) => {
                ParamValue::ArgosModulation(ArgosModulation::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::PressureLogMode(_) => {
                ParamValue::PressureLogMode(PressureLogMode::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
            ParamValue::DebugMode(_) => {
                ParamValue::DebugMode(DebugMode::from_u8(take(blob, &mut pos, 1)?[0])?)
            },
        };
        params.push(value);
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilesystemError;

    struct FakeGauge {
        voltage: u16,
        level: u8,
    }

    impl BatteryGauge for FakeGauge {
        fn voltage_mv(&mut self) -> u16 {
            self.voltage
        }

        fn level_percent(&mut self) -> u8 {
            self.level
        }
    }

    #[derive(Default)]
    struct MemoryPersistence {
        params: Option<Vec<u8>>,
        pass_predict: Option<Vec<u8>>,
    }

    impl ConfigPersistence for MemoryPersistence {
        fn load_params(&mut self) -> Option<Vec<u8>> {
            self.params.clone()
        }

        fn save_params(&mut self, blob: &[u8]) -> Result<(), FilesystemError> {
            self.params = Some(blob.to_vec());
            Ok(())
        }

        fn load_pass_predict(&mut self) -> Option<Vec<u8>> {
            self.pass_predict.clone()
        }

        fn save_pass_predict(&mut self, blob: &[u8]) -> Result<(), FilesystemError> {
            self.pass_predict = Some(blob.to_vec());
            Ok(())
        }
    }

    pub(crate) fn test_store_with_gauge(voltage: u16, level: u8) -> ConfigStore {
        let dynamics = Dynamics {
            gauge: Rc::new(RefCell::new(FakeGauge { voltage, level })),
            charger: None,
            sensors: SensorHub::new(),
            hardware_version: "V3".to_string(),
            device_id: 1234,
        };
        let mut store = ConfigStore::new(Box::new(MemoryPersistence::default()), dynamics);
        store.init();
        store.factory_reset().unwrap();
        store
    }

    #[test]
    fn invalid_store_rejects_static_reads_but_serves_dynamic_ones() {
        let dynamics = Dynamics {
            gauge: Rc::new(RefCell::new(FakeGauge {
                voltage: 3900,
                level: 80,
            })),
            charger: None,
            sensors: SensorHub::new(),
            hardware_version: "V3".to_string(),
            device_id: 7,
        };
        let mut store = ConfigStore::new(Box::new(MemoryPersistence::default()), dynamics);
        store.init();
        assert!(!store.is_valid());
        assert_eq!(
            store.read::<u32>(ParamId::TrNom),
            Err(ConfigError::StoreCorrupted)
        );
        assert_eq!(store.read::<u32>(ParamId::BattSoc), Ok(80));
        assert_eq!(store.read::<u32>(ParamId::DeviceDecId), Ok(7));
    }

    #[test]
    fn write_then_read_roundtrips_until_factory_reset() {
        let mut store = test_store_with_gauge(4000, 90);
        store.write(ParamId::TrNom, 90u32).unwrap();
        assert_eq!(store.read::<u32>(ParamId::TrNom), Ok(90));
        store.factory_reset().unwrap();
        assert_eq!(store.read::<u32>(ParamId::TrNom), Ok(60));
    }

    #[test]
    fn wrong_arm_is_a_typed_error() {
        let mut store = test_store_with_gauge(4000, 90);
        assert!(matches!(
            store.write(ParamId::TrNom, 1.5f64),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(matches!(
            store.read::<bool>(ParamId::TrNom),
            Err(ConfigError::WrongType { .. })
        ));
    }

    #[test]
    fn persisted_image_roundtrips() {
        let mut store = test_store_with_gauge(4000, 90);
        store.write(ParamId::TrNom, 120u32).unwrap();
        store
            .write(ParamId::ProfileName, "DEPLOYED".to_string())
            .unwrap();
        store.save().unwrap();

        let blob = encode_params(&store.params);
        let decoded = decode_params(&blob).unwrap();
        assert_eq!(decoded[ParamId::TrNom as usize], ParamValue::Uint(120));
        assert_eq!(
            decoded[ParamId::ProfileName as usize],
            ParamValue::Text("DEPLOYED".to_string())
        );
    }

    #[test]
    fn low_battery_profile_takes_priority() {
        let mut store = test_store_with_gauge(3300, 5);
        store.write(ParamId::LbEn, true).unwrap();
        let config = store.argos_configuration().unwrap();
        assert!(config.is_lb);
        assert_eq!(config.tr_nom, 240);
        assert_eq!(config.depth_pile, DepthPile::D1);
        assert_eq!(store.last_config_mode(), ConfigMode::LowBattery);

        let gnss = store.gnss_configuration().unwrap();
        assert!(gnss.is_lb);
        assert_eq!(gnss.dloc_arg_nom, 3600);
    }

    #[test]
    fn zone_exclusion_selects_out_of_zone_profile() {
        let mut store = test_store_with_gauge(4000, 90);
        store
            .write(ParamId::ZoneEnableOutOfZoneDetectionMode, true)
            .unwrap();
        store.write(ParamId::ZoneCenterLongitude, 0.0f64).unwrap();
        store.write(ParamId::ZoneCenterLatitude, 0.0f64).unwrap();
        store.write(ParamId::ZoneRadius, 1000u32).unwrap();
        store.write(ParamId::ZoneActivationDate, 0i64).unwrap();

        let fix = GpsInfo {
            valid: true,
            lon: 0.1,
            lat: 0.0,
            year: 2022,
            month: 6,
            day: 1,
            hour: 12,
            min: 0,
            ..GpsInfo::default()
        };
        store.notify_gps_location(&fix);

        assert!(store.is_zone_exclusion());
        let config = store.argos_configuration().unwrap();
        assert!(config.is_out_of_zone);
        assert_eq!(config.duty_cycle, 0xFF_FFFF);
        assert_eq!(store.last_config_mode(), ConfigMode::OutOfZone);
    }

    #[test]
    fn certification_disables_gnss_in_projection() {
        let mut store = test_store_with_gauge(4000, 90);
        store.write(ParamId::CertTxEnable, true).unwrap();
        let gnss = store.gnss_configuration().unwrap();
        assert!(!gnss.enable);
        let argos = store.argos_configuration().unwrap();
        assert!(!argos.gnss_en);
        assert!(argos.cert_tx_enable);
    }

    #[test]
    fn counters_accumulate() {
        let mut store = test_store_with_gauge(4000, 90);
        store.increment_tx_counter().unwrap();
        store.increment_tx_counter().unwrap();
        assert_eq!(store.read::<u32>(ParamId::TxCounter), Ok(2));
        store.increment_rx_time(55).unwrap();
        assert_eq!(store.read::<u32>(ParamId::ArgosRxTime), Ok(55));
    }
}
