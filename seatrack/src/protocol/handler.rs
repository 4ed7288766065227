//! Request dispatch for the control protocol.
//!
//! Each recognised command produces exactly one response frame; multi-frame
//! responses (the chunked log dump) return [`DteAction::Again`] so the
//! caller re-invokes the handler with the same request. Reset and
//! factory-reset are deferred actions: the response goes out first, the
//! caller performs the action afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::aop;
use crate::config::params::{ArgosModulation, ArgosPower, ParamId};
use crate::hal::{ArticDevice, CalibrationRegistry, MemoryAccess};
use crate::logging::LogRegistry;
use crate::protocol::codec::{
    self, base64_encode, decode_request, DteArg, Request,
};
use crate::protocol::commands::Command;
use crate::protocol::DteError;
use crate::service::SystemContext;

/// Number of log entries returned per DUMPD chunk.
const MAX_LOG_DUMP_ENTRIES: usize = 8;

/// Idle timeout applied to the transceiver during manual transmissions.
const ARGOSTX_IDLE_TIMEOUT_MS: u32 = 30_000;

/// Deferred action requested by a handled command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DteAction {
    None,
    /// More response frames pending; call again with the same request.
    Again,
    /// Reboot after the response has been sent.
    Reset,
    /// Factory reset after the response has been sent.
    Factory,
    /// OTA privileges were requested.
    Secur,
    /// A parameter write succeeded; running services may need new settings.
    ConfigUpdated,
}

/// External collaborators the handler may need.
pub struct DteEnv<'a> {
    pub logs: &'a mut LogRegistry,
    pub memory: Option<&'a dyn MemoryAccess>,
    pub calibration: Option<&'a mut dyn CalibrationRegistry>,
    pub artic: Option<Rc<RefCell<dyn ArticDevice>>>,
}

const DUMPD_LOG_NAMES: &[&str] = &[
    "system.log",
    "sensor.log",
    "ALS",
    "PH",
    "RTD",
    "CDT",
    "AXL",
    "PRESSURE",
];

const ERASE_ALL: u32 = 3;

fn erase_log_name(d_type: u32) -> Option<&'static str> {
    match d_type {
        1 => Some("sensor.log"),
        2 => Some("system.log"),
        4 => Some("ALS"),
        5 => Some("PH"),
        6 => Some("RTD"),
        7 => Some("CDT"),
        8 => Some("AXL"),
        9 => Some("PRESSURE"),
        _ => None,
    }
}

fn calibration_device_name(device_id: u32) -> Option<&'static str> {
    match device_id {
        0 => Some("AXL"),
        1 => Some("PRS"),
        2 => Some("ALS"),
        3 => Some("PH"),
        4 => Some("RTD"),
        5 => Some("CDT"),
        6 => Some("MCP47X6"),
        _ => None,
    }
}

#[derive(Default)]
pub struct DteHandler {
    dumpd_nnn: u32,
    dumpd_mmm: u32,
    artic_active: bool,
}

impl DteHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear any multi-frame state (new connection).
    pub fn reset_state(&mut self) {
        self.dumpd_nnn = 0;
        self.dumpd_mmm = 0;
    }

    /// Handle one request line; returns the response frame (if one can be
    /// produced) and any deferred action.
    pub fn handle(
        &mut self,
        sys: &mut SystemContext,
        env: &mut DteEnv<'_>,
        request: &str,
    ) -> (Option<String>, DteAction) {
        let request = match decode_request(request) {
            Ok(request) => request,
            Err(failure) => {
                let code = DteError::from(failure.error) as u32;
                warn!(error = %failure.error, "rejected control frame");
                let response = failure
                    .name
                    .map(|name| codec::encode_error(&name, code));
                return (response, DteAction::None);
            },
        };

        let name = request.descriptor.name;
        debug!(command = name, "control request");
        let (result, action) = self.dispatch(sys, env, &request);
        match result {
            Ok(payload) => (Some(codec::encode_response(name, &payload)), action),
            Err(code) => {
                // An error resets any multi-frame state
                self.reset_state();
                (Some(codec::encode_error(name, code as u32)), DteAction::None)
            },
        }
    }

    fn dispatch(
        &mut self,
        sys: &mut SystemContext,
        env: &mut DteEnv<'_>,
        request: &Request,
    ) -> (Result<String, DteError>, DteAction) {
        match request.descriptor.command {
            Command::Parml => (Self::parml(), DteAction::None),
            Command::Parmr => (Self::parmr(sys, request, false), DteAction::None),
            Command::Statr => (Self::parmr(sys, request, true), DteAction::None),
            Command::Parmw => Self::parmw(sys, request),
            Command::Profr => (Self::profr(sys), DteAction::None),
            Command::Profw => (Self::profw(sys, request), DteAction::None),
            Command::Paspw => (Self::paspw(sys, request), DteAction::None),
            Command::Secur => (Ok(String::new()), DteAction::Secur),
            Command::Dumpm => (Self::dumpm(env, request), DteAction::None),
            Command::Dumpd => self.dumpd(env, request),
            Command::Rstvw => (Self::rstvw(sys, request), DteAction::None),
            Command::Rstbw => (Ok(String::new()), DteAction::Reset),
            Command::Factw => (Ok(String::new()), DteAction::Factory),
            Command::Erase => (Self::erase(env, request), DteAction::None),
            Command::Scalw => (Self::scalw(env, request), DteAction::None),
            Command::Scalr => (Self::scalr(env, request), DteAction::None),
            Command::Argostx => (self.argostx(env, request), DteAction::None),
        }
    }

    fn parml() -> Result<String, DteError> {
        let keys: Vec<&str> = ParamId::ALL
            .iter()
            .filter(|id| id.meta().implemented)
            .map(|id| id.meta().key)
            .collect();
        Ok(keys.join(","))
    }

    fn parmr(
        sys: &mut SystemContext,
        request: &Request,
        technical: bool,
    ) -> Result<String, DteError> {
        let mut keys = match &request.args[0] {
            DteArg::Keys(keys) => keys.clone(),
            _ => return Err(DteError::IncorrectData),
        };
        if keys.is_empty() {
            keys = ParamId::ALL
                .iter()
                .filter(|id| id.meta().implemented && id.is_technical() == technical)
                .copied()
                .collect();
        }

        let mut pairs = Vec::with_capacity(keys.len());
        for id in keys {
            let value = sys
                .config
                .read_value(id)
                .map_err(|_| DteError::IncorrectData)?;
            pairs.push(format!(
                "{}={}",
                id.meta().key,
                codec::encode_param_value(id, &value)
            ));
        }
        Ok(pairs.join(","))
    }

    fn parmw(
        sys: &mut SystemContext,
        request: &Request,
    ) -> (Result<String, DteError>, DteAction) {
        let DteArg::KeyValues(kvs) = &request.args[0] else {
            return (Err(DteError::IncorrectData), DteAction::None);
        };
        for (id, value) in kvs {
            if !id.meta().writable {
                // Read-only keys are silently skipped
                warn!(key = id.meta().key, "ignoring write to read-only key");
                continue;
            }
            if sys.config.write_value(*id, value.clone()).is_err() {
                return (Err(DteError::IncorrectData), DteAction::None);
            }
        }
        if sys.config.save().is_err() {
            return (Err(DteError::IncorrectData), DteAction::None);
        }
        (Ok(String::new()), DteAction::ConfigUpdated)
    }

    fn profr(sys: &mut SystemContext) -> Result<String, DteError> {
        sys.config
            .read::<String>(ParamId::ProfileName)
            .map_err(|_| DteError::IncorrectData)
    }

    fn profw(sys: &mut SystemContext, request: &Request) -> Result<String, DteError> {
        let DteArg::Text(name) = &request.args[0] else {
            return Err(DteError::IncorrectData);
        };
        sys.config
            .write(ParamId::ProfileName, name.clone())
            .map_err(|_| DteError::IncorrectData)?;
        Ok(String::new())
    }

    fn paspw(sys: &mut SystemContext, request: &Request) -> Result<String, DteError> {
        let DteArg::Base64(blob) = &request.args[0] else {
            return Err(DteError::IncorrectData);
        };
        let Some(pass_predict) = aop::decode_record_stream(blob) else {
            warn!("PASPW payload rejected");
            return Err(DteError::IncorrectData);
        };
        if pass_predict.is_empty() {
            warn!("PASPW carries no AOP records");
            return Err(DteError::IncorrectData);
        }
        // Stamp with the most recent bulletin of an operational satellite
        let Some(aop_date) = pass_predict.newest_bulletin_epoch() else {
            warn!("PASPW carries no valid AOP bulletin");
            return Err(DteError::IncorrectData);
        };
        let records = pass_predict.len();
        sys.config
            .write_pass_predict(pass_predict)
            .map_err(|_| DteError::IncorrectData)?;
        sys.config
            .write(ParamId::ArgosAopDate, aop_date)
            .map_err(|_| DteError::IncorrectData)?;
        sys.config.save().map_err(|_| DteError::IncorrectData)?;
        info!(records, aop_date, "AOP table updated from PASPW");
        Ok(String::new())
    }

    fn dumpm(env: &mut DteEnv<'_>, request: &Request) -> Result<String, DteError> {
        let memory = env.memory.ok_or(DteError::IncorrectData)?;
        let address = request.args[0].as_uint().ok_or(DteError::IncorrectData)?;
        let length = request.args[1].as_uint().ok_or(DteError::IncorrectData)?;
        let data = memory
            .read(address, length as usize)
            .map_err(|_| DteError::IncorrectData)?;
        Ok(base64_encode(&data))
    }

    fn dumpd(
        &mut self,
        env: &mut DteEnv<'_>,
        request: &Request,
    ) -> (Result<String, DteError>, DteAction) {
        let Some(d_type) = request.args[0].as_uint() else {
            return (Err(DteError::IncorrectData), DteAction::None);
        };
        let Some(log_name) = DUMPD_LOG_NAMES.get(d_type as usize).copied() else {
            return (Err(DteError::IncorrectData), DteAction::None);
        };
        let Some((logger, formatter)) = env.logs.find(log_name) else {
            return (Err(DteError::IncorrectData), DteAction::None);
        };

        let mut logger = logger.borrow_mut();
        let total_entries = logger.num_entries();
        if self.dumpd_nnn == 0 {
            let chunks = total_entries.div_ceil(MAX_LOG_DUMP_ENTRIES) as u32;
            // An empty log still produces one (empty) response frame
            self.dumpd_nnn = chunks.max(1);
            self.dumpd_mmm = 0;
        }

        let start = self.dumpd_mmm as usize * MAX_LOG_DUMP_ENTRIES;
        let count = total_entries
            .saturating_sub(start)
            .min(MAX_LOG_DUMP_ENTRIES);

        let mut csv = String::new();
        if self.dumpd_mmm == 0 {
            csv.push_str(&formatter.header());
        }
        for i in 0..count {
            match logger.read(start + i) {
                Ok(record) => csv.push_str(&formatter.format(&record)),
                Err(_) => break,
            }
        }

        // MMM is the final chunk index, i.e. NNN-1
        let payload = format!(
            "{:X},{:X},{}",
            self.dumpd_mmm,
            self.dumpd_nnn - 1,
            base64_encode(csv.as_bytes())
        );

        self.dumpd_mmm += 1;
        let action = if self.dumpd_mmm == self.dumpd_nnn {
            self.dumpd_nnn = 0;
            DteAction::None
        } else {
            DteAction::Again
        };
        (Ok(payload), action)
    }

    fn rstvw(sys: &mut SystemContext, request: &Request) -> Result<String, DteError> {
        let index = request.args[0].as_uint().ok_or(DteError::IncorrectData)?;
        let param = match index {
            1 => ParamId::TxCounter,
            3 => ParamId::ArgosRxCounter,
            4 => ParamId::ArgosRxTime,
            _ => return Err(DteError::IncorrectData),
        };
        sys.config
            .write(param, 0u32)
            .map_err(|_| DteError::IncorrectData)?;
        sys.config.save().map_err(|_| DteError::IncorrectData)?;
        Ok(String::new())
    }

    fn erase(env: &mut DteEnv<'_>, request: &Request) -> Result<String, DteError> {
        let d_type = request.args[0].as_uint().ok_or(DteError::IncorrectData)?;
        if d_type == ERASE_ALL {
            env.logs.truncate_all();
            return Ok(String::new());
        }
        let name = erase_log_name(d_type).ok_or(DteError::IncorrectData)?;
        let (logger, _) = env.logs.find(name).ok_or(DteError::IncorrectData)?;
        debug!(name, "truncating log");
        logger
            .borrow_mut()
            .truncate()
            .map_err(|_| DteError::IncorrectData)?;
        Ok(String::new())
    }

    fn scalw(env: &mut DteEnv<'_>, request: &Request) -> Result<String, DteError> {
        let device_id = request.args[0].as_uint().ok_or(DteError::IncorrectData)?;
        let offset = request.args[1].as_uint().ok_or(DteError::IncorrectData)?;
        let value = request.args[2].as_float().ok_or(DteError::IncorrectData)?;
        let name = calibration_device_name(device_id).ok_or(DteError::IncorrectData)?;
        let calibration = env.calibration.as_mut().ok_or(DteError::IncorrectData)?;
        debug!(name, offset, value, "calibration write");
        calibration
            .calibration_write(name, offset, value)
            .map_err(|_| DteError::IncorrectData)?;
        Ok(String::new())
    }

    fn scalr(env: &mut DteEnv<'_>, request: &Request) -> Result<String, DteError> {
        let device_id = request.args[0].as_uint().ok_or(DteError::IncorrectData)?;
        let offset = request.args[1].as_uint().ok_or(DteError::IncorrectData)?;
        let name = calibration_device_name(device_id).ok_or(DteError::IncorrectData)?;
        let calibration = env.calibration.as_mut().ok_or(DteError::IncorrectData)?;
        let value = calibration
            .calibration_read(name, offset)
            .map_err(|_| DteError::IncorrectData)?;
        Ok(format!("{value}"))
    }

    fn argostx(&mut self, env: &mut DteEnv<'_>, request: &Request) -> Result<String, DteError> {
        let artic = env.artic.as_ref().ok_or(DteError::IncorrectData)?.clone();
        let modulation = request.args[0].as_uint().ok_or(DteError::IncorrectData)?;
        let modulation =
            ArgosModulation::from_u8(modulation as u8).ok_or(DteError::IncorrectData)?;
        let power_mw = request.args[1].as_uint().ok_or(DteError::IncorrectData)?;
        let frequency = request.args[2].as_float().ok_or(DteError::IncorrectData)?;
        let num_bytes = request.args[3].as_uint().ok_or(DteError::IncorrectData)? as usize;
        let tcxo_time = request.args[4].as_uint().ok_or(DteError::IncorrectData)?;

        let mut artic = artic.borrow_mut();
        if !self.artic_active {
            // Keep the transceiver powered long enough for bench checks
            artic.set_idle_timeout(ARGOSTX_IDLE_TIMEOUT_MS);
            self.artic_active = true;
        }
        artic.set_tx_power(ArgosPower::from_milliwatts(power_mw));
        artic.set_tcxo_warmup_time(tcxo_time);
        artic.set_frequency(frequency);
        let packet = vec![0xFFu8; num_bytes];
        artic
            .send(modulation, &packet, 8 * num_bytes)
            .map_err(|_| DteError::IncorrectData)?;
        info!(%modulation, num_bytes, "manual transmission requested");
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::hal::{DeviceEventQueue, Logger};
    use crate::logging::{GpsLogFormatter, LogType};
    use crate::testutil::{test_system, FakeArtic, MemoryLogger};

    fn env_with_logs(logs: &mut LogRegistry) -> DteEnv<'_> {
        DteEnv {
            logs,
            memory: None,
            calibration: None,
            artic: None,
        }
    }

    fn handle(sys: &mut SystemContext, request: &str) -> (Option<String>, DteAction) {
        let mut logs = LogRegistry::new();
        let mut env = env_with_logs(&mut logs);
        DteHandler::new().handle(sys, &mut env, request)
    }

    #[test]
    fn parml_lists_implemented_keys() {
        let (mut sys, _env) = test_system();
        let (resp, _) = handle(&mut sys, "$PARML#000;\r");
        let resp = resp.unwrap();
        assert!(resp.starts_with("$O;PARML#"));
        assert!(resp.contains("ARP03"));
        // Unimplemented keys stay hidden
        assert!(!resp.contains(ParamId::GnssNtry.meta().key));
    }

    #[test]
    fn parmw_then_parmr_roundtrip() {
        let (mut sys, _env) = test_system();
        let (resp, action) = handle(&mut sys, "$PARMW#009;ARP05=120\r");
        assert_eq!(resp.unwrap(), "$O;PARMW#000;\r");
        assert_eq!(action, DteAction::ConfigUpdated);
        assert_eq!(sys.config.read::<u32>(ParamId::TrNom).unwrap(), 120);

        let (resp, _) = handle(&mut sys, "$PARMR#005;ARP05\r");
        assert_eq!(resp.unwrap(), "$O;PARMR#009;ARP05=120\r");
    }

    #[test]
    fn parmw_silently_skips_read_only_keys() {
        let (mut sys, _env) = test_system();
        sys.config.write(ParamId::TxCounter, 7u32).unwrap();
        sys.config.save().unwrap();
        let (resp, _) = handle(&mut sys, "$PARMW#007;ART02=0\r");
        assert_eq!(resp.unwrap(), "$O;PARMW#000;\r");
        assert_eq!(sys.config.read::<u32>(ParamId::TxCounter).unwrap(), 7);
    }

    #[test]
    fn statr_reads_technical_keys() {
        let (mut sys, _env) = test_system();
        let (resp, _) = handle(&mut sys, "$STATR#005;ART02\r");
        assert_eq!(resp.unwrap(), "$O;STATR#007;ART02=0\r");

        // Empty key list returns every technical key
        let (resp, _) = handle(&mut sys, "$STATR#000;\r");
        let resp = resp.unwrap();
        assert!(resp.contains("IDT02=SEATRACK"));
    }

    #[test]
    fn profile_write_and_read() {
        let (mut sys, _env) = test_system();
        let (resp, _) = handle(&mut sys, "$PROFW#008;DEPLOYED\r");
        assert_eq!(resp.unwrap(), "$O;PROFW#000;\r");
        let (resp, _) = handle(&mut sys, "$PROFR#000;\r");
        assert_eq!(resp.unwrap(), "$O;PROFR#008;DEPLOYED\r");
    }

    #[test]
    fn bad_frames_return_wire_error_codes() {
        let (mut sys, _env) = test_system();
        let (resp, _) = handle(&mut sys, "$PARMR#004;ARP05\r");
        assert_eq!(resp.unwrap(), "$N;PARMR#001;4\r");
        let (resp, _) = handle(&mut sys, "$BOGUS#000;\r");
        assert_eq!(resp.unwrap(), "$N;BOGUS#001;1\r");
    }

    #[test]
    fn rstvw_resets_the_selected_counter() {
        let (mut sys, _env) = test_system();
        sys.config.write(ParamId::TxCounter, 42u32).unwrap();
        let (resp, _) = handle(&mut sys, "$RSTVW#001;1\r");
        assert_eq!(resp.unwrap(), "$O;RSTVW#000;\r");
        assert_eq!(sys.config.read::<u32>(ParamId::TxCounter).unwrap(), 0);
    }

    #[test]
    fn reset_and_factory_are_deferred_actions() {
        let (mut sys, _env) = test_system();
        let (_, action) = handle(&mut sys, "$RSTBW#000;\r");
        assert_eq!(action, DteAction::Reset);
        let (_, action) = handle(&mut sys, "$FACTW#000;\r");
        assert_eq!(action, DteAction::Factory);
        let (_, action) = handle(&mut sys, "$SECUR#004;CAFE\r");
        assert_eq!(action, DteAction::Secur);
    }

    #[test]
    fn paspw_uploads_a_fresh_aop_table() {
        let (mut sys, _env) = test_system();
        let pp = crate::config::aop::default_pass_predict();
        let mut stream = Vec::new();
        for record in &pp.records {
            crate::config::aop::encode_record(record, &mut stream);
        }
        let b64 = base64_encode(&stream);
        let frame = format!("$PASPW#{:03X};{}\r", b64.len(), b64);
        let (resp, _) = handle(&mut sys, &frame);
        assert!(resp.unwrap().starts_with("$O;PASPW#"));
        // AOP date refreshed to the newest operational bulletin
        let expected = pp.newest_bulletin_epoch().unwrap();
        assert_eq!(
            sys.config.read::<i64>(ParamId::ArgosAopDate).unwrap(),
            expected
        );
    }

    #[test]
    fn dumpd_pages_through_the_log() {
        let (mut sys, _env) = test_system();
        let logger = MemoryLogger::new("sensor.log");
        for i in 0..20 {
            let entry = crate::logging::GpsLogEntry {
                header: crate::logging::LogHeader::with_time(LogType::Gps, i),
                info: crate::logging::GpsInfo::default(),
            };
            logger.borrow_mut().write(&entry.to_record()).unwrap();
        }
        let mut logs = LogRegistry::new();
        logs.add(logger, Rc::new(GpsLogFormatter));

        let mut handler = DteHandler::new();
        let mut env = env_with_logs(&mut logs);

        // 20 entries over 8-entry chunks: frames 0,1 AGAIN then 2 final
        let (resp, action) = handler.handle(&mut sys, &mut env, "$DUMPD#001;1\r");
        assert!(resp.unwrap().contains("0,2,"));
        assert_eq!(action, DteAction::Again);
        let (_, action) = handler.handle(&mut sys, &mut env, "$DUMPD#001;1\r");
        assert_eq!(action, DteAction::Again);
        let (resp, action) = handler.handle(&mut sys, &mut env, "$DUMPD#001;1\r");
        assert!(resp.unwrap().contains("2,2,"));
        assert_eq!(action, DteAction::None);
    }

    #[test]
    fn erase_truncates_one_or_all_logs() {
        let (mut sys, _env) = test_system();
        let sensor = MemoryLogger::new("sensor.log");
        let system = MemoryLogger::new("system.log");
        sensor.borrow_mut().write(&[0u8; 128]).unwrap();
        system.borrow_mut().write(&[0u8; 128]).unwrap();
        let mut logs = LogRegistry::new();
        logs.add(sensor.clone(), Rc::new(GpsLogFormatter));
        logs.add(system.clone(), Rc::new(GpsLogFormatter));

        let mut handler = DteHandler::new();
        let mut env = env_with_logs(&mut logs);
        handler.handle(&mut sys, &mut env, "$ERASE#001;1\r");
        assert_eq!(sensor.borrow_mut().num_entries(), 0);
        assert_eq!(system.borrow_mut().num_entries(), 1);

        handler.handle(&mut sys, &mut env, "$ERASE#001;3\r");
        assert_eq!(system.borrow_mut().num_entries(), 0);
    }

    #[test]
    fn argostx_drives_the_transceiver() {
        let (mut sys, _env) = test_system();
        let queue = DeviceEventQueue::new();
        let artic = FakeArtic::new(queue);
        let mut logs = LogRegistry::new();
        let mut env = DteEnv {
            logs: &mut logs,
            memory: None,
            calibration: None,
            artic: Some(artic.clone()),
        };
        let mut handler = DteHandler::new();
        let (resp, _) =
            handler.handle(&mut sys, &mut env, "$ARGOSTX#012;0,500,401.62,15,10\r");
        assert_eq!(resp.unwrap(), "$O;ARGOSTX#000;\r");
        let artic = artic.borrow();
        assert_eq!(artic.sent.len(), 1);
        assert_eq!(artic.sent[0].2, 120);
        assert_eq!(artic.frequency, 401.62);
        assert_eq!(artic.idle_timeout_ms, ARGOSTX_IDLE_TIMEOUT_MS);
    }

    struct FixedCal;

    impl CalibrationRegistry for FixedCal {
        fn calibration_write(
            &mut self,
            _device: &str,
            _offset: u32,
            _value: f64,
        ) -> Result<(), DeviceError> {
            Ok(())
        }

        fn calibration_read(&mut self, device: &str, offset: u32) -> Result<f64, DeviceError> {
            if device == "PH" && offset == 0 {
                Ok(7.5)
            } else {
                Err(DeviceError::Unavailable)
            }
        }
    }

    #[test]
    fn calibration_read_write() {
        let (mut sys, _env) = test_system();
        let mut logs = LogRegistry::new();
        let mut cal = FixedCal;
        let mut env = DteEnv {
            logs: &mut logs,
            memory: None,
            calibration: Some(&mut cal),
            artic: None,
        };
        let mut handler = DteHandler::new();
        let (resp, _) = handler.handle(&mut sys, &mut env, "$SCALW#007;3,0,7.5\r");
        assert_eq!(resp.unwrap(), "$O;SCALW#000;\r");
        let (resp, _) = handler.handle(&mut sys, &mut env, "$SCALR#003;3,0\r");
        assert_eq!(resp.unwrap(), "$O;SCALR#003;7.5\r");
    }
}
