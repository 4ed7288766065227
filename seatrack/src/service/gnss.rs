//! GNSS acquisition service.
//!
//! Drives the receiver through power-on cycles aligned to UTC midnight,
//! feeds every solution into the sensor log and the configuration store,
//! and sets the RTC from the first fix. Acquisition timeouts and quality
//! filtering live in the receiver itself; this service only selects the
//! settings per the active configuration profile.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::params::ParamId;
use crate::hal::{DeviceEvent, GnssDevice, GnssEvent, NavSettings, PvtSolution};
use crate::logging::{FixFlags, GpsEventType, GpsInfo, GpsLogEntry, LogHeader, LogType};
use crate::service::{EventData, Service, ServiceEvent, ServiceEventType, ServiceId, SystemContext,
    SCHEDULE_DISABLED};
use crate::timeutil::CalendarTime;

/// Accelerated first-cycle period to shorten time to first fix.
const FIRST_AQPERIOD_S: i64 = 30;

pub struct GnssService {
    device: Rc<RefCell<dyn GnssDevice>>,
    is_active: bool,
    is_first_fix_found: bool,
    is_first_schedule: bool,
    num_fixes: u32,
    wakeup_time_ms: u64,
    next_schedule_epoch: i64,
}

impl GnssService {
    pub fn new(device: Rc<RefCell<dyn GnssDevice>>) -> Self {
        Self {
            device,
            is_active: false,
            is_first_fix_found: false,
            is_first_schedule: true,
            num_fixes: 0,
            wakeup_time_ms: 0,
            next_schedule_epoch: 0,
        }
    }

    fn no_fix_entry(&self, sys: &mut SystemContext) -> GpsLogEntry {
        let now = sys.current_time();
        GpsLogEntry {
            header: LogHeader::with_time(LogType::Gps, now),
            info: GpsInfo {
                event_type: GpsEventType::NoFix,
                batt_voltage: sys.config.battery_voltage_mv(),
                valid: false,
                on_time: (sys.current_timer_ms() - self.wakeup_time_ms) as u32,
                sched_time: self.next_schedule_epoch,
                ..GpsInfo::default()
            },
        }
    }

    fn complete_no_fix(&mut self, sys: &mut SystemContext) {
        let entry = self.no_fix_entry(sys);
        sys.complete_service(
            ServiceId::Gnss,
            Some(EventData::Gps(entry)),
            Some(entry.to_record()),
            true,
        );
    }

    fn process_solution(&mut self, sys: &mut SystemContext, data: &PvtSolution) {
        let now = sys.current_time();
        let on_time = (sys.current_timer_ms() - self.wakeup_time_ms) as u32;

        let mut entry = GpsLogEntry {
            header: LogHeader::with_time(LogType::Gps, now),
            info: GpsInfo {
                event_type: GpsEventType::Fix,
                batt_voltage: sys.config.battery_voltage_mv(),
                itow: data.itow,
                year: data.year,
                month: data.month,
                day: data.day,
                hour: data.hour,
                min: data.min,
                sec: data.sec,
                valid: true,
                on_time,
                ttff: data.ttff,
                fix_type: data.fix_type,
                flags: FixFlags::from_bits_retain(data.flags),
                flags2: data.flags2,
                flags3: data.flags3,
                num_sv: data.num_sv,
                lon: data.lon,
                lat: data.lat,
                height: data.height,
                h_msl: data.h_msl,
                h_acc: data.h_acc,
                v_acc: data.v_acc,
                vel_n: data.vel_n,
                vel_e: data.vel_e,
                vel_d: data.vel_d,
                g_speed: data.g_speed,
                head_mot: data.head_mot,
                s_acc: data.s_acc,
                head_acc: data.head_acc,
                p_dop: data.p_dop,
                v_dop: data.v_dop,
                h_dop: data.h_dop,
                head_veh: data.head_veh,
                sched_time: self.next_schedule_epoch,
            },
        };

        let fix_time = CalendarTime::new(
            data.year, data.month, data.day, data.hour, data.min, data.sec,
        )
        .to_epoch();

        // Seed the RTC from the very first fix
        if let Some(fix_time) = fix_time {
            if !sys.rtc.borrow().is_set() {
                info!(fix_time, "setting RTC from GNSS fix");
                sys.rtc.borrow_mut().set(fix_time);
            }
            if self.num_fixes == 1 {
                // The RTC was not trustworthy when this cycle was scheduled,
                // so back-compute the schedule time from the fix
                entry.info.sched_time = fix_time - i64::from(on_time / 1000);
            }
        }

        info!(
            lat = entry.info.lat,
            lon = entry.info.lon,
            h_dop = entry.info.h_dop,
            num_sv = entry.info.num_sv,
            "GNSS fix"
        );

        self.is_active = false;
        self.device.borrow_mut().power_off();

        sys.config.notify_gps_location(&entry.info);
        sys.complete_service(
            ServiceId::Gnss,
            Some(EventData::Gps(entry)),
            Some(entry.to_record()),
            true,
        );
    }
}

impl Service for GnssService {
    fn init(&mut self, _sys: &mut SystemContext) {
        self.is_active = false;
        self.is_first_fix_found = false;
        self.is_first_schedule = true;
        self.num_fixes = 0;
    }

    fn term(&mut self, _sys: &mut SystemContext) {}

    fn is_enabled(&mut self, sys: &mut SystemContext) -> bool {
        sys.config
            .gnss_configuration()
            .map(|c| c.enable)
            .unwrap_or(false)
    }

    fn next_schedule_in_ms(&mut self, sys: &mut SystemContext) -> u32 {
        let Ok(config) = sys.config.gnss_configuration() else {
            return SCHEDULE_DISABLED;
        };
        let now = sys.current_time();
        let aq_period = if self.is_first_schedule {
            FIRST_AQPERIOD_S
        } else if self.is_first_fix_found {
            i64::from(config.dloc_arg_nom)
        } else {
            i64::from(config.cold_start_retry_period)
        };

        if aq_period == 0 {
            return SCHEDULE_DISABLED;
        }

        // Schedules stay aligned to UTC midnight
        let next_schedule = now - (now % aq_period) + aq_period;
        debug!(
            first = self.is_first_schedule,
            fix_found = self.is_first_fix_found,
            aq_period,
            now,
            next_schedule,
            "GNSS schedule"
        );
        ((next_schedule - now) * 1000) as u32
    }

    fn initiate(&mut self, sys: &mut SystemContext) {
        let Ok(config) = sys.config.gnss_configuration() else {
            self.complete_no_fix(sys);
            return;
        };

        let nav_settings = NavSettings {
            fix_mode: config.fix_mode,
            dyn_model: config.dyn_model,
            assistnow_enable: config.assistnow_enable,
            assistnow_offline_enable: config.assistnow_offline_enable,
            hdop_filter_enable: config.hdop_filter_enable,
            hdop_filter_threshold: config.hdop_filter_threshold,
            hacc_filter_enable: config.hacc_filter_enable,
            hacc_filter_threshold: config.hacc_filter_threshold,
            num_consecutive_fixes: config.min_num_fixes,
            sat_tracking: true,
            acquisition_timeout_ms: 1000
                * if self.is_first_fix_found {
                    config.acquisition_timeout
                } else {
                    config.acquisition_timeout_cold_start
                },
        };

        self.next_schedule_epoch = sys.current_time();
        self.is_first_schedule = false;
        self.wakeup_time_ms = sys.current_timer_ms();

        self.is_active = true;
        let power_on_result = self.device.borrow_mut().power_on(&nav_settings);
        if let Err(e) = power_on_result {
            warn!(error = %e, "GNSS power-on failed");
            self.is_active = false;
            self.complete_no_fix(sys);
        }
    }

    fn cancel(&mut self, sys: &mut SystemContext) -> bool {
        debug!("GNSS cycle cancel");
        if self.is_active {
            self.is_active = false;
            self.device.borrow_mut().power_off();
            self.complete_no_fix(sys);
            return true;
        }
        false
    }

    fn next_timeout_ms(&mut self, _sys: &mut SystemContext) -> u32 {
        // The receiver owns the acquisition timeout
        0
    }

    fn triggered_on_surfaced(&mut self, sys: &mut SystemContext) -> (bool, bool) {
        let immediate = sys
            .config
            .gnss_configuration()
            .map(|c| c.trigger_on_surfaced)
            .unwrap_or(false);
        (true, immediate)
    }

    fn is_usable_underwater(&self) -> bool {
        false
    }

    fn triggered_on_event(&mut self, sys: &mut SystemContext, event: &ServiceEvent) -> (bool, bool) {
        if event.source == ServiceId::AxlSensor
            && event.event_type == ServiceEventType::ServiceLogUpdated
            && event.data == Some(EventData::Flag(true))
        {
            let trigger = sys
                .config
                .read::<bool>(ParamId::GnssTriggerOnAxlWakeup)
                .unwrap_or(false);
            return (trigger, trigger);
        }
        (false, false)
    }

    fn handle_device_event(&mut self, sys: &mut SystemContext, event: &DeviceEvent) {
        let DeviceEvent::Gnss(event) = event else {
            return;
        };
        match event {
            GnssEvent::Pvt(data) => {
                if self.is_active {
                    self.is_first_fix_found = true;
                    self.num_fixes += 1;
                    let data = *data;
                    self.process_solution(sys, &data);
                }
            },
            GnssEvent::PowerOff { fix_found, .. } => {
                if self.is_active {
                    self.is_active = false;
                    self.device.borrow_mut().power_off();
                    if !fix_found {
                        self.complete_no_fix(sys);
                    }
                }
            },
            GnssEvent::Error => {},
            _ => {},
        }
    }
}
