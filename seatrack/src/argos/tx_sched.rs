//! Argos transmission instant computation.
//!
//! All absolute times are UTC epoch milliseconds so the duty-cycle mask
//! aligns with hours of the UTC day. The scheduler owns the jitter PRNG
//! (seeded with the platform's Argos ID), the last/current schedule marks
//! and the earliest-TX floor set when the beacon surfaces.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, trace, warn};

use crate::config::params::ArgosModulation;
use crate::config::ArgosConfig;
use crate::constants::TX_JITTER_MS;
use crate::prepass::{
    AopSatelliteEntry, DownlinkStatus, PassPredictor, PredictionConfig, UplinkStatus,
    DEFAULT_PASS_POOL_CAPACITY,
};
use crate::timeutil::CalendarTime;

const MS_PER_SEC: u64 = 1000;
const SECONDS_PER_HOUR: u64 = 3600;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// Programming-time margin applied before the end of a prepass window.
const ARGOS_TX_MARGIN_MS: u64 = 0;

/// Safety bound on the prepass search iteration.
const MAX_PREPASS_CANDIDATES: usize = 1000;

/// Outcome of a prepass scheduling attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepassSchedule {
    /// Delay until the transmission instant.
    pub relative_ms: u64,
    pub modulation: ArgosModulation,
    /// Downlink window `[start, end]` (epoch seconds) discovered while
    /// searching, when one was requested and found.
    pub rx_window: Option<(i64, i64)>,
}

pub struct ArgosTxScheduler {
    last_schedule_abs_ms: Option<u64>,
    curr_schedule_abs_ms: Option<u64>,
    earliest_schedule_ms: Option<u64>,
    location: Option<(f64, f64)>,
    rng: StdRng,
}

impl ArgosTxScheduler {
    pub fn new() -> Self {
        Self {
            last_schedule_abs_ms: None,
            curr_schedule_abs_ms: None,
            earliest_schedule_ms: None,
            location: None,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Clear schedule state and reseed the jitter PRNG.
    pub fn reset(&mut self, seed: u32) {
        self.last_schedule_abs_ms = None;
        self.curr_schedule_abs_ms = None;
        self.earliest_schedule_ms = None;
        self.location = None;
        self.rng = StdRng::seed_from_u64(u64::from(seed));
    }

    /// Duty cycle is a 24-bit field; bit `23 - hour_UTC` set means the hour
    /// is permitted.
    pub fn is_in_duty_cycle(time_ms: u64, duty_cycle: u32) -> bool {
        let msec_of_day = time_ms % (SECONDS_PER_DAY * MS_PER_SEC);
        let hour_of_day = (msec_of_day / (SECONDS_PER_HOUR * MS_PER_SEC)) as u32;
        duty_cycle & (0x80_0000 >> hour_of_day) != 0
    }

    fn jitter(&mut self, enable: bool, min: i64, max: i64) -> i64 {
        if enable {
            let jitter = self.rng.gen_range(min..=max);
            trace!(jitter, "tx jitter");
            jitter
        } else {
            0
        }
    }

    /// Earliest permitted TX instant, set on surfacing after
    /// `dry_time_before_tx`.
    pub fn set_earliest_schedule(&mut self, epoch_s: i64) {
        trace!(epoch_s, "earliest schedule set");
        self.earliest_schedule_ms = Some(epoch_s as u64 * MS_PER_SEC);
    }

    pub fn set_last_location(&mut self, lon: f64, lat: f64) {
        self.location = Some((lon, lat));
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Pin the current schedule to an absolute instant (certification and
    /// time-sync bursts).
    pub fn schedule_at(&mut self, epoch_s: i64) {
        self.curr_schedule_abs_ms = Some(epoch_s as u64 * MS_PER_SEC);
    }

    /// A completed transmission anchors the next TR_NOM advance.
    pub fn notify_tx_complete(&mut self) {
        self.last_schedule_abs_ms = self.curr_schedule_abs_ms;
    }

    /// Periodic (duty-cycle / legacy) schedule computation. Returns the
    /// relative delay in ms, or `None` when no permitted instant exists in
    /// the next 24 hours.
    fn schedule_periodic(
        &mut self,
        period_ms: u64,
        jitter_en: bool,
        duty_cycle: u32,
        now_ms: u64,
    ) -> Option<u64> {
        debug!(
            now_ms,
            last = ?self.last_schedule_abs_ms,
            period_ms,
            jitter_en,
            "periodic schedule"
        );

        if duty_cycle == 0 {
            info!("duty cycle mask is empty, not scheduling");
            self.curr_schedule_abs_ms = None;
            return None;
        }

        // A pending earliest-TX floor is honoured when it lands inside the
        // duty cycle; otherwise a fresh schedule is computed below.
        if let Some(earliest) = self.earliest_schedule_ms {
            if earliest > now_ms {
                let mut start_time = earliest;
                if let Some(last) = self.last_schedule_abs_ms {
                    if start_time < last {
                        start_time = last;
                    }
                }
                if Self::is_in_duty_cycle(start_time, duty_cycle) {
                    self.curr_schedule_abs_ms = Some(start_time);
                    return Some(start_time.saturating_sub(now_ms));
                }
            } else {
                self.earliest_schedule_ms = None;
            }
        }

        let mut start_time = match self.last_schedule_abs_ms {
            // No -ve jitter on the first candidate to avoid under-running now
            None => now_ms.saturating_add_signed(self.jitter(jitter_en, 0, TX_JITTER_MS)),
            Some(last) => (last + period_ms)
                .saturating_add_signed(self.jitter(jitter_en, -TX_JITTER_MS, TX_JITTER_MS)),
        };

        trace!(start_time, "periodic schedule candidate");

        let mut elapsed = 0u64;
        while elapsed <= MS_PER_SEC * SECONDS_PER_DAY {
            if Self::is_in_duty_cycle(start_time, duty_cycle) && start_time >= now_ms {
                debug!(start_time, "periodic schedule found");
                self.curr_schedule_abs_ms = Some(start_time);
                return Some(start_time - now_ms);
            }
            // Every advance carries its own jitter draw; TR_NOM always
            // exceeds the jitter bound so the delta stays positive
            let delta = (period_ms as i64
                + self.jitter(jitter_en, -TX_JITTER_MS, TX_JITTER_MS)) as u64;
            start_time += delta;
            elapsed += delta;
        }

        error!("no periodic schedule found inside 24h window");
        self.curr_schedule_abs_ms = None;
        None
    }

    /// Duty-cycle mode schedule.
    pub fn schedule_duty_cycle(&mut self, config: &ArgosConfig, now_s: i64) -> Option<u64> {
        self.schedule_periodic(
            u64::from(config.tr_nom) * MS_PER_SEC,
            config.argos_tx_jitter_en,
            config.duty_cycle,
            now_s as u64 * MS_PER_SEC,
        )
    }

    /// Legacy mode: hourly repetition with every hour permitted.
    pub fn schedule_legacy(&mut self, config: &ArgosConfig, now_s: i64) -> Option<u64> {
        self.schedule_periodic(
            u64::from(config.tr_nom) * MS_PER_SEC,
            config.argos_tx_jitter_en,
            0xFF_FFFF,
            now_s as u64 * MS_PER_SEC,
        )
    }

    /// Pass-prediction schedule. `want_rx_window` additionally searches for
    /// the next downlink-capable pass to open a receive window against.
    pub fn schedule_prepass(
        &mut self,
        config: &ArgosConfig,
        aop: &[AopSatelliteEntry],
        predictor: &mut dyn PassPredictor,
        now_s: i64,
        want_rx_window: bool,
    ) -> Option<PrepassSchedule> {
        let Some((lon, lat)) = self.location else {
            warn!("prepass requested without a known location");
            self.last_schedule_abs_ms = None;
            return None;
        };

        let now_ms = now_s as u64 * MS_PER_SEC;
        let mut start_time_ms = now_ms;
        if let Some(earliest) = self.earliest_schedule_ms {
            if earliest > now_ms {
                trace!(earliest, "prepass search floored at earliest TX");
                start_time_ms = earliest;
            } else {
                self.earliest_schedule_ms = None;
            }
        }

        let start_s = (start_time_ms / MS_PER_SEC) as i64;
        let stop_s = start_s + SECONDS_PER_DAY as i64;
        let mut pp_config = PredictionConfig {
            latitude: lat,
            longitude: lon,
            start: CalendarTime::from_epoch(start_s),
            end: CalendarTime::from_epoch(stop_s),
            min_elevation_deg: config.prepass_min_elevation,
            max_elevation_deg: config.prepass_max_elevation,
            min_duration_min: f64::from(config.prepass_min_duration) / 60.0,
            max_passes: config.prepass_max_passes,
            linear_margin_min: f64::from(config.prepass_linear_margin) / 60.0,
            computation_step_s: config.prepass_comp_step,
            pass_pool_capacity: DEFAULT_PASS_POOL_CAPACITY,
        };

        info!(start_s, now_s, stop_s, "prepass search window");

        let mut rx_window = None;
        if want_rx_window {
            match predictor.next_pass_with_status(
                &pp_config,
                aop,
                DownlinkStatus::WithA3,
                UplinkStatus::Off,
            ) {
                Ok(Some(pass)) => {
                    rx_window = Some((pass.epoch, pass.end_epoch()));
                    info!(?rx_window, "downlink RX window discovered");
                },
                Ok(None) => {},
                Err(e) => warn!(error = %e, "downlink window search failed"),
            }
        }

        for _ in 0..MAX_PREPASS_CANDIDATES {
            let pass = match predictor.next_pass(&pp_config, aop) {
                Ok(Some(pass)) => pass,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "pass prediction failed");
                    break;
                },
            };

            let mut schedule = 0u64;
            if let Some(last) = self.last_schedule_abs_ms {
                schedule = schedule.max(last + u64::from(config.tr_nom) * MS_PER_SEC);
            }
            schedule = schedule.max(pass.epoch as u64 * MS_PER_SEC);
            // -ve jitter could pull the schedule before the window or the
            // present, so clamp to both afterwards
            schedule = schedule
                .saturating_add_signed(self.jitter(config.argos_tx_jitter_en, -TX_JITTER_MS, TX_JITTER_MS));
            schedule = schedule.max(start_time_ms);
            schedule = schedule.max(now_ms);

            debug!(
                hex_id = pass.sat_hex_id,
                dl = ?pass.downlink_status,
                ul = ?pass.uplink_status,
                epoch = pass.epoch,
                duration = pass.duration_s,
                schedule,
                "prepass candidate"
            );

            if schedule + ARGOS_TX_MARGIN_MS < pass.end_epoch() as u64 * MS_PER_SEC {
                self.curr_schedule_abs_ms = Some(schedule);
                let modulation = if pass.uplink_status.supports_a3() {
                    ArgosModulation::A3
                } else {
                    ArgosModulation::A2
                };
                info!(relative_ms = schedule - now_ms, %modulation, "prepass scheduled");
                return Some(PrepassSchedule {
                    relative_ms: schedule - now_ms,
                    modulation,
                    rx_window,
                });
            }

            // Too late for this window; restart the search past the pass
            trace!("schedule too late for this pass window");
            pp_config.start = CalendarTime::from_epoch(pass.end_epoch());
        }

        error!("pass prediction returned no usable pass");
        None
    }

    /// Relative delay of the current schedule against `now`, for
    /// certification repetitions.
    pub fn schedule_certification(&mut self, repetition_s: u32, first_tx: bool, now_s: i64) -> u64 {
        let now_ms = now_s as u64 * MS_PER_SEC;
        let delta = if first_tx {
            0
        } else {
            u64::from(repetition_s) * MS_PER_SEC
        };
        self.curr_schedule_abs_ms = Some(now_ms + delta);
        delta
    }
}

impl Default for ArgosTxScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrepassError;
    use crate::prepass::SatellitePass;
    use crate::testutil::test_argos_config as test_config;

    struct SinglePass {
        pass: SatellitePass,
        downlink: Option<SatellitePass>,
    }

    impl PassPredictor for SinglePass {
        fn next_pass(
            &mut self,
            config: &PredictionConfig,
            _aop: &[AopSatelliteEntry],
        ) -> Result<Option<SatellitePass>, PrepassError> {
            let start = config.start.to_epoch().unwrap_or(0);
            if self.pass.end_epoch() > start {
                Ok(Some(self.pass))
            } else {
                Ok(None)
            }
        }

        fn next_pass_with_status(
            &mut self,
            _config: &PredictionConfig,
            _aop: &[AopSatelliteEntry],
            _min_downlink: DownlinkStatus,
            _min_uplink: UplinkStatus,
        ) -> Result<Option<SatellitePass>, PrepassError> {
            Ok(self.downlink)
        }
    }

    #[test]
    fn duty_cycle_all_hours_first_tx_is_immediate() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(60, 0xFF_FFFF, false);
        assert_eq!(sched.schedule_duty_cycle(&config, 0), Some(0));
    }

    #[test]
    fn duty_cycle_advances_by_tr_nom_after_a_tx() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(60, 0xFF_FFFF, false);
        assert_eq!(sched.schedule_duty_cycle(&config, 0), Some(0));
        sched.notify_tx_complete();
        assert_eq!(sched.schedule_duty_cycle(&config, 0), Some(60_000));
    }

    #[test]
    fn hourly_duty_cycle_waits_for_permitted_hour() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        // Hour 0 UTC only; at 01:00 the next permitted instant is 23h away
        let config = test_config(60, 0x80_0000, false);
        assert_eq!(
            sched.schedule_duty_cycle(&config, 3600),
            Some(23 * 3600 * 1000)
        );
    }

    #[test]
    fn empty_duty_cycle_disables_schedule() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(60, 0, false);
        assert_eq!(sched.schedule_duty_cycle(&config, 0), None);
    }

    #[test]
    fn legacy_mode_ignores_duty_cycle_mask() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(3600, 0, false);
        assert_eq!(sched.schedule_legacy(&config, 0), Some(0));
    }

    #[test]
    fn jitter_stays_within_bounds_and_is_deterministic_per_seed() {
        let config = test_config(60, 0xFF_FFFF, true);
        let mut a = ArgosTxScheduler::new();
        let mut b = ArgosTxScheduler::new();
        a.reset(77);
        b.reset(77);
        let ra = a.schedule_duty_cycle(&config, 0).unwrap();
        let rb = b.schedule_duty_cycle(&config, 0).unwrap();
        assert_eq!(ra, rb);
        assert!(ra <= TX_JITTER_MS as u64);
    }

    #[test]
    fn earliest_schedule_floors_the_next_tx() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(60, 0xFF_FFFF, false);
        sched.set_earliest_schedule(500);
        assert_eq!(sched.schedule_duty_cycle(&config, 100), Some(400_000));
    }

    #[test]
    fn prepass_needs_a_location() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(60, 0xFF_FFFF, false);
        let mut predictor = SinglePass {
            pass: SatellitePass {
                sat_hex_id: 0xA,
                downlink_status: DownlinkStatus::WithA3,
                uplink_status: UplinkStatus::WithA3,
                epoch: 1000,
                duration_s: 600,
            },
            downlink: None,
        };
        assert!(sched
            .schedule_prepass(&config, &[], &mut predictor, 0, false)
            .is_none());
    }

    #[test]
    fn prepass_schedules_inside_the_pass_window() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(60, 0xFF_FFFF, false);
        sched.set_last_location(-3.5, 50.1);
        let pass = SatellitePass {
            sat_hex_id: 0xA,
            downlink_status: DownlinkStatus::WithA3,
            uplink_status: UplinkStatus::WithA3,
            epoch: 1000,
            duration_s: 600,
        };
        let mut predictor = SinglePass {
            pass,
            downlink: Some(pass),
        };
        let outcome = sched
            .schedule_prepass(&config, &[], &mut predictor, 0, true)
            .unwrap();
        assert_eq!(outcome.relative_ms, 1_000_000);
        assert_eq!(outcome.modulation, ArgosModulation::A3);
        assert_eq!(outcome.rx_window, Some((1000, 1600)));
    }

    #[test]
    fn prepass_uses_a2_for_legacy_uplink_satellites() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        let config = test_config(60, 0xFF_FFFF, false);
        sched.set_last_location(-3.5, 50.1);
        let pass = SatellitePass {
            sat_hex_id: 0x5,
            downlink_status: DownlinkStatus::Off,
            uplink_status: UplinkStatus::WithA2,
            epoch: 500,
            duration_s: 300,
        };
        let mut predictor = SinglePass {
            pass,
            downlink: None,
        };
        let outcome = sched
            .schedule_prepass(&config, &[], &mut predictor, 0, false)
            .unwrap();
        assert_eq!(outcome.modulation, ArgosModulation::A2);
        assert_eq!(outcome.rx_window, None);
    }

    #[test]
    fn certification_first_is_immediate_then_periodic() {
        let mut sched = ArgosTxScheduler::new();
        sched.reset(1);
        assert_eq!(sched.schedule_certification(60, true, 100), 0);
        assert_eq!(sched.schedule_certification(60, false, 100), 60_000);
    }
}
