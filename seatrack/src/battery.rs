//! Battery monitor: cached voltage/level readings with an edge-triggered
//! critical-voltage notification.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::hal::BatteryGauge;

/// Notification produced by [`BatteryMonitor::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryEvent {
    /// The voltage crossed below the critical threshold since the previous
    /// update.
    VoltageCritical,
}

pub struct BatteryMonitor {
    gauge: Rc<RefCell<dyn BatteryGauge>>,
    low_level_percent: u8,
    critical_voltage_mv: u16,
    last_voltage_mv: u16,
    last_level: u8,
    is_low_level: bool,
    is_critical: bool,
    was_critical: bool,
}

impl BatteryMonitor {
    pub fn new(
        gauge: Rc<RefCell<dyn BatteryGauge>>,
        low_level_percent: u8,
        critical_voltage_mv: u16,
    ) -> Self {
        Self {
            gauge,
            low_level_percent,
            critical_voltage_mv,
            last_voltage_mv: 0,
            last_level: 0,
            is_low_level: false,
            is_critical: false,
            was_critical: false,
        }
    }

    /// Refresh the cached readings; reports the critical-voltage crossing
    /// exactly once per downward edge.
    pub fn update(&mut self) -> Option<BatteryEvent> {
        {
            let mut gauge = self.gauge.borrow_mut();
            self.last_voltage_mv = gauge.voltage_mv();
            self.last_level = gauge.level_percent();
        }
        self.is_low_level = self.last_level <= self.low_level_percent;
        self.is_critical = self.last_voltage_mv < self.critical_voltage_mv;

        let event = if self.is_critical && !self.was_critical {
            warn!(
                voltage_mv = self.last_voltage_mv,
                "battery voltage critical"
            );
            Some(BatteryEvent::VoltageCritical)
        } else {
            None
        };
        self.was_critical = self.is_critical;
        event
    }

    pub fn voltage_mv(&self) -> u16 {
        self.last_voltage_mv
    }

    pub fn level_percent(&self) -> u8 {
        self.last_level
    }

    pub fn is_battery_low(&self) -> bool {
        self.is_low_level
    }

    pub fn is_battery_critical(&self) -> bool {
        self.is_critical
    }
}
