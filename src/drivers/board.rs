// wristhub — ESP32-C3 Board Glue
//
// Task watchdog and the battery ADC. The Xiao has no charger status pin, so
// charging always reads false.

use super::{BatterySense, Board};
use crate::config::*;

pub struct EspBoard;

impl Board for EspBoard {
    fn kick_watchdog(&mut self) {
        // Not subscribed to the TWDT is fine; the call then just reports an error.
        unsafe {
            esp_idf_sys::esp_task_wdt_reset();
        }
    }

    fn is_charging(&self) -> bool {
        false
    }
}

/// One-shot ADC on GPIO2 / ADC1 channel 2, 11 dB attenuation (0–3.3 V).
pub struct AdcBattery {
    handle: esp_idf_sys::adc_oneshot_unit_handle_t,
    channel: esp_idf_sys::adc_channel_t,
}

// SAFETY: the handle is only used through `&mut self`, from the idle loop.
unsafe impl Send for AdcBattery {}

impl AdcBattery {
    pub fn new() -> anyhow::Result<Self> {
        let channel = esp_idf_sys::adc_channel_t_ADC_CHANNEL_2;
        unsafe {
            let mut handle: esp_idf_sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
            let unit_cfg = esp_idf_sys::adc_oneshot_unit_init_cfg_t {
                unit_id: esp_idf_sys::adc_unit_t_ADC_UNIT_1,
                ulp_mode: esp_idf_sys::adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..core::mem::zeroed()
            };
            esp_idf_sys::esp!(esp_idf_sys::adc_oneshot_new_unit(&unit_cfg, &mut handle))?;

            let chan_cfg = esp_idf_sys::adc_oneshot_chan_cfg_t {
                atten: esp_idf_sys::adc_atten_t_ADC_ATTEN_DB_11,
                bitwidth: esp_idf_sys::adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            esp_idf_sys::esp!(esp_idf_sys::adc_oneshot_config_channel(handle, channel, &chan_cfg))?;
            Ok(Self { handle, channel })
        }
    }
}

impl BatterySense for AdcBattery {
    fn voltage(&mut self) -> anyhow::Result<f32> {
        let mut raw: i32 = 0;
        unsafe {
            esp_idf_sys::esp!(esp_idf_sys::adc_oneshot_read(self.handle, self.channel, &mut raw))?;
        }
        Ok((raw as f32 / 4095.0) * 3.3 * BATTERY_DIVIDER)
    }
}
