//! Decoded sensor readings.
//!
//! Readings are produced by the signal decoder and passed through the
//! registry untouched. Fields the decoder could not recover are `None`.

use serde::{Deserialize, Serialize};

/// Channel marker the decoder uses for a report that no signal was heard.
pub const DEAD_AIR_CHANNEL: char = '-';

/// One decoded temperature/humidity transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Sensor channel letter (`A`, `B` or `C`).
    pub channel: char,
    /// Collection time, Unix seconds.
    pub collection_time: i64,
    pub battery_low: bool,
    /// Relative humidity, percent.
    pub humidity: Option<i32>,
    /// Raw 12-bit temperature field.
    pub raw_temp: Option<i32>,
    pub temp_celsius: Option<f64>,
    pub temp_fahrenheit: Option<f64>,
    /// Undecoded sub-fields of the transmission.
    pub misc_data1: i32,
    pub misc_data2: i32,
    pub misc_data3: i32,
    /// Decoder ranking of this capture among its repeats.
    pub rank: i32,
    /// Number of repeated transmissions captured for this message.
    pub repeats_captured: i32,
    /// Decoder confidence, 0-100.
    pub signal_quality: i32,
    pub valid_checksum: bool,
}

impl SensorReading {
    /// Create a reading for `channel` with no measured values.
    pub fn new(channel: char, collection_time: i64) -> Self {
        Self {
            channel,
            collection_time,
            battery_low: false,
            humidity: None,
            raw_temp: None,
            temp_celsius: None,
            temp_fahrenheit: None,
            misc_data1: 0,
            misc_data2: 0,
            misc_data3: 0,
            rank: 0,
            repeats_captured: 0,
            signal_quality: 0,
            valid_checksum: false,
        }
    }

    /// Set humidity.
    pub fn with_humidity(mut self, humidity: i32) -> Self {
        self.humidity = Some(humidity);
        self
    }

    /// Set the raw temperature and the derived Celsius/Fahrenheit values.
    ///
    /// The raw field counts tenths of a degree Celsius offset by 1000.
    pub fn with_raw_temp(mut self, raw_temp: i32) -> Self {
        let celsius = f64::from(raw_temp - 1000) / 10.0;
        self.raw_temp = Some(raw_temp);
        self.temp_celsius = Some(celsius);
        self.temp_fahrenheit = Some(((celsius * 1.8 + 32.0) * 10.0).round() / 10.0);
        self
    }

    pub fn with_signal_quality(mut self, quality: i32) -> Self {
        self.signal_quality = quality;
        self
    }

    pub fn with_valid_checksum(mut self, valid: bool) -> Self {
        self.valid_checksum = valid;
        self
    }

    pub fn with_battery_low(mut self, low: bool) -> Self {
        self.battery_low = low;
        self
    }

    pub fn with_repeats(mut self, rank: i32, repeats_captured: i32) -> Self {
        self.rank = rank;
        self.repeats_captured = repeats_captured;
        self
    }

    /// Whether this is a "no signal" report rather than a transmission.
    pub fn is_dead_air(&self) -> bool {
        self.channel == DEAD_AIR_CHANNEL
    }
}
