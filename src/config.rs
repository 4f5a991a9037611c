// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.


//! Static device configuration handed over by the bootstrap code, plus the fixed geometry of
//! the consumption recorder.

use crate::clock::Timestamp;
use alloc::string::String;
use alloc::vec::Vec;

/// Recorder resolution, one bucket per 50 ml.
pub const POINTS_PER_LITER: usize = 20;
/// Largest keg a channel can record.
pub const MAX_LITERS: usize = 20;
pub const BUCKET_COUNT: usize = POINTS_PER_LITER * MAX_LITERS;

/// Partial snapshots only carry buckets reached within this many seconds.
pub const RECENT_WINDOW_SECONDS: Timestamp = 5;
pub const LIVE_MEASUREMENT_REFRESH_SECONDS: Timestamp = 1;
/// Time the sensing front end may go without a conversion before it is considered offline.
pub const SIGNAL_TIMEOUT_MS: u32 = 1000;

pub const DEFAULT_GAIN: u8 = 128;
const SUPPORTED_GAINS: [u8; 3] = [32, 64, 128];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    NoChannels,
    UnsupportedGain(usize),
    SharedDataPin(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub label: String,
    pub clock_pin: u8,
    pub data_pin: u8,
    pub gain: u8,
    /// Load cell mounted upside down, readings are negated by the front end.
    pub reverse: bool,
}

impl ChannelConfig {
    pub fn new(label: &str, clock_pin: u8, data_pin: u8) -> Self {
        Self {
            label: String::from(label),
            clock_pin,
            data_pin,
            gain: DEFAULT_GAIN,
            reverse: false,
        }
    }

    pub fn with_gain(mut self, gain: u8) -> Self {
        self.gain = gain;
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Reference mass offered to the user for tare or calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownWeight {
    pub label: String,
    /// Grams.
    pub mass: u16,
    pub for_tare: bool,
    pub for_calibration: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub hostname: String,
    pub channels: Vec<ChannelConfig>,
    pub weights: Vec<KnownWeight>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: String::from("keg-scale"),
            channels: Vec::new(),
            weights: Vec::new(),
        }
    }
}

impl DeviceConfig {
    /// The channel count sizes the calibration region, so a configuration without channels or
    /// with two channels reading the same data line is rejected before anything is allocated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        for (index, channel) in self.channels.iter().enumerate() {
            if !SUPPORTED_GAINS.contains(&channel.gain) {
                return Err(ConfigError::UnsupportedGain(index));
            }
            if self.channels[..index]
                .iter()
                .any(|other| other.data_pin == channel.data_pin)
            {
                return Err(ConfigError::SharedDataPin(index));
            }
        }
        Ok(())
    }

    pub fn tare_weights(&self) -> impl Iterator<Item = &KnownWeight> {
        self.weights.iter().filter(|w| w.for_tare)
    }

    pub fn calibration_weights(&self) -> impl Iterator<Item = &KnownWeight> {
        self.weights.iter().filter(|w| w.for_calibration)
    }
}
