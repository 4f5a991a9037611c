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


//! Per channel tare offset and calibration factor, persisted in a fixed size region.

mod region;

pub use region::{EepromRegion, PersistentRegion, RegionError};

use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::NoopMutex;
use log::{debug, warn};

/// Serialized size of one `Calibration`: `i32` tare offset then `f32` factor, little endian.
pub const RECORD_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    ZeroChannels,
    RegionUnavailable,
    ReadFailed,
    WriteFailed,
    CommitFailed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub tare_offset: i32,
    pub calibration_factor: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            tare_offset: 0,
            calibration_factor: 1.0,
        }
    }
}

impl Calibration {
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[..4].copy_from_slice(&self.tare_offset.to_le_bytes());
        bytes[4..].copy_from_slice(&self.calibration_factor.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        Self {
            tare_offset: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            calibration_factor: f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Calibration store shared between the channels of one device.
pub type SharedCalibrationStore<R> = NoopMutex<RefCell<CalibrationStore<R>>>;

/// One `Calibration` per channel, index aligned with the channel configuration.
///
/// Records live in memory; channels mutate them in place through the shared store and nothing
/// reaches the region until `save`.
pub struct CalibrationStore<R> {
    region: R,
    records: Vec<Calibration>,
}

impl<R> CalibrationStore<R>
where
    R: PersistentRegion,
{
    /// Size the region for `channel_count` records and read them back.
    ///
    /// A region without prior data is initialised with default records which are committed
    /// straight away.
    pub fn load(mut region: R, channel_count: usize) -> Result<Self, CalibrationError> {
        if channel_count == 0 {
            return Err(CalibrationError::ZeroChannels);
        }

        region.begin(channel_count * RECORD_SIZE).map_err(|e| {
            warn!("Unable to open calibration region. Error: {:?}", e);
            CalibrationError::RegionUnavailable
        })?;

        if region.percent_used() < 0 {
            debug!("No stored calibration, writing defaults for {} channels", channel_count);
            let mut store = Self {
                region,
                records: vec![Calibration::default(); channel_count],
            };
            store.save()?;
            return Ok(store);
        }

        let mut records = Vec::with_capacity(channel_count);
        for index in 0..channel_count {
            let mut bytes = [0u8; RECORD_SIZE];
            region.read(index * RECORD_SIZE, &mut bytes).map_err(|e| {
                warn!("Unable to read calibration {}. Error: {:?}", index, e);
                CalibrationError::ReadFailed
            })?;
            records.push(Calibration::from_bytes(&bytes));
        }
        debug!("Loaded calibration for {} channels", channel_count);

        Ok(Self { region, records })
    }

    /// Serialize every record and commit the region once.
    pub fn save(&mut self) -> Result<(), CalibrationError> {
        for (index, record) in self.records.iter().enumerate() {
            self.region
                .write(index * RECORD_SIZE, &record.to_bytes())
                .map_err(|e| {
                    warn!("Unable to stage calibration {}. Error: {:?}", index, e);
                    CalibrationError::WriteFailed
                })?;
        }
        self.region.commit().map_err(|e| {
            warn!("Unable to commit calibration. Error: {:?}", e);
            CalibrationError::CommitFailed
        })
    }

    pub fn into_shared(self) -> SharedCalibrationStore<R> {
        NoopMutex::new(RefCell::new(self))
    }

    pub fn region(&self) -> &R {
        &self.region
    }
}

impl<R> CalibrationStore<R> {
    pub fn calibration(&self, index: usize) -> Option<Calibration> {
        self.records.get(index).copied()
    }

    pub fn calibration_mut(&mut self, index: usize) -> Option<&mut Calibration> {
        self.records.get_mut(index)
    }

    pub fn records(&self) -> &[Calibration] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
