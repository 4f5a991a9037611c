#![no_std]
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


//! Core of a multi channel keg scale: per channel measurement states, consumption recording
//! and persisted calibration.
//!
//! Hardware is reached through the `MassSensing`, `TimeSource` and `PersistentRegion` traits so
//! the same code runs on the device and in host tests.

extern crate alloc;

pub mod calibration;
pub mod channel;
pub mod channel_set;
pub mod clock;
pub mod config;
pub mod logger;
pub mod recorder;
pub mod sensing;
pub mod state;

#[cfg(test)]
mod testing;

pub use keg_scale_messages as messages;

pub use calibration::{Calibration, CalibrationError, CalibrationStore, SharedCalibrationStore};
pub use channel::{ChannelManager, SharedResources};
pub use channel_set::{ChannelSet, CommandError, SnapshotSink};
pub use recorder::{RecorderError, SharedRecorder, VolumeRecorder};
pub use state::{ChannelState, UpdateResult};
