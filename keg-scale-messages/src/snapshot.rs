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


use crate::custom_data_types::Timestamp;
use crate::tap::TapEntry;
use alloc::collections::BTreeMap;
use alloc::string::String;
use minicbor::{CborLen, Decode, Encode};

/// Everything an observer needs to draw one channel.
#[derive(Debug, Clone, PartialEq, Decode, Encode, CborLen)]
pub struct ChannelSnapshot {
    #[n(0)] pub index: u16,
    #[n(1)] pub label: String,
    #[n(2)] pub state: StateSnapshot,
    #[n(3)] pub sensor: SensorSnapshot,
}

#[derive(Debug, Clone, PartialEq, Default, Decode, Encode, CborLen)]
pub struct StateSnapshot {
    #[n(0)] pub name: String,
    /// Live mass reading, absent while the channel is offline.
    #[n(1)] pub mass: Option<f32>,
    #[n(2)] pub known_mass: Option<f32>,
    #[n(3)] pub recording: Option<RecordingSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Default, Decode, Encode, CborLen)]
pub struct RecordingSnapshot {
    #[n(0)] pub is_paused: bool,
    /// Only sent with a full snapshot.
    #[n(1)] pub tap_entry: Option<TapEntry>,
    /// Remaining liters keyed by the time they were first reached.
    #[n(2)] pub data: BTreeMap<Timestamp, f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Decode, Encode, CborLen)]
pub struct SensorSnapshot {
    #[n(0)] pub tare_offset: i32,
    #[n(1)] pub calibration_factor: f32,
    #[n(2)] pub tare_timeout: bool,
    #[n(3)] pub signal_timeout: bool,
}
