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


use crate::recording::RecordingEntry;
use crate::tap::TapEntry;
use minicbor::{CborLen, Decode, Encode};

/// Operations an observer can request on a single channel.
#[derive(Debug, Clone, PartialEq, Decode, Encode, CborLen)]
pub enum ChannelCommand {
    #[n(0)] Standby,
    #[n(1)] LiveMeasurement,
    #[n(2)] Tare,
    #[n(3)] Calibrate(#[n(0)] f32),
    #[n(4)] StartRecording(#[n(0)] TapEntry),
    #[n(5)] PutRecordingEntry(#[n(0)] RecordingEntry),
    #[n(6)] PauseRecording,
    #[n(7)] ContinueRecording,
    #[n(8)] StopRecording,
}

#[derive(Debug, Clone, PartialEq, Decode, Encode, CborLen)]
pub struct CommandMessage {
    #[n(0)] pub index: u16,
    #[n(1)] pub command: ChannelCommand,
}
