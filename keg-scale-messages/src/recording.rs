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


use crate::custom_data_types::{BucketIndex, Timestamp};
use crate::tap::TapEntry;
use alloc::collections::BTreeMap;
use minicbor::{CborLen, Decode, Encode};

/// Exported form of a recording session, used to download a recording and to upload it again.
///
/// `data` is sparse: only buckets that were reached are present, keyed by bucket index.
#[derive(Debug, Clone, PartialEq, Default, Decode, Encode, CborLen)]
pub struct RecordingEntry {
    #[n(0)] pub tap_entry: TapEntry,
    #[n(1)] pub started_at: Timestamp,
    #[n(2)] pub is_paused: bool,
    #[n(3)] pub data: BTreeMap<BucketIndex, Timestamp>,
}

impl RecordingEntry {
    pub fn new(tap_entry: TapEntry, started_at: Timestamp) -> Self {
        Self {
            tap_entry,
            started_at,
            is_paused: false,
            data: BTreeMap::new(),
        }
    }
}
