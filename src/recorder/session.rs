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


use super::RecorderError;
use super::buckets::BucketHistory;
use crate::clock::Timestamp;
use crate::config::{BUCKET_COUNT, POINTS_PER_LITER, RECENT_WINDOW_SECONDS};
use alloc::collections::BTreeMap;
use keg_scale_messages::custom_data_types::BucketIndex;
use keg_scale_messages::recording::RecordingEntry;
use keg_scale_messages::snapshot::RecordingSnapshot;
use keg_scale_messages::tap::TapEntry;
use log::trace;
use micromath::F32Ext;

/// Consumption recording of the keg on one channel.
///
/// The remaining volume is quantised into buckets of `1 / POINTS_PER_LITER` liters. A bucket is
/// stamped with the time it was first reached, and only buckets below every previously accepted
/// one are accepted, so the recorded volume never goes back up.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    tap: TapEntry,
    started_at: Timestamp,
    is_paused: bool,
    buckets: BucketHistory,
    high_water: usize,
}

impl RecordingSession {
    /// Start recording `tap` with `current_mass` on the scale.
    ///
    /// With `use_bottling_volume` set the keg is assumed to be full right now, so its tare offset
    /// is derived from the current mass.
    pub fn start(mut tap: TapEntry, current_mass: f32, now: Timestamp) -> Result<Self, RecorderError> {
        check_gravity(&tap)?;
        if tap.use_bottling_volume {
            tap.tare_offset = current_mass - tap.bottling_volume * tap.final_gravity;
            trace!("Derived tare offset {} for '{}'", tap.tare_offset, tap.name.as_str());
        }
        Ok(Self {
            tap,
            started_at: now,
            is_paused: false,
            buckets: BucketHistory::default(),
            high_water: BUCKET_COUNT,
        })
    }

    /// Rebuild a session from an exported record.
    pub fn import(entry: RecordingEntry) -> Result<Self, RecorderError> {
        check_gravity(&entry.tap_entry)?;
        let mut buckets = BucketHistory::default();
        for (&bucket, &reached_at) in entry.data.iter() {
            if reached_at == 0 {
                return Err(RecorderError::InvalidTimestamp(bucket));
            }
            if !buckets.set(bucket as usize, reached_at) {
                return Err(RecorderError::InvalidBucket(bucket));
            }
        }
        Ok(Self {
            tap: entry.tap_entry,
            started_at: entry.started_at,
            is_paused: entry.is_paused,
            buckets,
            high_water: BUCKET_COUNT,
        })
    }

    pub fn export(&self) -> RecordingEntry {
        RecordingEntry {
            tap_entry: self.tap.clone(),
            started_at: self.started_at,
            is_paused: self.is_paused,
            data: self
                .buckets
                .iter_reached()
                .map(|(bucket, reached_at)| (bucket as BucketIndex, reached_at))
                .collect(),
        }
    }

    /// Bucket a mass reading falls into, `None` when it is not a valid bucket.
    fn bucket_for(&self, mass: f32) -> Option<usize> {
        let points =
            (mass - self.tap.tare_offset) / self.tap.final_gravity * POINTS_PER_LITER as f32;
        if !points.is_finite() {
            return None;
        }
        let bucket = F32Ext::round(points);
        if bucket < 0.0 || bucket >= BUCKET_COUNT as f32 {
            return None;
        }
        Some(bucket as usize)
    }

    /// Record a mass reading. Returns `true` when a new bucket was reached.
    pub fn update(&mut self, mass: f32, now: Timestamp) -> bool {
        if self.is_paused {
            return false;
        }
        let Some(bucket) = self.bucket_for(mass) else {
            return false;
        };
        if self.tap.use_bottling_volume
            && bucket as f32 > self.tap.bottling_volume * POINTS_PER_LITER as f32
        {
            return false;
        }
        if bucket >= self.high_water || self.buckets.is_reached(bucket) {
            return false;
        }

        self.high_water = bucket;
        self.buckets.set(bucket, now)
    }

    pub fn pause(&mut self) {
        self.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.is_paused = false;
    }

    /// Remaining liters keyed by the time they were reached. A partial render is limited to the
    /// buckets reached within `RECENT_WINDOW_SECONDS` of `now`.
    pub fn render(&self, full: bool, now: Timestamp) -> RecordingSnapshot {
        let mut data = BTreeMap::new();
        // Descending so the lowest volume wins a shared timestamp.
        for (bucket, reached_at) in self.buckets.iter_reached().rev() {
            if full || now.saturating_sub(reached_at) <= RECENT_WINDOW_SECONDS {
                data.insert(reached_at, bucket as f32 / POINTS_PER_LITER as f32);
            }
        }
        RecordingSnapshot {
            is_paused: self.is_paused,
            tap_entry: full.then(|| self.tap.clone()),
            data,
        }
    }

    pub fn tap(&self) -> &TapEntry {
        &self.tap
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    pub fn buckets(&self) -> &BucketHistory {
        &self.buckets
    }
}

/// Mass per liter must be positive for readings to map onto buckets.
fn check_gravity(tap: &TapEntry) -> Result<(), RecorderError> {
    if tap.final_gravity > 0.0 {
        Ok(())
    } else {
        Err(RecorderError::InvalidGravity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keg_scale_messages::tap::TapEntryBuilder;

    fn fixed_tare_tap() -> TapEntry {
        TapEntryBuilder::new("Pale Ale").tare_offset(50.0).build()
    }

    #[test]
    fn reading_maps_to_bucket_once() {
        let mut session = RecordingSession::start(fixed_tare_tap(), 5155.0, 900).unwrap();

        assert!(session.update(5155.0, 1000));
        assert_eq!(session.buckets().get(101), Some(1000));
        assert!(!session.update(5155.0, 1005));
        assert_eq!(session.buckets().get(101), Some(1000));
        assert_eq!(session.high_water(), 101);
    }

    #[test]
    fn volume_never_goes_back_up() {
        let mut session = RecordingSession::start(fixed_tare_tap(), 0.0, 900).unwrap();
        assert!(session.update(5155.0, 1000));

        // bucket 150
        assert!(!session.update(50.0 + 150.0 / 20.0 * 1010.0, 1010));
        assert_eq!(session.buckets().get(150), Some(0));

        let mut accepted = alloc::vec::Vec::new();
        for (step, liters) in [4.9f32, 4.95, 4.5, 4.6, 3.0, 0.0].iter().enumerate() {
            let mass = 50.0 + liters * 1010.0;
            if session.update(mass, 1100 + step as Timestamp) {
                accepted.push(session.high_water());
            }
        }
        assert_eq!(accepted, [98, 90, 60, 0]);
        assert!(accepted.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn readings_outside_range_are_rejected() {
        let mut session = RecordingSession::start(fixed_tare_tap(), 0.0, 900).unwrap();
        assert!(!session.update(-500.0, 1000));
        assert!(!session.update(50.0 + 21.0 * 1010.0, 1000));
        assert!(!session.update(f32::NAN, 1000));
        assert!(!session.update(f32::INFINITY, 1000));
        assert!(!session.update(f32::NEG_INFINITY, 1000));
        assert_eq!(session.high_water(), BUCKET_COUNT);
        assert_eq!(session.buckets().iter_reached().count(), 0);

        assert!(session.update(5155.0, 1001));
        assert_eq!(session.high_water(), 101);
    }

    #[test]
    fn tap_without_positive_gravity_cannot_record() {
        for gravity in [0.0, -1010.0, f32::NAN] {
            let tap = TapEntryBuilder::new("Flat").tare_offset(50.0).final_gravity(gravity).build();
            assert_eq!(
                RecordingSession::start(tap.clone(), 50.0, 900),
                Err(RecorderError::InvalidGravity)
            );
            assert_eq!(
                RecordingSession::import(RecordingEntry::new(tap, 900)),
                Err(RecorderError::InvalidGravity)
            );
        }
    }

    #[test]
    fn tare_offset_is_derived_from_bottling_volume() {
        let tap = TapEntryBuilder::new("Porter").bottling_volume(19.0).final_gravity(1010.0).build();
        let session = RecordingSession::start(tap, 25000.0, 900).unwrap();
        assert_eq!(session.tap().tare_offset, 25000.0 - 19.0 * 1010.0);
    }

    #[test]
    fn bottling_volume_caps_recordable_volume() {
        let tap = TapEntryBuilder::new("Porter").bottling_volume(10.0).final_gravity(1000.0).build();
        let mut session = RecordingSession::start(tap, 15000.0, 900).unwrap();

        assert!(!session.update(15000.0 + 1000.0, 1000));
        assert!(session.update(15000.0, 1001));
        assert_eq!(session.high_water(), 200);
    }

    #[test]
    fn paused_session_ignores_readings() {
        let mut session = RecordingSession::start(fixed_tare_tap(), 0.0, 900).unwrap();
        session.pause();
        session.pause();
        assert!(session.is_paused());
        assert!(!session.update(5155.0, 1000));

        session.resume();
        assert!(session.update(5155.0, 1000));
    }

    #[test]
    fn partial_render_only_reports_recent_buckets() {
        let mut session = RecordingSession::start(fixed_tare_tap(), 0.0, 900).unwrap();
        session.update(50.0 + 10.0 * 1010.0, 1000);
        session.update(50.0 + 9.0 * 1010.0, 1010);

        let partial = session.render(false, 1012);
        assert_eq!(partial.tap_entry, None);
        assert_eq!(partial.data.len(), 1);
        assert_eq!(partial.data.get(&1010), Some(&9.0));

        let full = session.render(true, 1012);
        assert_eq!(full.tap_entry.as_ref(), Some(session.tap()));
        assert_eq!(full.data.get(&1000), Some(&10.0));
    }

    #[test]
    fn shared_timestamp_reports_lower_volume() {
        let mut session = RecordingSession::start(fixed_tare_tap(), 0.0, 900).unwrap();
        session.update(50.0 + 10.0 * 1010.0, 1000);
        session.update(50.0 + 9.0 * 1010.0, 1000);

        let full = session.render(true, 1000);
        assert_eq!(full.data.len(), 1);
        assert_eq!(full.data.get(&1000), Some(&9.0));
    }

    #[test]
    fn export_and_import_restore_the_session() {
        let mut session = RecordingSession::start(fixed_tare_tap(), 0.0, 900).unwrap();
        session.update(5155.0, 1000);
        session.update(4000.0, 1200);
        session.pause();

        let restored = RecordingSession::import(session.export()).unwrap();
        assert_eq!(restored.tap(), session.tap());
        assert_eq!(restored.started_at(), 900);
        assert!(restored.is_paused());
        assert_eq!(restored.buckets(), session.buckets());
        assert_eq!(restored.high_water(), BUCKET_COUNT);
    }

    #[test]
    fn import_rejects_invalid_records() {
        let mut entry = RecordingEntry::new(fixed_tare_tap(), 900);
        entry.data.insert(BUCKET_COUNT as BucketIndex, 1000);
        assert_eq!(
            RecordingSession::import(entry),
            Err(RecorderError::InvalidBucket(BUCKET_COUNT as BucketIndex))
        );

        let mut entry = RecordingEntry::new(fixed_tare_tap(), 900);
        entry.data.insert(12, 0);
        assert_eq!(
            RecordingSession::import(entry),
            Err(RecorderError::InvalidTimestamp(12))
        );
    }
}
