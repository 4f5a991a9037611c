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


use crate::clock::Timestamp;
use crate::config::BUCKET_COUNT;

/// Time at which each volume bucket was first reached, `0` for buckets not reached yet.
#[derive(Clone, PartialEq, Eq)]
pub struct BucketHistory {
    slots: [Timestamp; BUCKET_COUNT],
}

impl Default for BucketHistory {
    fn default() -> Self {
        Self {
            slots: [0; BUCKET_COUNT],
        }
    }
}

impl core::fmt::Debug for BucketHistory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter_reached()).finish()
    }
}

impl BucketHistory {
    pub fn get(&self, bucket: usize) -> Option<Timestamp> {
        self.slots.get(bucket).copied()
    }

    /// Returns `false` without writing when `bucket` is out of range.
    pub fn set(&mut self, bucket: usize, reached_at: Timestamp) -> bool {
        match self.slots.get_mut(bucket) {
            Some(slot) => {
                *slot = reached_at;
                true
            }
            None => false,
        }
    }

    pub fn is_reached(&self, bucket: usize) -> bool {
        self.get(bucket).is_some_and(|t| t != 0)
    }

    /// Reached buckets in ascending bucket order.
    pub fn iter_reached(&self) -> impl DoubleEndedIterator<Item = (usize, Timestamp)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, t)| **t != 0)
            .map(|(i, t)| (i, *t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_are_bounds_checked() {
        let mut history = BucketHistory::default();
        assert!(history.set(BUCKET_COUNT - 1, 10));
        assert!(!history.set(BUCKET_COUNT, 10));
        assert_eq!(history.get(BUCKET_COUNT), None);
        assert!(history.is_reached(BUCKET_COUNT - 1));
        assert!(!history.is_reached(0));
    }

    #[test]
    fn reached_buckets_iterate_in_order() {
        let mut history = BucketHistory::default();
        history.set(7, 30);
        history.set(3, 40);

        let reached: alloc::vec::Vec<_> = history.iter_reached().collect();
        assert_eq!(reached, [(3, 40), (7, 30)]);
    }
}
