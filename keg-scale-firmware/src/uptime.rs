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


use embassy_time::Instant;
use keg_scale::clock::{TimeSource, Timestamp};

/// Wall clock derived from the uptime counter and the epoch time at boot.
pub struct UptimeClock {
    epoch_at_boot: Timestamp,
}

impl UptimeClock {
    pub const fn new(epoch_at_boot: Timestamp) -> Self {
        Self { epoch_at_boot }
    }
}

impl TimeSource for UptimeClock {
    fn now(&self) -> Timestamp {
        self.epoch_at_boot
            .saturating_add(Instant::now().as_secs() as Timestamp)
    }
}
