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


use alloc::string::String;
use minicbor::{CborLen, Decode, Encode};

/// Description of the keg mounted on a channel.
///
/// Entries come either from the batch catalog or from an uploaded recording. A recording
/// session takes its own copy, after which only `tare_offset` may change.
#[derive(Debug, Clone, PartialEq, Default, Decode, Encode, CborLen)]
pub struct TapEntry {
    /// Catalog identifier, `None` for manually entered kegs.
    #[n(0)] pub id: Option<String>,
    #[n(1)] pub number: u16,
    #[n(2)] pub name: String,
    /// ISO 8601 date, `YYYY-MM-DD`.
    #[n(3)] pub bottling_date: String,
    /// Liters.
    #[n(4)] pub bottling_volume: f32,
    /// Derive the tare offset from the bottling volume and cap the recordable volume by it.
    #[n(5)] pub use_bottling_volume: bool,
    /// Mass reading of the empty keg and tap hardware.
    #[n(6)] pub tare_offset: f32,
    /// Grams per liter.
    #[n(7)] pub final_gravity: f32,
    #[n(8)] pub abv: f32,
    #[n(9)] pub srm: f32,
}

/// A builder for creating a `TapEntry`, starting from the defaults of a typical ale.
pub struct TapEntryBuilder {
    entry: TapEntry,
}

impl TapEntryBuilder {
    const DEFAULT_FINAL_GRAVITY: f32 = 1010.0;
    const DEFAULT_BOTTLING_VOLUME: f32 = 19.0;
    const DEFAULT_ABV: f32 = 5.0;
    const DEFAULT_SRM: f32 = 9.0;

    /// Creates a new builder for a keg with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            entry: TapEntry {
                id: None,
                number: 0,
                name: String::from(name),
                bottling_date: String::new(),
                bottling_volume: Self::DEFAULT_BOTTLING_VOLUME,
                use_bottling_volume: true,
                tare_offset: 0.0,
                final_gravity: Self::DEFAULT_FINAL_GRAVITY,
                abv: Self::DEFAULT_ABV,
                srm: Self::DEFAULT_SRM,
            },
        }
    }

    /// Sets the catalog identifier.
    pub fn id(mut self, id: &str) -> Self {
        self.entry.id = Some(String::from(id));
        self
    }

    /// Sets the batch number.
    pub fn number(mut self, number: u16) -> Self {
        self.entry.number = number;
        self
    }

    pub fn bottling_date(mut self, date: &str) -> Self {
        self.entry.bottling_date = String::from(date);
        self
    }

    pub fn bottling_volume(mut self, liters: f32) -> Self {
        self.entry.bottling_volume = liters;
        self
    }

    /// Uses a measured empty keg mass instead of deriving it from the bottling volume.
    /// This also lifts the bottling volume cap.
    pub fn tare_offset(mut self, mass: f32) -> Self {
        self.entry.tare_offset = mass;
        self.entry.use_bottling_volume = false;
        self
    }

    pub fn final_gravity(mut self, grams_per_liter: f32) -> Self {
        self.entry.final_gravity = grams_per_liter;
        self
    }

    pub fn abv(mut self, abv: f32) -> Self {
        self.entry.abv = abv;
        self
    }

    pub fn srm(mut self, srm: f32) -> Self {
        self.entry.srm = srm;
        self
    }

    /// Builds the `TapEntry`.
    pub fn build(self) -> TapEntry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_tare_offset_disables_bottling_volume() {
        let entry = TapEntryBuilder::new("Porter").bottling_volume(10.0).tare_offset(4200.0).build();

        assert!(!entry.use_bottling_volume);
        assert_eq!(entry.tare_offset, 4200.0);
        assert_eq!(entry.bottling_volume, 10.0);
        assert_eq!(entry.final_gravity, 1010.0);
    }
}
