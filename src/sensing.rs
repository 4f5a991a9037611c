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


/// Outcome of advancing the sampling of a load cell front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensingStatus {
    /// Nothing new since the previous poll.
    Idle,
    /// A conversion was added to the rolling average.
    NewData,
    /// A requested tare finished during this poll.
    TareComplete,
}

/// Load cell front end of one channel.
///
/// Sampling is poll driven: `update` must never block, it consumes a conversion if one is ready
/// and keeps the timeout flags current. The channel treats the two timeout flags as the sole
/// indication of whether the sensor is online.
pub trait MassSensing {
    fn begin(&mut self, gain: u8);

    /// Negate readings, for cells mounted the other way round.
    fn set_reverse_output(&mut self);

    /// Start sampling. With `blocking == false` the start returns immediately and stabilisation
    /// happens across subsequent `update` calls.
    fn start_multiple(&mut self, timeout_ms: u32, blocking: bool);

    fn set_tare_offset(&mut self, offset: i32);

    fn tare_offset(&self) -> i32;

    fn set_calibration_factor(&mut self, factor: f32);

    fn update(&mut self) -> SensingStatus;

    /// Filtered mass, tared and scaled by the calibration factor.
    fn data(&self) -> f32;

    fn tare_timeout_flag(&self) -> bool;

    fn signal_timeout_flag(&self) -> bool;

    /// Request a tare which completes over subsequent `update` calls.
    fn tare_no_delay(&mut self);

    /// True once the requested tare has completed. `tare_offset` then holds the new offset.
    fn tare_status(&self) -> bool;

    /// Derive and apply a calibration factor from a known mass currently on the cell.
    fn new_calibration(&mut self, known_mass: f32) -> f32;

    fn is_online(&self) -> bool {
        !self.signal_timeout_flag() && !self.tare_timeout_flag()
    }
}
