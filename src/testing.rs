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


//! Test doubles shared by the unit tests of this crate.

use crate::clock::{TimeSource, Timestamp};
use crate::logger::ChannelLogger;
use crate::sensing::{MassSensing, SensingStatus};
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use embedded_storage::{ReadStorage, Storage};
use log::Level;

/// Sensor whose readings and flags are set by the test. Implemented for a shared reference so
/// the test keeps a handle while the channel owns the sensor.
pub(crate) struct ScriptedSensor {
    pub mass: Cell<f32>,
    pub signal_timeout: Cell<bool>,
    pub tare_timeout: Cell<bool>,
    pub tare_done: Cell<bool>,
    tare_reported: Cell<bool>,
    pub tare_offset: Cell<i32>,
    pub calibration_factor: Cell<f32>,
    pub next_calibration_factor: Cell<f32>,
    pub gain: Cell<u8>,
    pub reversed: Cell<bool>,
    pub starts: Cell<u32>,
    pub updates: Cell<u32>,
    pub tare_requests: Cell<u32>,
}

impl ScriptedSensor {
    pub fn online() -> Self {
        Self {
            mass: Cell::new(0.0),
            signal_timeout: Cell::new(false),
            tare_timeout: Cell::new(false),
            tare_done: Cell::new(false),
            tare_reported: Cell::new(true),
            tare_offset: Cell::new(0),
            calibration_factor: Cell::new(1.0),
            next_calibration_factor: Cell::new(1.0),
            gain: Cell::new(0),
            reversed: Cell::new(false),
            starts: Cell::new(0),
            updates: Cell::new(0),
            tare_requests: Cell::new(0),
        }
    }

    pub fn offline() -> Self {
        let sensor = Self::online();
        sensor.set_online(false);
        sensor
    }

    pub fn set_online(&self, online: bool) {
        self.signal_timeout.set(!online);
    }
}

impl MassSensing for &ScriptedSensor {
    fn begin(&mut self, gain: u8) {
        self.gain.set(gain);
    }

    fn set_reverse_output(&mut self) {
        self.reversed.set(true);
    }

    fn start_multiple(&mut self, _timeout_ms: u32, _blocking: bool) {
        self.starts.set(self.starts.get() + 1);
    }

    fn set_tare_offset(&mut self, offset: i32) {
        self.tare_offset.set(offset);
    }

    fn tare_offset(&self) -> i32 {
        self.tare_offset.get()
    }

    fn set_calibration_factor(&mut self, factor: f32) {
        self.calibration_factor.set(factor);
    }

    fn update(&mut self) -> SensingStatus {
        self.updates.set(self.updates.get() + 1);
        if self.tare_done.get() && !self.tare_reported.replace(true) {
            return SensingStatus::TareComplete;
        }
        SensingStatus::NewData
    }

    fn data(&self) -> f32 {
        self.mass.get()
    }

    fn tare_timeout_flag(&self) -> bool {
        self.tare_timeout.get()
    }

    fn signal_timeout_flag(&self) -> bool {
        self.signal_timeout.get()
    }

    fn tare_no_delay(&mut self) {
        self.tare_requests.set(self.tare_requests.get() + 1);
        self.tare_done.set(false);
        self.tare_reported.set(false);
    }

    fn tare_status(&self) -> bool {
        self.tare_done.get()
    }

    fn new_calibration(&mut self, _known_mass: f32) -> f32 {
        let factor = self.next_calibration_factor.get();
        self.calibration_factor.set(factor);
        factor
    }
}

pub(crate) struct ManualClock(Cell<Timestamp>);

impl ManualClock {
    pub fn at(now: Timestamp) -> Self {
        Self(Cell::new(now))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.set(now);
    }

    pub fn advance(&self, seconds: Timestamp) {
        self.0.set(self.0.get() + seconds);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.get()
    }
}

#[derive(Default)]
pub(crate) struct CapturingLogger {
    lines: RefCell<Vec<(Level, usize, String)>>,
}

impl CapturingLogger {
    pub fn count_containing(&self, text: &str) -> usize {
        self.lines
            .borrow()
            .iter()
            .filter(|(_, _, line)| line.contains(text))
            .count()
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.lines.borrow().iter().filter(|(l, _, _)| *l == level).count()
    }
}

impl ChannelLogger for CapturingLogger {
    fn log(&self, level: Level, channel: usize, message: fmt::Arguments<'_>) {
        self.lines.borrow_mut().push((level, channel, format!("{}", message)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemoryStorageError {
    OutOfBounds,
    WriteRejected,
}

/// Byte addressable storage held in RAM, optionally refusing writes.
pub(crate) struct MemoryStorage {
    pub bytes: Vec<u8>,
    pub reject_writes: bool,
}

impl MemoryStorage {
    pub fn erased(capacity: usize) -> Self {
        Self {
            bytes: vec![0xff; capacity],
            reject_writes: false,
        }
    }
}

impl ReadStorage for MemoryStorage {
    type Error = MemoryStorageError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let source = self
            .bytes
            .get(start..start + bytes.len())
            .ok_or(MemoryStorageError::OutOfBounds)?;
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for MemoryStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.reject_writes {
            return Err(MemoryStorageError::WriteRejected);
        }
        let start = offset as usize;
        self.bytes
            .get_mut(start..start + bytes.len())
            .ok_or(MemoryStorageError::OutOfBounds)?
            .copy_from_slice(bytes);
        Ok(())
    }
}
