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


use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use embedded_storage::Storage;
use log::{debug, trace};

/// Fixed size byte region with explicit commit, in the manner of an emulated EEPROM.
///
/// Reads and writes address a staging copy of the region; nothing reaches the backing store
/// until `commit`.
pub trait PersistentRegion {
    type Error: Debug;

    /// Size the region and load any previously committed content.
    fn begin(&mut self, size: usize) -> Result<(), Self::Error>;

    /// Percentage of the backing store in use. Negative when the region holds no committed data
    /// of the size requested in `begin`.
    fn percent_used(&self) -> i8;

    fn read(&mut self, offset: usize, bytes: &mut [u8]) -> Result<(), Self::Error>;

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError<E> {
    NotStarted,
    OutOfBounds,
    TooLarge,
    Storage(E),
}

const MAGIC: [u8; 4] = *b"KEGS";
const HEADER_SIZE: usize = 8;

/// `PersistentRegion` on top of any byte addressable `embedded_storage::Storage`.
///
/// Layout: 4 byte magic, little endian `u32` payload length, payload. Content whose recorded
/// length differs from the size passed to `begin` is treated as absent.
pub struct EepromRegion<S> {
    storage: S,
    staging: Vec<u8>,
    has_data: bool,
    started: bool,
}

impl<S> EepromRegion<S>
where
    S: Storage,
{
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            staging: Vec::new(),
            has_data: false,
            started: false,
        }
    }

    pub fn release(self) -> S {
        self.storage
    }

    fn bounds(&self, offset: usize, len: usize) -> Result<core::ops::Range<usize>, RegionError<S::Error>> {
        if !self.started {
            return Err(RegionError::NotStarted);
        }
        let end = offset.checked_add(len).ok_or(RegionError::OutOfBounds)?;
        if end > self.staging.len() {
            return Err(RegionError::OutOfBounds);
        }
        Ok(offset..end)
    }
}

impl<S> PersistentRegion for EepromRegion<S>
where
    S: Storage,
    S::Error: Debug,
{
    type Error = RegionError<S::Error>;

    fn begin(&mut self, size: usize) -> Result<(), Self::Error> {
        if HEADER_SIZE + size > self.storage.capacity() {
            return Err(RegionError::TooLarge);
        }

        self.staging = vec![0; size];
        self.has_data = false;
        self.started = true;

        let mut header = [0u8; HEADER_SIZE];
        self.storage.read(0, &mut header).map_err(RegionError::Storage)?;
        let stored_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

        if header[..4] == MAGIC && stored_len == size {
            self.storage
                .read(HEADER_SIZE as u32, &mut self.staging)
                .map_err(RegionError::Storage)?;
            self.has_data = true;
            trace!("Region holds {} committed bytes", size);
        } else {
            debug!("Region holds no data of size {}", size);
        }
        Ok(())
    }

    fn percent_used(&self) -> i8 {
        if !self.has_data {
            return -1;
        }
        let used = (HEADER_SIZE + self.staging.len()) * 100 / self.storage.capacity().max(1);
        used.min(100) as i8
    }

    fn read(&mut self, offset: usize, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.bounds(offset, bytes.len())?;
        bytes.copy_from_slice(&self.staging[range]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.bounds(offset, bytes.len())?;
        self.staging[range].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        if !self.started {
            return Err(RegionError::NotStarted);
        }
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&MAGIC);
        header[4..].copy_from_slice(&(self.staging.len() as u32).to_le_bytes());

        self.storage.write(0, &header).map_err(RegionError::Storage)?;
        self.storage
            .write(HEADER_SIZE as u32, &self.staging)
            .map_err(RegionError::Storage)?;
        self.has_data = true;
        trace!("Committed {} bytes", self.staging.len());
        Ok(())
    }
}
