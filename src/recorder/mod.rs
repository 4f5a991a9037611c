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


//! Consumption recording for every channel of the device.

mod buckets;
mod session;

pub use buckets::BucketHistory;
pub use session::RecordingSession;

use crate::clock::Timestamp;
use alloc::vec::Vec;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::NoopMutex;
use keg_scale_messages::custom_data_types::BucketIndex;
use keg_scale_messages::recording::RecordingEntry;
use keg_scale_messages::snapshot::RecordingSnapshot;
use keg_scale_messages::tap::TapEntry;
use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecorderError {
    ChannelOutOfRange,
    /// No session to continue and no tap entry to start one from.
    NothingToStart,
    NoSession,
    /// The tap entry has no positive final gravity, so mass cannot be turned into volume.
    InvalidGravity,
    InvalidBucket(BucketIndex),
    InvalidTimestamp(BucketIndex),
}

/// Recorder shared between the channels of one device.
pub type SharedRecorder = NoopMutex<RefCell<VolumeRecorder>>;

/// At most one recording session per channel.
pub struct VolumeRecorder {
    sessions: Vec<Option<RecordingSession>>,
}

impl VolumeRecorder {
    pub fn new(channel_count: usize) -> Self {
        let mut sessions = Vec::with_capacity(channel_count);
        sessions.resize_with(channel_count, || None);
        Self { sessions }
    }

    pub fn into_shared(self) -> SharedRecorder {
        NoopMutex::new(RefCell::new(self))
    }

    pub fn channel_count(&self) -> usize {
        self.sessions.len()
    }

    fn slot(&mut self, channel: usize) -> Result<&mut Option<RecordingSession>, RecorderError> {
        self.sessions
            .get_mut(channel)
            .ok_or(RecorderError::ChannelOutOfRange)
    }

    pub fn session(&self, channel: usize) -> Option<&RecordingSession> {
        self.sessions.get(channel).and_then(Option::as_ref)
    }

    pub fn has_session(&self, channel: usize) -> bool {
        self.session(channel).is_some()
    }

    /// Continue the existing session of `channel`, or start a new one from `tap`.
    pub fn start_session(
        &mut self,
        channel: usize,
        tap: Option<TapEntry>,
        current_mass: f32,
        now: Timestamp,
    ) -> Result<(), RecorderError> {
        let slot = self.slot(channel)?;
        if let Some(session) = slot.as_mut() {
            session.resume();
            trace!("Channel {} continues its recording", channel);
            return Ok(());
        }

        let tap = tap.ok_or(RecorderError::NothingToStart)?;
        debug!("Channel {} starts recording '{}'", channel, tap.name.as_str());
        *slot = Some(RecordingSession::start(tap, current_mass, now)?);
        Ok(())
    }

    /// Feed a mass reading to the session of `channel`. Returns `true` when a new bucket was
    /// reached.
    pub fn update(&mut self, channel: usize, mass: f32, now: Timestamp) -> bool {
        match self.sessions.get_mut(channel) {
            Some(Some(session)) => session.update(mass, now),
            _ => false,
        }
    }

    pub fn pause(&mut self, channel: usize) -> Result<(), RecorderError> {
        let session = self.slot(channel)?.as_mut().ok_or(RecorderError::NoSession)?;
        session.pause();
        Ok(())
    }

    /// Discard the session of `channel`, returning it.
    pub fn stop(&mut self, channel: usize) -> Option<RecordingSession> {
        let stopped = self.sessions.get_mut(channel).and_then(Option::take);
        if stopped.is_some() {
            debug!("Channel {} stopped recording", channel);
        }
        stopped
    }

    pub fn render(&self, channel: usize, full: bool, now: Timestamp) -> Option<RecordingSnapshot> {
        self.session(channel).map(|s| s.render(full, now))
    }

    pub fn export(&self, channel: usize) -> Option<RecordingEntry> {
        self.session(channel).map(RecordingSession::export)
    }

    /// Install `session` on `channel`, replacing any existing one.
    pub fn put_session(&mut self, channel: usize, session: RecordingSession) -> Result<(), RecorderError> {
        *self.slot(channel)? = Some(session);
        debug!("Channel {} recording replaced", channel);
        Ok(())
    }

    pub fn import(&mut self, channel: usize, entry: RecordingEntry) -> Result<(), RecorderError> {
        // Validate the channel before the record.
        self.slot(channel)?;
        let session = RecordingSession::import(entry)?;
        self.put_session(channel, session)
    }
}
