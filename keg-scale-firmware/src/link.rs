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


//! Outgoing frames for observers. Snapshots and replies are framed here and queued for
//! whichever transport drains the queue.

use defmt::{Debug2Format, trace, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use keg_scale::SnapshotSink;
use keg_scale::messages::snapshot::ChannelSnapshot;
use keg_scale::messages::{ChannelMessages, frame_message};

pub const FRAME_CAPACITY: usize = 1024;
const FRAME_QUEUE_DEPTH: usize = 8;
const COMMAND_QUEUE_DEPTH: usize = 4;

pub type Frame = heapless::Vec<u8, FRAME_CAPACITY>;
pub type FrameChannel = Channel<CriticalSectionRawMutex, Frame, FRAME_QUEUE_DEPTH>;
pub type FrameReceiver = Receiver<'static, CriticalSectionRawMutex, Frame, FRAME_QUEUE_DEPTH>;

pub type CommandChannel = Channel<CriticalSectionRawMutex, ChannelMessages, COMMAND_QUEUE_DEPTH>;
pub type CommandReceiver = Receiver<'static, CriticalSectionRawMutex, ChannelMessages, COMMAND_QUEUE_DEPTH>;

pub struct FramedSink {
    frames: Sender<'static, CriticalSectionRawMutex, Frame, FRAME_QUEUE_DEPTH>,
    buffer: [u8; FRAME_CAPACITY],
}

impl FramedSink {
    pub fn new(frames: Sender<'static, CriticalSectionRawMutex, Frame, FRAME_QUEUE_DEPTH>) -> Self {
        Self {
            frames,
            buffer: [0; FRAME_CAPACITY],
        }
    }

    /// Frames are dropped rather than waited on when the queue is full.
    pub fn send(&mut self, message: &ChannelMessages) {
        let length = match frame_message(message, &mut self.buffer) {
            Ok(length) => length,
            Err(e) => {
                warn!("Unable to frame message. Error: {}", Debug2Format(&e));
                return;
            }
        };
        let Ok(frame) = Frame::from_slice(&self.buffer[..length]) else {
            return;
        };
        if self.frames.try_send(frame).is_err() {
            warn!("Frame queue full, dropped {} bytes", length);
        }
    }
}

impl SnapshotSink for FramedSink {
    fn publish(&mut self, snapshot: ChannelSnapshot, full: bool) {
        trace!("Publishing {} snapshot of channel {}", if full { "full" } else { "partial" }, snapshot.index);
        self.send(&ChannelMessages::Snapshot(snapshot));
    }
}
