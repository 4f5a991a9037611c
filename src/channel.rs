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


use crate::calibration::SharedCalibrationStore;
use crate::clock::TimeSource;
use crate::config::ChannelConfig;
use crate::logger::ChannelLogger;
use crate::recorder::SharedRecorder;
use crate::sensing::MassSensing;
use crate::state::{ChannelContext, ChannelState, RecordingSource, UpdateResult};
use embassy_futures::yield_now;
use keg_scale_messages::command::ChannelCommand;
use keg_scale_messages::recording::RecordingEntry;
use keg_scale_messages::snapshot::{ChannelSnapshot, SensorSnapshot};
use keg_scale_messages::tap::TapEntry;
use log::trace;

/// Device wide collaborators every channel borrows.
pub struct SharedResources<'a, R> {
    pub calibration: &'a SharedCalibrationStore<R>,
    pub recorder: &'a SharedRecorder,
    pub clock: &'a dyn TimeSource,
    pub logger: &'a dyn ChannelLogger,
}

impl<R> Clone for SharedResources<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for SharedResources<'_, R> {}

/// One load cell channel: its sensor, its current state and the state queued for the next tick.
pub struct ChannelManager<'a, S, R> {
    index: usize,
    config: ChannelConfig,
    sensing: S,
    resources: SharedResources<'a, R>,
    state: ChannelState,
    pending: Option<ChannelState>,
    is_online: bool,
}

impl<'a, S, R> ChannelManager<'a, S, R>
where
    S: MassSensing,
{
    pub fn new(index: usize, config: ChannelConfig, mut sensing: S, resources: SharedResources<'a, R>) -> Self {
        sensing.begin(config.gain);
        if config.reverse {
            sensing.set_reverse_output();
        }
        Self {
            index,
            config,
            sensing,
            resources,
            state: ChannelState::Offline,
            pending: None,
            is_online: false,
        }
    }

    fn split(&mut self) -> (&mut ChannelState, ChannelContext<'_, S, R>) {
        let Self {
            index,
            sensing,
            resources,
            state,
            pending,
            is_online,
            ..
        } = self;
        let context = ChannelContext {
            index: *index,
            sensing,
            calibration: resources.calibration,
            recorder: resources.recorder,
            clock: resources.clock,
            logger: resources.logger,
            is_online,
            next: pending,
        };
        (state, context)
    }

    fn has_session(&self) -> bool {
        let index = self.index;
        self.resources.recorder.lock(|r| r.borrow().has_session(index))
    }

    fn request(&mut self, state: ChannelState) -> bool {
        trace!("Channel {} queued {}", self.index, state.name());
        self.pending = Some(state);
        true
    }

    pub fn standby(&mut self) -> bool {
        self.request(ChannelState::Standby)
    }

    pub fn live_measurement(&mut self) -> bool {
        self.request(ChannelState::LiveMeasurement { last_refresh: 0 })
    }

    pub fn tare(&mut self) -> bool {
        self.request(ChannelState::Tare)
    }

    pub fn calibrate(&mut self, known_mass: f32) -> bool {
        self.request(ChannelState::Calibrate { known_mass })
    }

    pub fn start_recording(&mut self, tap: TapEntry) -> bool {
        self.request(ChannelState::Recording {
            source: RecordingSource::Tap(tap),
        })
    }

    pub fn put_recording_entry(&mut self, entry: RecordingEntry) -> bool {
        self.request(ChannelState::Recording {
            source: RecordingSource::Session(entry),
        })
    }

    /// Rejected when the channel has no session.
    pub fn pause_recording(&mut self) -> bool {
        self.has_session() && self.request(ChannelState::PausedRecording)
    }

    /// Rejected when the channel has no session.
    pub fn continue_recording(&mut self) -> bool {
        self.has_session()
            && self.request(ChannelState::Recording {
                source: RecordingSource::Resume,
            })
    }

    pub fn stop_recording(&mut self) -> bool {
        self.request(ChannelState::StopRecording)
    }

    pub fn apply(&mut self, command: ChannelCommand) -> bool {
        match command {
            ChannelCommand::Standby => self.standby(),
            ChannelCommand::LiveMeasurement => self.live_measurement(),
            ChannelCommand::Tare => self.tare(),
            ChannelCommand::Calibrate(known_mass) => self.calibrate(known_mass),
            ChannelCommand::StartRecording(tap) => self.start_recording(tap),
            ChannelCommand::PutRecordingEntry(entry) => self.put_recording_entry(entry),
            ChannelCommand::PauseRecording => self.pause_recording(),
            ChannelCommand::ContinueRecording => self.continue_recording(),
            ChannelCommand::StopRecording => self.stop_recording(),
        }
    }

    /// Apply the pending state if there is one, otherwise let the current state do its work.
    ///
    /// A transition yields twice: after the old state has exited and after the new one has
    /// entered, so other channels get to run in between.
    pub async fn tick(&mut self) -> UpdateResult {
        let Some(next) = self.pending.take() else {
            let (state, mut context) = self.split();
            return state.update(&mut context);
        };

        {
            let (state, mut context) = self.split();
            state.exit(&mut context, &next);
        }
        yield_now().await;

        let previous = core::mem::replace(&mut self.state, next);
        {
            let (state, mut context) = self.split();
            state.enter(&mut context, &previous);
        }
        drop(previous);
        yield_now().await;

        UpdateResult::StateChanged
    }

    /// Snapshot of this channel. A partial snapshot only carries recently recorded volume.
    pub fn render(&self, full: bool) -> ChannelSnapshot {
        let index = self.index;
        let recording = if self.state.is_recording() {
            let now = self.resources.clock.now();
            self.resources
                .recorder
                .lock(|r| r.borrow().render(index, full, now))
        } else {
            None
        };
        let calibration = self
            .resources
            .calibration
            .lock(|c| c.borrow().calibration(index))
            .unwrap_or_default();

        ChannelSnapshot {
            index: index as u16,
            label: self.config.label.clone(),
            state: self.state.render(self.sensing.data(), recording),
            sensor: SensorSnapshot {
                tare_offset: self.sensing.tare_offset(),
                calibration_factor: calibration.calibration_factor,
                tare_timeout: self.sensing.tare_timeout_flag(),
                signal_timeout: self.sensing.signal_timeout_flag(),
            },
        }
    }

    pub fn export_recording(&self) -> Option<RecordingEntry> {
        let index = self.index;
        self.resources.recorder.lock(|r| r.borrow().export(index))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn pending(&self) -> Option<&ChannelState> {
        self.pending.as_ref()
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }
}
