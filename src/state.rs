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


//! Per channel measurement and recording states.
//!
//! Every state runs through `enter`, any number of `update` calls, then `exit`. States never
//! switch themselves; they ask for a successor with `ChannelContext::request` and the channel
//! applies it on its next tick.

use crate::calibration::SharedCalibrationStore;
use crate::clock::{TimeSource, Timestamp};
use crate::config::{LIVE_MEASUREMENT_REFRESH_SECONDS, SIGNAL_TIMEOUT_MS};
use crate::logger::ChannelLogger;
use crate::recorder::SharedRecorder;
use crate::sensing::{MassSensing, SensingStatus};
use alloc::string::String;
use core::fmt;
use keg_scale_messages::recording::RecordingEntry;
use keg_scale_messages::snapshot::{RecordingSnapshot, StateSnapshot};
use keg_scale_messages::tap::TapEntry;
use log::Level;
use strum::IntoStaticStr;

/// Outcome of one channel tick, deciding what gets broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateResult {
    /// Broadcast a full snapshot.
    StateChanged,
    /// Broadcast a partial snapshot.
    DataUpdated,
    NoChange,
}

/// Where a recording state takes its session from when entered.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingSource {
    /// Continue the session the recorder already holds.
    Resume,
    Tap(TapEntry),
    /// Replace the session with an uploaded one.
    Session(RecordingEntry),
}

#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ChannelState {
    Offline,
    Standby,
    LiveMeasurement { last_refresh: Timestamp },
    Tare,
    Calibrate { known_mass: f32 },
    Recording { source: RecordingSource },
    #[strum(serialize = "recording")]
    PausedRecording,
    /// Reported as `recording` for the one tick it lasts, without recording data.
    #[strum(serialize = "recording")]
    StopRecording,
}

/// The parts of a channel a state may touch while it runs.
pub struct ChannelContext<'c, S, R> {
    pub index: usize,
    pub sensing: &'c mut S,
    pub calibration: &'c SharedCalibrationStore<R>,
    pub recorder: &'c SharedRecorder,
    pub clock: &'c dyn TimeSource,
    pub logger: &'c dyn ChannelLogger,
    pub(crate) is_online: &'c mut bool,
    pub(crate) next: &'c mut Option<ChannelState>,
}

impl<S, R> ChannelContext<'_, S, R>
where
    S: MassSensing,
{
    /// Replace the pending state. The last request before a tick wins.
    pub fn request(&mut self, state: ChannelState) {
        *self.next = Some(state);
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        self.logger.log(level, self.index, message);
    }

    /// Start non-blocking sampling with the stored calibration of this channel.
    fn start_sensing(&mut self) {
        self.sensing.start_multiple(SIGNAL_TIMEOUT_MS, false);
        let index = self.index;
        if let Some(calibration) = self.calibration.lock(|c| c.borrow().calibration(index)) {
            self.sensing.set_tare_offset(calibration.tare_offset);
            self.sensing.set_calibration_factor(calibration.calibration_factor);
        }
    }

    /// Advance sampling and track online transitions. Requests `Offline` once the sensor is lost,
    /// otherwise returns what sampling produced.
    fn poll_online(&mut self) -> Option<SensingStatus> {
        let status = self.sensing.update();
        let online = self.sensing.is_online();
        if online != *self.is_online {
            *self.is_online = online;
            if online {
                self.log(Level::Info, format_args!("sensor online"));
            } else {
                self.log(
                    Level::Warn,
                    format_args!(
                        "sensor offline (signal timeout: {}, tare timeout: {})",
                        self.sensing.signal_timeout_flag(),
                        self.sensing.tare_timeout_flag()
                    ),
                );
            }
        }
        if !online {
            self.request(ChannelState::Offline);
            return None;
        }
        Some(status)
    }

    fn has_session(&self) -> bool {
        let index = self.index;
        self.recorder.lock(|r| r.borrow().has_session(index))
    }
}

impl ChannelState {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. } | Self::PausedRecording)
    }

    pub fn enter<S, R>(&mut self, ctx: &mut ChannelContext<'_, S, R>, previous: &ChannelState)
    where
        S: MassSensing,
    {
        ctx.log(
            Level::Debug,
            format_args!("{} -> {}", previous.name(), self.name()),
        );
        let index = ctx.index;

        match self {
            Self::Offline | Self::Standby => {}
            Self::LiveMeasurement { last_refresh } => *last_refresh = 0,
            Self::Tare => ctx.sensing.tare_no_delay(),
            Self::Calibrate { known_mass } => {
                let factor = ctx.sensing.new_calibration(*known_mass);
                ctx.calibration.lock(|c| {
                    if let Some(calibration) = c.borrow_mut().calibration_mut(index) {
                        calibration.calibration_factor = factor;
                    }
                });
                ctx.log(
                    Level::Info,
                    format_args!("calibrated with {} g, factor {}", known_mass, factor),
                );
            }
            Self::Recording { source } => {
                let mass = ctx.sensing.data();
                let now = ctx.now();
                let result = match core::mem::replace(source, RecordingSource::Resume) {
                    RecordingSource::Session(entry) => {
                        ctx.recorder.lock(|r| r.borrow_mut().import(index, entry))
                    }
                    RecordingSource::Tap(tap) => ctx
                        .recorder
                        .lock(|r| r.borrow_mut().start_session(index, Some(tap), mass, now)),
                    RecordingSource::Resume => ctx
                        .recorder
                        .lock(|r| r.borrow_mut().start_session(index, None, mass, now)),
                };
                if let Err(e) = result {
                    ctx.log(Level::Warn, format_args!("unable to record: {:?}", e));
                    ctx.request(ChannelState::Standby);
                }
            }
            Self::PausedRecording => {
                if let Err(e) = ctx.recorder.lock(|r| r.borrow_mut().pause(index)) {
                    ctx.log(Level::Warn, format_args!("unable to pause: {:?}", e));
                    ctx.request(ChannelState::Standby);
                }
            }
            Self::StopRecording => {
                ctx.recorder.lock(|r| r.borrow_mut().stop(index));
            }
        }
    }

    pub fn update<S, R>(&mut self, ctx: &mut ChannelContext<'_, S, R>) -> UpdateResult
    where
        S: MassSensing,
    {
        match self {
            Self::Offline => {
                ctx.start_sensing();
                ctx.sensing.update();
                if ctx.sensing.is_online() {
                    *ctx.is_online = true;
                    ctx.log(Level::Info, format_args!("sensor online"));
                    if ctx.has_session() {
                        ctx.request(ChannelState::Recording {
                            source: RecordingSource::Resume,
                        });
                    } else {
                        ctx.request(ChannelState::Standby);
                    }
                }
                UpdateResult::NoChange
            }
            Self::Standby => {
                ctx.poll_online();
                UpdateResult::NoChange
            }
            Self::LiveMeasurement { last_refresh } => {
                if ctx.poll_online().is_none() {
                    return UpdateResult::NoChange;
                }
                let now = ctx.now();
                if now.saturating_sub(*last_refresh) >= LIVE_MEASUREMENT_REFRESH_SECONDS {
                    *last_refresh = now;
                    UpdateResult::DataUpdated
                } else {
                    UpdateResult::NoChange
                }
            }
            Self::Tare => {
                if ctx.poll_online() == Some(SensingStatus::TareComplete) {
                    let offset = ctx.sensing.tare_offset();
                    let index = ctx.index;
                    ctx.calibration.lock(|c| {
                        if let Some(calibration) = c.borrow_mut().calibration_mut(index) {
                            calibration.tare_offset = offset;
                        }
                    });
                    ctx.log(Level::Info, format_args!("tare offset {}", offset));
                    ctx.request(ChannelState::LiveMeasurement { last_refresh: 0 });
                }
                UpdateResult::NoChange
            }
            Self::Calibrate { .. } => {
                ctx.poll_online();
                ctx.request(ChannelState::LiveMeasurement { last_refresh: 0 });
                UpdateResult::NoChange
            }
            Self::Recording { .. } | Self::PausedRecording => {
                if ctx.poll_online().is_none() {
                    return UpdateResult::NoChange;
                }
                let (index, mass, now) = (ctx.index, ctx.sensing.data(), ctx.now());
                if ctx.recorder.lock(|r| r.borrow_mut().update(index, mass, now)) {
                    UpdateResult::DataUpdated
                } else {
                    UpdateResult::NoChange
                }
            }
            Self::StopRecording => {
                ctx.poll_online();
                ctx.request(ChannelState::Standby);
                UpdateResult::NoChange
            }
        }
    }

    pub fn exit<S, R>(&mut self, ctx: &mut ChannelContext<'_, S, R>, next: &ChannelState)
    where
        S: MassSensing,
    {
        match self {
            Self::Tare if !ctx.sensing.tare_status() => {
                ctx.log(
                    Level::Warn,
                    format_args!("tare abandoned for {}", next.name()),
                );
            }
            Self::Recording { .. } if *next == ChannelState::Offline => {
                ctx.log(
                    Level::Info,
                    format_args!("recording suspended until the sensor is back"),
                );
            }
            _ => {}
        }
    }

    /// Describe this state for observers. `mass` is ignored while offline and `recording` is
    /// only reported by the recording states.
    pub fn render(
        &self,
        mass: f32,
        recording: Option<RecordingSnapshot>,
    ) -> StateSnapshot {
        StateSnapshot {
            name: String::from(self.name()),
            mass: (*self != ChannelState::Offline).then_some(mass),
            known_mass: match self {
                Self::Calibrate { known_mass } => Some(*known_mass),
                _ => None,
            },
            recording: if self.is_recording() { recording } else { None },
        }
    }
}
