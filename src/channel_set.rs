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


use crate::calibration::{CalibrationError, PersistentRegion};
use crate::channel::{ChannelManager, SharedResources};
use crate::config::ChannelConfig;
use crate::sensing::MassSensing;
use crate::state::UpdateResult;
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use embassy_futures::yield_now;
use keg_scale_messages::ChannelMessages;
use keg_scale_messages::command::CommandMessage;
use keg_scale_messages::recording::RecordingEntry;
use keg_scale_messages::snapshot::ChannelSnapshot;
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    ChannelOutOfRange(usize),
    /// The channel refused the command in its current situation.
    Rejected,
    /// The channel has no recording to export.
    NoRecording(usize),
}

/// Receiver of the snapshots produced by the driver loop.
pub trait SnapshotSink {
    fn publish(&mut self, snapshot: ChannelSnapshot, full: bool);
}

/// Every channel of the device, addressed by index.
pub struct ChannelSet<'a, S, R> {
    resources: SharedResources<'a, R>,
    channels: Vec<ChannelManager<'a, S, R>>,
}

impl<'a, S, R> ChannelSet<'a, S, R>
where
    S: MassSensing,
{
    pub fn new<I>(resources: SharedResources<'a, R>, channels: I) -> Self
    where
        I: IntoIterator<Item = (ChannelConfig, S)>,
    {
        let channels: Vec<_> = channels
            .into_iter()
            .enumerate()
            .map(|(index, (config, sensing))| ChannelManager::new(index, config, sensing, resources))
            .collect();
        debug!("Channel set with {} channels", channels.len());
        Self { resources, channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelManager<'a, S, R>> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut ChannelManager<'a, S, R>> {
        self.channels.get_mut(index)
    }

    pub fn dispatch(&mut self, message: CommandMessage) -> Result<(), CommandError> {
        let index = message.index as usize;
        let channel = self
            .channels
            .get_mut(index)
            .ok_or(CommandError::ChannelOutOfRange(index))?;
        if channel.apply(message.command) {
            Ok(())
        } else {
            Err(CommandError::Rejected)
        }
    }

    /// One pass of the driver loop: tick every channel in order and publish what changed.
    pub async fn handle<K>(&mut self, sink: &mut K)
    where
        K: SnapshotSink,
    {
        for channel in self.channels.iter_mut() {
            match channel.tick().await {
                UpdateResult::StateChanged => sink.publish(channel.render(true), true),
                UpdateResult::DataUpdated => sink.publish(channel.render(false), false),
                UpdateResult::NoChange => {}
            }
            yield_now().await;
        }
    }

    /// Snapshots of every channel, for an observer that just connected.
    pub fn render_all(&self, full: bool) -> Vec<ChannelSnapshot> {
        self.channels.iter().map(|c| c.render(full)).collect()
    }

    pub fn export_recording(&self, index: usize) -> Result<Option<RecordingEntry>, CommandError> {
        self.channels
            .get(index)
            .map(ChannelManager::export_recording)
            .ok_or(CommandError::ChannelOutOfRange(index))
    }
}

impl<'a, S, R> ChannelSet<'a, S, R>
where
    S: MassSensing,
    R: PersistentRegion,
{
    pub fn persist_calibration(&self) -> Result<(), CalibrationError> {
        self.resources.calibration.lock(|c| c.borrow_mut().save())
    }

    /// Answer one message from an observer.
    ///
    /// `SnapshotRequest` is answered with a full snapshot of every channel and `ExportRecording`
    /// with the recording of that channel. Everything else gets `Ack`, or `Error` on failure.
    pub fn handle_message(&mut self, message: ChannelMessages) -> Vec<ChannelMessages> {
        let result = match message {
            ChannelMessages::Command(command) => self
                .dispatch(command)
                .map(|()| vec![ChannelMessages::Ack])
                .map_err(|e| format!("{:?}", e)),
            ChannelMessages::Persist => self
                .persist_calibration()
                .map(|()| vec![ChannelMessages::Ack])
                .map_err(|e| format!("{:?}", e)),
            ChannelMessages::SnapshotRequest => Ok(self
                .render_all(true)
                .into_iter()
                .map(ChannelMessages::Snapshot)
                .collect()),
            ChannelMessages::ExportRecording(index) => {
                let index = index as usize;
                self.export_recording(index)
                    .and_then(|entry| entry.ok_or(CommandError::NoRecording(index)))
                    .map(|entry| vec![ChannelMessages::RecordingEntry(entry)])
                    .map_err(|e| format!("{:?}", e))
            }
            other => Err(format!("Unexpected message: {:?}", other)),
        };
        result.unwrap_or_else(|reason| {
            warn!("Message refused: {}", reason.as_str());
            vec![ChannelMessages::Error(reason)]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::tests::{Fixture, TestRegion};
    use crate::testing::ScriptedSensor;
    use alloc::string::String;
    use embassy_futures::block_on;
    use keg_scale_messages::command::ChannelCommand;
    use keg_scale_messages::tap::TapEntryBuilder;

    #[derive(Default)]
    struct CollectingSink {
        published: Vec<(u16, String, bool)>,
    }

    impl SnapshotSink for CollectingSink {
        fn publish(&mut self, snapshot: ChannelSnapshot, full: bool) {
            self.published.push((snapshot.index, snapshot.state.name, full));
        }
    }

    fn channel_set(fixture: &Fixture) -> ChannelSet<'_, &ScriptedSensor, TestRegion> {
        let channels = fixture
            .sensors
            .iter()
            .enumerate()
            .map(|(i, sensor)| (ChannelConfig::new("Tap", 2 * i as u8, 2 * i as u8 + 1), sensor));
        ChannelSet::new(fixture.resources(), channels)
    }

    fn command(index: u16, command: ChannelCommand) -> CommandMessage {
        CommandMessage { index, command }
    }

    #[test]
    fn driver_pass_publishes_changes_only() {
        let fixture = Fixture::new(2);
        let mut set = channel_set(&fixture);
        let mut sink = CollectingSink::default();

        block_on(set.handle(&mut sink));
        assert!(sink.published.is_empty());

        block_on(set.handle(&mut sink));
        assert_eq!(
            sink.published,
            [
                (0, String::from("standby"), true),
                (1, String::from("standby"), true)
            ]
        );

        sink.published.clear();
        fixture.clock.set(1000);
        set.dispatch(command(1, ChannelCommand::LiveMeasurement)).unwrap();
        block_on(set.handle(&mut sink));
        block_on(set.handle(&mut sink));
        assert_eq!(
            sink.published,
            [
                (1, String::from("liveMeasurement"), true),
                (1, String::from("liveMeasurement"), false)
            ]
        );
    }

    #[test]
    fn commands_are_checked_against_channel_count() {
        let fixture = Fixture::new(2);
        let mut set = channel_set(&fixture);

        assert_eq!(
            set.dispatch(command(2, ChannelCommand::Tare)),
            Err(CommandError::ChannelOutOfRange(2))
        );
        assert_eq!(
            set.dispatch(command(0, ChannelCommand::PauseRecording)),
            Err(CommandError::Rejected)
        );
        assert_eq!(set.dispatch(command(0, ChannelCommand::Tare)), Ok(()));
        assert!(set.channel(0).unwrap().pending().is_some());
        assert!(set.channel(1).unwrap().pending().is_none());
    }

    #[test]
    fn messages_are_acknowledged_or_refused() {
        let fixture = Fixture::new(1);
        let mut set = channel_set(&fixture);

        assert_eq!(
            set.handle_message(ChannelMessages::Command(command(0, ChannelCommand::Standby))),
            [ChannelMessages::Ack]
        );
        assert_eq!(set.handle_message(ChannelMessages::Persist), [ChannelMessages::Ack]);
        assert_eq!(
            set.handle_message(ChannelMessages::Command(command(3, ChannelCommand::Standby))),
            [ChannelMessages::Error(String::from("ChannelOutOfRange(3)"))]
        );
        assert!(matches!(
            set.handle_message(ChannelMessages::Ack).as_slice(),
            [ChannelMessages::Error(_)]
        ));
    }

    #[test]
    fn observer_can_request_snapshots_and_recordings() {
        let fixture = Fixture::new(2);
        let mut set = channel_set(&fixture);
        block_on(set.handle(&mut CollectingSink::default()));
        block_on(set.handle(&mut CollectingSink::default()));

        let tap = TapEntryBuilder::new("Pale Ale").tare_offset(50.0).build();
        set.dispatch(command(0, ChannelCommand::StartRecording(tap.clone()))).unwrap();
        block_on(set.handle(&mut CollectingSink::default()));
        fixture.sensors[0].mass.set(5155.0);
        fixture.clock.set(1000);
        block_on(set.handle(&mut CollectingSink::default()));

        let replies = set.handle_message(ChannelMessages::SnapshotRequest);
        assert_eq!(replies.len(), 2);
        let ChannelMessages::Snapshot(first) = &replies[0] else {
            panic!("expected a snapshot, got {:?}", replies[0]);
        };
        assert_eq!(first.index, 0);
        assert_eq!(first.state.recording.as_ref().unwrap().tap_entry, Some(tap.clone()));
        assert!(matches!(&replies[1], ChannelMessages::Snapshot(s) if s.state.name == "standby"));

        let replies = set.handle_message(ChannelMessages::ExportRecording(0));
        let [ChannelMessages::RecordingEntry(entry)] = replies.as_slice() else {
            panic!("expected a recording, got {:?}", replies);
        };
        assert_eq!(entry.tap_entry, tap);
        assert_eq!(entry.data.get(&101), Some(&1000));

        assert_eq!(
            set.handle_message(ChannelMessages::ExportRecording(1)),
            [ChannelMessages::Error(String::from("NoRecording(1)"))]
        );
        assert_eq!(
            set.handle_message(ChannelMessages::ExportRecording(5)),
            [ChannelMessages::Error(String::from("ChannelOutOfRange(5)"))]
        );
    }

    #[test]
    fn recordings_are_exported_by_index() {
        let fixture = Fixture::new(2);
        let mut set = channel_set(&fixture);
        block_on(set.handle(&mut CollectingSink::default()));
        block_on(set.handle(&mut CollectingSink::default()));

        let tap = TapEntryBuilder::new("Pale Ale").tare_offset(50.0).build();
        set.dispatch(command(1, ChannelCommand::StartRecording(tap.clone()))).unwrap();
        block_on(set.handle(&mut CollectingSink::default()));

        assert_eq!(set.export_recording(0), Ok(None));
        assert_eq!(set.export_recording(1).unwrap().unwrap().tap_entry, tap);
        assert_eq!(set.export_recording(2), Err(CommandError::ChannelOutOfRange(2)));

        let snapshots = set.render_all(true);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].state.name, "recording");
        assert!(snapshots[1].state.recording.as_ref().unwrap().tap_entry.is_some());
    }
}
