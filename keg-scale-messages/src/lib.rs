#![no_std]
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

extern crate alloc;

use crate::command::CommandMessage;
use crate::recording::RecordingEntry;
use crate::snapshot::ChannelSnapshot;
use alloc::string::String;
use minicbor::{CborLen, Decode, Encode};

pub mod command;
pub mod custom_data_types;
pub mod recording;
pub mod snapshot;
pub mod tap;

#[derive(Debug, PartialEq, Decode, Encode, CborLen)]
pub enum ChannelMessages {
    #[n(0)] Command(#[n(0)] CommandMessage),
    #[n(1)] Snapshot(#[n(0)] ChannelSnapshot),
    #[n(2)] RecordingEntry(#[n(0)] RecordingEntry),
    #[n(3)] Ack,
    #[n(4)] Error(#[n(0)] String),
    /// Write the in-memory calibration of every channel to persistent storage.
    #[n(5)] Persist,
    /// Ask for a full snapshot of every channel, answered with one `Snapshot` per channel.
    #[n(6)] SnapshotRequest,
    /// Download the recording of a channel, answered with `RecordingEntry`.
    #[n(7)] ExportRecording(#[n(0)] u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer is too small to hold the encoded message and length prefix, value is the expected length
    BufferTooSmall(usize),
    /// The CBOR encoding failed due to invalid data or the message does not fit the length prefix
    EncodingError,
    DecodingError,
}

const PREFIX_BYTE_COUNT: usize = 2;

/// Frame a CBOR message with a length prefix for sending across a data link.
///
/// Returns the number of bytes written on success, or a FrameError on failure.
///
/// # Errors
///
/// - `BufferTooSmall`: if the buffer is not large enough to hold the length prefix (2 bytes)
///   plus the encoded message
/// - `EncodingError`: if the CBOR encoding of the message failed or the message is longer
///   than the length prefix can express
pub fn frame_message<M>(msg: &M, buffer: &mut [u8]) -> Result<usize, FrameError>
where
    M: minicbor::Encode<()> + minicbor::CborLen<()>,
{
    let encoded_len = minicbor::len(msg);
    if encoded_len > u16::MAX as usize {
        return Err(FrameError::EncodingError);
    }
    let total_bytes_needed = encoded_len + PREFIX_BYTE_COUNT;

    if buffer.len() < total_bytes_needed {
        return Err(FrameError::BufferTooSmall(total_bytes_needed));
    }

    buffer[0..PREFIX_BYTE_COUNT].copy_from_slice(&(encoded_len as u16).to_be_bytes());

    minicbor::encode(msg, &mut buffer[PREFIX_BYTE_COUNT..total_bytes_needed])
        .map_err(|_| FrameError::EncodingError)?;

    Ok(total_bytes_needed)
}

/// Decode one length prefixed message from the start of `buffer`.
///
/// Returns the number of bytes consumed together with the message. `BufferTooSmall` carries
/// the total number of bytes required before the message can be decoded.
pub fn decode_framed_message<'b, M>(buffer: &'b [u8]) -> Result<(usize, M), FrameError>
where
    M: minicbor::Decode<'b, ()>,
{
    if buffer.len() < PREFIX_BYTE_COUNT {
        return Err(FrameError::BufferTooSmall(PREFIX_BYTE_COUNT));
    }

    let mut length_bytes = [0u8; PREFIX_BYTE_COUNT];
    length_bytes.copy_from_slice(&buffer[..PREFIX_BYTE_COUNT]);
    let message_len = u16::from_be_bytes(length_bytes) as usize;

    let message_end = PREFIX_BYTE_COUNT + message_len;
    if buffer.len() < message_end {
        return Err(FrameError::BufferTooSmall(message_end));
    }

    let message = minicbor::decode::<M>(&buffer[PREFIX_BYTE_COUNT..message_end])
        .map_err(|_| FrameError::DecodingError)?;

    Ok((message_end, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ChannelCommand;
    use crate::tap::TapEntryBuilder;

    #[test]
    fn framed_command_decodes_to_the_same_message() {
        let message = ChannelMessages::Command(CommandMessage {
            index: 1,
            command: ChannelCommand::StartRecording(TapEntryBuilder::new("Pale Ale").number(42).build()),
        });
        let mut buffer = [0u8; 256];

        let written = frame_message(&message, &mut buffer).unwrap();
        let (consumed, decoded) = decode_framed_message::<ChannelMessages>(&buffer[..written]).unwrap();

        assert_eq!(consumed, written);
        assert_eq!(decoded, message);
    }

    #[test]
    fn framing_into_a_short_buffer_reports_required_length() {
        let message = ChannelMessages::Error(String::from("invalid channel index"));
        let mut buffer = [0u8; 4];

        let needed = PREFIX_BYTE_COUNT + minicbor::len(&message);
        assert_eq!(frame_message(&message, &mut buffer), Err(FrameError::BufferTooSmall(needed)));
    }

    #[test]
    fn partial_frame_asks_for_more_bytes() {
        let mut buffer = [0u8; 64];
        let written = frame_message(&ChannelMessages::Persist, &mut buffer).unwrap();

        assert_eq!(
            decode_framed_message::<ChannelMessages>(&buffer[..1]),
            Err(FrameError::BufferTooSmall(PREFIX_BYTE_COUNT))
        );

        let ack_len = minicbor::len(&ChannelMessages::Ack);
        let written_ack = frame_message(&ChannelMessages::Ack, &mut buffer[written..]).unwrap();
        assert_eq!(written_ack, ack_len + PREFIX_BYTE_COUNT);

        let (consumed, first) = decode_framed_message::<ChannelMessages>(&buffer[..written + written_ack]).unwrap();
        assert_eq!(first, ChannelMessages::Persist);
        let (_, second) = decode_framed_message::<ChannelMessages>(&buffer[consumed..written + written_ack]).unwrap();
        assert_eq!(second, ChannelMessages::Ack);
    }

    #[test]
    fn export_request_and_reply_survive_framing() {
        let mut entry = RecordingEntry::new(TapEntryBuilder::new("Stout").build(), 900);
        entry.data.insert(300, 1000);
        entry.data.insert(299, 1060);
        let mut buffer = [0u8; 256];

        for message in [ChannelMessages::ExportRecording(1), ChannelMessages::RecordingEntry(entry)] {
            let written = frame_message(&message, &mut buffer).unwrap();
            let (_, decoded) = decode_framed_message::<ChannelMessages>(&buffer[..written]).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn garbage_payload_is_a_decoding_error() {
        let buffer = [0x00, 0x02, 0xff, 0xff];
        assert_eq!(
            decode_framed_message::<ChannelMessages>(&buffer),
            Err(FrameError::DecodingError)
        );
    }
}
