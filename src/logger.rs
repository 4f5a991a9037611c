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


use core::fmt;
use log::Level;

/// Leveled text output for channel events, handed to each channel when it is built.
pub trait ChannelLogger {
    fn log(&self, level: Level, channel: usize, message: fmt::Arguments<'_>);
}

/// Forwards channel events to whatever `log` backend the application installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacade;

impl ChannelLogger for LogFacade {
    fn log(&self, level: Level, channel: usize, message: fmt::Arguments<'_>) {
        log::log!(target: "keg_scale::channel", level, "[channel {}] {}", channel, message);
    }
}
