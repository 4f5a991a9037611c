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


use defmt::Debug2Format;

/// Routes the `log` output of the scale core to defmt.
pub struct DefmtLogger;

impl log::Log for DefmtLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let message = Debug2Format(record.args());
        match record.level() {
            log::Level::Error => defmt::error!("{}: {}", record.target(), message),
            log::Level::Warn => defmt::warn!("{}: {}", record.target(), message),
            log::Level::Info => defmt::info!("{}: {}", record.target(), message),
            log::Level::Debug => defmt::debug!("{}: {}", record.target(), message),
            log::Level::Trace => defmt::trace!("{}: {}", record.target(), message),
        }
    }

    fn flush(&self) {}
}

static LOGGER: DefmtLogger = DefmtLogger;

pub fn init(level: log::LevelFilter) {
    // Single core, called before the executor starts.
    unsafe {
        if log::set_logger_racy(&LOGGER).is_ok() {
            log::set_max_level_racy(level);
        }
    }
}
