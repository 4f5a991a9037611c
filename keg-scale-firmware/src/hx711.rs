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


//! Poll driven HX711 front end. Conversions are clocked out only when the chip signals one is
//! ready, so `update` never waits on the 10 or 80 Hz conversion rate.

use defmt::{Debug2Format, debug, trace, warn};
use embassy_time::{Duration, Instant, block_for};
use heapless::HistoryBuffer;
use keg_scale::sensing::{MassSensing, SensingStatus};

#[derive(Clone, Copy)]
pub enum Hx711Gain {
    Gain128,
    Gain64,
    Gain32ChannelB,
}

impl Hx711Gain {
    fn tick_count(&self) -> usize {
        match self {
            Hx711Gain::Gain128 => 25,
            Hx711Gain::Gain64 => 27,
            Hx711Gain::Gain32ChannelB => 26,
        }
    }

    fn from_gain(gain: u8) -> Self {
        match gain {
            64 => Hx711Gain::Gain64,
            32 => Hx711Gain::Gain32ChannelB,
            _ => Hx711Gain::Gain128,
        }
    }
}

const CLK_HALF_PERIOD: Duration = Duration::from_micros(1);
const VALID_DATA_BITS: usize = 24;
/// Conversions in the rolling average.
const AVERAGE_DEPTH: usize = 16;
/// Conversions averaged into a tare offset.
const TARE_CONVERSIONS: usize = AVERAGE_DEPTH;
const TARE_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug)]
pub enum Error<OutPinE, InPinE> {
    OutPin(OutPinE),
    InPin(InPinE),
}

pub struct Hx711<CLK, DATA> {
    clock_pin: CLK,
    data_pin: DATA,
    gain_clocks: usize,
    reverse: bool,
    readings: HistoryBuffer<i32, AVERAGE_DEPTH>,
    tare_offset: i32,
    calibration_factor: f32,
    signal_timeout: Duration,
    started_at: Option<Instant>,
    last_conversion: Option<Instant>,
    tare_requested_at: Option<Instant>,
    tare_conversions: usize,
    tare_done: bool,
    signal_timeout_flag: bool,
    tare_timeout_flag: bool,
    pin_fault_reported: bool,
}

impl<CLK, DATA> Hx711<CLK, DATA>
where
    CLK: embedded_hal::digital::OutputPin,
    DATA: embedded_hal::digital::InputPin,
{
    pub fn new(clock_pin: CLK, data_pin: DATA) -> Self {
        Self {
            clock_pin,
            data_pin,
            gain_clocks: Hx711Gain::Gain128.tick_count(),
            reverse: false,
            readings: HistoryBuffer::new(),
            tare_offset: 0,
            calibration_factor: 1.0,
            signal_timeout: Duration::from_millis(0),
            started_at: None,
            last_conversion: None,
            tare_requested_at: None,
            tare_conversions: 0,
            tare_done: false,
            signal_timeout_flag: true,
            tare_timeout_flag: false,
            pin_fault_reported: false,
        }
    }

    /// Clock out a conversion if DOUT reports one ready.
    fn read_conversion(&mut self) -> Result<Option<i32>, Error<CLK::Error, DATA::Error>> {
        // DOUT goes low when conversion is ready
        if !self.data_pin.is_low().map_err(Error::InPin)? {
            return Ok(None);
        }

        let mut data: i32 = 0;
        for _ in 0..self.gain_clocks {
            data <<= 1;
            self.clock_pin.set_high().map_err(Error::OutPin)?;
            block_for(CLK_HALF_PERIOD);
            self.clock_pin.set_low().map_err(Error::OutPin)?;
            if self.data_pin.is_high().map_err(Error::InPin)? {
                data |= 0x1;
            }
            block_for(CLK_HALF_PERIOD);
        }

        data >>= self.gain_clocks - VALID_DATA_BITS;
        data &= (1 << VALID_DATA_BITS) - 1;
        // extend sign if bit 24 is 1
        if (data >> 23) & 0x1 == 0x1 {
            data |= 0xFF000000u32 as i32;
        }
        Ok(Some(if self.reverse { -data } else { data }))
    }

    fn average(&self) -> i32 {
        let readings = self.readings.as_slice();
        if readings.is_empty() {
            return 0;
        }
        let sum: i64 = readings.iter().map(|&r| r as i64).sum();
        (sum / readings.len() as i64) as i32
    }
}

impl<CLK, DATA> MassSensing for Hx711<CLK, DATA>
where
    CLK: embedded_hal::digital::OutputPin,
    DATA: embedded_hal::digital::InputPin,
{
    fn begin(&mut self, gain: u8) {
        self.gain_clocks = Hx711Gain::from_gain(gain).tick_count();
        // power up
        self.clock_pin.set_low().ok();
    }

    fn set_reverse_output(&mut self) {
        self.reverse = true;
    }

    fn start_multiple(&mut self, timeout_ms: u32, _blocking: bool) {
        if self.started_at.is_some() && !self.tare_timeout_flag {
            return;
        }
        debug!("HX711 sampling started, signal timeout {} ms", timeout_ms);
        self.signal_timeout = Duration::from_millis(timeout_ms as u64);
        self.started_at = Some(Instant::now());
        self.last_conversion = None;
        self.readings.clear();
        self.tare_requested_at = None;
        self.tare_timeout_flag = false;
        self.signal_timeout_flag = true;
    }

    fn set_tare_offset(&mut self, offset: i32) {
        self.tare_offset = offset;
    }

    fn tare_offset(&self) -> i32 {
        self.tare_offset
    }

    fn set_calibration_factor(&mut self, factor: f32) {
        self.calibration_factor = factor;
    }

    fn update(&mut self) -> SensingStatus {
        if self.started_at.is_none() {
            return SensingStatus::Idle;
        }
        let now = Instant::now();
        let mut status = SensingStatus::Idle;

        let conversion = match self.read_conversion() {
            Ok(conversion) => {
                self.pin_fault_reported = false;
                conversion
            }
            Err(e) => {
                // Reported once per fault, the signal timeout takes it from there.
                if !self.pin_fault_reported {
                    warn!("HX711 pin error: {}", Debug2Format(&e));
                    self.pin_fault_reported = true;
                }
                None
            }
        };

        if let Some(raw) = conversion {
            trace!("HX711 conversion {}", raw);
            self.last_conversion = Some(now);
            self.readings.write(raw);
            status = SensingStatus::NewData;

            if self.tare_requested_at.is_some() {
                self.tare_conversions += 1;
                if self.tare_conversions >= TARE_CONVERSIONS {
                    self.tare_offset = self.average();
                    self.tare_requested_at = None;
                    self.tare_done = true;
                    status = SensingStatus::TareComplete;
                }
            }
        }

        self.signal_timeout_flag = match self.last_conversion {
            Some(at) => now - at > self.signal_timeout,
            None => true,
        };
        if let Some(requested_at) = self.tare_requested_at {
            self.tare_timeout_flag = now - requested_at > TARE_TIMEOUT;
        }
        status
    }

    fn data(&self) -> f32 {
        if self.calibration_factor == 0.0 {
            return 0.0;
        }
        (self.average() - self.tare_offset) as f32 / self.calibration_factor
    }

    fn tare_timeout_flag(&self) -> bool {
        self.tare_timeout_flag
    }

    fn signal_timeout_flag(&self) -> bool {
        self.signal_timeout_flag
    }

    fn tare_no_delay(&mut self) {
        self.readings.clear();
        self.tare_conversions = 0;
        self.tare_done = false;
        self.tare_requested_at = Some(Instant::now());
    }

    fn tare_status(&self) -> bool {
        self.tare_done
    }

    fn new_calibration(&mut self, known_mass: f32) -> f32 {
        let counts = (self.average() - self.tare_offset) as f32;
        if known_mass != 0.0 && counts != 0.0 {
            self.calibration_factor = counts / known_mass;
        }
        trace!("Calibration counts per gram = {}", self.calibration_factor);
        self.calibration_factor
    }
}
