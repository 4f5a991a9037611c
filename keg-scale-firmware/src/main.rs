#![no_std]
#![no_main]
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

mod hx711;
mod link;
mod log_bridge;
mod uptime;

use crate::hx711::Hx711;
use crate::link::{CommandChannel, CommandReceiver, FrameChannel, FrameReceiver, FramedSink};
use crate::uptime::UptimeClock;
use alloc::vec;
use assign_resources::assign_resources;
use core::cell::RefCell;
use defmt::{debug, error, info};
use defmt_rtt as _;
use embassy_embedded_hal::flash::partition::BlockingPartition;
use embassy_executor::Spawner;
use embassy_rp::flash::{Blocking, ERASE_SIZE, Flash};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::{Peri, peripherals};
use embassy_sync::blocking_mutex::NoopMutex;
use embassy_time::{Duration, Ticker};
use embedded_alloc::LlffHeap as Heap;
use embedded_storage::nor_flash::RmwNorFlashStorage;
use keg_scale::calibration::{CalibrationStore, EepromRegion};
use keg_scale::config::{ChannelConfig, DeviceConfig};
use keg_scale::logger::LogFacade;
use keg_scale::{ChannelSet, SharedResources, VolumeRecorder};
use panic_probe as _;
use static_cell::StaticCell;

const FLASH_SIZE: usize = 2 * 1024 * 1024;
const CALIBRATION_OFFSET: u32 = (FLASH_SIZE - ERASE_SIZE) as u32;
const HEAP_SIZE: usize = 48 * 1024;
const DRIVER_PERIOD: Duration = Duration::from_millis(10);
/// 2025-01-01T00:00:00Z, used until an observer provides the time.
const EPOCH_AT_BOOT: u32 = 1_735_689_600;

#[global_allocator]
static HEAP: Heap = Heap::empty();

static FRAMES: FrameChannel = FrameChannel::new();
static COMMANDS: CommandChannel = CommandChannel::new();
static MERGE_BUFFER: StaticCell<[u8; ERASE_SIZE]> = StaticCell::new();

assign_resources! {
    left_cell: LeftCellResources {
        clk_pin: PIN_14,
        data_pin: PIN_15,
    },
    right_cell: RightCellResources {
        clk_pin: PIN_12,
        data_pin: PIN_13,
    },
    storage: StorageResources {
        flash: FLASH,
    },
}

type BlockingFlash = Flash<'static, peripherals::FLASH, Blocking, FLASH_SIZE>;
type CellSensor = Hx711<Output<'static>, Input<'static>>;

fn device_config() -> DeviceConfig {
    let mut left = ChannelConfig::new("Left", 14, 15);
    let mut right = ChannelConfig::new("Right", 12, 13);
    if cfg!(feature = "flat_board") {
        left = left.reversed();
        right = right.reversed();
    }
    DeviceConfig {
        channels: vec![left, right],
        ..DeviceConfig::default()
    }
}

fn cell_sensor(clk_pin: Peri<'static, impl embassy_rp::gpio::Pin>, data_pin: Peri<'static, impl embassy_rp::gpio::Pin>) -> CellSensor {
    Hx711::new(Output::new(clk_pin, Level::Low), Input::new(data_pin, Pull::Up))
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    {
        use core::mem::MaybeUninit;
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        unsafe { HEAP.init(&raw mut HEAP_MEM as usize, HEAP_SIZE) }
    }
    log_bridge::init(log::LevelFilter::Debug);

    let p = embassy_rp::init(Default::default());
    let resources = split_resources!(p);

    info!("Keg scale starting");
    spawner.spawn(frame_task(FRAMES.receiver())).unwrap();
    spawner
        .spawn(scale_task(
            resources.left_cell,
            resources.right_cell,
            resources.storage,
            COMMANDS.receiver(),
        ))
        .unwrap();
}

/// Drains outgoing frames. A transport attaches here.
#[embassy_executor::task]
async fn frame_task(frames: FrameReceiver) {
    loop {
        let frame = frames.receive().await;
        debug!("Frame of {} bytes ready", frame.len());
    }
}

#[embassy_executor::task]
async fn scale_task(
    left_cell: LeftCellResources,
    right_cell: RightCellResources,
    storage: StorageResources,
    commands: CommandReceiver,
) {
    let config = device_config();
    if let Err(e) = config.validate() {
        error!("Invalid device configuration: {}", e);
        return;
    }

    let flash: NoopMutex<RefCell<BlockingFlash>> =
        NoopMutex::new(RefCell::new(Flash::new_blocking(storage.flash)));
    let partition = BlockingPartition::new(&flash, CALIBRATION_OFFSET, ERASE_SIZE as u32);
    let region = EepromRegion::new(RmwNorFlashStorage::new(
        partition,
        MERGE_BUFFER.init([0; ERASE_SIZE]),
    ));

    let calibration = match CalibrationStore::load(region, config.channels.len()) {
        Ok(store) => store.into_shared(),
        Err(e) => {
            error!("Unable to load calibration: {}", e);
            return;
        }
    };
    let recorder = VolumeRecorder::new(config.channels.len()).into_shared();
    let clock = UptimeClock::new(EPOCH_AT_BOOT);
    let logger = LogFacade;
    let resources = SharedResources {
        calibration: &calibration,
        recorder: &recorder,
        clock: &clock,
        logger: &logger,
    };

    let sensors = [
        cell_sensor(left_cell.clk_pin, left_cell.data_pin),
        cell_sensor(right_cell.clk_pin, right_cell.data_pin),
    ];
    let mut channels = ChannelSet::new(resources, config.channels.into_iter().zip(sensors));
    let mut sink = FramedSink::new(FRAMES.sender());
    let mut ticker = Ticker::every(DRIVER_PERIOD);

    info!("{} channels ready", channels.len());
    loop {
        while let Ok(message) = commands.try_receive() {
            for reply in channels.handle_message(message) {
                sink.send(&reply);
            }
        }
        channels.handle(&mut sink).await;
        ticker.next().await;
    }
}
