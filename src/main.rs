//! # SX|2 Indicator firmware
//!
//! This is the firmware for the SX|2 indicator board, a Raspberry Pi Pico
//! sitting between a USB mouse and a PS/2 host. It:
//!
//! * brings up the RP2040 clocks, pins and hardware timer,
//! * polls the PS/2 device engine on Core 0, as fast as it can, and
//! * runs the mouse protocol adapter on Core 1, showing on the LED whether a
//!   mouse is plugged in.
//!
//! The two cores only share the [`Port`] and the [`HidMouse`], both of which
//! live in `static`s.

// -----------------------------------------------------------------------------
// Licence Statement
// -----------------------------------------------------------------------------
// Copyright (c) the SX|2 Indicator Developers, 2024
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.
// -----------------------------------------------------------------------------

#![no_std]
#![no_main]

// -----------------------------------------------------------------------------
// Imports
// -----------------------------------------------------------------------------

use cortex_m_rt::entry;
use defmt_rtt as _;
use embedded_hal::digital::v2::{OutputPin, PinState};
use panic_probe as _;
use rp_pico::hal::{
	self,
	gpio::InOutPin,
	multicore::{Multicore, Stack},
	pac,
};

use sx2_indicator::{
	clock::{Instant, Monotonic},
	hid::{HidMouse, PointerSource},
	ps2dev::{Engine, Port, Timing},
	u2p::{self, Adapter},
};

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// The RP2040's 1 MHz timer, as our time source.
#[derive(Copy, Clone)]
struct PicoTimer(hal::Timer);

// -----------------------------------------------------------------------------
// Static and Const Data
// -----------------------------------------------------------------------------

/// This is the standard RP2040 bootloader. It must be stored in the first 256
/// bytes of the external SPI Flash chip. It will map the external SPI flash
/// chip to address `0x1000_0000` and jump to an Interrupt Vector Table at
/// address `0x1000_0100` (i.e. immediately after the bootloader).
///
/// See `memory.x` for a definition of the `.boot2` section.
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

/// Firmware version, from `git describe`
const VERSION: &str = include_str!(concat!(env!("OUT_DIR"), "/version.txt"));

/// Bytes to and from the PS/2 host. Engine on Core 0, adapter on Core 1.
static PS2_PORT: Port = Port::new();

/// Fed by the USB host stack, drained by the adapter.
static HID_MOUSE: HidMouse = HidMouse::new();

/// Core 1 runs the adapter on this.
static mut CORE1_STACK: Stack<4096> = Stack::new();

// -----------------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------------

impl Monotonic for PicoTimer {
	fn now(&self) -> Instant {
		self.0.get_counter()
	}
}

/// This is the entry-point to the firmware. It is called by cortex-m-rt once
/// the `.bss` and `.data` sections have been initialised.
#[entry]
fn main() -> ! {
	defmt::info!("SX|2 Indicator {=str} starting...", VERSION);

	// Grab the singleton containing all the RP2040 peripherals
	let mut pac = pac::Peripherals::take().unwrap();

	// Needed by the clock setup
	let mut watchdog = hal::watchdog::Watchdog::new(pac.WATCHDOG);

	// Get ourselves up to a decent clock speed.
	let clocks = hal::clocks::init_clocks_and_plls(
		rp_pico::XOSC_CRYSTAL_FREQ,
		pac.XOSC,
		pac.CLOCKS,
		pac.PLL_SYS,
		pac.PLL_USB,
		&mut pac.RESETS,
		&mut watchdog,
	)
	.ok()
	.unwrap();

	defmt::info!("Clocks OK");

	// The free-running 64-bit microsecond counter. Both cores read it.
	let timer = PicoTimer(hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks));

	// sio is the *Single-cycle Input/Output* peripheral. It has all our GPIO
	// pins, as well as the mailboxes we need to start Core 1.
	let mut sio = hal::sio::Sio::new(pac.SIO);

	// Configure and grab all the RP2040 pins the Pico exposes.
	let pins = rp_pico::Pins::new(
		pac.IO_BANK0,
		pac.PADS_BANK0,
		sio.gpio_bank0,
		&mut pac.RESETS,
	);

	// PS/2 CLK on GPIO11 and DAT on GPIO10. The host has pull-ups, but we
	// add ours in case nothing is plugged in.
	let ps2_clock = InOutPin::new(pins.gpio11.into_pull_up_input());
	let ps2_data = InOutPin::new(pins.gpio10.into_pull_up_input());
	let led = pins.led.into_push_pull_output();

	defmt::info!("Pins OK");

	let mut mc = Multicore::new(&mut pac.PSM, &mut pac.PPB, &mut sio.fifo);
	let cores = mc.cores();
	let core1 = &mut cores[1];
	// Safety: this is the only place the stack is used, and we only get here
	// once.
	let core1_stack = unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK.mem) };
	core1
		.spawn(core1_stack, move || core1_main(timer, led))
		.unwrap();

	defmt::info!("Core 1 running");

	let mut engine = Engine::new(ps2_clock, ps2_data, timer, &PS2_PORT, Timing::STANDARD);
	loop {
		engine.poll();
	}
}

/// Core 1: speak the mouse protocol and keep the LED up to date.
fn core1_main<L>(timer: PicoTimer, mut led: L) -> !
where
	L: OutputPin,
{
	let mut adapter = Adapter::new(&PS2_PORT, &HID_MOUSE, timer, u2p::Config::DEFAULT);
	let mut attached = false;
	loop {
		adapter.poll();
		let now_attached = (&HID_MOUSE).is_attached();
		if now_attached != attached {
			defmt::debug!("Pointer attached: {=bool}", now_attached);
			let _ = led.set_state(PinState::from(now_attached));
			attached = now_attached;
		}
	}
}

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
