//! A simulated PS/2 bus for the host-side tests.
//!
//! Two open-collector wires, each pulled low if either the device or the
//! simulated host pulls it. The device end is a pair of [`SimLine`]s which
//! implement the embedded-hal pin traits, so the engine sees them exactly as
//! it would see real pins. The wires also watch the clock: every time the
//! device pulls CLK low they note the level on DAT, which is what a host
//! would sample.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::clock::{Instant, Monotonic};
use crate::ps2dev::{frame, Engine, Port, State, Timing};

/// Both wires, as seen by both ends.
#[derive(Default)]
pub struct Wires {
	device_clock_low: bool,
	device_data_low: bool,
	host_clock_low: bool,
	host_data_low: bool,
	/// Clock pulses the device has generated
	falling_edges: u32,
	/// DAT level at each of those pulses
	sampled: Vec<bool>,
	/// Host grabs CLK once the device has produced this many pulses
	inhibit_after: Option<u32>,
}

impl Wires {
	pub fn clock(&self) -> bool {
		!self.device_clock_low && !self.host_clock_low
	}

	pub fn data(&self) -> bool {
		!self.device_data_low && !self.host_data_low
	}
}

#[derive(Copy, Clone)]
enum Wire {
	Clock,
	Data,
}

/// The device's handle on one wire.
pub struct SimLine {
	wires: Rc<RefCell<Wires>>,
	wire: Wire,
}

impl OutputPin for SimLine {
	type Error = Infallible;

	fn set_low(&mut self) -> Result<(), Infallible> {
		let mut wires = self.wires.borrow_mut();
		match self.wire {
			Wire::Clock => {
				if !wires.device_clock_low {
					wires.device_clock_low = true;
					wires.falling_edges += 1;
					let level = wires.data();
					wires.sampled.push(level);
				}
			}
			Wire::Data => wires.device_data_low = true,
		}
		Ok(())
	}

	fn set_high(&mut self) -> Result<(), Infallible> {
		let mut wires = self.wires.borrow_mut();
		match self.wire {
			Wire::Clock => {
				wires.device_clock_low = false;
				if let Some(limit) = wires.inhibit_after {
					if wires.falling_edges >= limit {
						wires.host_clock_low = true;
					}
				}
			}
			Wire::Data => wires.device_data_low = false,
		}
		Ok(())
	}
}

impl InputPin for SimLine {
	type Error = Infallible;

	fn is_high(&self) -> Result<bool, Infallible> {
		let wires = self.wires.borrow();
		Ok(match self.wire {
			Wire::Clock => wires.clock(),
			Wire::Data => wires.data(),
		})
	}

	fn is_low(&self) -> Result<bool, Infallible> {
		self.is_high().map(|high| !high)
	}
}

/// A clock that moves on by `step` microseconds every time it is read.
#[derive(Clone)]
pub struct SimClock {
	ticks: Rc<Cell<u64>>,
	step: u64,
}

impl SimClock {
	pub fn new(step: u64) -> SimClock {
		SimClock {
			ticks: Rc::new(Cell::new(0)),
			step,
		}
	}

	pub fn advance_us(&self, us: u64) {
		self.ticks.set(self.ticks.get() + us);
	}
}

impl Monotonic for SimClock {
	fn now(&self) -> Instant {
		let now = self.ticks.get();
		self.ticks.set(now + self.step);
		Instant::from_ticks(now)
	}
}

/// An engine wired to a scripted host.
///
/// Time moves on one microsecond per poll.
pub struct Bench<'p> {
	pub engine: Engine<'p, SimLine, SimLine, SimClock>,
	wires: Rc<RefCell<Wires>>,
	/// States the engine has passed through since the last `clear_log`
	log: Vec<State>,
}

impl<'p> Bench<'p> {
	pub fn new(port: &'p Port, timing: Timing) -> Bench<'p> {
		let wires = Rc::new(RefCell::new(Wires::default()));
		let clock_line = SimLine {
			wires: wires.clone(),
			wire: Wire::Clock,
		};
		let data_line = SimLine {
			wires: wires.clone(),
			wire: Wire::Data,
		};
		let engine = Engine::new(clock_line, data_line, SimClock::new(1), port, timing);
		Bench {
			engine,
			wires,
			log: Vec::new(),
		}
	}

	/// One poll.
	pub fn step(&mut self) {
		let before = self.engine.state();
		self.engine.poll();
		let after = self.engine.state();
		if after != before {
			self.log.push(after);
		}
	}

	pub fn run_us(&mut self, us: u32) {
		for _ in 0..us {
			self.step();
		}
	}

	/// Did the engine enter `state` since the log was last cleared?
	pub fn saw(&self, state: State) -> bool {
		self.log.contains(&state)
	}

	pub fn clear_log(&mut self) {
		self.log.clear();
	}

	/// Host pulls CLK low (`true`) or lets it go.
	pub fn host_clock(&mut self, pull_low: bool) {
		self.wires.borrow_mut().host_clock_low = pull_low;
	}

	/// Host pulls DAT low (`true`) or lets it go.
	pub fn host_data(&mut self, pull_low: bool) {
		self.wires.borrow_mut().host_data_low = pull_low;
	}

	/// Have the host grab CLK after the device's `pulses`th clock pulse.
	pub fn inhibit_after_pulses(&mut self, pulses: u32) {
		self.wires.borrow_mut().inhibit_after = Some(pulses);
	}

	pub fn lines_released(&self) -> bool {
		let wires = self.wires.borrow();
		!wires.device_clock_low && !wires.device_data_low
	}

	pub fn device_holds_data(&self) -> bool {
		self.wires.borrow().device_data_low
	}

	fn falling_edges(&self) -> u32 {
		self.wires.borrow().falling_edges
	}

	/// Send a byte to the device. Returns whether it acknowledged.
	pub fn host_send(&mut self, byte: u8) -> bool {
		self.host_send_with_parity(byte, frame::parity_bit(byte))
	}

	/// Send a byte with a parity bit of our choosing.
	pub fn host_send_with_parity(&mut self, byte: u8, parity: bool) -> bool {
		let mut bits = [true; 10];
		for (n, bit) in bits.iter_mut().take(8).enumerate() {
			*bit = byte & (1 << n) != 0;
		}
		bits[8] = parity;

		// Request-to-send: inhibit, start bit, release the clock.
		self.host_clock(true);
		self.run_us(100);
		self.host_data(true);
		self.run_us(5);
		self.host_clock(false);

		let first_edge = self.falling_edges();
		let mut seen = 0;
		let mut acked = false;
		for _ in 0..5_000 {
			self.step();
			let edges = self.falling_edges() - first_edge;
			if edges != seen {
				seen = edges;
				match edges {
					// Change DAT while the device holds CLK low.
					1..=10 => self.host_data(!bits[edges as usize - 1]),
					11 => acked = !self.wires.borrow().data(),
					_ => {}
				}
			}
			if seen >= 11 && self.engine.state() == State::Idle {
				break;
			}
		}
		self.host_data(false);
		acked
	}

	/// Let the device clock a byte out to us.
	///
	/// Gives up, returning `None`, if eleven good bits don't arrive.
	pub fn host_receive(&mut self) -> Option<u8> {
		self.wires.borrow_mut().sampled.clear();
		for _ in 0..2_000 {
			self.step();
			if self.wires.borrow().sampled.len() >= 11 && self.engine.state() == State::Idle {
				break;
			}
		}
		self.captured()
	}

	/// Decode the first frame the device clocked out since the last capture
	/// started.
	pub fn captured(&self) -> Option<u8> {
		let wires = self.wires.borrow();
		if wires.sampled.len() < 11 {
			return None;
		}
		let bits = wires.sampled[..11]
			.iter()
			.enumerate()
			.fold(0u16, |acc, (n, level)| acc | (u16::from(*level) << n));
		frame::decode(bits)
	}
}
