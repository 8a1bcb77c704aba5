//! # PS/2 device-side driver
//!
//! Emulates the device end of a PS/2 link on two open-drain GPIO lines, with
//! no UART or PIO help. Everything happens in [`Engine::poll`], which looks at
//! the lines and the clock, makes at most one state transition and returns.
//! Nothing waits inside a call.
//!
//! ## Host to device
//!
//! The host pulls CLK low to inhibit us, pulls DAT low (the start bit) and
//! lets CLK go. From then on we generate the clock: for each of the eight data
//! bits, the parity bit and the stop bit we hold CLK low for a while, release
//! it and sample DAT. Then we pull DAT low and pulse CLK once more as the
//! acknowledge bit. If the start bit and the clock release haven't both
//! turned up within the request timeout of CLK going low, we give up and go
//! back to idle.
//!
//! ## Device to host
//!
//! Only started from idle, with CLK high and a byte in the transmit queue. We
//! put each of the eleven frame bits on DAT and pulse CLK. Before each step
//! we check the host isn't holding CLK low; if it is, the send is aborted and
//! the host gets to talk.
//!
//! ## Timing
//!
//! Every dwell is measured from the moment we entered the current state and
//! only checked when `poll` is called, so `poll` must be called much more
//! often than the shortest dwell in [`Timing`]. The textbook figures are in
//! [`Timing::STANDARD`]. Hosts generally accept much narrower pulses, which
//! [`Timing::FAST`] relies on when the polling loop has other work to do.

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

// -----------------------------------------------------------------------------
// Sub-modules
// -----------------------------------------------------------------------------

pub mod frame;
mod port;

// -----------------------------------------------------------------------------
// Imports
// -----------------------------------------------------------------------------

use crate::bus::OpenDrainLine;
use crate::clock::{Duration, Instant, Monotonic};

pub use port::{Port, RECEIVE_FIFO_LEN, TRANSMIT_FIFO_LEN};

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// Dwell times for the bit engine.
///
/// Each one is a minimum: the engine moves on at the first `poll` after the
/// time has passed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timing {
	/// How long we hold CLK low for each bit.
	pub clock_low: Duration,
	/// How long CLK stays released between bits.
	pub clock_high: Duration,
	/// When sending, the wait before changing DAT and again before pulling
	/// CLK low.
	pub setup: Duration,
	/// Around the acknowledge bit, the wait before pulling DAT low and before
	/// letting it go again.
	pub ack_hold: Duration,
	/// How long the host gets to produce the start bit, and then to release
	/// CLK, before we give up on a request-to-send.
	pub request_timeout: Duration,
}

/// Which bit of the frame is being moved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bit {
	Start,
	/// Data bit 0 to 7
	Data(u8),
	Parity,
	Stop,
}

/// The engine's state.
///
/// `Idle` is where it rests; everything else is part of one frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
	/// Watching CLK for a request-to-send, or waiting for something to send.
	Idle,
	/// Host has pulled CLK low; waiting for DAT to go low.
	WaitStartBit,
	/// Got the start bit; waiting for the host to let CLK go.
	WaitClockRelease,
	/// CLK released; waiting to pull it low for this bit.
	ReceiveClockLow(Bit),
	/// CLK held low; waiting to release it and sample this bit.
	ReceiveClockHigh(Bit),
	/// Frame received; waiting to pull DAT low.
	AckDataLow,
	/// DAT low; waiting to pull CLK low.
	AckClockLow,
	/// CLK low; waiting to release it.
	AckClockHigh,
	/// Waiting to release DAT, which ends the frame.
	AckDataRelease,
	/// Waiting to put this bit on DAT.
	SendData(Bit),
	/// Bit is on DAT; waiting to pull CLK low.
	SendClockLow(Bit),
	/// CLK held low; waiting to release it.
	SendClockHigh(Bit),
	/// Stop bit is out; waiting out the final CLK high time.
	SendComplete,
}

/// How the last device-to-host send went.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SendOutcome {
	/// Still clocking it out
	Pending = 0,
	/// The host pulled CLK low part-way through
	Aborted = 1,
	/// All eleven bits went out
	Success = 2,
}

/// Ways [`Engine::send_blocking`] can fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
	/// The engine is mid-frame, or other bytes are already queued.
	Busy,
	/// The host took the bus while we were sending.
	Aborted,
	/// The send didn't finish within the allowed number of polls.
	TimedOut,
}

/// The bit-level PS/2 device engine.
///
/// Owns the two lines. Must only be polled from one execution context; the
/// [`Port`] it is attached to may be used from anywhere.
pub struct Engine<'p, CLK, DAT, T> {
	clock: CLK,
	data: DAT,
	timer: T,
	port: &'p Port,
	timing: Timing,
	state: State,
	/// When we entered `state`
	since: Instant,
	/// Byte being received, filled from the top
	shift: u8,
	/// XOR of the data bits received so far
	parity: bool,
	/// Parity and stop bit of the frame being received were good
	frame_ok: bool,
	/// Remaining bits of the frame being sent, see [`frame::encode`]
	frame: u16,
}

// -----------------------------------------------------------------------------
// Static and Const Data
// -----------------------------------------------------------------------------

impl Timing {
	/// Nominal PS/2 device timing: 30 µs clock phases.
	pub const STANDARD: Timing = Timing {
		clock_low: Duration::micros(30),
		clock_high: Duration::micros(30),
		setup: Duration::micros(15),
		ack_hold: Duration::micros(5),
		request_timeout: Duration::millis(15),
	};

	/// Narrow pulses, for when `poll` can't be called every few microseconds.
	///
	/// Only works with hosts that tolerate pulses far narrower than the PS/2
	/// figures. Check against the real host before using it.
	pub const FAST: Timing = Timing {
		clock_low: Duration::micros(3),
		clock_high: Duration::micros(3),
		setup: Duration::micros(1),
		ack_hold: Duration::micros(1),
		request_timeout: Duration::millis(15),
	};
}

// -----------------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------------

impl Default for Timing {
	fn default() -> Self {
		Timing::STANDARD
	}
}

impl Bit {
	/// Position in the frame, with the start bit at 0.
	pub const fn index(self) -> u8 {
		match self {
			Bit::Start => 0,
			Bit::Data(n) => 1 + (n & 7),
			Bit::Parity => 9,
			Bit::Stop => 10,
		}
	}

	/// The inverse of [`Bit::index`].
	pub const fn from_index(index: u8) -> Option<Bit> {
		match index {
			0 => Some(Bit::Start),
			1..=8 => Some(Bit::Data(index - 1)),
			9 => Some(Bit::Parity),
			10 => Some(Bit::Stop),
			_ => None,
		}
	}

	/// The bit after this one, if there is one.
	pub const fn next(self) -> Option<Bit> {
		Bit::from_index(self.index() + 1)
	}
}

impl State {
	/// Turn a diagnostic code back into a state.
	///
	/// Codes come from `u8::from(state)`. The upper nibble says what the engine
	/// is doing and the lower nibble which bit it is on.
	pub fn from_code(code: u8) -> Option<State> {
		let bit = Bit::from_index(code & 0x0F);
		let state = match code >> 4 {
			0 => match code {
				0 => State::Idle,
				1 => State::WaitStartBit,
				2 => State::WaitClockRelease,
				_ => return None,
			},
			1 => State::ReceiveClockLow(bit?),
			2 => State::ReceiveClockHigh(bit?),
			3 => match code & 0x0F {
				0 => State::AckDataLow,
				1 => State::AckClockLow,
				2 => State::AckClockHigh,
				3 => State::AckDataRelease,
				_ => return None,
			},
			4 => State::SendData(bit?),
			5 => State::SendClockLow(bit?),
			6 => State::SendClockHigh(bit?),
			7 if code == 0x70 => State::SendComplete,
			_ => return None,
		};
		Some(state)
	}

	/// Is the engine in the middle of a host-to-device frame?
	pub fn is_receiving(self) -> bool {
		matches!(
			self,
			State::WaitStartBit
				| State::WaitClockRelease
				| State::ReceiveClockLow(_)
				| State::ReceiveClockHigh(_)
				| State::AckDataLow
				| State::AckClockLow
				| State::AckClockHigh
				| State::AckDataRelease
		)
	}

	/// Is the engine in the middle of a device-to-host frame?
	pub fn is_sending(self) -> bool {
		matches!(
			self,
			State::SendData(_)
				| State::SendClockLow(_)
				| State::SendClockHigh(_)
				| State::SendComplete
		)
	}
}

impl From<State> for u8 {
	fn from(state: State) -> u8 {
		match state {
			State::Idle => 0x00,
			State::WaitStartBit => 0x01,
			State::WaitClockRelease => 0x02,
			State::ReceiveClockLow(bit) => 0x10 | bit.index(),
			State::ReceiveClockHigh(bit) => 0x20 | bit.index(),
			State::AckDataLow => 0x30,
			State::AckClockLow => 0x31,
			State::AckClockHigh => 0x32,
			State::AckDataRelease => 0x33,
			State::SendData(bit) => 0x40 | bit.index(),
			State::SendClockLow(bit) => 0x50 | bit.index(),
			State::SendClockHigh(bit) => 0x60 | bit.index(),
			State::SendComplete => 0x70,
		}
	}
}

impl SendOutcome {
	pub(crate) fn from_code(code: u8) -> SendOutcome {
		match code {
			0 => SendOutcome::Pending,
			1 => SendOutcome::Aborted,
			_ => SendOutcome::Success,
		}
	}
}

impl<'p, CLK, DAT, T> Engine<'p, CLK, DAT, T>
where
	CLK: OpenDrainLine,
	DAT: OpenDrainLine,
	T: Monotonic,
{
	/// Take ownership of the two lines and start in idle with both released.
	///
	/// The pins must already have their pull-ups enabled. Anything left in the
	/// port's queues from an earlier engine is thrown away.
	pub fn new(
		mut clock: CLK,
		mut data: DAT,
		timer: T,
		port: &'p Port,
		timing: Timing,
	) -> Engine<'p, CLK, DAT, T> {
		clock.set_as_input();
		data.set_as_input();
		port.reset();
		port.publish_state(State::Idle);
		let since = timer.now();
		Engine {
			clock,
			data,
			timer,
			port,
			timing,
			state: State::Idle,
			since,
			shift: 0,
			parity: false,
			frame_ok: false,
			frame: frame::SENT,
		}
	}

	/// Let go of both lines and give back the hardware.
	///
	/// A frame in progress is abandoned.
	pub fn release(mut self) -> (CLK, DAT, T) {
		self.clock.set_as_input();
		self.data.set_as_input();
		self.port.publish_state(State::Idle);
		(self.clock, self.data, self.timer)
	}

	/// The state the engine is in.
	pub fn state(&self) -> State {
		self.state
	}

	/// The port this engine feeds.
	pub fn port(&self) -> &'p Port {
		self.port
	}

	/// Change the dwell times. Takes effect from the next state change.
	pub fn set_timing(&mut self, timing: Timing) {
		self.timing = timing;
	}

	/// Advance the state machine by at most one step.
	///
	/// Call this as often as possible from the time-critical context: the gap
	/// between calls must be well under the smallest dwell in the current
	/// [`Timing`].
	pub fn poll(&mut self) {
		let now = self.timer.now();
		let elapsed = now
			.checked_duration_since(self.since)
			.unwrap_or(Duration::from_ticks(0));
		let timing = self.timing;

		match self.state {
			State::Idle => {
				if !self.clock.read_level() {
					// Host wants to talk, which beats anything we have queued.
					self.enter(State::WaitStartBit, now);
				} else if let Some(byte) = self.port.next_to_send() {
					self.frame = frame::encode(byte);
					self.port.publish_outcome(SendOutcome::Pending);
					self.enter(State::SendData(Bit::Start), now);
				}
			}

			// Host-to-device
			State::WaitStartBit => {
				if !self.data.read_level() {
					self.shift = 0;
					self.parity = false;
					self.frame_ok = false;
					// The request timeout runs from CLK first going low.
					self.continue_in(State::WaitClockRelease);
				} else if self.clock.read_level() {
					// CLK back up with no start bit: the host was only
					// inhibiting us.
					self.enter_idle(now);
				} else if elapsed > timing.request_timeout {
					debug!("PS/2 no start bit");
					self.enter_idle(now);
				}
			}
			State::WaitClockRelease => {
				if self.clock.read_level() {
					self.enter(State::ReceiveClockLow(Bit::Data(0)), now);
				} else if elapsed > timing.request_timeout {
					debug!("PS/2 host kept CLK low");
					self.enter_idle(now);
				}
			}
			State::ReceiveClockLow(bit) => {
				if elapsed > timing.clock_high {
					self.clock.set_as_output_low();
					self.enter(State::ReceiveClockHigh(bit), now);
				}
			}
			State::ReceiveClockHigh(bit) => {
				if elapsed > timing.clock_low {
					self.clock.set_as_input();
					let level = self.data.read_level();
					let next = self.sample(bit, level);
					self.enter(next, now);
				}
			}
			State::AckDataLow => {
				if elapsed > timing.ack_hold {
					self.data.set_as_output_low();
					self.enter(State::AckClockLow, now);
				}
			}
			State::AckClockLow => {
				if elapsed > timing.clock_high {
					self.clock.set_as_output_low();
					self.enter(State::AckClockHigh, now);
				}
			}
			State::AckClockHigh => {
				if elapsed > timing.clock_low {
					self.clock.set_as_input();
					self.deliver();
					self.enter(State::AckDataRelease, now);
				}
			}
			State::AckDataRelease => {
				if elapsed > timing.ack_hold {
					self.enter_idle(now);
				}
			}

			// Device-to-host
			State::SendData(bit) => {
				if elapsed > timing.setup {
					if !self.clock.read_level() {
						self.abort_send(bit, now);
						return;
					}
					if self.frame & 1 == 0 {
						self.data.set_as_output_low();
					} else {
						self.data.set_as_input();
					}
					self.frame >>= 1;
					self.enter(State::SendClockLow(bit), now);
				}
			}
			State::SendClockLow(bit) => {
				if elapsed > timing.setup {
					if !self.clock.read_level() {
						self.abort_send(bit, now);
						return;
					}
					self.clock.set_as_output_low();
					self.enter(State::SendClockHigh(bit), now);
				}
			}
			State::SendClockHigh(bit) => {
				if elapsed > timing.clock_low {
					self.clock.set_as_input();
					let next = match bit.next() {
						Some(next) if self.frame != frame::SENT => State::SendData(next),
						_ => State::SendComplete,
					};
					self.enter(next, now);
				}
			}
			State::SendComplete => {
				if elapsed > timing.clock_high {
					self.port.publish_outcome(SendOutcome::Success);
					self.enter_idle(now);
				}
			}
		}
	}

	/// Queue one byte and poll until it has been sent.
	///
	/// Only for callers that really need to know the outcome. The queue must
	/// be empty and the engine idle, so the next send to finish is ours. Gives
	/// up after `max_polls` calls to [`Engine::poll`].
	pub fn send_blocking(&mut self, byte: u8, max_polls: u32) -> Result<(), SendError> {
		if self.state != State::Idle || !self.port.is_send_queue_empty() {
			return Err(SendError::Busy);
		}
		let before = self.port.sends_completed();
		if !self.port.try_send_byte(byte) {
			return Err(SendError::Busy);
		}
		for _ in 0..max_polls {
			self.poll();
			if self.port.sends_completed() != before {
				return match self.port.last_send_outcome() {
					SendOutcome::Success => Ok(()),
					_ => Err(SendError::Aborted),
				};
			}
		}
		Err(SendError::TimedOut)
	}

	/// Fold one sampled receive bit into the frame and pick the next state.
	fn sample(&mut self, bit: Bit, level: bool) -> State {
		match bit {
			Bit::Data(n) => {
				self.shift >>= 1;
				if level {
					self.shift |= 0x80;
					self.parity = !self.parity;
				}
				if n < 7 {
					State::ReceiveClockLow(Bit::Data(n + 1))
				} else {
					State::ReceiveClockLow(Bit::Parity)
				}
			}
			Bit::Parity => {
				// Odd parity: data ones plus the parity bit must be odd.
				self.frame_ok = self.parity != level;
				State::ReceiveClockLow(Bit::Stop)
			}
			Bit::Stop => {
				if !level {
					self.frame_ok = false;
				}
				State::AckDataLow
			}
			// We never clock in the start bit; the host puts it on DAT before
			// handing us CLK.
			Bit::Start => State::ReceiveClockLow(Bit::Data(0)),
		}
	}

	/// Pass a completed frame to the consumer, if it was good.
	fn deliver(&mut self) {
		if !self.frame_ok {
			debug!("PS/2 bad frame {=u8:02x} dropped", self.shift);
		} else if !self.port.push_received(self.shift) {
			debug!("PS/2 receive FIFO full, {=u8:02x} dropped", self.shift);
		}
	}

	fn abort_send(&mut self, bit: Bit, now: Instant) {
		debug!("PS/2 send aborted at bit {=u8}", bit.index());
		self.port.publish_outcome(SendOutcome::Aborted);
		self.enter_idle(now);
	}

	fn enter_idle(&mut self, now: Instant) {
		self.clock.set_as_input();
		self.data.set_as_input();
		self.enter(State::Idle, now);
	}

	fn enter(&mut self, state: State, now: Instant) {
		self.since = now;
		self.continue_in(state);
	}

	/// Change state without restarting the dwell timer.
	fn continue_in(&mut self, state: State) {
		self.state = state;
		self.port.publish_state(state);
	}
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------


// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
