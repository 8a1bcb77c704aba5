//! The shared half of a PS/2 device port.
//!
//! The [`Engine`](super::Engine) runs on one core and the protocol adapter on
//! the other. Everything they share lives in here: the receive and transmit
//! FIFOs (behind one [`NeoMutex`]) and a few atomics the engine publishes for
//! the other side to read.

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
// Imports
// -----------------------------------------------------------------------------

use atomic_polyfill::{AtomicU32, AtomicU8, Ordering};

use super::{SendOutcome, State};
use crate::fifo::ByteFifo;
use crate::mutex::NeoMutex;

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// Shared state for one PS/2 device port.
///
/// Create one per physical bus, usually as a `static`.
pub struct Port {
	fifos: NeoMutex<Fifos>,
	/// Diagnostic code of the engine's current [`State`]
	state: AtomicU8,
	/// A [`SendOutcome`], as a `u8`
	last_outcome: AtomicU8,
	/// Bumped every time a send finishes, either way
	sends_completed: AtomicU32,
}

/// The two byte queues, guarded together.
struct Fifos {
	/// Host-to-device bytes, filled by the engine
	receive: ByteFifo<RECEIVE_FIFO_LEN>,
	/// Device-to-host bytes, drained by the engine
	transmit: ByteFifo<TRANSMIT_FIFO_LEN>,
}

// -----------------------------------------------------------------------------
// Static and Const Data
// -----------------------------------------------------------------------------

/// Slots in the receive FIFO (one is always kept free).
pub const RECEIVE_FIFO_LEN: usize = 16;

/// Slots in the transmit FIFO (one is always kept free).
pub const TRANSMIT_FIFO_LEN: usize = 8;

// -----------------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------------

impl Port {
	/// Make a port with empty queues and an idle engine.
	pub const fn new() -> Port {
		Port {
			fifos: NeoMutex::new(Fifos {
				receive: ByteFifo::new(),
				transmit: ByteFifo::new(),
			}),
			state: AtomicU8::new(0),
			last_outcome: AtomicU8::new(SendOutcome::Success as u8),
			sends_completed: AtomicU32::new(0),
		}
	}

	/// Empty both queues.
	pub fn reset(&self) {
		let mut fifos = self.fifos.lock();
		fifos.receive.clear();
		fifos.transmit.clear();
	}

	/// Has the host sent us anything we haven't read yet?
	pub fn is_receive_buffer_empty(&self) -> bool {
		self.fifos.lock().receive.is_empty()
	}

	/// Take the oldest byte the host sent us, if any.
	pub fn try_receive_byte(&self) -> Option<u8> {
		self.fifos.lock().receive.pop()
	}

	/// Queue a byte for the host.
	///
	/// Returns `false` if the transmit queue is full. The caller may try
	/// again later.
	pub fn try_send_byte(&self, byte: u8) -> bool {
		self.fifos.lock().transmit.push(byte)
	}

	/// Queue several bytes for the host, all or nothing.
	///
	/// Returns `false`, and queues nothing, if they won't all fit.
	pub fn try_send_bytes(&self, bytes: &[u8]) -> bool {
		let mut fifos = self.fifos.lock();
		if !fifos.transmit.has_room_for(bytes.len()) {
			return false;
		}
		for byte in bytes {
			fifos.transmit.push(*byte);
		}
		true
	}

	/// Is there nothing waiting to go to the host?
	///
	/// A byte already being clocked out by the engine is not in the queue.
	pub fn is_send_queue_empty(&self) -> bool {
		self.fifos.lock().transmit.is_empty()
	}

	/// What the engine is doing right now. For debug and telemetry only.
	pub fn engine_state(&self) -> State {
		State::from_code(self.state.load(Ordering::Relaxed)).unwrap_or(State::Idle)
	}

	/// How did the most recent device-to-host send go?
	pub fn last_send_outcome(&self) -> SendOutcome {
		SendOutcome::from_code(self.last_outcome.load(Ordering::Acquire))
	}

	/// Number of sends that have finished (successfully or not) since boot.
	///
	/// Wraps.
	pub fn sends_completed(&self) -> u32 {
		self.sends_completed.load(Ordering::Acquire)
	}

	// Engine side

	/// Hand a finished host-to-device byte to the consumer.
	///
	/// Dropped if the receive queue is full. Returns whether it was kept.
	pub(crate) fn push_received(&self, byte: u8) -> bool {
		self.fifos.lock().receive.push(byte)
	}

	/// Take the next byte to be sent to the host.
	pub(crate) fn next_to_send(&self) -> Option<u8> {
		self.fifos.lock().transmit.pop()
	}

	pub(crate) fn publish_state(&self, state: State) {
		self.state.store(state.into(), Ordering::Relaxed);
	}

	pub(crate) fn publish_outcome(&self, outcome: SendOutcome) {
		self.last_outcome.store(outcome as u8, Ordering::Release);
		if outcome != SendOutcome::Pending {
			self.sends_completed.fetch_add(1, Ordering::AcqRel);
		}
	}
}

impl Default for Port {
	fn default() -> Self {
		Self::new()
	}
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn multi_byte_send_is_all_or_nothing() {
		let port = Port::new();
		assert!(port.try_send_bytes(&[1, 2, 3, 4]));
		assert!(!port.try_send_bytes(&[5, 6, 7, 8]));
		assert!(port.try_send_bytes(&[5, 6, 7]));
		assert!(!port.try_send_byte(8));
		let sent: Vec<u8> = core::iter::from_fn(|| port.next_to_send()).collect();
		assert_eq!(sent, vec![1, 2, 3, 4, 5, 6, 7]);
		assert!(port.is_send_queue_empty());
	}

	#[test]
	fn receive_queue_drops_newest_when_full() {
		let port = Port::new();
		for byte in 0..15 {
			assert!(port.push_received(byte));
		}
		assert!(!port.push_received(0xEE));
		assert!(!port.is_receive_buffer_empty());
		for expected in 0..15 {
			assert_eq!(port.try_receive_byte(), Some(expected));
		}
		assert_eq!(port.try_receive_byte(), None);
		assert!(port.is_receive_buffer_empty());
	}

	#[test]
	fn outcome_counter_ignores_pending() {
		let port = Port::new();
		assert_eq!(port.sends_completed(), 0);
		port.publish_outcome(SendOutcome::Pending);
		assert_eq!(port.last_send_outcome(), SendOutcome::Pending);
		assert_eq!(port.sends_completed(), 0);
		port.publish_outcome(SendOutcome::Aborted);
		port.publish_outcome(SendOutcome::Success);
		assert_eq!(port.sends_completed(), 2);
		assert_eq!(port.last_send_outcome(), SendOutcome::Success);
	}

	#[test]
	fn reset_empties_both_queues() {
		let port = Port::new();
		port.push_received(0xFF);
		port.try_send_byte(0xFA);
		port.reset();
		assert!(port.is_receive_buffer_empty());
		assert!(port.is_send_queue_empty());
	}
}

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
