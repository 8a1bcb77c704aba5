//! Fixed-size byte FIFOs.
//!
//! A classic ring buffer with a read index and a write index that wrap with a
//! bitmask. One slot is always left empty so that "full" (next write index
//! equals the read index) can be told apart from "empty" (indices equal).
//! A `ByteFifo<8>` therefore holds seven bytes.
//!
//! There is no locking in here. The PS/2 port wraps its FIFOs in a
//! [`NeoMutex`](crate::mutex::NeoMutex).

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
// Types
// -----------------------------------------------------------------------------

/// A ring buffer of `N` byte slots.
///
/// `N` must be a power of two, and at least two.
pub struct ByteFifo<const N: usize> {
	buffer: [u8; N],
	read: usize,
	write: usize,
}

impl<const N: usize> ByteFifo<N> {
	/// Rejects bad sizes at compile time.
	const SIZE_OK: () = assert!(
		N >= 2 && N.is_power_of_two(),
		"FIFO size must be a power of two"
	);

	/// Index wrap-around mask.
	const MASK: usize = N - 1;

	/// Create an empty FIFO.
	pub const fn new() -> ByteFifo<N> {
		#[allow(clippy::let_unit_value)]
		let () = Self::SIZE_OK;
		ByteFifo {
			buffer: [0; N],
			read: 0,
			write: 0,
		}
	}

	/// How many bytes fit in this FIFO.
	pub const fn capacity(&self) -> usize {
		N - 1
	}

	/// How many bytes are waiting.
	pub fn len(&self) -> usize {
		self.write.wrapping_sub(self.read) & Self::MASK
	}

	pub fn is_empty(&self) -> bool {
		self.read == self.write
	}

	pub fn is_full(&self) -> bool {
		((self.write + 1) & Self::MASK) == self.read
	}

	/// Room for `count` more bytes?
	pub fn has_room_for(&self, count: usize) -> bool {
		self.capacity() - self.len() >= count
	}

	/// Append a byte.
	///
	/// If the FIFO is full the byte is dropped and the contents are left
	/// alone. Returns whether the byte was taken.
	pub fn push(&mut self, byte: u8) -> bool {
		if self.is_full() {
			return false;
		}
		self.buffer[self.write] = byte;
		self.write = (self.write + 1) & Self::MASK;
		true
	}

	/// Look at the oldest byte without removing it.
	pub fn peek(&self) -> Option<u8> {
		if self.is_empty() {
			None
		} else {
			Some(self.buffer[self.read])
		}
	}

	/// Remove the oldest byte.
	pub fn pop(&mut self) -> Option<u8> {
		let byte = self.peek()?;
		self.read = (self.read + 1) & Self::MASK;
		Some(byte)
	}

	/// Throw away everything.
	pub fn clear(&mut self) {
		self.read = 0;
		self.write = 0;
	}
}

impl<const N: usize> Default for ByteFifo<N> {
	fn default() -> Self {
		Self::new()
	}
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------


// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
