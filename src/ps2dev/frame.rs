//! PS/2 frame layout.
//!
//! Every byte travels as eleven bits, least significant first:
//!
//! ```text
//! | start (0) | d0 .. d7 | parity | stop (1) |
//! ```
//!
//! Parity is odd: the parity bit is set when the data byte has an even number
//! of ones, so the nine bits together always hold an odd number of ones.

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
// Static and Const Data
// -----------------------------------------------------------------------------

/// Bit 11, just above the stop bit. Lets the sender tell when it is done.
pub const MARKER: u16 = 1 << 11;

/// What is left of an encoded frame once every bit has been shifted out.
pub const SENT: u16 = MARKER >> 11;

const STOP: u16 = 1 << 10;
const PARITY: u16 = 1 << 9;

// -----------------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------------

/// The odd-parity bit for `byte`.
pub const fn parity_bit(byte: u8) -> bool {
	byte.count_ones() % 2 == 0
}

/// Build the shift register for a device-to-host send.
///
/// Shift right after each bit. When only the marker is left (the value is
/// [`SENT`]) all eleven bits have gone out.
pub const fn encode(byte: u8) -> u16 {
	let parity = if parity_bit(byte) { PARITY } else { 0 };
	MARKER | STOP | parity | ((byte as u16) << 1)
}

/// Recover the byte from eleven sampled bits (bit 0 being the start bit).
///
/// Returns `None` on a bad start bit, stop bit or parity.
pub fn decode(bits: u16) -> Option<u8> {
	let byte = (bits >> 1) as u8;
	let start_ok = bits & 1 == 0;
	let stop_ok = bits & STOP != 0;
	let parity_ok = (bits & PARITY != 0) == parity_bit(byte);
	if start_ok && stop_ok && parity_ok {
		Some(byte)
	} else {
		None
	}
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------


// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
