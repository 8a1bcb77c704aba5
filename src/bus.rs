//! Open-drain bus lines.
//!
//! A PS/2 line is shared by the host and the device. Either side may pull it
//! low; nobody ever drives it high. Releasing the line (making our pin an
//! input) lets the pull-up bring it back high, unless the other side is still
//! holding it down.

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

use embedded_hal::digital::v2::{InputPin, OutputPin};

/// The three things the PS/2 engine does with a line.
pub trait OpenDrainLine {
	/// Stop driving the line, so the pull-up (or the host) sets its level.
	fn set_as_input(&mut self);

	/// Actively pull the line to ground.
	fn set_as_output_low(&mut self);

	/// Sample the wire. `true` means high.
	///
	/// While we are driving the line low this is always `false`.
	fn read_level(&self) -> bool;
}

/// Any pin that can be both driven and sampled works as an open-drain line,
/// as long as `set_high` releases it rather than driving it. The RP2040 HAL's
/// `InOutPin` behaves this way.
///
/// Pin errors are not fatal to a bus that resynchronises on the next frame:
/// a failed write is ignored and a failed read is reported as a released
/// (high) line.
impl<P> OpenDrainLine for P
where
	P: InputPin + OutputPin,
{
	fn set_as_input(&mut self) {
		let _ = self.set_high();
	}

	fn set_as_output_low(&mut self) {
		let _ = self.set_low();
	}

	fn read_level(&self) -> bool {
		self.is_high().unwrap_or(true)
	}
}

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
