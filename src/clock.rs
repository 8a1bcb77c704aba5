//! A microsecond time source.
//!
//! On the Pico this is the 64-bit, 1 MHz hardware timer, which never wraps in
//! practice. Host tests use a simulated clock.

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

use fugit::{MicrosDurationU64, TimerInstantU64};

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// A point in time, in microseconds since boot.
pub type Instant = TimerInstantU64<1_000_000>;

/// A span of time, in microseconds.
pub type Duration = MicrosDurationU64;

/// Something that can tell us the current time.
pub trait Monotonic {
	/// Get the current time. Must never go backwards.
	fn now(&self) -> Instant;

	/// How long has it been since `earlier`?
	fn elapsed_since(&self, earlier: Instant) -> Duration {
		self.now()
			.checked_duration_since(earlier)
			.unwrap_or(Duration::from_ticks(0))
	}
}

// -----------------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------------

impl<T> Monotonic for &T
where
	T: Monotonic + ?Sized,
{
	fn now(&self) -> Instant {
		(**self).now()
	}
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------


// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
