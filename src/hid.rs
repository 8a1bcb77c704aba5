//! USB HID mouse input.
//!
//! The USB host stack calls into a [`HidMouse`] from its own context whenever
//! a device is mounted or a report arrives. The protocol adapter, on the other
//! core, drains the accumulated movement through [`PointerSource`].

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

use atomic_polyfill::{AtomicBool, Ordering};

use crate::mutex::NeoMutex;

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// Movement and buttons since the last time we asked.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Motion {
	/// Positive is to the right
	pub dx: i16,
	/// Positive is down (the USB convention)
	pub dy: i16,
	/// Bit 0 is left, bit 1 is right, bit 2 is middle
	pub buttons: u8,
}

/// Where the protocol adapter gets pointer movement from.
pub trait PointerSource {
	/// Is a pointing device plugged in?
	fn is_attached(&self) -> bool;

	/// Take the movement accumulated since the last call, and the current
	/// buttons.
	fn take_motion(&mut self) -> Motion;
}

/// HID interface protocols, from the interface descriptor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterfaceProtocol {
	None,
	Keyboard,
	Mouse,
}

/// Collects boot-protocol mouse reports.
///
/// Shared between the USB context and the adapter, usually as a `static`.
pub struct HidMouse {
	attached: AtomicBool,
	pending: NeoMutex<Motion>,
}

// -----------------------------------------------------------------------------
// Static and Const Data
// -----------------------------------------------------------------------------

/// Accumulated movement saturates at this, in either direction.
const MAX_PENDING: i16 = 127;

/// Left, right and middle.
pub const BUTTON_MASK: u8 = 0x07;

// -----------------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------------

impl InterfaceProtocol {
	/// From the `bInterfaceProtocol` value.
	pub fn from_descriptor(value: u8) -> InterfaceProtocol {
		match value {
			1 => InterfaceProtocol::Keyboard,
			2 => InterfaceProtocol::Mouse,
			_ => InterfaceProtocol::None,
		}
	}
}

impl HidMouse {
	pub const fn new() -> HidMouse {
		HidMouse {
			attached: AtomicBool::new(false),
			pending: NeoMutex::new(Motion {
				dx: 0,
				dy: 0,
				buttons: 0,
			}),
		}
	}

	/// A HID interface has been mounted.
	///
	/// Only a mouse counts; anything else leaves us with no pointer.
	pub fn mount(&self, protocol: InterfaceProtocol) {
		if protocol == InterfaceProtocol::Mouse {
			*self.pending.lock() = Motion::default();
			self.attached.store(true, Ordering::Release);
			info!("Mouse attached");
		} else {
			self.attached.store(false, Ordering::Release);
			debug!("HID device is not a mouse");
		}
	}

	/// The HID interface has gone away.
	pub fn unmount(&self) {
		self.attached.store(false, Ordering::Release);
		info!("Mouse detached");
	}

	/// Fold in a boot-protocol report: buttons, then X and Y as signed bytes.
	///
	/// Reports too short to hold X and Y are ignored. So is anything that
	/// arrives while no mouse is mounted.
	pub fn handle_report(&self, report: &[u8]) {
		if !self.attached.load(Ordering::Acquire) {
			return;
		}
		let [buttons, x, y, ..] = *report else {
			trace!("Short HID report ({=usize} bytes)", report.len());
			return;
		};
		let mut pending = self.pending.lock();
		pending.dx = (pending.dx + i16::from(x as i8)).clamp(-MAX_PENDING, MAX_PENDING);
		pending.dy = (pending.dy + i16::from(y as i8)).clamp(-MAX_PENDING, MAX_PENDING);
		pending.buttons = buttons & BUTTON_MASK;
	}
}

impl Default for HidMouse {
	fn default() -> Self {
		Self::new()
	}
}

impl PointerSource for &HidMouse {
	fn is_attached(&self) -> bool {
		self.attached.load(Ordering::Acquire)
	}

	fn take_motion(&mut self) -> Motion {
		if !self.is_attached() {
			return Motion::default();
		}
		let mut pending = self.pending.lock();
		let motion = *pending;
		pending.dx = 0;
		pending.dy = 0;
		motion
	}
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------


// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
