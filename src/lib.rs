//! # SX|2 Indicator
//!
//! Hardware-independent core of the SX|2 indicator firmware. It:
//!
//! * emulates a PS/2 mouse on two open-drain GPIO lines, using a polled
//!   bit-level state machine ([`ps2dev::Engine`]),
//! * decouples that engine from the rest of the firmware with two byte FIFOs
//!   shared between the Pico's cores ([`ps2dev::Port`]),
//! * answers the host's mouse commands and streams movement packets
//!   ([`u2p::Adapter`]), and
//! * accumulates USB HID mouse reports for the adapter to consume
//!   ([`hid::HidMouse`]).
//!
//! Nothing in here touches RP2040 registers. Lines are anything implementing
//! the embedded-hal digital traits and time comes from a [`clock::Monotonic`],
//! so the whole state machine can be stepped on the host with a simulated bus.

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

#![cfg_attr(not(test), no_std)]

// -----------------------------------------------------------------------------
// Sub-modules
// -----------------------------------------------------------------------------

#[macro_use]
mod fmt;

pub mod bus;
pub mod clock;
pub mod fifo;
pub mod hid;
pub mod mutex;
pub mod ps2dev;
pub mod u2p;

#[cfg(test)]
mod sim;

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
