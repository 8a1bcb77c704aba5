//! # USB to PS/2 protocol adapter
//!
//! Sits on top of a [`Port`]: pops the host's command bytes, queues the
//! replies and, once the host has enabled reporting, streams three-byte
//! movement packets built from whatever the [`PointerSource`] has collected.
//!
//! The `0xEB` exchange doubles as the status link to the machine: after we
//! answer with a four-byte movement report, the other end sends a length
//! byte and then that many status bytes, which we keep as the last known
//! [`StatusBlock`].
//!
//! Like the engine, the adapter never waits. Call [`Adapter::poll`] from the
//! application loop.

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

use bitflags::bitflags;
use heapless::Vec;

use crate::clock::{Duration, Instant, Monotonic};
use crate::hid::{Motion, PointerSource, BUTTON_MASK};
use crate::ps2dev::Port;

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// Adapter settings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
	/// What we answer to `0xF2` and after a reset
	pub device_id: u8,
	/// How long we wait for each byte of a status read
	pub status_timeout: Duration,
	/// Cursor range is `0..=width`
	pub width: u16,
	/// Cursor range is `0..=height`
	pub height: u16,
}

/// Where the pointer is on the panel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cursor {
	pub x: u16,
	pub y: u16,
	/// As in [`Motion::buttons`]
	pub buttons: u8,
}

/// Indices into the [`StatusBlock`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum Information {
	/// Keyboard LED bits
	Led = 0,
}

/// The last status block the machine sent us.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusBlock {
	bytes: Vec<u8, STATUS_BLOCK_LEN>,
}

/// Packet scaling, set by `0xE6` and `0xE7`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scaling {
	OneToOne,
	TwoToOne,
}

bitflags! {
	/// First byte of the reply to `0xE9`.
	#[derive(Default)]
	pub struct MouseStatus: u8 {
		const B_LEFT = 1 << 0;
		const B_RIGHT = 1 << 1;
		const B_MID = 1 << 2;

		const SCALE2 = 1 << 4;
		const ENABLE = 1 << 5;
		const REMOTE = 1 << 6;
	}
}

/// Mouse settings the host can change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Settings {
	/// Only the mode bits; buttons are added for the `0xE9` reply
	status: MouseStatus,
	resolution: u8,
	sample_rate: u8,
}

/// What the adapter is waiting for.
#[derive(Debug, Copy, Clone)]
enum Session {
	/// A command byte
	Idle,
	/// The argument to `0xF3`
	SampleRate,
	/// The argument to `0xE8`
	Resolution,
	/// The transmit queue to drain, so the `0xEB` report can go
	ReadDataPending,
	/// The length byte of a status block
	StatusLength { since: Instant },
	/// The rest of a status block
	StatusBody {
		expected: u8,
		received: u8,
		since: Instant,
	},
}

/// The PS/2 mouse protocol, driven from the application loop.
pub struct Adapter<'p, P, T> {
	port: &'p Port,
	pointer: P,
	timer: T,
	config: Config,
	session: Session,
	settings: Settings,
	/// A reply that didn't fit in the transmit queue yet
	reply: Vec<u8, MAX_REPLY_LEN>,
	cursor: Cursor,
	status: StatusBlock,
	/// Status block being read in
	incoming: Vec<u8, STATUS_BLOCK_LEN>,
}

// -----------------------------------------------------------------------------
// Static and Const Data
// -----------------------------------------------------------------------------

/// Most bytes of status we keep. Anything beyond this is read and dropped.
pub const STATUS_BLOCK_LEN: usize = 32;

const MAX_REPLY_LEN: usize = 4;

/// Host commands.
mod command {
	pub const RESET: u8 = 0xFF;
	pub const RESEND: u8 = 0xFE;
	pub const SET_DEFAULTS: u8 = 0xF6;
	pub const DISABLE_REPORTING: u8 = 0xF5;
	pub const ENABLE_REPORTING: u8 = 0xF4;
	pub const SET_SAMPLE_RATE: u8 = 0xF3;
	pub const GET_DEVICE_ID: u8 = 0xF2;
	pub const SET_REMOTE_MODE: u8 = 0xF0;
	pub const READ_DATA: u8 = 0xEB;
	pub const SET_STREAM_MODE: u8 = 0xEA;
	pub const STATUS_REQUEST: u8 = 0xE9;
	pub const SET_RESOLUTION: u8 = 0xE8;
	pub const SET_SCALING_2_1: u8 = 0xE7;
	pub const SET_SCALING_1_1: u8 = 0xE6;
}

const ACK: u8 = 0xFA;
const SELF_TEST_PASSED: u8 = 0xAA;

/// Bit 3 of the first packet byte is always set.
const PACKET_ALWAYS_ONE: u8 = 0x08;

/// Sample rates a host may send bare, without the `0xF3` in front.
const BARE_SAMPLE_RATES: [u8; 4] = [200, 100, 80, 40];

impl Config {
	/// A standard mouse driving the 240x135 indicator panel.
	pub const DEFAULT: Config = Config {
		device_id: 0x00,
		status_timeout: Duration::millis(50),
		width: 240,
		height: 135,
	};
}

impl Settings {
	const DEFAULT: Settings = Settings {
		status: MouseStatus::empty(),
		resolution: 2,
		sample_rate: 100,
	};
}

// -----------------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------------

impl Default for Config {
	fn default() -> Self {
		Config::DEFAULT
	}
}

impl StatusBlock {
	/// Byte `index` of the block, or 0 if the block is shorter than that.
	pub fn get(&self, index: usize) -> u8 {
		self.bytes.get(index).copied().unwrap_or(0)
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.bytes
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}

/// Move `position` by `delta`, staying within `0..=limit`.
fn move_within(position: u16, delta: i16, limit: u16) -> u16 {
	let moved = i32::from(position) + i32::from(delta);
	moved.clamp(0, i32::from(limit)) as u16
}

/// Clamp a delta into a packet byte.
fn clamp_delta(delta: i16) -> u8 {
	delta.clamp(i16::from(i8::MIN), i16::from(i8::MAX)) as i8 as u8
}

impl<'p, P, T> Adapter<'p, P, T>
where
	P: PointerSource,
	T: Monotonic,
{
	pub fn new(port: &'p Port, pointer: P, timer: T, config: Config) -> Adapter<'p, P, T> {
		Adapter {
			port,
			pointer,
			timer,
			config,
			session: Session::Idle,
			settings: Settings::DEFAULT,
			reply: Vec::new(),
			cursor: Cursor {
				x: config.width / 2,
				y: config.height / 2,
				buttons: 0,
			},
			status: StatusBlock::default(),
			incoming: Vec::new(),
		}
	}

	/// Do whatever needs doing, without waiting.
	///
	/// Handles at most one received byte per call.
	pub fn poll(&mut self) {
		if !self.flush_reply() {
			return;
		}

		match self.session {
			Session::Idle => {
				if let Some(byte) = self.port.try_receive_byte() {
					self.command(byte);
				} else if self.is_streaming()
					&& self.pointer.is_attached()
					&& self.port.is_receive_buffer_empty()
					&& self.port.is_send_queue_empty()
				{
					let motion = self.take_motion();
					let packet = self.packet(motion);
					self.queue_reply(&packet);
				}
			}
			Session::SampleRate => {
				if let Some(rate) = self.port.try_receive_byte() {
					debug!("Sample rate {=u8}", rate);
					self.settings.sample_rate = rate;
					self.session = Session::Idle;
					self.queue_reply(&[ACK]);
				}
			}
			Session::Resolution => {
				if let Some(resolution) = self.port.try_receive_byte() {
					debug!("Resolution {=u8}", resolution);
					self.settings.resolution = resolution & 0x03;
					self.session = Session::Idle;
					self.queue_reply(&[ACK]);
				}
			}
			Session::ReadDataPending => {
				if self.port.is_send_queue_empty() {
					let motion = self.take_motion();
					let packet = self.packet(motion);
					self.queue_reply(&[ACK, packet[0], packet[1], packet[2]]);
					self.session = Session::StatusLength {
						since: self.timer.now(),
					};
				}
			}
			Session::StatusLength { since } => {
				if let Some(length) = self.port.try_receive_byte() {
					self.incoming.clear();
					if length == 0 {
						self.publish_status();
					} else {
						self.session = Session::StatusBody {
							expected: length,
							received: 0,
							since: self.timer.now(),
						};
					}
				} else if self.timer.elapsed_since(since) > self.config.status_timeout {
					warn!("Status read timed out waiting for length");
					self.session = Session::Idle;
				}
			}
			Session::StatusBody {
				expected,
				received,
				since,
			} => {
				if let Some(byte) = self.port.try_receive_byte() {
					// Past our limit the bytes are still read, just not kept.
					let _ = self.incoming.push(byte);
					let received = received + 1;
					if received >= expected {
						self.publish_status();
					} else {
						self.session = Session::StatusBody {
							expected,
							received,
							since: self.timer.now(),
						};
					}
				} else if self.timer.elapsed_since(since) > self.config.status_timeout {
					warn!(
						"Status read timed out after {=u8} of {=u8} bytes",
						received,
						expected
					);
					self.incoming.clear();
					self.session = Session::Idle;
				}
			}
		}
	}

	/// Has the host turned on movement reports, in stream mode?
	pub fn is_streaming(&self) -> bool {
		self.settings.status.contains(MouseStatus::ENABLE)
			&& !self.settings.status.contains(MouseStatus::REMOTE)
	}

	/// Where the pointer is, for the display.
	pub fn cursor(&self) -> Cursor {
		self.cursor
	}

	/// The last complete status block.
	pub fn status(&self) -> &StatusBlock {
		&self.status
	}

	/// One byte of the last status block.
	pub fn information(&self, index: Information) -> u8 {
		self.status.get(index as usize)
	}

	/// The rate the host last asked for, in samples per second.
	pub fn sample_rate(&self) -> u8 {
		self.settings.sample_rate
	}

	pub fn resolution(&self) -> u8 {
		self.settings.resolution
	}

	pub fn scaling(&self) -> Scaling {
		if self.settings.status.contains(MouseStatus::SCALE2) {
			Scaling::TwoToOne
		} else {
			Scaling::OneToOne
		}
	}

	/// Act on a command byte received while idle.
	fn command(&mut self, byte: u8) {
		debug!("PS/2 command {=u8:02x}", byte);
		match byte {
			command::RESET => {
				self.settings = Settings::DEFAULT;
				self.queue_reply(&[ACK, SELF_TEST_PASSED, self.config.device_id]);
			}
			command::SET_DEFAULTS => {
				self.settings = Settings::DEFAULT;
				self.queue_reply(&[ACK]);
			}
			command::DISABLE_REPORTING => {
				self.settings.status.remove(MouseStatus::ENABLE);
				self.queue_reply(&[ACK]);
			}
			command::ENABLE_REPORTING => {
				self.settings.status.insert(MouseStatus::ENABLE);
				self.queue_reply(&[ACK]);
			}
			command::SET_SAMPLE_RATE => {
				self.session = Session::SampleRate;
				self.queue_reply(&[ACK]);
			}
			command::GET_DEVICE_ID => {
				self.queue_reply(&[ACK, self.config.device_id]);
			}
			command::SET_REMOTE_MODE => {
				self.settings.status.insert(MouseStatus::REMOTE);
				self.queue_reply(&[ACK]);
			}
			command::SET_STREAM_MODE => {
				self.settings.status.remove(MouseStatus::REMOTE);
				self.queue_reply(&[ACK]);
			}
			command::STATUS_REQUEST => {
				let settings = self.settings;
				let status =
					settings.status | MouseStatus::from_bits_truncate(self.cursor.buttons & BUTTON_MASK);
				self.queue_reply(&[
					ACK,
					status.bits(),
					settings.resolution,
					settings.sample_rate,
				]);
			}
			command::SET_RESOLUTION => {
				self.session = Session::Resolution;
				self.queue_reply(&[ACK]);
			}
			command::SET_SCALING_1_1 | command::SET_SCALING_2_1 => {
				self.settings
					.status
					.set(MouseStatus::SCALE2, byte == command::SET_SCALING_2_1);
				self.queue_reply(&[ACK]);
			}
			command::READ_DATA => {
				self.session = Session::ReadDataPending;
			}
			command::RESEND => {
				debug!("Resend not supported");
			}
			rate if BARE_SAMPLE_RATES.contains(&rate) => {
				self.queue_reply(&[ACK]);
			}
			_ => {
				debug!("Ignoring unknown command {=u8:02x}", byte);
			}
		}
	}

	/// Pull movement from the pointer and move the cursor.
	fn take_motion(&mut self) -> Motion {
		if !self.pointer.is_attached() {
			return Motion::default();
		}
		let motion = self.pointer.take_motion();
		self.cursor.x = move_within(self.cursor.x, motion.dx, self.config.width);
		self.cursor.y = move_within(self.cursor.y, motion.dy, self.config.height);
		self.cursor.buttons = motion.buttons & BUTTON_MASK;
		motion
	}

	/// A movement packet. PS/2 has Y going up, so it is flipped.
	fn packet(&self, motion: Motion) -> [u8; 3] {
		[
			PACKET_ALWAYS_ONE | (motion.buttons & BUTTON_MASK),
			clamp_delta(motion.dx),
			clamp_delta(motion.dy.saturating_neg()),
		]
	}

	/// Queue a reply, or hold on to it if the transmit queue is too full.
	fn queue_reply(&mut self, bytes: &[u8]) {
		if !self.port.try_send_bytes(bytes) {
			trace!("Transmit queue full, holding reply");
			self.reply.clear();
			// Replies are never longer than MAX_REPLY_LEN.
			let _ = self.reply.extend_from_slice(bytes);
		}
	}

	/// Try to queue a held reply. Returns `true` if nothing is held any more.
	fn flush_reply(&mut self) -> bool {
		if self.reply.is_empty() {
			return true;
		}
		if self.port.try_send_bytes(&self.reply) {
			self.reply.clear();
			true
		} else {
			false
		}
	}

	fn publish_status(&mut self) {
		self.status.bytes = self.incoming.clone();
		self.incoming.clear();
		self.session = Session::Idle;
		debug!("Status block of {=usize} bytes", self.status.len());
	}
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ps2dev::Timing;
	use crate::sim::{Bench, SimClock};
	use std::cell::RefCell;
	use std::collections::VecDeque;
	use std::rc::Rc;

	/// Hands out scripted movements, then nothing.
	#[derive(Clone, Default)]
	struct Script {
		moves: Rc<RefCell<VecDeque<Motion>>>,
	}

	impl Script {
		fn push(&self, dx: i16, dy: i16, buttons: u8) {
			self.moves
				.borrow_mut()
				.push_back(Motion { dx, dy, buttons });
		}
	}

	impl PointerSource for Script {
		fn is_attached(&self) -> bool {
			true
		}

		fn take_motion(&mut self) -> Motion {
			self.moves.borrow_mut().pop_front().unwrap_or_default()
		}
	}

	fn adapter(port: &Port) -> (Adapter<'_, Script, SimClock>, Script, SimClock) {
		let script = Script::default();
		let clock = SimClock::new(1);
		let adapter = Adapter::new(port, script.clone(), clock.clone(), Config::DEFAULT);
		(adapter, script, clock)
	}

	fn sent(port: &Port) -> std::vec::Vec<u8> {
		core::iter::from_fn(|| port.next_to_send()).collect()
	}

	/// Deliver `bytes` from the host and poll once for each.
	fn host_says(port: &Port, adapter: &mut Adapter<'_, Script, SimClock>, bytes: &[u8]) {
		for byte in bytes {
			assert!(port.push_received(*byte));
			adapter.poll();
		}
	}

	#[test]
	fn reset_replies_ack_self_test_and_id() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xFF]);
		assert_eq!(sent(&port), [0xFA, 0xAA, 0x00]);
	}

	#[test]
	fn device_id_comes_from_config() {
		let port = Port::new();
		let config = Config {
			device_id: 0x03,
			..Config::DEFAULT
		};
		let mut adapter = Adapter::new(&port, Script::default(), SimClock::new(1), config);
		host_says(&port, &mut adapter, &[0xF2]);
		assert_eq!(sent(&port), [0xFA, 0x03]);
	}

	#[test]
	fn sample_rate_takes_an_argument() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xF3, 200, 0xF3, 100, 0xF3, 80]);
		assert_eq!(sent(&port), [0xFA; 6]);
		assert_eq!(adapter.sample_rate(), 80);
		// An argument isn't mistaken for a command.
		host_says(&port, &mut adapter, &[0xF3, 0xFF]);
		assert_eq!(sent(&port), [0xFA, 0xFA]);
		assert_eq!(adapter.sample_rate(), 0xFF);
	}

	#[test]
	fn bare_rates_are_acked() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xC8, 0x64, 0x50, 40]);
		assert_eq!(sent(&port), [0xFA; 4]);
	}

	#[test]
	fn unknown_bytes_are_ignored() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0x12, 0xEE, 0xFE]);
		assert!(port.is_send_queue_empty());
	}

	#[test]
	fn status_request_reports_settings() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xE8, 3, 0xE7, 0xF0]);
		assert_eq!(sent(&port), [0xFA; 4]);
		host_says(&port, &mut adapter, &[0xE9]);
		assert_eq!(sent(&port), [0xFA, 0x50, 3, 100]);
		assert_eq!(adapter.resolution(), 3);
		assert_eq!(adapter.scaling(), Scaling::TwoToOne);
		host_says(&port, &mut adapter, &[0xF6, 0xE9]);
		assert_eq!(sent(&port), [0xFA, 0xFA, 0x00, 2, 100]);
	}

	#[test]
	fn status_request_carries_buttons_and_enable() {
		let port = Port::new();
		let (mut adapter, script, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xF4]);
		sent(&port);
		script.push(0, 0, 0x05);
		adapter.poll();
		sent(&port);
		host_says(&port, &mut adapter, &[0xE9]);
		let expected = MouseStatus::ENABLE | MouseStatus::B_LEFT | MouseStatus::B_MID;
		assert_eq!(sent(&port), [0xFA, expected.bits(), 2, 100]);
		assert_eq!(expected.bits(), 0x25);
	}

	#[test]
	fn zero_sized_panel_pins_the_cursor() {
		let port = Port::new();
		let config = Config {
			width: 0,
			height: 0,
			..Config::DEFAULT
		};
		let script = Script::default();
		let mut adapter = Adapter::new(&port, script.clone(), SimClock::new(1), config);
		host_says(&port, &mut adapter, &[0xF4]);
		sent(&port);
		script.push(-30, 40, 0);
		adapter.poll();
		assert_eq!(
			adapter.cursor(),
			Cursor {
				x: 0,
				y: 0,
				buttons: 0
			}
		);
	}

	#[test]
	fn streaming_sends_movement_packets() {
		let port = Port::new();
		let (mut adapter, script, _) = adapter(&port);
		adapter.poll();
		assert!(port.is_send_queue_empty(), "no packets before F4");
		host_says(&port, &mut adapter, &[0xF4]);
		assert_eq!(sent(&port), [0xFA]);
		assert!(adapter.is_streaming());
		script.push(5, -3, 0);
		adapter.poll();
		assert_eq!(sent(&port), [0x08, 5, 3]);
		script.push(-1, 2, 0x05);
		adapter.poll();
		assert_eq!(sent(&port), [0x0D, 0xFF, 0xFE]);
	}

	#[test]
	fn packets_wait_for_an_empty_queue() {
		let port = Port::new();
		let (mut adapter, script, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xF4]);
		script.push(1, 1, 0);
		adapter.poll();
		assert_eq!(sent(&port), [0xFA]);
		adapter.poll();
		assert_eq!(sent(&port), [0x08, 1, 0xFF]);
	}

	#[test]
	fn deltas_are_clamped() {
		let port = Port::new();
		let (mut adapter, script, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xF4]);
		sent(&port);
		script.push(200, 200, 0);
		adapter.poll();
		assert_eq!(sent(&port), [0x08, 127, 0x80]);
		script.push(-200, -200, 0);
		adapter.poll();
		assert_eq!(sent(&port), [0x08, 0x80, 127]);
		script.push(0, i16::MIN, 0);
		adapter.poll();
		assert_eq!(sent(&port), [0x08, 0, 127]);
	}

	#[test]
	fn disable_and_remote_mode_stop_packets() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xF4]);
		assert_eq!(sent(&port), [0xFA]);
		host_says(&port, &mut adapter, &[0xF0]);
		assert_eq!(sent(&port), [0xFA]);
		adapter.poll();
		assert!(port.is_send_queue_empty());
		host_says(&port, &mut adapter, &[0xEA]);
		assert_eq!(sent(&port), [0xFA]);
		adapter.poll();
		assert_eq!(sent(&port), [0x08, 0, 0]);
		host_says(&port, &mut adapter, &[0xF5]);
		assert_eq!(sent(&port), [0xFA]);
		adapter.poll();
		assert!(port.is_send_queue_empty());
	}

	#[test]
	fn reset_stops_streaming() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xF4, 0xFF]);
		assert!(!adapter.is_streaming());
	}

	#[test]
	fn cursor_stays_on_the_panel() {
		let port = Port::new();
		let (mut adapter, script, _) = adapter(&port);
		assert_eq!(
			adapter.cursor(),
			Cursor {
				x: 120,
				y: 67,
				buttons: 0
			}
		);
		host_says(&port, &mut adapter, &[0xF4]);
		sent(&port);
		script.push(500, -500, 0x01);
		adapter.poll();
		assert_eq!(
			adapter.cursor(),
			Cursor {
				x: 240,
				y: 0,
				buttons: 0x01
			}
		);
		sent(&port);
		script.push(-10, 20, 0);
		adapter.poll();
		assert_eq!(
			adapter.cursor(),
			Cursor {
				x: 230,
				y: 20,
				buttons: 0
			}
		);
	}

	#[test]
	fn held_reply_blocks_new_commands() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		assert!(port.try_send_bytes(&[1, 2, 3, 4, 5]));
		host_says(&port, &mut adapter, &[0xFF, 0xF2]);
		// Reset reply didn't fit; the F2 is still waiting.
		assert!(!port.is_receive_buffer_empty());
		assert_eq!(sent(&port), [1, 2, 3, 4, 5]);
		adapter.poll();
		adapter.poll();
		assert_eq!(sent(&port), [0xFA, 0xAA, 0x00, 0xFA, 0x00]);
	}

	#[test]
	fn read_data_then_status_block() {
		let port = Port::new();
		let (mut adapter, script, _) = adapter(&port);
		assert!(port.try_send_byte(0x55));
		script.push(3, 4, 0x02);
		host_says(&port, &mut adapter, &[0xEB]);
		adapter.poll();
		// Waits for the queue to drain first.
		assert_eq!(sent(&port), [0x55]);
		adapter.poll();
		assert_eq!(sent(&port), [0xFA, 0x0A, 3, 0xFC]);
		host_says(&port, &mut adapter, &[3, 0x11, 0x22, 0x33]);
		assert_eq!(adapter.status().as_slice(), [0x11, 0x22, 0x33]);
		assert_eq!(adapter.information(Information::Led), 0x11);
		// Back to taking commands.
		host_says(&port, &mut adapter, &[0xF2]);
		assert_eq!(sent(&port), [0xFA, 0x00]);
	}

	#[test]
	fn long_status_block_is_truncated() {
		let port = Port::new();
		let (mut adapter, _, _) = adapter(&port);
		host_says(&port, &mut adapter, &[0xEB]);
		adapter.poll();
		sent(&port);
		host_says(&port, &mut adapter, &[40]);
		for n in 0..40u8 {
			host_says(&port, &mut adapter, &[n]);
		}
		assert_eq!(adapter.status().len(), STATUS_BLOCK_LEN);
		assert_eq!(adapter.status().get(31), 31);
		host_says(&port, &mut adapter, &[0xF2]);
		assert_eq!(sent(&port), [0xFA, 0x00]);
	}

	#[test]
	fn status_timeout_keeps_last_values() {
		let port = Port::new();
		let (mut adapter, _, clock) = adapter(&port);
		host_says(&port, &mut adapter, &[0xEB]);
		adapter.poll();
		host_says(&port, &mut adapter, &[2, 0xAB, 0xCD]);
		assert_eq!(adapter.status().as_slice(), [0xAB, 0xCD]);
		sent(&port);

		// Second read stalls after one byte.
		host_says(&port, &mut adapter, &[0xEB]);
		adapter.poll();
		host_says(&port, &mut adapter, &[2, 0x01]);
		clock.advance_us(60_000);
		adapter.poll();
		assert_eq!(adapter.status().as_slice(), [0xAB, 0xCD]);
		sent(&port);
		host_says(&port, &mut adapter, &[0xF2]);
		assert_eq!(sent(&port), [0xFA, 0x00]);
	}

	#[test]
	fn status_length_times_out() {
		let port = Port::new();
		let (mut adapter, _, clock) = adapter(&port);
		host_says(&port, &mut adapter, &[0xEB]);
		adapter.poll();
		sent(&port);
		clock.advance_us(51_000);
		adapter.poll();
		host_says(&port, &mut adapter, &[0xF2]);
		assert_eq!(sent(&port), [0xFA, 0x00]);
		assert!(adapter.status().is_empty());
	}

	#[test]
	fn talks_to_a_host_over_the_wire() {
		let port = Port::new();
		let mut bench = Bench::new(&port, Timing::STANDARD);
		let (mut adapter, script, _) = adapter(&port);

		assert!(bench.host_send(0xFF));
		adapter.poll();
		assert_eq!(bench.host_receive(), Some(0xFA));
		assert_eq!(bench.host_receive(), Some(0xAA));
		assert_eq!(bench.host_receive(), Some(0x00));

		assert!(bench.host_send(0xF4));
		adapter.poll();
		assert_eq!(bench.host_receive(), Some(0xFA));

		script.push(5, -3, 0);
		adapter.poll();
		assert_eq!(bench.host_receive(), Some(0x08));
		assert_eq!(bench.host_receive(), Some(5));
		assert_eq!(bench.host_receive(), Some(3));
	}
}

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
