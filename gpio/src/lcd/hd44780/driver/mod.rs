//! Byte-level transport to an HD44780 controller.

mod gpio;

use crate::GpioResult;
use crate::lcd::hd44780::command::Command;
pub use gpio::*;
use std::fmt::Debug;

/// Sends instruction and character bytes to an HD44780 controller.
///
/// There is no read path: the R/W line is expected to be tied to ground, so nothing is ever
/// acknowledged by the device.
pub trait HD44780Driver: Debug + Send {
    /// Sends an instruction byte (RS low).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends a character byte (RS high).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;

    /// Releases the interface, leaving every line at its idle level.
    fn shutdown(&mut self) -> GpioResult<()>;

    /// Sends an encoded [Command].
    fn execute(&mut self, command: Command) -> GpioResult<()> {
        self.send_command(command.encode())
    }
}
