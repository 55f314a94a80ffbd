use crate::delay::hold;
use crate::{GpioBusOutput, GpioOutput, GpioResult};
use log::trace;
use std::time::Duration;

/// Minimum time the enable line has to stay at each level of a strobe pulse.
pub const STROBE_HOLD: Duration = Duration::from_micros(1);

/// Which register of the controller a transfer targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterSelect {
    /// Instruction register, RS low.
    Command,
    /// Data register, RS high.
    Data,
}

impl RegisterSelect {
    /// Level of the RS line for this register.
    pub fn level(self) -> bool {
        self == RegisterSelect::Data
    }
}

/// The six lines of a 4-bit HD44780 interface: register select, enable (strobe) and D4 to D7.
///
/// This is the signal level only. It knows nothing about bytes or instructions, see
/// [GpioHD44780Driver](super::driver::GpioHD44780Driver) for that.
#[derive(Debug)]
pub struct BitBus<'a> {
    pin_rs: &'a dyn GpioOutput,
    pin_e: &'a dyn GpioOutput,
    data_bus: &'a dyn GpioBusOutput<4>,
}

impl<'a> BitBus<'a> {
    /// Creates a new bus.
    ///
    /// # Parameters
    ///
    /// - `pin_rs`: Register select output pin.
    /// - `pin_e`: Enable output pin.
    /// - `data_bus`: D4, D5, D6 and D7, in this order. The first line carries the least
    ///   significant bit of every nibble.
    pub fn new(
        pin_rs: &'a dyn GpioOutput,
        pin_e: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<4>,
    ) -> Self {
        BitBus {
            pin_rs,
            pin_e,
            data_bus,
        }
    }

    /// Puts `nibble` on the data lines with RS set for `register`, then strobes it in.
    ///
    /// Only the low 4 bits of `nibble` are used.
    pub fn send_nibble(&self, nibble: u8, register: RegisterSelect) -> GpioResult<()> {
        let nibble = nibble & 0x0F;
        trace!("Writing nibble: {:04b}, {:?}", nibble, register);

        self.pin_rs.write(register.level())?;
        self.data_bus.write_nibble(nibble)?;
        self.pulse_strobe()
    }

    /// Drives the enable line low, high, then low again, holding each level for at least
    /// [STROBE_HOLD]. The controller latches the data lines on the falling edge.
    pub fn pulse_strobe(&self) -> GpioResult<()> {
        self.pin_e.write(false)?;
        hold(STROBE_HOLD);
        self.pin_e.write(true)?;
        hold(STROBE_HOLD);
        self.pin_e.write(false)?;
        hold(STROBE_HOLD);
        Ok(())
    }

    /// Drives every line to its idle (high) level.
    pub fn shutdown(&self) -> GpioResult<()> {
        trace!("Releasing bus");
        self.pin_rs.write(true)?;
        self.pin_e.write(true)?;
        self.data_bus.write(&[true; 4])
    }
}
