use crate::GpioResult;
use crate::delay::hold;
use crate::lcd::hd44780::bus::{BitBus, RegisterSelect};
use crate::lcd::hd44780::driver::HD44780Driver;
use log::trace;
use std::time::Duration;

/// Time the controller gets to finish the previous instruction before the next byte goes out.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1);

/// GpioHD44780Driver talks to the controller over a 4-bit [BitBus].
///
/// Every byte is preceded by [SETTLE_DELAY], then sent as its high nibble followed by its low
/// nibble, each with its own strobe pulse.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    bus: BitBus<'a>,
}

impl<'a> GpioHD44780Driver<'a> {
    pub fn new(bus: BitBus<'a>) -> Self {
        GpioHD44780Driver { bus }
    }

    fn send(&mut self, byte: u8, register: RegisterSelect) -> GpioResult<()> {
        trace!("Sending byte: {:08b}, {:?}", byte, register);

        hold(SETTLE_DELAY);
        self.bus.send_nibble(byte >> 4, register)?;
        self.bus.send_nibble(byte & 0x0F, register)?;
        Ok(())
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, RegisterSelect::Command)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, RegisterSelect::Data)
    }

    fn shutdown(&mut self) -> GpioResult<()> {
        self.bus.shutdown()
    }
}
