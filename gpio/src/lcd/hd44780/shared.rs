use crate::lcd::hd44780::driver::HD44780Driver;
use crate::lcd::hd44780::{Lcd, LcdResult};
use log::warn;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An [Lcd] shared between threads.
///
/// All the lines of the bus are shared state, so operations are serialized: each one, including
/// all of its nibbles and delays, finishes before the next starts. [SharedLcd::with] extends that
/// to a whole sequence of operations.
#[derive(Debug)]
pub struct SharedLcd<D: HD44780Driver> {
    inner: Mutex<Lcd<D>>,
}

impl<D: HD44780Driver> SharedLcd<D> {
    pub fn new(lcd: Lcd<D>) -> Self {
        SharedLcd {
            inner: Mutex::new(lcd),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lcd<D>> {
        self.inner.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("A thread panicked while using the display, continuing");
            poisoned.into_inner()
        })
    }

    /// Runs `f` with exclusive access to the display.
    pub fn with<R>(&self, f: impl FnOnce(&mut Lcd<D>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn write(&self, text: &str) -> LcdResult<()> {
        self.lock().write(text)
    }

    pub fn clear(&self) -> LcdResult<()> {
        self.lock().clear()
    }

    /// Clears the display and writes `text`, with nothing from other threads in between.
    pub fn show(&self, text: &str) -> LcdResult<()> {
        let mut lcd = self.lock();
        lcd.clear()?;
        lcd.write(text)
    }

    /// Waits for the operation in progress, if any, then releases the lines.
    pub fn shutdown(&self) -> LcdResult<()> {
        self.lock().shutdown()
    }

    pub fn into_inner(self) -> Lcd<D> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpioDriver;
    use crate::lcd::hd44780::{BitBus, GpioHD44780Driver, LcdState};
    use crate::sim::SimGpioDriver;
    use std::thread;

    const RS: usize = 24;
    const E: usize = 23;
    const DATA: [usize; 4] = [17, 18, 27, 22];

    /// Pairs latched nibbles back into (RS, byte).
    fn latched_bytes(gpio: &SimGpioDriver) -> Vec<(bool, u8)> {
        let latched = gpio.latched_nibbles(E, RS, DATA);
        assert_eq!(latched.len() % 2, 0);
        latched
            .chunks(2)
            .map(|pair| {
                assert_eq!(pair[0].rs, pair[1].rs);
                (pair[0].rs, (pair[0].nibble << 4) | pair[1].nibble)
            })
            .collect()
    }

    #[test]
    fn end_to_end_on_the_wire() {
        let gpio = SimGpioDriver::new(28);
        let mut rs = gpio.get_pin(RS).unwrap();
        let mut e = gpio.get_pin(E).unwrap();
        let mut data = gpio.get_pin_bus(DATA).unwrap();
        let (rs, e, data) = (rs.as_output().unwrap(), e.as_output().unwrap(), data.as_output().unwrap());
        let mut lcd = Lcd::new(GpioHD44780Driver::new(BitBus::new(&*rs, &*e, &*data)));

        lcd.init(16, 2).unwrap();
        assert_eq!(
            latched_bytes(&gpio),
            [(false, 0x33), (false, 0x32), (false, 0x28), (false, 0x0C), (false, 0x06), (false, 0x01)]
        );

        gpio.clear_events();
        lcd.write("AB\nCD").unwrap();
        assert_eq!(
            latched_bytes(&gpio),
            [(true, b'A'), (true, b'B'), (false, 0xC0), (true, b'C'), (true, b'D')]
        );

        lcd.shutdown().unwrap();
        assert_eq!(lcd.state(), LcdState::Shutdown);
        for pin in [RS, E].into_iter().chain(DATA) {
            assert!(gpio.level(pin).unwrap());
        }
    }

    #[test]
    fn nothing_is_sent_within_clear_delay_of_a_clear() {
        let gpio = SimGpioDriver::new(28);
        let mut rs = gpio.get_pin(RS).unwrap();
        let mut e = gpio.get_pin(E).unwrap();
        let mut data = gpio.get_pin_bus(DATA).unwrap();
        let (rs, e, data) = (rs.as_output().unwrap(), e.as_output().unwrap(), data.as_output().unwrap());
        let mut lcd = Lcd::new(GpioHD44780Driver::new(BitBus::new(&*rs, &*e, &*data)));
        lcd.init(16, 2).unwrap();

        for next in [0, 1] {
            gpio.clear_events();
            lcd.clear().unwrap();
            if next == 0 {
                lcd.write("A").unwrap();
            } else {
                lcd.set_cursor(1, 1).unwrap();
            }

            let events = gpio.events();
            let latched = gpio.latched_nibbles(E, RS, DATA);
            let clear_latched = latched[1];
            let next_start = events[clear_latched.event_index + 1].at;
            assert!(next_start - clear_latched.at >= crate::lcd::hd44780::CLEAR_DELAY);
        }
    }

    #[test]
    fn concurrent_writes_never_interleave() {
        let gpio = SimGpioDriver::new(28);
        let mut rs = gpio.get_pin(RS).unwrap();
        let mut e = gpio.get_pin(E).unwrap();
        let mut data = gpio.get_pin_bus(DATA).unwrap();
        let (rs, e, data) = (rs.as_output().unwrap(), e.as_output().unwrap(), data.as_output().unwrap());
        let mut lcd = Lcd::new(GpioHD44780Driver::new(BitBus::new(&*rs, &*e, &*data)));
        lcd.init(16, 2).unwrap();
        gpio.clear_events();

        let shared = SharedLcd::new(lcd);
        thread::scope(|scope| {
            scope.spawn(|| shared.write("aaaaaaaa").unwrap());
            scope.spawn(|| shared.write("bbbbbbbb").unwrap());
        });

        let bytes: Vec<u8> = latched_bytes(&gpio).into_iter().map(|(_, byte)| byte).collect();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text == "aaaaaaaabbbbbbbb" || text == "bbbbbbbbaaaaaaaa", "interleaved: {}", text);

        shared.shutdown().unwrap();
        assert_eq!(shared.into_inner().state(), LcdState::Shutdown);
    }

    #[test]
    fn show_is_atomic() {
        let gpio = SimGpioDriver::new(28);
        let mut rs = gpio.get_pin(RS).unwrap();
        let mut e = gpio.get_pin(E).unwrap();
        let mut data = gpio.get_pin_bus(DATA).unwrap();
        let (rs, e, data) = (rs.as_output().unwrap(), e.as_output().unwrap(), data.as_output().unwrap());
        let mut lcd = Lcd::new(GpioHD44780Driver::new(BitBus::new(&*rs, &*e, &*data)));
        lcd.init(16, 2).unwrap();
        gpio.clear_events();

        let shared = SharedLcd::new(lcd);
        thread::scope(|scope| {
            scope.spawn(|| shared.show("xy").unwrap());
            scope.spawn(|| shared.show("zw").unwrap());
        });

        let bytes = latched_bytes(&gpio);
        assert_eq!(bytes.len(), 6);
        assert_eq!(bytes[0], (false, 0x01));
        assert_eq!(bytes[3], (false, 0x01));
        let first: Vec<u8> = bytes[1..3].iter().map(|&(_, byte)| byte).collect();
        assert!(first == b"xy" || first == b"zw");
    }

    #[test]
    fn with_runs_a_sequence_under_one_lock() {
        let gpio = SimGpioDriver::new(28);
        let mut rs = gpio.get_pin(RS).unwrap();
        let mut e = gpio.get_pin(E).unwrap();
        let mut data = gpio.get_pin_bus(DATA).unwrap();
        let (rs, e, data) = (rs.as_output().unwrap(), e.as_output().unwrap(), data.as_output().unwrap());
        let mut lcd = Lcd::new(GpioHD44780Driver::new(BitBus::new(&*rs, &*e, &*data)));
        lcd.init(16, 2).unwrap();
        gpio.clear_events();

        let shared = SharedLcd::new(lcd);
        let position = shared.with(|lcd| {
            lcd.set_cursor(4, 1)?;
            lcd.cursor()?;
            Ok::<_, crate::lcd::hd44780::LcdError>(lcd.position())
        });
        assert_eq!(position.unwrap().col, 4);
        assert_eq!(latched_bytes(&gpio), [(false, 0xC4), (false, 0x0E)]);
    }
}
