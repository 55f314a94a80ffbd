//! In-memory GPIO backend.
//!
//! Every physical level change is recorded together with the moment it happened, which makes it
//! possible to replay exactly what a device connected to the lines would have seen. Used for tests
//! and for running without hardware.
use crate::{
    GpioActiveLevel, GpioBus, GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioPin,
    GpioResult,
};
use bitvec::vec::BitVec;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// A single write to a simulated line, as seen on the wire (after applying the active level).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SimEvent {
    pub pin: usize,
    pub level: bool,
    pub at: Instant,
}

/// A nibble latched by a falling edge of a strobe line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LatchedNibble {
    /// Level of the register select line at the falling edge.
    pub rs: bool,
    /// Data lines at the falling edge, first line as the least significant bit.
    pub nibble: u8,
    /// Index of the falling edge in [SimGpioDriver::events].
    pub event_index: usize,
    pub at: Instant,
}

#[derive(Debug)]
struct SimState {
    levels: Vec<bool>,
    events: Vec<SimEvent>,
}

/// SimGpioDriver keeps the levels of `count` virtual lines, all starting low.
pub struct SimGpioDriver {
    state: Mutex<SimState>,
    used_pins: BitVec<AtomicU8>,
}

impl SimGpioDriver {
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(SimState {
                levels: vec![false; count],
                events: Vec::new(),
            }),
            used_pins: BitVec::repeat(false, count),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drive(&self, writes: &[(usize, bool)]) {
        let at = Instant::now();
        let mut state = self.state();
        for &(pin, level) in writes {
            state.levels[pin] = level;
            state.events.push(SimEvent { pin, level, at });
        }
    }

    /// Gets the current physical level of a line.
    pub fn level(&self, pin: usize) -> GpioResult<bool> {
        self.state()
            .levels
            .get(pin)
            .copied()
            .ok_or(GpioError::InvalidArgument)
    }

    /// Gets a copy of all the writes recorded so far.
    pub fn events(&self) -> Vec<SimEvent> {
        self.state().events.clone()
    }

    /// Forgets the recorded writes, keeping the current levels.
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Replays the recorded writes and collects what a device would latch on every high-to-low
    /// transition of `pin_e`.
    pub fn latched_nibbles(&self, pin_e: usize, pin_rs: usize, data: [usize; 4]) -> Vec<LatchedNibble> {
        let state = self.state();
        let mut levels = vec![false; state.levels.len()];
        let mut latched = Vec::new();

        for (event_index, event) in state.events.iter().enumerate() {
            let previous = levels[event.pin];
            levels[event.pin] = event.level;

            if event.pin == pin_e && previous && !event.level {
                let nibble = data
                    .iter()
                    .enumerate()
                    .filter(|&(_, &pin)| levels[pin])
                    .fold(0u8, |acc, (bit, _)| acc | (1 << bit));
                latched.push(LatchedNibble {
                    rs: levels[pin_rs],
                    nibble,
                    event_index,
                    at: event.at,
                });
            }
        }

        latched
    }
}

impl Debug for SimGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimGpioDriver({})", self.used_pins.len())
    }
}

impl GpioDriver for SimGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.used_pins.len())
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_pins.set_aliased(index, true);

        Ok(Box::new(SimPin {
            driver: self,
            pin_index: index,
            active_level: GpioActiveLevel::High,
        }))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        let n = self.count()?;

        if indices.iter().any(|&index| index >= n) {
            return Err(GpioError::InvalidArgument);
        }

        if indices.iter().any(|&index| self.used_pins[index]) {
            return Err(GpioError::AlreadyInUse);
        }

        for index in indices {
            self.used_pins.set_aliased(index, true);
        }

        Ok(Box::new(SimBus {
            driver: self,
            pin_indices: indices,
            active_level: GpioActiveLevel::High,
        }))
    }
}

struct SimPin<'a> {
    driver: &'a SimGpioDriver,
    pin_index: usize,
    active_level: GpioActiveLevel,
}

impl Debug for SimPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for SimPin<'_> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(SimOutput { pin: self }))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }
}

impl Drop for SimPin<'_> {
    fn drop(&mut self) {
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}

struct SimOutput<'a> {
    pin: &'a SimPin<'a>,
}

impl Debug for SimOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for SimOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        let level = self.pin.active_level.get_state(value);
        self.pin.driver.drive(&[(self.pin.pin_index, level)]);
        Ok(())
    }
}

struct SimBus<'a, const N: usize> {
    driver: &'a SimGpioDriver,
    pin_indices: [usize; N],
    active_level: GpioActiveLevel,
}

impl<const N: usize> Debug for SimBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for SimBus<'_, N> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(SimBusOutput { bus: self }))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }
}

impl<const N: usize> Drop for SimBus<'_, N> {
    fn drop(&mut self) {
        for &index in &self.pin_indices {
            self.driver.used_pins.set_aliased(index, false);
        }
    }
}

struct SimBusOutput<'a, const N: usize> {
    bus: &'a SimBus<'a, N>,
}

impl<const N: usize> Debug for SimBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for SimBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        let mut writes = [(0, false); N];
        for (write, (&pin, &value)) in writes.iter_mut().zip(self.bus.pin_indices.iter().zip(values)) {
            *write = (pin, self.bus.active_level.get_state(value));
        }
        self.bus.driver.drive(&writes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_are_claimed_once() {
        let gpio = SimGpioDriver::new(8);
        let pin = gpio.get_pin(3);
        assert!(pin.is_ok());
        assert_eq!(gpio.get_pin(3).unwrap_err(), GpioError::AlreadyInUse);
        assert_eq!(gpio.get_pin_bus([1, 2, 3]).unwrap_err(), GpioError::AlreadyInUse);
        drop(pin);
        assert!(gpio.get_pin(3).is_ok());
    }

    #[test]
    fn out_of_range_pins_are_rejected() {
        let gpio = SimGpioDriver::new(4);
        assert_eq!(gpio.get_pin(4).unwrap_err(), GpioError::InvalidArgument);
        assert_eq!(gpio.get_pin_bus([0, 9]).unwrap_err(), GpioError::InvalidArgument);
        assert_eq!(gpio.level(4).unwrap_err(), GpioError::InvalidArgument);
    }

    #[test]
    fn active_low_inverts_the_physical_level() {
        let gpio = SimGpioDriver::new(2);
        let mut pin = gpio.get_pin(1).unwrap();
        pin.set_active_level(GpioActiveLevel::Low).unwrap();
        let out = pin.as_output().unwrap();

        out.write(true).unwrap();
        assert!(!gpio.level(1).unwrap());
        out.write(false).unwrap();
        assert!(gpio.level(1).unwrap());
    }

    #[test]
    fn write_nibble_maps_lsb_to_first_line() {
        let gpio = SimGpioDriver::new(8);
        let mut bus = gpio.get_pin_bus([4, 5, 6, 7]).unwrap();
        let out = bus.as_output().unwrap();

        out.write_nibble(0b1010).unwrap();
        let levels: Vec<bool> = (4..8).map(|pin| gpio.level(pin).unwrap()).collect();
        assert_eq!(levels, [false, true, false, true]);

        assert_eq!(out.write_nibble(0x10).unwrap_err(), GpioError::InvalidArgument);
    }

    #[test]
    fn latches_on_falling_edge_only() {
        let gpio = SimGpioDriver::new(6);
        let mut e = gpio.get_pin(0).unwrap();
        let mut rs = gpio.get_pin(1).unwrap();
        let mut data = gpio.get_pin_bus([2, 3, 4, 5]).unwrap();
        let e = e.as_output().unwrap();
        let rs = rs.as_output().unwrap();
        let data = data.as_output().unwrap();

        rs.write(true).unwrap();
        data.write_nibble(0x9).unwrap();
        e.write(false).unwrap();
        e.write(true).unwrap();
        e.write(false).unwrap();
        data.write_nibble(0x6).unwrap();
        e.write(false).unwrap();

        let latched = gpio.latched_nibbles(0, 1, [2, 3, 4, 5]);
        assert_eq!(latched.len(), 1);
        assert!(latched[0].rs);
        assert_eq!(latched[0].nibble, 0x9);
        assert_eq!(gpio.events()[latched[0].event_index].pin, 0);
    }
}
