//! HD44780 character LCD, driven over a 4-bit parallel bus.
//!
//! The layers, from the wires up:
//! - [BitBus]: register select, enable and four data lines; sends single nibbles.
//! - [Command]: the instruction set, encoded to bytes.
//! - [HD44780Driver] / [GpioHD44780Driver]: sends whole bytes, high nibble first.
//! - [Lcd]: the character-level API and the instruction flags.
//! - [SharedLcd]: an [Lcd] behind a lock, for callers on several threads.
//!
//! The controller never answers: the R/W line is not used, so every operation is a sequence of
//! timed pin writes. Wiring problems show up as garbage on the glass, never as errors.

pub mod bus;
pub mod command;
pub mod driver;
mod lcd;
mod shared;

use crate::GpioError;
use thiserror::Error;

pub use bus::{BitBus, RegisterSelect};
pub use command::{Command, CursorShift, DisplayControl, EntryMode, FunctionSet, LCD_NEWLINE};
pub use driver::{GpioHD44780Driver, HD44780Driver};
pub use lcd::*;
pub use shared::*;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LcdError {
    #[error(transparent)]
    Gpio(#[from] GpioError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("cannot {operation} while the display is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: LcdState,
    },
}

pub type LcdResult<T> = Result<T, LcdError>;
