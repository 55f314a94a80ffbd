//! HD44780 instruction set.
//!
//! [Command] maps every logical instruction the driver uses onto its 8-bit instruction byte. The
//! mapping is total: flag sets can only hold the bits of their instruction, and addresses are
//! masked to the width of their field.

use bitflags::bitflags;

/// Command that moves the cursor to the start of the second line (DDRAM address `0x40`).
pub const LCD_NEWLINE: u8 = 0xC0;

/// The two bytes that bring the controller into 4-bit mode from any state.
pub const RESET_SEQUENCE: [u8; 2] = [0x33, 0x32];

bitflags! {
    /// Flags of the entry mode set instruction.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct EntryMode: u8 {
        /// Cursor moves to the right after each character. Cleared: to the left.
        const LEFT_TO_RIGHT = 0x02;
        /// The display shifts with each character instead of the cursor moving.
        const SHIFT_INCREMENT = 0x01;
    }

    /// Flags of the display on/off control instruction.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct DisplayControl: u8 {
        const DISPLAY_ON = 0x04;
        const CURSOR_ON = 0x02;
        const BLINK_ON = 0x01;
    }

    /// Flags of the cursor/display shift instruction.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct CursorShift: u8 {
        /// Shift the whole display. Cleared: move the cursor only.
        const DISPLAY_MOVE = 0x08;
        /// Shift to the right. Cleared: to the left.
        const MOVE_RIGHT = 0x04;
    }

    /// Flags of the function set instruction.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct FunctionSet: u8 {
        /// 8-bit bus. Never set by this driver, which only talks over 4 lines.
        const EIGHT_BIT_MODE = 0x10;
        const TWO_LINE = 0x08;
        /// 5x10 dots font. Cleared: 5x8.
        const FONT_5X10 = 0x04;
    }
}

/// A single HD44780 instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    ClearDisplay,
    ReturnHome,
    EntryModeSet(EntryMode),
    DisplayControl(DisplayControl),
    CursorShift(CursorShift),
    FunctionSet(FunctionSet),
    /// CGRAM address, 6 bits.
    SetCgramAddress(u8),
    /// DDRAM address, 7 bits.
    SetDdramAddress(u8),
}

impl Command {
    pub const CLEAR_DISPLAY: u8 = 0x01;
    pub const RETURN_HOME: u8 = 0x02;
    pub const ENTRY_MODE_SET: u8 = 0x04;
    pub const DISPLAY_CONTROL: u8 = 0x08;
    pub const CURSOR_SHIFT: u8 = 0x10;
    pub const FUNCTION_SET: u8 = 0x20;
    pub const SET_CGRAM_ADDRESS: u8 = 0x40;
    pub const SET_DDRAM_ADDRESS: u8 = 0x80;

    /// Gets the instruction byte.
    pub const fn encode(self) -> u8 {
        match self {
            Command::ClearDisplay => Self::CLEAR_DISPLAY,
            Command::ReturnHome => Self::RETURN_HOME,
            Command::EntryModeSet(flags) => Self::ENTRY_MODE_SET | flags.bits(),
            Command::DisplayControl(flags) => Self::DISPLAY_CONTROL | flags.bits(),
            Command::CursorShift(flags) => Self::CURSOR_SHIFT | flags.bits(),
            Command::FunctionSet(flags) => Self::FUNCTION_SET | flags.bits(),
            Command::SetCgramAddress(address) => Self::SET_CGRAM_ADDRESS | (address & 0x3F),
            Command::SetDdramAddress(address) => Self::SET_DDRAM_ADDRESS | (address & 0x7F),
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command.encode()
    }
}
