use crate::delay::hold;
use crate::lcd::hd44780::command::{
    Command, CursorShift, DisplayControl, EntryMode, FunctionSet, LCD_NEWLINE, RESET_SEQUENCE,
};
use crate::lcd::hd44780::driver::HD44780Driver;
use crate::lcd::hd44780::{LcdError, LcdResult};
use log::{debug, error, info, warn};
use std::time::Duration;

/// DDRAM address of the first column of each row.
pub const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// Time the controller needs to execute clear display and return home.
pub const CLEAR_DELAY: Duration = Duration::from_millis(3);

/// Number of DDRAM cells.
const DDRAM_SIZE: usize = 80;
const MAX_COLUMNS: u8 = 40;

/// Lifecycle of an [Lcd].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LcdState {
    /// Created, [Lcd::begin] may still change the geometry.
    Uninitialized,
    /// The initialization sequence is being sent. An [Lcd] stays here if it fails.
    Initializing,
    Ready,
    /// The lines have been released. Terminal.
    Shutdown,
}

/// Position of the cursor, zero-based.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CursorPosition {
    pub col: u8,
    pub row: u8,
}

/// Character-level interface to an HD44780 display.
///
/// The display's own memory is the only record of what is shown; `Lcd` only keeps the
/// instruction flags (so that toggling one of them never disturbs the others) and the last cursor
/// position it addressed.
///
/// Typical usage:
///
/// ```ignore
/// let mut lcd = Lcd::new(GpioHD44780Driver::new(bus));
/// lcd.init(16, 2)?;
/// lcd.write("Hello\nworld")?;
/// ```
#[derive(Debug)]
pub struct Lcd<D: HD44780Driver> {
    driver: D,
    state: LcdState,
    cols: u8,
    lines: u8,
    entry_mode: EntryMode,
    display_control: DisplayControl,
    function_set: FunctionSet,
    position: CursorPosition,
}

impl<D: HD44780Driver> Lcd<D> {
    /// Creates a new, uninitialized 16x2 display.
    pub fn new(driver: D) -> Self {
        Lcd {
            driver,
            state: LcdState::Uninitialized,
            cols: 16,
            lines: 2,
            entry_mode: EntryMode::LEFT_TO_RIGHT,
            display_control: DisplayControl::DISPLAY_ON,
            function_set: FunctionSet::TWO_LINE,
            position: CursorPosition::default(),
        }
    }

    pub fn state(&self) -> LcdState {
        self.state
    }

    /// Gets the last position the driver addressed. Characters written since then have moved the
    /// device's own cursor further.
    pub fn position(&self) -> CursorPosition {
        self.position
    }

    pub fn columns(&self) -> u8 {
        self.cols
    }

    pub fn lines(&self) -> u8 {
        self.lines
    }

    pub fn entry_mode(&self) -> EntryMode {
        self.entry_mode
    }

    pub fn display_control(&self) -> DisplayControl {
        self.display_control
    }

    pub fn function_set(&self) -> FunctionSet {
        self.function_set
    }

    /// Configures the geometry of the display. Only allowed before [Self::initialize].
    pub fn begin(&mut self, cols: u8, lines: u8) -> LcdResult<()> {
        self.expect_state("begin", LcdState::Uninitialized)?;

        if cols == 0 || cols > MAX_COLUMNS {
            return Err(LcdError::InvalidArgument(format!(
                "{} columns, expected 1 to {}",
                cols, MAX_COLUMNS
            )));
        }
        if lines == 0 || lines as usize > ROW_OFFSETS.len() {
            return Err(LcdError::InvalidArgument(format!(
                "{} lines, expected 1 to {}",
                lines,
                ROW_OFFSETS.len()
            )));
        }
        if cols as usize * lines as usize > DDRAM_SIZE {
            return Err(LcdError::InvalidArgument(format!(
                "{}x{} exceeds the {} DDRAM cells",
                cols, lines, DDRAM_SIZE
            )));
        }

        self.cols = cols;
        self.lines = lines;
        self.function_set.set(FunctionSet::TWO_LINE, lines > 1);
        self.position = CursorPosition::default();
        debug!("Configured {}x{} display", cols, lines);
        Ok(())
    }

    /// Sends the initialization sequence and clears the display.
    ///
    /// The reset bytes `0x33`, `0x32` bring the controller into 4-bit mode whatever state it was
    /// in, then function set, display control and entry mode are sent from the current flags
    /// (`0x28`, `0x0C`, `0x06` for the defaults).
    pub fn initialize(&mut self) -> LcdResult<()> {
        self.expect_state("initialize", LcdState::Uninitialized)?;
        self.state = LcdState::Initializing;

        for byte in RESET_SEQUENCE {
            self.driver.send_command(byte)?;
        }
        self.driver.execute(Command::FunctionSet(self.function_set))?;
        self.driver.execute(Command::DisplayControl(self.display_control))?;
        self.driver.execute(Command::EntryModeSet(self.entry_mode))?;
        self.send_clear()?;

        self.state = LcdState::Ready;
        info!("{}x{} display ready", self.cols, self.lines);
        Ok(())
    }

    /// [Self::begin] followed by [Self::initialize].
    pub fn init(&mut self, cols: u8, lines: u8) -> LcdResult<()> {
        self.begin(cols, lines)?;
        self.initialize()
    }

    /// Writes text at the cursor.
    ///
    /// `'\n'` jumps to the start of the second line (the controller's address `0x40`, which a
    /// single-line display doesn't show; the tracked row stays 0 there). Nothing else wraps: text longer than a line
    /// continues wherever the controller's address counter takes it. Characters past U+00FF
    /// can't be sent and are replaced with `?`.
    pub fn write(&mut self, text: &str) -> LcdResult<()> {
        self.expect_state("write", LcdState::Ready)?;

        for c in text.chars() {
            if c == '\n' {
                self.driver.send_command(LCD_NEWLINE)?;
                self.position = CursorPosition {
                    col: 0,
                    row: 1.min(self.lines - 1),
                };
                continue;
            }

            let byte = match u8::try_from(c) {
                Ok(byte) => byte,
                Err(_) => {
                    warn!("Character {:?} has no 8-bit code, sending '?'", c);
                    b'?'
                }
            };
            self.driver.send_data(byte)?;
        }
        Ok(())
    }

    /// Clears the display and moves the cursor home. Blocks for [CLEAR_DELAY] afterwards.
    pub fn clear(&mut self) -> LcdResult<()> {
        self.expect_state("clear", LcdState::Ready)?;
        self.send_clear()
    }

    /// Moves the cursor home and undoes any display shift. Blocks for [CLEAR_DELAY] afterwards.
    pub fn home(&mut self) -> LcdResult<()> {
        self.expect_state("home", LcdState::Ready)?;
        self.driver.execute(Command::ReturnHome)?;
        hold(CLEAR_DELAY);
        self.position = CursorPosition::default();
        Ok(())
    }

    /// Moves the cursor to `col`, `row`.
    ///
    /// Rows past the last line are clamped to the last line. Columns past the width are an error.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> LcdResult<()> {
        self.expect_state("set_cursor", LcdState::Ready)?;

        if col >= self.cols {
            return Err(LcdError::InvalidArgument(format!(
                "column {}, display has {}",
                col, self.cols
            )));
        }

        let last_row = self.lines - 1;
        let row = if row > last_row {
            debug!("Row {} clamped to {}", row, last_row);
            last_row
        } else {
            row
        };

        self.driver.execute(Command::SetDdramAddress(col + ROW_OFFSETS[row as usize]))?;
        self.position = CursorPosition { col, row };
        Ok(())
    }

    /// Turns the display on.
    pub fn display(&mut self) -> LcdResult<()> {
        self.update_display_control("display", DisplayControl::DISPLAY_ON, true)
    }

    /// Turns the display off, keeping its contents.
    pub fn no_display(&mut self) -> LcdResult<()> {
        self.update_display_control("no_display", DisplayControl::DISPLAY_ON, false)
    }

    /// Shows the underline cursor.
    pub fn cursor(&mut self) -> LcdResult<()> {
        self.update_display_control("cursor", DisplayControl::CURSOR_ON, true)
    }

    pub fn no_cursor(&mut self) -> LcdResult<()> {
        self.update_display_control("no_cursor", DisplayControl::CURSOR_ON, false)
    }

    /// Blinks the cursor cell.
    pub fn blink(&mut self) -> LcdResult<()> {
        self.update_display_control("blink", DisplayControl::BLINK_ON, true)
    }

    pub fn no_blink(&mut self) -> LcdResult<()> {
        self.update_display_control("no_blink", DisplayControl::BLINK_ON, false)
    }

    /// Text flows to the right of the cursor.
    pub fn left_to_right(&mut self) -> LcdResult<()> {
        self.update_entry_mode("left_to_right", EntryMode::LEFT_TO_RIGHT, true)
    }

    /// Text flows to the left of the cursor.
    pub fn right_to_left(&mut self) -> LcdResult<()> {
        self.update_entry_mode("right_to_left", EntryMode::LEFT_TO_RIGHT, false)
    }

    /// Shifts the display with every character, so text appears "right justified" at the cursor.
    pub fn autoscroll(&mut self) -> LcdResult<()> {
        self.update_entry_mode("autoscroll", EntryMode::SHIFT_INCREMENT, true)
    }

    pub fn no_autoscroll(&mut self) -> LcdResult<()> {
        self.update_entry_mode("no_autoscroll", EntryMode::SHIFT_INCREMENT, false)
    }

    /// Shifts the whole display one cell to the left without touching DDRAM.
    pub fn scroll_display_left(&mut self) -> LcdResult<()> {
        self.shift("scroll_display_left", CursorShift::DISPLAY_MOVE)
    }

    /// Shifts the whole display one cell to the right without touching DDRAM.
    pub fn scroll_display_right(&mut self) -> LcdResult<()> {
        self.shift("scroll_display_right", CursorShift::DISPLAY_MOVE | CursorShift::MOVE_RIGHT)
    }

    pub fn move_cursor_left(&mut self) -> LcdResult<()> {
        self.shift("move_cursor_left", CursorShift::empty())
    }

    pub fn move_cursor_right(&mut self) -> LcdResult<()> {
        self.shift("move_cursor_right", CursorShift::MOVE_RIGHT)
    }

    /// Stores a custom 5x8 glyph in CGRAM slot `location` (0 to 7). It is then shown by writing the
    /// character with that code.
    ///
    /// Only the low 5 bits of each row are used. The cursor is put back at [Self::position]
    /// afterwards.
    pub fn create_char(&mut self, location: u8, pattern: [u8; 8]) -> LcdResult<()> {
        self.expect_state("create_char", LcdState::Ready)?;

        if location > 7 {
            return Err(LcdError::InvalidArgument(format!(
                "CGRAM location {}, expected 0 to 7",
                location
            )));
        }

        self.driver.execute(Command::SetCgramAddress(location << 3))?;
        for row in pattern {
            self.driver.send_data(row & 0b11111)?;
        }

        let CursorPosition { col, row } = self.position;
        self.driver.execute(Command::SetDdramAddress(col + ROW_OFFSETS[row as usize]))?;
        Ok(())
    }

    /// Drives every line to its idle level. Any further operation fails.
    ///
    /// Calling it again is a no-op.
    pub fn shutdown(&mut self) -> LcdResult<()> {
        if self.state == LcdState::Shutdown {
            return Ok(());
        }

        self.driver.shutdown()?;
        self.state = LcdState::Shutdown;
        info!("Display released");
        Ok(())
    }

    fn send_clear(&mut self) -> LcdResult<()> {
        self.driver.execute(Command::ClearDisplay)?;
        hold(CLEAR_DELAY);
        self.position = CursorPosition::default();
        Ok(())
    }

    fn update_display_control(&mut self, operation: &'static str, flag: DisplayControl, value: bool) -> LcdResult<()> {
        self.expect_state(operation, LcdState::Ready)?;
        self.display_control.set(flag, value);
        self.driver.execute(Command::DisplayControl(self.display_control))?;
        Ok(())
    }

    fn update_entry_mode(&mut self, operation: &'static str, flag: EntryMode, value: bool) -> LcdResult<()> {
        self.expect_state(operation, LcdState::Ready)?;
        self.entry_mode.set(flag, value);
        self.driver.execute(Command::EntryModeSet(self.entry_mode))?;
        Ok(())
    }

    fn shift(&mut self, operation: &'static str, flags: CursorShift) -> LcdResult<()> {
        self.expect_state(operation, LcdState::Ready)?;
        self.driver.execute(Command::CursorShift(flags))?;
        Ok(())
    }

    fn expect_state(&self, operation: &'static str, expected: LcdState) -> LcdResult<()> {
        if self.state != expected {
            return Err(LcdError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }
}

impl<D: HD44780Driver> Drop for Lcd<D> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!("Failed to release the display: {}", err);
        }
    }
}
