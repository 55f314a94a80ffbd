//! Cycles a list of messages on the display.

use log::{debug, info};
use pilcd_gpio::lcd::hd44780::{HD44780Driver, LcdResult, SharedLcd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest time [MessageScheduler::run] goes without looking at the stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct MessageScheduler {
    messages: Vec<String>,
    interval: Duration,
    index: usize,
}

impl MessageScheduler {
    /// Creates a scheduler, or `None` if there is nothing to show.
    pub fn new(messages: Vec<String>, interval: Duration) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }
        Some(MessageScheduler {
            messages,
            interval,
            index: 0,
        })
    }

    /// Index of the message the next tick shows.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Replaces the display contents with the next message.
    pub fn tick<D: HD44780Driver>(&mut self, lcd: &SharedLcd<D>) -> LcdResult<()> {
        let message = &self.messages[self.index];
        debug!("Showing message {}: {:?}", self.index, message);
        lcd.show(message)?;
        self.index = (self.index + 1) % self.messages.len();
        Ok(())
    }

    /// Ticks every interval until `stop` is raised.
    pub fn run<D: HD44780Driver>(&mut self, lcd: &SharedLcd<D>, stop: &AtomicBool) -> LcdResult<()> {
        info!("Cycling {} messages every {:?}", self.messages.len(), self.interval);

        while !stop.load(Ordering::Relaxed) {
            let next = Instant::now() + self.interval;
            self.tick(lcd)?;

            while !stop.load(Ordering::Relaxed) {
                let now = Instant::now();
                if now >= next {
                    break;
                }
                thread::sleep((next - now).min(STOP_POLL));
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilcd_gpio::GpioResult;
    use pilcd_gpio::lcd::hd44780::Lcd;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default, Clone)]
    struct MockDriver {
        sent: Arc<Mutex<Vec<(bool, u8)>>>,
    }

    impl MockDriver {
        /// Texts shown after each clear.
        fn screens(&self) -> Vec<String> {
            let sent = self.sent.lock().unwrap();
            let mut screens: Vec<String> = Vec::new();
            for &(data, byte) in sent.iter() {
                match (data, byte) {
                    (false, 0x01) => screens.push(String::new()),
                    (false, 0xC0) => {
                        if let Some(screen) = screens.last_mut() {
                            screen.push('\n');
                        }
                    }
                    (true, byte) => {
                        if let Some(screen) = screens.last_mut() {
                            screen.push(byte as char);
                        }
                    }
                    _ => {}
                }
            }
            screens
        }
    }

    impl HD44780Driver for MockDriver {
        fn send_command(&mut self, command: u8) -> GpioResult<()> {
            self.sent.lock().unwrap().push((false, command));
            Ok(())
        }

        fn send_data(&mut self, data: u8) -> GpioResult<()> {
            self.sent.lock().unwrap().push((true, data));
            Ok(())
        }

        fn shutdown(&mut self) -> GpioResult<()> {
            Ok(())
        }
    }

    fn shared_lcd() -> (SharedLcd<MockDriver>, MockDriver) {
        let mock = MockDriver::default();
        let mut lcd = Lcd::new(mock.clone());
        lcd.init(16, 2).unwrap();
        mock.sent.lock().unwrap().clear();
        (SharedLcd::new(lcd), mock)
    }

    #[test]
    fn empty_message_list_is_rejected() {
        assert!(MessageScheduler::new(Vec::new(), Duration::from_millis(1)).is_none());
    }

    #[test]
    fn ticks_cycle_and_wrap() {
        let (lcd, mock) = shared_lcd();
        let messages = vec!["one".to_string(), "two\n2".to_string(), "three".to_string()];
        let mut scheduler = MessageScheduler::new(messages, Duration::from_millis(1)).unwrap();

        for _ in 0..4 {
            scheduler.tick(&lcd).unwrap();
        }

        assert_eq!(mock.screens(), ["one", "two\n2", "three", "one"]);
        assert_eq!(scheduler.index(), 1);
    }

    #[test]
    fn run_returns_once_stopped() {
        let (lcd, mock) = shared_lcd();
        let messages = vec!["a".to_string(), "b".to_string()];
        let mut scheduler = MessageScheduler::new(messages, Duration::from_secs(60)).unwrap();
        let stop = AtomicBool::new(false);

        let start = Instant::now();
        thread::scope(|scope| {
            scope.spawn(|| scheduler.run(&lcd, &stop).unwrap());
            while mock.screens().is_empty() {
                thread::sleep(Duration::from_millis(1));
            }
            stop.store(true, Ordering::Relaxed);
        });

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(mock.screens(), ["a"]);
    }

    #[test]
    fn run_does_nothing_when_already_stopped() {
        let (lcd, mock) = shared_lcd();
        let mut scheduler = MessageScheduler::new(vec!["a".to_string()], Duration::from_millis(1)).unwrap();
        scheduler.run(&lcd, &AtomicBool::new(true)).unwrap();
        assert!(mock.screens().is_empty());
    }
}
