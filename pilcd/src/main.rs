mod config;
mod scheduler;

use crate::config::{Backend, Config, PinConfig};
use crate::scheduler::MessageScheduler;
use dotenv::dotenv;
use log::{debug, info};
use pilcd_gpio::gpiod::GpiodDriver;
use pilcd_gpio::lcd::hd44780::{BitBus, GpioHD44780Driver, Lcd, SharedLcd};
use pilcd_gpio::sim::SimGpioDriver;
use pilcd_gpio::{GpioActiveLevel, GpioDriver};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("PiLCD starting...");

    let pins = PinConfig::from_env()?;
    info!(
        "LCD @ RS: {}, E: {}, Data: {:?}, {}x{}",
        pins.pin_rs, pins.pin_e, pins.pins_data, pins.cols, pins.lines
    );

    debug!("Trying to load config...");
    let config = match Config::try_load()? {
        Some(config) => {
            info!("Config loaded.");
            config
        }
        None => {
            info!("Config not found. Using default");
            let config = Config::default();
            config.save()?;
            info!("Default config saved.");
            config
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            info!("Termination requested");
            stop.store(true, Ordering::Relaxed);
        })?;
    }

    match &pins.backend {
        Backend::Gpiod(path) => {
            let gpio = GpiodDriver::open(path)?;
            debug!("{:?} initialized.", gpio);
            run(&gpio, &pins, config, &stop)?;
        }
        Backend::Sim => {
            let gpio = SimGpioDriver::new(pins.max_pin() + 1);
            debug!("{:?} initialized.", gpio);
            run(&gpio, &pins, config, &stop)?;
            info!("Simulated {} pin writes", gpio.events().len());
        }
    }

    info!("PiLCD stopped.");
    Ok(())
}

/// Claims the lines, brings the display up and shows the messages until `stop` is raised.
fn run<G: GpioDriver>(gpio: &G, pins: &PinConfig, config: Config, stop: &AtomicBool) -> eyre::Result<()> {
    debug!("Initializing LCD driver...");
    let mut pin_rs = gpio.get_pin(pins.pin_rs)?;
    let rs_out = pin_rs.as_output()?;
    let mut pin_e = gpio.get_pin(pins.pin_e)?;
    let e_out = pin_e.as_output()?;
    let mut data_bus = gpio.get_pin_bus(pins.pins_data)?;
    if pins.data_active_low {
        data_bus.set_active_level(GpioActiveLevel::Low)?;
    }
    let data_out = data_bus.as_output()?;

    let bus = BitBus::new(&*rs_out, &*e_out, &*data_out);
    let mut lcd = Lcd::new(GpioHD44780Driver::new(bus));
    lcd.init(pins.cols, pins.lines)?;
    debug!("{:?} initialized.", lcd);

    let lcd = SharedLcd::new(lcd);
    let mut scheduler = MessageScheduler::new(config.messages, Duration::from_millis(config.interval_ms))
        .ok_or_else(|| eyre::eyre!("No messages configured"))?;

    let result = scheduler.run(&lcd, stop);
    // Lines go idle before their handles are released, also when the scheduler failed.
    lcd.shutdown()?;
    result?;
    Ok(())
}
