//! Serial console logger

use log::LevelFilter;
use vcore::logging::{level_filter, LineLogger};
use vcore::LineSink;

use crate::hal::MiniUart;
use crate::platform_core::core_id;

const CONSOLE_BAUD: u32 = 115_200;

/// Kernel log on the Mini UART, tagged with the writing core
pub static LOGGER: LineLogger<MiniUart> = LineLogger::new(MiniUart::new(), LevelFilter::Info, core_id);

/// Bring up the UART and install [`LOGGER`] as the `log` backend
pub fn init() {
    LOGGER.with_sink(|uart| uart.init(CONSOLE_BAUD));
    if log::set_logger(&LOGGER).is_err() {
        LOGGER.write_line("logger already installed");
    }
    log::set_max_level(LOGGER.level());
}

/// Apply a `loglevel=` value
pub fn set_level(level: u8) {
    let filter = if cfg!(feature = "debug_uart") {
        LevelFilter::Trace
    } else {
        level_filter(level)
    };
    LOGGER.set_level(filter);
    log::set_max_level(filter);
}

/// Workload output on the same console as the log
pub struct Console;

impl LineSink for Console {
    fn write_line(&mut self, line: &str) {
        LOGGER.write_line(line);
    }
}
