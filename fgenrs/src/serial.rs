//! Shortcuts to open an [`Instrument`] on a serial port using the [`serialport`] crate.

use std::time::Duration;

use serialport::{SerialPort, SerialPortBuilder};

use crate::{Instrument, InstrumentError};

/// Builder for serial port instrument interfaces.
#[derive(Debug)]
pub struct SerialInterface {}

impl SerialInterface {
    /// Open a serial port with the given baud rate and a timeout of three seconds.
    ///
    /// All other settings are the [`serialport`] defaults (8N1, no flow control).
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud` - The baud rate.
    pub fn simple(port: &str, baud: u32) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let spb = serialport::new(port, baud).timeout(Duration::from_secs(3));
        SerialInterface::full(spb)
    }

    /// Open a fully configured serial port.
    ///
    /// The timeout configured in the builder is also used as the read timeout of the interface.
    ///
    /// # Arguments
    /// * `spb` - A [`serialport::SerialPortBuilder`] with all the settings applied.
    pub fn full(spb: SerialPortBuilder) -> Result<Instrument<Box<dyn SerialPort>>, InstrumentError> {
        let port = spb.open()?;
        let timeout = port.timeout();
        Ok(Instrument::new(port, timeout))
    }
}
