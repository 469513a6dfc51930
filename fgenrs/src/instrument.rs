//! A general transport for any port that implements [`std::io::Read`] and [`std::io::Write`].
//!
//! Serial ports, `usbtmc` device files, and sockets all fit here. The more specific interfaces
//! of this crate are only shortcuts that build an [`Instrument`] with the right settings.

use std::time::Duration;

use crate::{InstrumentError, InstrumentInterface};

/// A general instrument interface that can be built with any port that implements
/// [`std::io::Read`] and [`std::io::Write`].
///
/// # Example
///
/// ```no_run
/// use std::{fs::OpenOptions, time::Duration};
///
/// use fgenrs::{Instrument, InstrumentInterface};
///
/// let port = OpenOptions::new().read(true).write(true).open("/dev/usbtmc0").unwrap();
/// let mut inst = Instrument::new(port, Duration::from_secs(3));
/// println!("{}", inst.query("*IDN?").unwrap());
/// ```
pub struct Instrument<P: std::io::Read + std::io::Write> {
    port: P,
    terminator: String,
    timeout: Duration,
}

impl<P: std::io::Read + std::io::Write> Instrument<P> {
    /// Create a new instance of [`Instrument`] with a given port and read timeout.
    ///
    /// The terminator defaults to `"\n"`.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            terminator: "\n".to_string(),
            timeout,
        }
    }
}

impl<P: std::io::Read + std::io::Write> InstrumentInterface for Instrument<P> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.port.read_exact(buf)?;
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }
}
