//! Shortcut to open an [`Instrument`] on a Linux `usbtmc` character device.
//!
//! The kernel's `usbtmc` driver exposes each USB test and measurement device as a file such as
//! `/dev/usbtmc0`. Writing to it sends a message, reading from it returns the response.

use std::{
    fs::{File, OpenOptions},
    path::Path,
    time::Duration,
};

use crate::{Instrument, InstrumentError};

/// Builder for `usbtmc` instrument interfaces.
#[derive(Debug)]
pub struct UsbTmcInterface {}

impl UsbTmcInterface {
    /// Open a `usbtmc` device file with a read timeout of three seconds.
    ///
    /// # Arguments
    /// * `path` - Path to the device file, e.g., `"/dev/usbtmc0"`.
    pub fn simple<A: AsRef<Path>>(path: A) -> Result<Instrument<File>, InstrumentError> {
        UsbTmcInterface::with_timeout(path, Duration::from_secs(3))
    }

    /// Open a `usbtmc` device file with a given read timeout.
    ///
    /// # Arguments
    /// * `path` - Path to the device file.
    /// * `timeout` - Maximum time to wait for a terminated response.
    pub fn with_timeout<A: AsRef<Path>>(
        path: A,
        timeout: Duration,
    ) -> Result<Instrument<File>, InstrumentError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Instrument::new(file, timeout))
    }
}
