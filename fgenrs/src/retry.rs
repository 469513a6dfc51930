//! Bounded, immediate retries of transport calls.

use std::time::Duration;

use crate::{InstrumentError, InstrumentInterface};

/// An interface wrapper that retries failed transport calls.
///
/// Commands, queries, and block transfers that fail with a transport error (see
/// [`InstrumentError::is_transport`]) are reissued right away, up to `retries` additional times.
/// There is no backoff. Once all attempts are used up, the last transport error is returned
/// unchanged. Any other error is returned immediately.
///
/// # Example
///
/// ```no_run
/// use fgenrs::{InstrumentInterface, RetryInterface, UsbTmcInterface};
///
/// let usb = UsbTmcInterface::simple("/dev/usbtmc0").unwrap();
/// let mut inst = RetryInterface::new(usb, 2);
/// println!("{}", inst.query("*IDN?").unwrap());
/// ```
pub struct RetryInterface<T: InstrumentInterface> {
    inner: T,
    retries: usize,
}

impl<T: InstrumentInterface> RetryInterface<T> {
    /// Wrap an interface.
    ///
    /// # Arguments
    /// * `inner` - The interface whose calls should be retried.
    /// * `retries` - How many times a failing call is repeated after the first attempt.
    pub fn new(inner: T, retries: usize) -> Self {
        RetryInterface { inner, retries }
    }

    /// Number of retries after the first attempt.
    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Unwrap and return the inner interface.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn with_retries<R>(
        &mut self,
        mut call: impl FnMut(&mut T) -> Result<R, InstrumentError>,
    ) -> Result<R, InstrumentError> {
        let mut attempt = 0;
        loop {
            match call(&mut self.inner) {
                Err(e) if e.is_transport() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(attempt, retries = self.retries, error = %e, "transport call failed, retrying");
                }
                result => return result,
            }
        }
    }
}

impl<T: InstrumentInterface> InstrumentInterface for RetryInterface<T> {
    fn get_terminator(&self) -> &str {
        self.inner.get_terminator()
    }

    fn get_timeout(&self) -> Duration {
        self.inner.get_timeout()
    }

    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.with_retries(|intf| intf.query(cmd))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.inner.read_exact(buf)
    }

    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        self.inner.read_until_terminator()
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        self.with_retries(|intf| intf.sendcmd(cmd))
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.inner.set_terminator(terminator);
    }

    fn write_block(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError> {
        self.with_retries(|intf| intf.write_block(prefix, payload))
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.inner.write_raw(data)
    }
}
