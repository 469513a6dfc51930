//! fgenrs: Drive function and arbitrary waveform generators from Rust
//!
//! The fgenrs library provides the building blocks that function generator drivers share: a
//! blocking transport abstraction for text command protocols, and a declarative attribute layer
//! that maps instrument settings onto command strings while caching what it has read or written.
//!
//! # Transport
//!
//! Every driver talks to its instrument through the [`InstrumentInterface`] trait. It knows how
//! to send a command, ask a query, and transfer a length framed binary block. Implementations
//! are provided for:
//! - Any type that implements [`std::io::Read`] and [`std::io::Write`] via [`Instrument`].
//! - Serial ports using the [`serialport`] crate (feature `serial`) via [`SerialInterface`].
//! - Linux `usbtmc` character devices via [`UsbTmcInterface`].
//!
//! Any of these can be wrapped in a [`RetryInterface`] to retry transient transport failures a
//! bounded number of times. For tests, the [`LoopbackInterfaceString`] plays back a scripted
//! conversation.
//!
//! # Attributes
//!
//! A driver describes each setting once as an [`AttributeDescriptor`]: which command reads it,
//! which command writes it, how to parse and format its value, and whether it exists once per
//! output channel. The [`PropertyRegistry`] then implements get and set for all of them,
//! rewriting commands for the addressed channel through a [`CommandAdapter`] and skipping
//! round-trips for values held valid in its [`CacheStore`].
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod adapter;
mod cache;
mod instrument;
mod loopback;
mod registry;
mod retry;
#[cfg(feature = "serial")]
mod serial;
mod usbtmc;

pub use adapter::{CommandAdapter, PassThroughAdapter};
pub use cache::{CacheEntry, CacheStore};
pub use instrument::Instrument;
pub use loopback::LoopbackInterfaceString;
pub use registry::{AttributeDescriptor, CacheScope, PropertyRegistry, Value};
pub use retry::RetryInterface;
#[cfg(feature = "serial")]
pub use serial::SerialInterface;
pub use usbtmc::UsbTmcInterface;

use std::time::{Duration, Instant};

use thiserror::Error;

/// The error enum for all instruments.
///
/// For any command sending or querying, your instrument should return either an empty result or a
/// result with the query where this Error is the alternative. [`InstrumentError`] makes it easy to
/// propagate all the sending commands, querying errors forward with the `?` operator such that
/// errors propagate nicely.
///
/// Errors fall into two groups. Validation errors (unsupported values, invalid sizes, unknown
/// references, out of range values) are raised before anything is sent to the instrument and are
/// never retried. Transport errors are the ones for which [`InstrumentError::is_transport`]
/// returns `true`; these may be retried by a [`RetryInterface`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// The channel index requested is out of range. The error contains the index requested and
    /// the number of channels that are currently configured.
    #[error(
        "Channel with index {idx} is out of range. Number of channels available: {nof_channels}"
    )]
    ChannelIndexOutOfRange {
        /// Index of the channel that is out of range.
        idx: usize,
        /// Total number of channels.
        nof_channels: usize,
    },
    /// A given float value is out of the specified range.
    #[error("Float value {value} is out of range. Allowed range is [{min}, {max}]")]
    FloatValueOutOfRange {
        /// The value that is out of range.
        value: f64,
        /// The minimum value that is allowed.
        min: f64,
        /// The maximum value that is allowed.
        max: f64,
    },
    /// The queried identity of the instrument does not start with the expected model prefix.
    #[error("Instrument ID mismatch, expecting {expected}, got {actual}")]
    IdentityMismatch {
        /// The model prefix that was expected.
        expected: String,
        /// The model string the instrument reported.
        actual: String,
    },
    /// The called command is not supported by this interface.
    #[error("This command is not supported by this interface.")]
    InterfaceCommandNotSupported,
    /// A given integer value is out of the specified range.
    #[error("Integer value {value} is out of range. Allowed range is [{min}, {max}]")]
    IntValueOutOfRange {
        /// The value that is out of range.
        value: i64,
        /// The minimum value that is allowed.
        min: i64,
        /// The maximum value that is allowed.
        max: i64,
    },
    /// Error when an invalid argument is passed to a function. This error contains only an error
    /// message, but no arguments. It is intended for the user.
    #[error("{0}")]
    InvalidArgument(String),
    /// The length of a sample sequence is not a positive multiple of the waveform quantum, or it
    /// lies outside the allowed size range.
    #[error(
        "Invalid waveform size {len}: must be a multiple of {quantum} within [{min}, {max}] samples"
    )]
    InvalidSize {
        /// The number of samples that was given.
        len: usize,
        /// The granularity the number of samples must be a multiple of.
        quantum: usize,
        /// The minimum number of samples.
        min: usize,
        /// The maximum number of samples.
        max: usize,
    },
    /// Error when reading from/writing to an interface. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Instrument status is not okay, e.g., the instrument reported an error in its error queue.
    #[error("{0}")]
    InstrumentStatus(String),
    /// Instrument response could not be parsed because it was unexpected by the driver. This error
    /// contains the response that was received from the instrument.
    #[error("Response from instrument could not be parsed. Response was: {0}")]
    ResponseParseError(String),
    #[cfg(feature = "serial")]
    /// Serial port errors can occur when opening a serial interface. See the [`serialport::Error`]
    /// documentation for more information.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// Timeout occurred while waiting for a response from the instrument. The error contains the
    /// timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response from the instrument. Timeout was set to {0:?}."
    )]
    Timeout(Duration),
    /// Timeout occurred while waiting for a response to a query. The error contains the query
    /// that was sent and the timeout that was exceeded.
    #[error(
        "Timeout occured while waiting for a response to query: {query}. Timeout was set to {timeout:?}."
    )]
    TimeoutQuery {
        /// The query that timed out.
        query: String,
        /// The timeout that was set.
        timeout: Duration,
    },
    /// A waveform handle has the wrong file extension or is not stored on the instrument.
    #[error("Unknown waveform reference: {0}")]
    UnknownReference(String),
    /// The value is not part of the allowed set of values of an attribute.
    #[error("Value not supported: {0}")]
    UnsupportedValue(String),
}

impl InstrumentError {
    /// Returns `true` if this error was raised by the underlying transport.
    ///
    /// Only these errors are retried by [`RetryInterface`]. All other errors are the result of
    /// validation or parsing and would fail again in the same way.
    pub fn is_transport(&self) -> bool {
        match self {
            InstrumentError::Io(_)
            | InstrumentError::Timeout(_)
            | InstrumentError::TimeoutQuery { .. } => true,
            #[cfg(feature = "serial")]
            InstrumentError::Serialport(_) => true,
            _ => false,
        }
    }
}

/// The `InstrumentInterface` trait defines the transport to an instrument.
///
/// Implementors only need to provide [`InstrumentInterface::read_exact`] and
/// [`InstrumentInterface::write_raw`]. All the command level functions, i.e., sending commands,
/// querying, and writing binary blocks, are built on top of these two.
pub trait InstrumentInterface {
    /// Get the terminator of the interface. Defaults to `"\n"`.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Get the timeout of the interface. Defaults to three seconds.
    fn get_timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    /// Query the instrument with a command and return the response as a String.
    ///
    /// The command is sent with [`InstrumentInterface::sendcmd`], then the response is read until
    /// the terminator. The returned string is trimmed.
    ///
    /// # Arguments
    /// * `cmd` - The command to send to the instrument for which we expect a response.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        match self.read_until_terminator() {
            Ok(response) => {
                tracing::trace!(query = cmd, response = %response, "query answered");
                Ok(response)
            }
            Err(InstrumentError::Timeout(timeout)) => Err(InstrumentError::TimeoutQuery {
                query: cmd.to_string(),
                timeout,
            }),
            Err(e) => Err(e),
        }
    }

    /// Read exactly the number of bytes that fit into `buf` from the instrument.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// Read from the instrument until the terminator is received.
    ///
    /// Reads byte by byte until the response ends with the terminator or the timeout is exceeded.
    /// Non-UTF-8 bytes are skipped with a warning. The terminator and surrounding whitespace are
    /// trimmed from the returned string.
    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        let terminator = self.get_terminator().to_string();
        let timeout = self.get_timeout();
        let mut response = String::new();
        let mut single_buf = [0u8];

        let tic = Instant::now();
        while tic.elapsed() < timeout {
            self.read_exact(&mut single_buf)?;
            if let Ok(val) = std::str::from_utf8(&single_buf) {
                response.push_str(val);
            } else {
                tracing::warn!(byte = single_buf[0], "received invalid UTF-8 data");
            }
            if response.ends_with(&terminator) {
                return Ok(response.trim().to_string());
            }
        }
        Err(InstrumentError::Timeout(timeout))
    }

    /// Send a command to the instrument.
    ///
    /// The terminator is appended to the command before it is written.
    ///
    /// # Arguments
    /// * `cmd` - A string slice that will be sent to the instrument.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        tracing::trace!(command = cmd, "sending command");
        let cmd = format!("{cmd}{}", self.get_terminator());
        self.write_raw(cmd.as_bytes())
    }

    /// Set the terminator of an interface from a `&str`.
    ///
    /// # Arguments
    /// * `_terminator` - A string slice that will be used as the terminator for commands
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Transfer a binary payload as an IEEE 488.2 definite length block.
    ///
    /// The bytes written are `prefix`, `#`, the number of length digits, the payload length in
    /// decimal, the payload itself, and finally the terminator.
    ///
    /// # Arguments
    /// * `prefix` - The directive the block is attached to, including a trailing space, e.g.
    ///   `":curve "`.
    /// * `payload` - The raw bytes to transfer.
    fn write_block(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError> {
        tracing::trace!(prefix, len = payload.len(), "writing binary block");
        let mut data = block_header(prefix, payload.len()).into_bytes();
        data.extend_from_slice(payload);
        data.extend_from_slice(self.get_terminator().as_bytes());
        self.write_raw(&data)
    }

    /// Write raw bytes to the instrument and flush.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;
}

/// Build the header of a definite length block: `prefix#<digits><len>`.
pub(crate) fn block_header(prefix: &str, len: usize) -> String {
    let len = len.to_string();
    format!("{prefix}#{}{len}", len.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_header() {
        assert_eq!(block_header(":curve ", 16), ":curve #216");
        assert_eq!(block_header("", 5), "#15");
        assert_eq!(block_header("DATA ", 1024), "DATA #41024");
    }

    #[test]
    fn test_transport_classification() {
        let io = InstrumentError::Io(std::io::Error::other("broken"));
        assert!(io.is_transport());
        assert!(InstrumentError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!InstrumentError::UnsupportedValue("x".into()).is_transport());
        assert!(!InstrumentError::UnknownReference("x.wfm".into()).is_transport());
    }
}
