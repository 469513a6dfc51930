//! Tests for the bounded retry wrapper.

use rstest::*;

use fgenrs::{InstrumentError, InstrumentInterface, RetryInterface};

/// An interface whose first `failures` writes fail with the given error kind.
struct FlakyInstrument {
    failures: usize,
    transport: bool,
    attempts: usize,
    written: Vec<u8>,
}

impl FlakyInstrument {
    fn new(failures: usize, transport: bool) -> Self {
        FlakyInstrument {
            failures,
            transport,
            attempts: 0,
            written: Vec::new(),
        }
    }
}

impl InstrumentInterface for FlakyInstrument {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        buf.fill(b'\n');
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            return if self.transport {
                Err(InstrumentError::Io(std::io::Error::other("bus glitch")))
            } else {
                Err(InstrumentError::InvalidArgument("rejected".to_string()))
            };
        }
        self.written.extend_from_slice(data);
        Ok(())
    }
}

/// Transport errors are retried until the call succeeds.
#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
fn test_retry_succeeds(#[case] failures: usize) {
    let mut intf = RetryInterface::new(FlakyInstrument::new(failures, true), 2);
    intf.sendcmd("*TRG").unwrap();

    let inner = intf.into_inner();
    assert_eq!(inner.attempts, failures + 1);
    assert_eq!(inner.written, b"*TRG\n");
}

/// Once all retries are used up, the last transport error is returned unchanged.
#[rstest]
fn test_retry_exhausted() {
    let mut intf = RetryInterface::new(FlakyInstrument::new(5, true), 2);
    assert!(matches!(intf.sendcmd("*TRG"), Err(InstrumentError::Io(_))));
    assert_eq!(intf.into_inner().attempts, 3);
}

/// Errors that do not come from the transport are never retried.
#[rstest]
fn test_no_retry_on_validation_error() {
    let mut intf = RetryInterface::new(FlakyInstrument::new(1, false), 3);
    assert!(matches!(
        intf.sendcmd("*TRG"),
        Err(InstrumentError::InvalidArgument(_))
    ));
    assert_eq!(intf.into_inner().attempts, 1);
}

/// Block transfers are retried as a whole.
#[rstest]
fn test_retry_write_block() {
    let mut intf = RetryInterface::new(FlakyInstrument::new(1, true), 1);
    intf.write_block(":curve ", &[0x01, 0x02]).unwrap();
    assert_eq!(intf.retries(), 1);

    let inner = intf.into_inner();
    assert_eq!(inner.attempts, 2);
    assert_eq!(inner.written, b":curve #12\x01\x02\n");
}

/// Queries are retried including their command.
#[rstest]
fn test_retry_query() {
    let mut intf = RetryInterface::new(FlakyInstrument::new(1, true), 1);
    assert_eq!(intf.query("FREQ?").unwrap(), "");
    assert_eq!(intf.into_inner().attempts, 2);
}
