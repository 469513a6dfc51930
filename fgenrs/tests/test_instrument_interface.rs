//! Tests for the default implementation of the [`InstrumentInterface`] trait.

use std::time::Duration;

use rstest::*;

use fgenrs::{InstrumentError, InstrumentInterface};

/// An interface that records everything written and never answers.
#[derive(Default)]
struct RecordingInstrument {
    written: Vec<u8>,
}

impl InstrumentInterface for RecordingInstrument {
    fn read_exact(&mut self, _buf: &mut [u8]) -> Result<(), InstrumentError> {
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        self.written.extend_from_slice(data);
        Ok(())
    }
}

#[fixture]
fn inst() -> RecordingInstrument {
    RecordingInstrument::default()
}

#[rstest]
fn test_default_get_terminator(inst: RecordingInstrument) {
    assert_eq!(inst.get_terminator(), "\n");
}

#[rstest]
fn test_default_get_timeout(inst: RecordingInstrument) {
    assert_eq!(inst.get_timeout(), Duration::from_secs(3));
}

/// `sendcmd` appends the terminator to every command.
#[rstest]
fn test_default_sendcmd(mut inst: RecordingInstrument) {
    inst.sendcmd("*TRG").unwrap();
    inst.sendcmd("FREQ 1.000000e+03").unwrap();
    assert_eq!(inst.written, b"*TRG\nFREQ 1.000000e+03\n");
}

/// The default block transfer uses a single length digit count followed by the length.
#[rstest]
#[case(0, b":curve #10".to_vec())]
#[case(16, b":curve #216".to_vec())]
#[case(2048, b":curve #42048".to_vec())]
fn test_default_write_block_header(
    mut inst: RecordingInstrument,
    #[case] len: usize,
    #[case] header: Vec<u8>,
) {
    let payload = vec![0xab; len];
    inst.write_block(":curve ", &payload).unwrap();

    assert_eq!(&inst.written[..header.len()], header.as_slice());
    assert_eq!(&inst.written[header.len()..header.len() + len], payload.as_slice());
    assert_eq!(inst.written.last(), Some(&b'\n'));
    assert_eq!(inst.written.len(), header.len() + len + 1);
}
