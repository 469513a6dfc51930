//! Loopback interface implemented for testing instruments that communicate by sending strings.
//!
//! End-of-command is in these cases always determined by a terminator string, usually `"\n"` or
//! similar.

use std::collections::VecDeque;

use crate::{InstrumentError, InstrumentInterface, block_header, loopback::IncrIndex};

/// An interface that allows you to simply write tests for your instrument driver.
///
/// # Example
///
/// Let us build a simple instrument that would send a `"*IDN?"` command to an instrument and get
/// back a string and then write a test for it using the [`LoopbackInterfaceString`].
///
/// ```
/// use fgenrs::{InstrumentInterface, InstrumentError, LoopbackInterfaceString};
///
/// struct MyInstrument<T: InstrumentInterface> {
///    interface: T,
/// }
///
/// impl<T: InstrumentInterface> MyInstrument<T> {
///    fn get_name(&mut self) -> Result<String, InstrumentError> {
///        self.interface.query("*IDN?")
///    }
/// }
///
/// let host2inst = vec!["*IDN?".to_string()];
/// let inst2host = vec!["RIGOL TECHNOLOGIES,DG1022,DG1000000001,00.03.00.09.00.02.11".to_string()];
/// let loopback = LoopbackInterfaceString::new(host2inst, inst2host, "\n");
///
/// let mut inst = MyInstrument { interface: loopback };
/// assert!(inst.get_name().unwrap().starts_with("RIGOL"));
/// ```
///
/// # Binary blocks
///
/// A binary block transfer shows up in the host to instrument commands as its header only, i.e.,
/// the prefix followed by `#`, the number of length digits, and the length, e.g.
/// `":curve #216"`. The payload itself is compared with the next entry of the expected blocks
/// that are given with [`LoopbackInterfaceString::with_blocks`].
pub struct LoopbackInterfaceString {
    from_host: Vec<String>,
    from_inst: Vec<String>,
    blocks: Vec<Vec<u8>>,
    terminator_exp: String,
    from_host_index: IncrIndex,
    from_inst_index: IncrIndex,
    blocks_index: IncrIndex,
    curr_bytes: VecDeque<u8>,
    terminator: String,
}

impl LoopbackInterfaceString {
    /// Create a new loopback instrument with given commands to and from instrument.
    ///
    /// The commands are read in order. At the end, when the [`LoopbackInterfaceString`] is
    /// dropped, a `finalize` function is called that checks if all commands that you have
    /// provided have been used. If not, the program panics. Whenever something is sent to the
    /// instrument that is not expected, the [`LoopbackInterfaceString`] will panic as well.
    ///
    /// # Arguments:
    /// * `from_host` - Commands from host to instrument.
    /// * `from_inst` - Commands from instrument to host.
    /// * `terminator_exp` - The expected terminator. This is required for every instantiation of
    ///   the loopback interface.
    pub fn new(from_host: Vec<String>, from_inst: Vec<String>, terminator_exp: &str) -> Self {
        LoopbackInterfaceString {
            from_host,
            from_inst,
            blocks: Vec::new(),
            terminator_exp: terminator_exp.to_string(),
            from_host_index: IncrIndex::default(),
            from_inst_index: IncrIndex::default(),
            blocks_index: IncrIndex::default(),
            curr_bytes: VecDeque::new(),
            terminator: "\n".to_string(), // default terminator, as interfaces
        }
    }

    /// Add the binary payloads that are expected to be written as blocks, in order.
    pub fn with_blocks(mut self, blocks: Vec<Vec<u8>>) -> Self {
        self.blocks = blocks;
        self
    }

    /// This command panics if not all commands in the [`LoopbackInterfaceString`] have been used.
    ///
    /// It is automatically called when the [`LoopbackInterfaceString`] is dropped, but you can
    /// also call it manually to ensure that all commands have been used.
    pub fn finalize(&mut self) {
        let from_host_leftover = self.from_host.get(self.from_host_index.next());
        let from_inst_leftover = self.from_inst.get(self.from_inst_index.next());
        let blocks_leftover = self.blocks.get(self.blocks_index.next());
        if let Some(fil) = from_host_leftover {
            panic!("Leftover expected commands found from host to instrument: {fil}");
        }
        if let Some(fil) = from_inst_leftover {
            panic!("Leftover expected commands found from instrument to host: {fil}");
        }
        if let Some(fil) = blocks_leftover {
            panic!("Leftover expected binary block from host to instrument: {fil:?}");
        }
    }

    /// Test the interfaces terminator and ensure the right one is set.
    pub fn test_terminator(&self, expected_terminator: &str) {
        assert_eq!(
            expected_terminator, self.terminator,
            "Expected terminator '{expected_terminator}', got '{}'",
            self.terminator
        );
    }

    /// Get the next command from host to instrument, or panic.
    fn get_next_from_host(&mut self) -> &str {
        self.from_host
            .get(self.from_host_index.next())
            .expect("No more commands were expected from host to instrument.")
    }

    /// Get the next command from instrument to host, or panic.
    fn get_next_from_inst(&mut self) -> &str {
        self.from_inst
            .get(self.from_inst_index.next())
            .expect("No more commands were expected from instrument to host.")
    }

    /// Get the next expected binary payload, or panic.
    fn get_next_block(&mut self) -> &[u8] {
        self.blocks
            .get(self.blocks_index.next())
            .expect("No more binary blocks were expected from host to instrument.")
    }

    /// Get the next command from host to instrument as a string including the terminator.
    fn get_next_from_host_with_terminator(&mut self) -> String {
        let cmd = self.get_next_from_host().to_string();
        format!("{cmd}{}", self.terminator_exp)
    }

    /// Get the next command from instrument to host as a string including the terminator.
    fn get_next_from_inst_with_terminator(&mut self) -> String {
        let cmd = self.get_next_from_inst().to_string();
        format!("{cmd}{}", self.terminator_exp)
    }

    /// Function to read exactly one byte from the next command from the instrument.
    ///
    /// This just panics if there are no more commands. If there are no more commands but one is
    /// required, the panic is justified as this is a test interface.
    fn read_one_byte(&mut self) -> u8 {
        match self.curr_bytes.pop_front() {
            Some(byte) => byte,
            None => {
                let next_cmd = self.get_next_from_inst_with_terminator();
                self.curr_bytes = next_cmd.as_bytes().iter().copied().collect();
                self.read_one_byte()
            }
        }
    }
}

impl InstrumentInterface for LoopbackInterfaceString {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.read_one_byte();
        }
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn write_block(&mut self, prefix: &str, payload: &[u8]) -> Result<(), InstrumentError> {
        let header = block_header(prefix, payload.len());
        let exp = self.get_next_from_host().to_string();
        assert_eq!(exp, header, "Expected block header '{exp}', got '{header}'");
        let exp_payload = self.get_next_block();
        assert_eq!(
            exp_payload, payload,
            "Expected block payload {exp_payload:?}, got {payload:?}"
        );
        Ok(())
    }

    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), InstrumentError> {
        let exp = self.get_next_from_host_with_terminator();
        assert_eq!(
            exp.as_bytes(),
            cmd,
            "Expected sendcmd '{0}', got '{1:?}'",
            exp,
            std::str::from_utf8(cmd)
        );
        Ok(())
    }
}

impl Drop for LoopbackInterfaceString {
    fn drop(&mut self) {
        // do not turn a failing test into an abort
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
