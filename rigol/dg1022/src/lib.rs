//! A rust driver for the Rigol DG1022 function and arbitrary waveform generator.
//!
//! This driver controls the two outputs of the DG1022: output state, standard waveforms,
//! frequency, amplitude, offset, and bursts. Output mode, reference clock, and sample rate of
//! arbitrary waveforms are set for the whole instrument. The driver also uploads arbitrary
//! waveforms into the instrument's memory and selects them for playback.
//!
//! Settings are cached. A value that was read or written is returned from the cache until it is
//! invalidated, e.g., because a related setting was written or the instrument was reset.
//!
//! # Example
//!
//! This example shows the usage via the Linux `usbtmc` interface.
//! ```no_run
//! use measurements::{Frequency, Voltage};
//! use fgenrs::UsbTmcInterface;
//! use rigol_dg1022::{Dg1022, StandardWaveform};
//!
//! let usb = UsbTmcInterface::simple("/dev/usbtmc0").expect("Failed to open usbtmc device");
//! let mut inst = Dg1022::try_new(usb).unwrap();
//!
//! // Query the name of the instrument
//! println!("{}", inst.get_name().unwrap());
//!
//! // A 10 kHz square wave on the second output
//! let mut ch2 = inst.get_channel(1).unwrap();
//! ch2.set_waveform(StandardWaveform::Square).unwrap();
//! ch2.set_frequency(Frequency::from_kilohertz(10.0)).unwrap();
//! ch2.set_amplitude(Voltage::from_volts(2.0)).unwrap();
//! ch2.set_output_enabled(true).unwrap();
//!
//! // Upload a ramp and play it on the first output
//! let samples: Vec<f64> = (0..64).map(|i| f64::from(i) / 32.0 - 1.0).collect();
//! let mut ch1 = inst.get_channel(0).unwrap();
//! let handle = ch1.create_waveform(&samples, None).unwrap();
//! println!("Playing {handle}");
//! ```

#![deny(warnings, missing_docs)]

mod adapter;
mod attributes;
mod catalog;
mod utils;
mod waveform;

pub use adapter::RigolChannelAdapter;
pub use attributes::{
    Attribute, BURST_COUNT_RANGE, ClockSource, DUTY_CYCLE_RANGE, GeneratorMode, IMPEDANCE_RANGE,
    START_PHASE_RANGE, StandardWaveform,
};
pub use catalog::{CATALOG_QUERY, Catalog, CatalogEntry};
pub use waveform::{
    BIT_RESOLUTION, DEFAULT_SAMPLE_INTERVAL, WaveformLimits, encode, quantize, sample_interval,
};

use std::sync::{Arc, Mutex, MutexGuard};

use fgenrs::{InstrumentError, InstrumentInterface, PropertyRegistry, Value};
use measurements::{Angle, Frequency, Resistance, Voltage};
use tracing::info;

use catalog::CatalogManager;
use waveform::WaveformEncoder;

/// Model prefix that the identity query must report.
pub const EXPECTED_MODEL: &str = "DG1022";

const SIMULATED_IDENTITY: &str = "Not available while simulating";

/// Options for opening a session with the instrument.
///
/// # Example
///
/// ```
/// use rigol_dg1022::DriverOptions;
///
/// let opts = DriverOptions::default().with_simulate(true).with_reset(true);
/// assert!(opts.simulate);
/// assert_eq!(opts.output_count, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Never talk to the instrument, serve everything from the cache.
    pub simulate: bool,
    /// Check the model reported by the instrument when opening the session.
    pub id_query: bool,
    /// Reset the instrument when opening the session.
    pub reset: bool,
    /// Number of outputs.
    pub output_count: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            simulate: false,
            id_query: false,
            reset: false,
            output_count: 2,
        }
    }
}

impl DriverOptions {
    /// Turn simulation on or off.
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Turn the identity check on or off.
    pub fn with_id_query(mut self, id_query: bool) -> Self {
        self.id_query = id_query;
        self
    }

    /// Turn the initial reset on or off.
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Set the number of outputs.
    pub fn with_output_count(mut self, output_count: usize) -> Self {
        self.output_count = output_count;
        self
    }
}

/// Identity of the instrument as reported by `*IDN?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Manufacturer, e.g., `RIGOL TECHNOLOGIES`.
    pub manufacturer: String,
    /// Model, e.g., `DG1022U`.
    pub model: String,
    /// Serial number.
    pub serial_number: String,
    /// Firmware revision.
    pub firmware_revision: String,
}

impl Identity {
    fn from_response(response: &str) -> Result<Self, InstrumentError> {
        let parts: Vec<&str> = response.trim().split(',').map(str::trim).collect();
        match parts.as_slice() {
            [manufacturer, model, serial_number, firmware_revision] => Ok(Identity {
                manufacturer: manufacturer.to_string(),
                model: model.to_string(),
                serial_number: serial_number.to_string(),
                firmware_revision: firmware_revision.to_string(),
            }),
            _ => Err(InstrumentError::ResponseParseError(response.to_string())),
        }
    }

    fn simulated() -> Self {
        Identity {
            manufacturer: SIMULATED_IDENTITY.to_string(),
            model: SIMULATED_IDENTITY.to_string(),
            serial_number: SIMULATED_IDENTITY.to_string(),
            firmware_revision: SIMULATED_IDENTITY.to_string(),
        }
    }
}

/// Everything that belongs to one session with the instrument, kept behind one mutex.
struct Session<T: InstrumentInterface> {
    interface: T,
    registry: PropertyRegistry<Attribute, RigolChannelAdapter>,
    catalog: CatalogManager,
    encoder: WaveformEncoder,
}

impl<T: InstrumentInterface> Session<T> {
    fn is_simulated(&self) -> bool {
        self.registry.is_simulated()
    }

    fn get(&mut self, attr: Attribute, channel: usize) -> Result<Value, InstrumentError> {
        self.registry.get(&mut self.interface, attr, channel)
    }

    fn set(&mut self, attr: Attribute, channel: usize, value: Value) -> Result<(), InstrumentError> {
        self.registry.resolve_channel(attr, channel)?;
        let value = match attr {
            Attribute::ArbitraryWaveform => {
                let handle = value
                    .as_text()
                    .ok_or_else(|| InstrumentError::UnsupportedValue(value.to_string()))?;
                Value::Text(self.catalog.validate_reference(&mut self.interface, handle)?)
            }
            _ => value,
        };
        self.registry.set(&mut self.interface, attr, channel, value)
    }

    fn create_waveform(
        &mut self,
        samples: &[f64],
        times: Option<&[f64]>,
    ) -> Result<String, InstrumentError> {
        self.encoder
            .create(&mut self.interface, &mut self.catalog, samples, times)
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        if self.is_simulated() {
            return Ok(());
        }
        self.interface.sendcmd(cmd)
    }
}

/// A rust driver for the Rigol DG1022.
///
/// See the top-level documentation for an example on how to use this driver.
pub struct Dg1022<T: InstrumentInterface> {
    session: Arc<Mutex<Session<T>>>,
    num_channels: usize,
}

impl<T: InstrumentInterface> Dg1022<T> {
    /// Create a new DG1022 instance with the given instrument interface and default options.
    ///
    /// # Arguments
    /// * `interface` - An instrument interface that implements the [`InstrumentInterface`] trait.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        Self::try_new_with_options(interface, DriverOptions::default())
    }

    /// Create a new DG1022 instance with the given interface and options.
    ///
    /// If requested, the model reported by the instrument is checked against
    /// [`EXPECTED_MODEL`] and the instrument is reset. Neither talks to the instrument in a
    /// simulated session.
    pub fn try_new_with_options(
        interface: T,
        options: DriverOptions,
    ) -> Result<Self, InstrumentError> {
        let mut registry = PropertyRegistry::new(RigolChannelAdapter, options.output_count);
        registry.set_simulate(options.simulate);
        for descriptor in attributes::descriptors() {
            registry.register(descriptor)?;
        }

        let session = Session {
            interface,
            registry,
            catalog: CatalogManager::new(options.simulate),
            encoder: WaveformEncoder::new(WaveformLimits::default()),
        };
        let mut inst = Dg1022 {
            session: Arc::new(Mutex::new(session)),
            num_channels: options.output_count,
        };

        if options.id_query && !options.simulate {
            inst.check_identity(EXPECTED_MODEL)?;
        }
        if options.reset {
            inst.reset()?;
        }
        Ok(inst)
    }

    /// Get a new channel with a given index for the Channel.
    ///
    /// Please note that channels are zero indexed.
    pub fn get_channel(&mut self, idx: usize) -> Result<Channel<T>, InstrumentError> {
        if idx >= self.num_channels {
            return Err(InstrumentError::ChannelIndexOutOfRange {
                idx,
                nof_channels: self.num_channels,
            });
        }
        Ok(Channel::new(idx, Arc::clone(&self.session)))
    }

    /// Query the name of the instrument.
    ///
    /// Returns the raw response to `*IDN?`, a comma-separated string of manufacturer, model,
    /// serial number, and firmware revision.
    pub fn get_name(&mut self) -> Result<String, InstrumentError> {
        let mut session = self.lock();
        if session.is_simulated() {
            return Ok(SIMULATED_IDENTITY.to_string());
        }
        session.interface.query("*IDN?")
    }

    /// Query the identity of the instrument.
    pub fn get_identity(&mut self) -> Result<Identity, InstrumentError> {
        if self.is_simulated() {
            return Ok(Identity::simulated());
        }
        let name = self.get_name()?;
        Identity::from_response(&name)
    }

    /// Check that the model reported by the instrument starts with `expected`.
    pub fn check_identity(&mut self, expected: &str) -> Result<(), InstrumentError> {
        if self.is_simulated() {
            return Ok(());
        }
        let identity = self.get_identity()?;
        if !identity.model.starts_with(expected) {
            return Err(InstrumentError::IdentityMismatch {
                expected: expected.to_string(),
                actual: identity.model,
            });
        }
        Ok(())
    }

    /// Reset the instrument to its default state and invalidate all cached values.
    pub fn reset(&mut self) -> Result<(), InstrumentError> {
        let mut session = self.lock();
        session.registry.invalidate_all();
        session.sendcmd("*RST")?;
        info!("instrument reset");
        Ok(())
    }

    /// Query the oldest entry of the instrument's error queue.
    ///
    /// Returns the error code and message. A code of zero means that there is no error. A
    /// simulated session never has errors.
    pub fn get_error(&mut self) -> Result<(i32, String), InstrumentError> {
        let mut session = self.lock();
        if session.is_simulated() {
            return Ok((0, "No error".to_string()));
        }
        let resp = session.interface.query("SYST:ERR?")?;
        let (code, msg) = resp
            .split_once(',')
            .ok_or_else(|| InstrumentError::ResponseParseError(resp.clone()))?;
        let code = code
            .trim()
            .parse::<i32>()
            .map_err(|_| InstrumentError::ResponseParseError(resp.clone()))?;
        Ok((code, msg.trim().trim_matches('"').to_string()))
    }

    /// Send a software trigger, e.g., to start a burst.
    pub fn send_software_trigger(&mut self) -> Result<(), InstrumentError> {
        self.lock().sendcmd("*TRG")
    }

    /// Get whether the instrument plays standard or arbitrary waveforms.
    pub fn get_output_mode(&mut self) -> Result<GeneratorMode, InstrumentError> {
        let val = self.lock().get(Attribute::OutputMode, 0)?;
        val.as_text().ok_or_else(|| unexpected(&val))?.parse()
    }

    /// Set the output mode. All cached values are invalidated.
    pub fn set_output_mode(&mut self, mode: GeneratorMode) -> Result<(), InstrumentError> {
        self.lock()
            .set(Attribute::OutputMode, 0, Value::from(mode.as_str()))
    }

    /// Get the reference clock source.
    ///
    /// The instrument cannot be asked for it, so this is the last source that was set, or
    /// [`ClockSource::Internal`] in a simulated session.
    pub fn get_reference_clock_source(&mut self) -> Result<ClockSource, InstrumentError> {
        let val = self.lock().get(Attribute::ReferenceClockSource, 0)?;
        val.as_text().ok_or_else(|| unexpected(&val))?.parse()
    }

    /// Set the reference clock source. All cached values are invalidated.
    pub fn set_reference_clock_source(
        &mut self,
        source: ClockSource,
    ) -> Result<(), InstrumentError> {
        self.lock().set(
            Attribute::ReferenceClockSource,
            0,
            Value::from(source.as_str()),
        )
    }

    /// Get the sample rate of arbitrary waveforms.
    pub fn get_arbitrary_sample_rate(&mut self) -> Result<Frequency, InstrumentError> {
        let val = self.lock().get(Attribute::ArbitrarySampleRate, 0)?;
        val.as_float()
            .map(Frequency::from_hertz)
            .ok_or_else(|| unexpected(&val))
    }

    /// Set the sample rate of arbitrary waveforms.
    ///
    /// The rate is written with the frequency command, so the cached frequency of both outputs
    /// is invalidated.
    pub fn set_arbitrary_sample_rate(&mut self, rate: Frequency) -> Result<(), InstrumentError> {
        self.lock()
            .set(Attribute::ArbitrarySampleRate, 0, Value::Float(rate.as_hertz()))
    }

    /// Upload an arbitrary waveform and return the handle it is stored as.
    ///
    /// The waveform is not selected on any output; see [`Channel::create_waveform`] for that.
    ///
    /// # Arguments
    /// * `samples` - Samples in [-1, 1]. Values outside are clamped. The number of samples must
    ///   satisfy the [`WaveformLimits`] of the instrument.
    /// * `times` - Optional time axis of the samples in seconds. The sample interval is the root
    ///   mean square of the steps. Without a time axis, [`DEFAULT_SAMPLE_INTERVAL`] is used.
    pub fn create_waveform(
        &mut self,
        samples: &[f64],
        times: Option<&[f64]>,
    ) -> Result<String, InstrumentError> {
        self.lock().create_waveform(samples, times)
    }

    /// Get the waveforms that are stored on the instrument.
    pub fn get_catalog(&mut self) -> Result<Catalog, InstrumentError> {
        let mut session = self.lock();
        let Session {
            interface, catalog, ..
        } = &mut *session;
        catalog.load(interface)
    }

    /// Get the size constraints of arbitrary waveforms.
    pub fn waveform_limits(&self) -> WaveformLimits {
        self.lock().encoder.limits()
    }

    /// Whether this session is simulated.
    pub fn is_simulated(&self) -> bool {
        self.lock().is_simulated()
    }

    /// Get an attribute on a channel. The channel is ignored for attributes that are not
    /// per channel.
    pub fn get_attribute(
        &mut self,
        attr: Attribute,
        channel: usize,
    ) -> Result<Value, InstrumentError> {
        self.lock().get(attr, channel)
    }

    /// Set an attribute on a channel.
    pub fn set_attribute(
        &mut self,
        attr: Attribute,
        channel: usize,
        value: Value,
    ) -> Result<(), InstrumentError> {
        self.lock().set(attr, channel, value)
    }

    /// Invalidate the cached value of an attribute on a channel, such that the next get queries
    /// the instrument.
    pub fn invalidate(&mut self, attr: Attribute, channel: usize) -> Result<(), InstrumentError> {
        self.lock().registry.invalidate(attr, channel)
    }

    /// Invalidate all cached values.
    pub fn invalidate_all(&mut self) {
        self.lock().registry.invalidate_all();
    }

    fn lock(&self) -> MutexGuard<'_, Session<T>> {
        self.session.lock().expect("Mutex should not be poisoned")
    }
}

impl<T: InstrumentInterface> Clone for Dg1022<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            num_channels: self.num_channels,
        }
    }
}

/// Channel structure representing a single output of the DG1022.
///
/// **This structure can only be created through the [`Dg1022`] struct.**
pub struct Channel<T: InstrumentInterface> {
    idx: usize,
    session: Arc<Mutex<Session<T>>>,
}

impl<T: InstrumentInterface> Channel<T> {
    /// Get a new channel for the given session.
    ///
    /// This function can only be called from inside of the [`Dg1022`] struct.
    fn new(idx: usize, session: Arc<Mutex<Session<T>>>) -> Self {
        Channel { idx, session }
    }

    /// Zero based index of this channel.
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// Get whether the output is enabled.
    pub fn get_output_enabled(&mut self) -> Result<bool, InstrumentError> {
        let val = self.get(Attribute::OutputEnabled)?;
        val.as_bool().ok_or_else(|| unexpected(&val))
    }

    /// Enable or disable the output.
    pub fn set_output_enabled(&mut self, enabled: bool) -> Result<(), InstrumentError> {
        self.set(Attribute::OutputEnabled, Value::Bool(enabled))
    }

    /// Get the load impedance. High impedance is reported as infinite resistance.
    pub fn get_impedance(&mut self) -> Result<Resistance, InstrumentError> {
        self.get_float(Attribute::OutputImpedance)
            .map(Resistance::from_ohms)
    }

    /// Set the load impedance. An infinite resistance selects high impedance.
    ///
    /// Finite values must lie within [`IMPEDANCE_RANGE`].
    pub fn set_impedance(&mut self, impedance: Resistance) -> Result<(), InstrumentError> {
        self.set(
            Attribute::OutputImpedance,
            Value::Float(impedance.as_ohms()),
        )
    }

    /// Get the standard waveform.
    pub fn get_waveform(&mut self) -> Result<StandardWaveform, InstrumentError> {
        let val = self.get(Attribute::Waveform)?;
        val.as_text().ok_or_else(|| unexpected(&val))?.parse()
    }

    /// Set the standard waveform.
    pub fn set_waveform(&mut self, waveform: StandardWaveform) -> Result<(), InstrumentError> {
        self.set(Attribute::Waveform, Value::from(waveform.as_str()))
    }

    /// Get the frequency.
    pub fn get_frequency(&mut self) -> Result<Frequency, InstrumentError> {
        self.get_float(Attribute::Frequency)
            .map(Frequency::from_hertz)
    }

    /// Set the frequency.
    ///
    /// The frequency is shared by both outputs, so this invalidates the cached frequency of the
    /// other output.
    pub fn set_frequency(&mut self, frequency: Frequency) -> Result<(), InstrumentError> {
        self.set(Attribute::Frequency, Value::Float(frequency.as_hertz()))
    }

    /// Get the amplitude (peak to peak).
    pub fn get_amplitude(&mut self) -> Result<Voltage, InstrumentError> {
        self.get_float(Attribute::Amplitude).map(Voltage::from_volts)
    }

    /// Set the amplitude (peak to peak).
    pub fn set_amplitude(&mut self, amplitude: Voltage) -> Result<(), InstrumentError> {
        self.set(Attribute::Amplitude, Value::Float(amplitude.as_volts()))
    }

    /// Get the DC offset.
    pub fn get_dc_offset(&mut self) -> Result<Voltage, InstrumentError> {
        self.get_float(Attribute::DcOffset).map(Voltage::from_volts)
    }

    /// Set the DC offset.
    pub fn set_dc_offset(&mut self, offset: Voltage) -> Result<(), InstrumentError> {
        self.set(Attribute::DcOffset, Value::Float(offset.as_volts()))
    }

    /// Get the duty cycle of the square wave in percent.
    pub fn get_duty_cycle(&mut self) -> Result<f64, InstrumentError> {
        self.get_float(Attribute::DutyCycle)
    }

    /// Set the duty cycle of the square wave in percent, see [`DUTY_CYCLE_RANGE`].
    pub fn set_duty_cycle(&mut self, percent: f64) -> Result<(), InstrumentError> {
        self.set(Attribute::DutyCycle, Value::Float(percent))
    }

    /// Get the start phase.
    pub fn get_start_phase(&mut self) -> Result<Angle, InstrumentError> {
        self.get_float(Attribute::StartPhase)
            .map(Angle::from_degrees)
    }

    /// Set the start phase, see [`START_PHASE_RANGE`] for the allowed range in degrees.
    pub fn set_start_phase(&mut self, phase: Angle) -> Result<(), InstrumentError> {
        self.set(Attribute::StartPhase, Value::Float(phase.as_degrees()))
    }

    /// Get the gain of the arbitrary waveform.
    pub fn get_arbitrary_gain(&mut self) -> Result<f64, InstrumentError> {
        self.get_float(Attribute::ArbitraryGain)
    }

    /// Set the gain of the arbitrary waveform. This also changes the amplitude.
    pub fn set_arbitrary_gain(&mut self, gain: f64) -> Result<(), InstrumentError> {
        self.set(Attribute::ArbitraryGain, Value::Float(gain))
    }

    /// Get the offset of the arbitrary waveform.
    pub fn get_arbitrary_offset(&mut self) -> Result<Voltage, InstrumentError> {
        self.get_float(Attribute::ArbitraryOffset)
            .map(Voltage::from_volts)
    }

    /// Set the offset of the arbitrary waveform. This also changes the DC offset.
    pub fn set_arbitrary_offset(&mut self, offset: Voltage) -> Result<(), InstrumentError> {
        self.set(Attribute::ArbitraryOffset, Value::Float(offset.as_volts()))
    }

    /// Get the handle of the arbitrary waveform selected on this output.
    pub fn get_arbitrary_waveform(&mut self) -> Result<String, InstrumentError> {
        let val = self.get(Attribute::ArbitraryWaveform)?;
        val.as_text()
            .map(str::to_string)
            .ok_or_else(|| unexpected(&val))
    }

    /// Select an arbitrary waveform for this output.
    ///
    /// The handle must end in `.wfm` and be stored on the instrument, otherwise an
    /// [`InstrumentError::UnknownReference`] is returned.
    pub fn set_arbitrary_waveform(&mut self, handle: &str) -> Result<(), InstrumentError> {
        self.set(Attribute::ArbitraryWaveform, Value::from(handle))
    }

    /// Get the number of cycles per burst.
    pub fn get_burst_count(&mut self) -> Result<u32, InstrumentError> {
        let val = self.get(Attribute::BurstCount)?;
        val.as_int()
            .and_then(|count| u32::try_from(count).ok())
            .ok_or_else(|| unexpected(&val))
    }

    /// Set the number of cycles per burst, see [`BURST_COUNT_RANGE`].
    pub fn set_burst_count(&mut self, count: u32) -> Result<(), InstrumentError> {
        self.set(Attribute::BurstCount, Value::Int(i64::from(count)))
    }

    /// Upload an arbitrary waveform and select it on this output.
    ///
    /// See [`Dg1022::create_waveform`] for the arguments. Returns the handle of the waveform.
    pub fn create_waveform(
        &mut self,
        samples: &[f64],
        times: Option<&[f64]>,
    ) -> Result<String, InstrumentError> {
        let mut session = self.lock();
        let handle = session.create_waveform(samples, times)?;
        session.set(
            Attribute::ArbitraryWaveform,
            self.idx,
            Value::from(handle.as_str()),
        )?;
        Ok(handle)
    }

    fn get(&mut self, attr: Attribute) -> Result<Value, InstrumentError> {
        self.lock().get(attr, self.idx)
    }

    fn get_float(&mut self, attr: Attribute) -> Result<f64, InstrumentError> {
        let val = self.get(attr)?;
        val.as_float().ok_or_else(|| unexpected(&val))
    }

    fn set(&mut self, attr: Attribute, value: Value) -> Result<(), InstrumentError> {
        self.lock().set(attr, self.idx, value)
    }

    fn lock(&self) -> MutexGuard<'_, Session<T>> {
        self.session.lock().expect("Mutex should not be poisoned")
    }
}

impl<T: InstrumentInterface> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            idx: self.idx,
            session: self.session.clone(),
        }
    }
}

fn unexpected(value: &Value) -> InstrumentError {
    InstrumentError::ResponseParseError(value.to_string())
}
