//! Attribute table of the DG1022 and the conversions between values and command arguments.

use std::{fmt::Display, str::FromStr};

use fgenrs::{AttributeDescriptor, InstrumentError, Value};

use crate::utils::fmt_sci;

/// All settings of the DG1022 that are read and written through the attribute cache.
///
/// Most attributes exist once per output channel. [`Attribute::Frequency`] is shared by the
/// outputs: setting it on one channel invalidates it on all of them. The output mode, the
/// reference clock source, and the arbitrary sample rate exist once for the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Output on or off.
    OutputEnabled,
    /// Load impedance the output is calibrated for, in ohm.
    OutputImpedance,
    /// The standard waveform, see [`StandardWaveform`].
    Waveform,
    /// Frequency in Hz.
    Frequency,
    /// Amplitude in volts, peak to peak.
    Amplitude,
    /// DC offset in volts.
    DcOffset,
    /// Duty cycle of the square wave in percent.
    DutyCycle,
    /// Start phase in degrees.
    StartPhase,
    /// Gain of the arbitrary waveform. Shares its command with [`Attribute::Amplitude`].
    ArbitraryGain,
    /// Offset of the arbitrary waveform. Shares its command with [`Attribute::DcOffset`].
    ArbitraryOffset,
    /// Handle of the arbitrary waveform that is played on the output.
    ArbitraryWaveform,
    /// Number of cycles per burst.
    BurstCount,
    /// Whether the instrument plays standard or arbitrary waveforms, see [`GeneratorMode`].
    /// Writing it invalidates all cached values.
    OutputMode,
    /// Source of the reference clock, see [`ClockSource`]. Write-only. Writing it invalidates
    /// all cached values.
    ReferenceClockSource,
    /// Sample rate of arbitrary waveforms in Hz. It is written through the frequency command.
    ArbitrarySampleRate,
}

/// Operating mode of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Standard waveforms.
    Function,
    /// Arbitrary waveforms.
    Arbitrary,
}

impl GeneratorMode {
    /// Name of the mode as used by this driver.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorMode::Function => "function",
            GeneratorMode::Arbitrary => "arbitrary",
        }
    }
}

impl FromStr for GeneratorMode {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "function" => Ok(GeneratorMode::Function),
            "arbitrary" => Ok(GeneratorMode::Arbitrary),
            _ => Err(InstrumentError::UnsupportedValue(format!(
                "{s} is not an output mode"
            ))),
        }
    }
}

impl Display for GeneratorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the reference clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// The internal oscillator.
    Internal,
    /// The clock input on the rear panel.
    External,
}

impl ClockSource {
    /// Name of the source, which is also its command argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClockSource::Internal => "internal",
            ClockSource::External => "external",
        }
    }
}

impl FromStr for ClockSource {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "internal" => Ok(ClockSource::Internal),
            "external" => Ok(ClockSource::External),
            _ => Err(InstrumentError::UnsupportedValue(format!(
                "{s} is not a clock source"
            ))),
        }
    }
}

impl Display for ClockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard waveforms the DG1022 can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardWaveform {
    /// Sine wave.
    Sine,
    /// Square wave.
    Square,
    /// Triangle wave. The instrument has no separate triangle and plays a ramp.
    Triangle,
    /// Ramp.
    Ramp,
    /// Pulse.
    Pulse,
    /// Noise.
    Noise,
    /// Constant DC level.
    Dc,
    /// User defined, i.e., the arbitrary waveform selected on the channel.
    User,
}

impl StandardWaveform {
    /// Name of the waveform as used by this driver.
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardWaveform::Sine => "sine",
            StandardWaveform::Square => "square",
            StandardWaveform::Triangle => "triangle",
            StandardWaveform::Ramp => "ramp",
            StandardWaveform::Pulse => "pulse",
            StandardWaveform::Noise => "noise",
            StandardWaveform::Dc => "dc",
            StandardWaveform::User => "user",
        }
    }

    fn to_cmd_str(self) -> &'static str {
        match self {
            StandardWaveform::Sine => "SIN",
            StandardWaveform::Square => "SQU",
            StandardWaveform::Triangle | StandardWaveform::Ramp => "RAMP",
            StandardWaveform::Pulse => "PULS",
            StandardWaveform::Noise => "NOIS",
            StandardWaveform::Dc => "DC",
            StandardWaveform::User => "USER",
        }
    }

    /// Parse the waveform from an instrument response. Long and short forms are accepted.
    fn from_cmd_str(response: &str) -> Result<Self, InstrumentError> {
        let resp = response.trim().to_uppercase();
        let wf = if resp.starts_with("SIN") {
            StandardWaveform::Sine
        } else if resp.starts_with("SQU") {
            StandardWaveform::Square
        } else if resp.starts_with("RAMP") {
            StandardWaveform::Ramp
        } else if resp.starts_with("PULS") {
            StandardWaveform::Pulse
        } else if resp.starts_with("NOIS") {
            StandardWaveform::Noise
        } else if resp.starts_with("DC") {
            StandardWaveform::Dc
        } else if resp.starts_with("USER") {
            StandardWaveform::User
        } else {
            return Err(InstrumentError::ResponseParseError(response.to_string()));
        };
        Ok(wf)
    }
}

impl FromStr for StandardWaveform {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sine" => Ok(StandardWaveform::Sine),
            "square" => Ok(StandardWaveform::Square),
            "triangle" => Ok(StandardWaveform::Triangle),
            "ramp" => Ok(StandardWaveform::Ramp),
            "pulse" => Ok(StandardWaveform::Pulse),
            "noise" => Ok(StandardWaveform::Noise),
            "dc" => Ok(StandardWaveform::Dc),
            "user" => Ok(StandardWaveform::User),
            _ => Err(InstrumentError::UnsupportedValue(format!(
                "{s} is not a standard waveform"
            ))),
        }
    }
}

impl Display for StandardWaveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Range of the output impedance in ohm. Infinity selects high impedance.
pub const IMPEDANCE_RANGE: (f64, f64) = (1.0, 10_000.0);
/// Range of the square wave duty cycle in percent.
pub const DUTY_CYCLE_RANGE: (f64, f64) = (20.0, 80.0);
/// Range of the start phase in degrees.
pub const START_PHASE_RANGE: (f64, f64) = (-180.0, 180.0);
/// Range of the cycles per burst.
pub const BURST_COUNT_RANGE: (i64, i64) = (1, 50_000);

/// Attributes whose cache depends on the operating state of the instrument.
const STATE_DEPENDENT: [Attribute; 13] = [
    Attribute::OutputEnabled,
    Attribute::OutputImpedance,
    Attribute::Waveform,
    Attribute::Frequency,
    Attribute::Amplitude,
    Attribute::DcOffset,
    Attribute::DutyCycle,
    Attribute::StartPhase,
    Attribute::ArbitraryGain,
    Attribute::ArbitraryOffset,
    Attribute::ArbitraryWaveform,
    Attribute::BurstCount,
    Attribute::ArbitrarySampleRate,
];

fn state_dependent_and(other: Attribute) -> Vec<Attribute> {
    STATE_DEPENDENT.iter().copied().chain([other]).collect()
}

/// The attribute table of the DG1022.
pub(crate) fn descriptors() -> Vec<AttributeDescriptor<Attribute>> {
    use Attribute::*;
    vec![
        AttributeDescriptor::new(OutputEnabled, Some("OUTP?"), "OUTP", parse_bool, format_bool)
            .indexed(),
        AttributeDescriptor::new(
            OutputImpedance,
            Some("OUTP:LOAD?"),
            "OUTP:LOAD",
            parse_impedance,
            format_impedance,
        )
        .indexed()
        .with_default(Value::Float(f64::INFINITY)),
        AttributeDescriptor::new(Waveform, Some("FUNC?"), "FUNC", parse_waveform, format_waveform)
            .indexed()
            .with_default(Value::from("sine")),
        AttributeDescriptor::new(Frequency, Some("FREQ?"), "FREQ", parse_float, format_float)
            .indexed()
            .device_wide()
            .linked(&[ArbitrarySampleRate])
            .with_default(Value::Float(1e3)),
        AttributeDescriptor::new(Amplitude, Some("VOLT?"), "VOLT", parse_float, format_float)
            .indexed()
            .linked(&[ArbitraryGain])
            .with_default(Value::Float(5.0)),
        AttributeDescriptor::new(
            DcOffset,
            Some("VOLT:OFFS?"),
            "VOLT:OFFS",
            parse_float,
            format_float,
        )
        .indexed()
        .linked(&[ArbitraryOffset])
        .with_default(Value::Float(0.0)),
        AttributeDescriptor::new(
            DutyCycle,
            Some("FUNC:SQU:DCYC?"),
            "FUNC:SQU:DCYC",
            parse_float,
            format_duty_cycle,
        )
        .indexed()
        .with_default(Value::Float(50.0)),
        AttributeDescriptor::new(StartPhase, Some("PHAS?"), "PHAS", parse_float, format_phase)
            .indexed()
            .with_default(Value::Float(0.0)),
        AttributeDescriptor::new(ArbitraryGain, Some("VOLT?"), "VOLT", parse_float, format_float)
            .indexed()
            .linked(&[Amplitude])
            .with_default(Value::Float(5.0)),
        AttributeDescriptor::new(
            ArbitraryOffset,
            Some("VOLT:OFFS?"),
            "VOLT:OFFS",
            parse_float,
            format_float,
        )
        .indexed()
        .linked(&[DcOffset])
        .with_default(Value::Float(0.0)),
        AttributeDescriptor::new(
            ArbitraryWaveform,
            Some("FUNC:USER?"),
            "FUNC:USER",
            parse_handle,
            format_handle,
        )
        .indexed()
        .with_default(Value::from("")),
        AttributeDescriptor::new(
            BurstCount,
            Some("BURS:NCYC?"),
            "BURS:NCYC",
            parse_int,
            format_burst_count,
        )
        .indexed()
        .with_default(Value::Int(1)),
        AttributeDescriptor::new(
            OutputMode,
            Some(":fg:state?"),
            ":fg:state",
            parse_output_mode,
            format_output_mode,
        )
        .device_wide()
        .linked(&state_dependent_and(ReferenceClockSource))
        .with_default(Value::from(GeneratorMode::Function.as_str())),
        AttributeDescriptor::new(
            ReferenceClockSource,
            None,
            ":clock:source",
            parse_clock_source,
            format_clock_source,
        )
        .device_wide()
        .linked(&state_dependent_and(OutputMode))
        .with_default(Value::from(ClockSource::Internal.as_str())),
        AttributeDescriptor::new(
            ArbitrarySampleRate,
            Some(":clock:frequency?"),
            "FREQ",
            parse_sample_rate,
            format_float,
        )
        .device_wide()
        .linked(&[Frequency])
        .with_default(Value::Float(1e3)),
    ]
}

fn parse_bool(response: &str) -> Result<Value, InstrumentError> {
    match response.trim().to_uppercase().as_str() {
        "ON" | "1" => Ok(Value::Bool(true)),
        "OFF" | "0" => Ok(Value::Bool(false)),
        _ => Err(InstrumentError::ResponseParseError(response.to_string())),
    }
}

fn format_bool(value: &Value) -> Result<String, InstrumentError> {
    match value.as_bool() {
        Some(true) => Ok("ON".to_string()),
        Some(false) => Ok("OFF".to_string()),
        None => Err(unsupported(value)),
    }
}

fn parse_float(response: &str) -> Result<Value, InstrumentError> {
    response
        .trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| InstrumentError::ResponseParseError(response.to_string()))
}

fn format_float(value: &Value) -> Result<String, InstrumentError> {
    match value.as_float() {
        Some(val) if val.is_finite() => Ok(fmt_sci(val)),
        _ => Err(unsupported(value)),
    }
}

fn parse_int(response: &str) -> Result<Value, InstrumentError> {
    let resp = response.trim();
    if let Ok(val) = resp.parse::<i64>() {
        return Ok(Value::Int(val));
    }
    // the instrument may answer in scientific notation
    match resp.parse::<f64>() {
        Ok(val) if val.fract() == 0.0 => Ok(Value::Int(val as i64)),
        _ => Err(InstrumentError::ResponseParseError(response.to_string())),
    }
}

fn parse_impedance(response: &str) -> Result<Value, InstrumentError> {
    let resp = response.trim().to_uppercase();
    if resp.starts_with("INF") {
        Ok(Value::Float(f64::INFINITY))
    } else {
        parse_float(response)
    }
}

fn format_impedance(value: &Value) -> Result<String, InstrumentError> {
    match value.as_float() {
        Some(val) if val == f64::INFINITY => Ok("INF".to_string()),
        Some(val) => {
            check_float_range(val, IMPEDANCE_RANGE)?;
            Ok(fmt_sci(val))
        }
        None => Err(unsupported(value)),
    }
}

fn format_duty_cycle(value: &Value) -> Result<String, InstrumentError> {
    let val = value.as_float().ok_or_else(|| unsupported(value))?;
    check_float_range(val, DUTY_CYCLE_RANGE)?;
    Ok(fmt_sci(val))
}

fn format_phase(value: &Value) -> Result<String, InstrumentError> {
    let val = value.as_float().ok_or_else(|| unsupported(value))?;
    check_float_range(val, START_PHASE_RANGE)?;
    Ok(fmt_sci(val))
}

fn format_burst_count(value: &Value) -> Result<String, InstrumentError> {
    let val = value.as_int().ok_or_else(|| unsupported(value))?;
    let (min, max) = BURST_COUNT_RANGE;
    if !(min..=max).contains(&val) {
        return Err(InstrumentError::IntValueOutOfRange { value: val, min, max });
    }
    Ok(val.to_string())
}

/// Drop the header some responses start with, e.g., `FG:STAT 1`.
fn strip_header(response: &str) -> &str {
    let resp = response.trim();
    resp.split_once(' ').map_or(resp, |(_, value)| value.trim())
}

fn parse_output_mode(response: &str) -> Result<Value, InstrumentError> {
    let mode = match parse_int(strip_header(response))?.as_int() {
        Some(0) => GeneratorMode::Arbitrary,
        Some(_) => GeneratorMode::Function,
        None => return Err(InstrumentError::ResponseParseError(response.to_string())),
    };
    Ok(Value::from(mode.as_str()))
}

fn format_output_mode(value: &Value) -> Result<String, InstrumentError> {
    let name = value.as_text().ok_or_else(|| unsupported(value))?;
    match name.parse::<GeneratorMode>()? {
        GeneratorMode::Function => Ok("1".to_string()),
        GeneratorMode::Arbitrary => Ok("0".to_string()),
    }
}

fn parse_clock_source(response: &str) -> Result<Value, InstrumentError> {
    let source = strip_header(response)
        .parse::<ClockSource>()
        .map_err(|_| InstrumentError::ResponseParseError(response.to_string()))?;
    Ok(Value::from(source.as_str()))
}

fn format_clock_source(value: &Value) -> Result<String, InstrumentError> {
    let name = value.as_text().ok_or_else(|| unsupported(value))?;
    Ok(name.parse::<ClockSource>()?.as_str().to_string())
}

fn parse_sample_rate(response: &str) -> Result<Value, InstrumentError> {
    parse_float(strip_header(response))
        .map_err(|_| InstrumentError::ResponseParseError(response.to_string()))
}

fn parse_waveform(response: &str) -> Result<Value, InstrumentError> {
    StandardWaveform::from_cmd_str(response).map(|wf| Value::from(wf.as_str()))
}

fn format_waveform(value: &Value) -> Result<String, InstrumentError> {
    let name = value.as_text().ok_or_else(|| unsupported(value))?;
    Ok(name.parse::<StandardWaveform>()?.to_cmd_str().to_string())
}

fn parse_handle(response: &str) -> Result<Value, InstrumentError> {
    Ok(Value::Text(response.trim().trim_matches('"').to_lowercase()))
}

fn format_handle(value: &Value) -> Result<String, InstrumentError> {
    match value.as_text() {
        Some(handle) if !handle.is_empty() => Ok(format!("\"{handle}\"")),
        _ => Err(unsupported(value)),
    }
}

fn check_float_range(value: f64, (min, max): (f64, f64)) -> Result<(), InstrumentError> {
    if value.is_nan() || value < min || value > max {
        return Err(InstrumentError::FloatValueOutOfRange { value, min, max });
    }
    Ok(())
}

fn unsupported(value: &Value) -> InstrumentError {
    InstrumentError::UnsupportedValue(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::*;

    #[rstest]
    #[case("sine", "SIN")]
    #[case("square", "SQU")]
    #[case("triangle", "RAMP")]
    #[case("ramp", "RAMP")]
    #[case("pulse", "PULS")]
    #[case("noise", "NOIS")]
    #[case("dc", "DC")]
    #[case("user", "USER")]
    fn test_format_waveform(#[case] name: &str, #[case] cmd: &str) {
        assert_eq!(format_waveform(&Value::from(name)).unwrap(), cmd);
    }

    #[rstest]
    #[case("SIN", "sine")]
    #[case("SINUSOID", "sine")]
    #[case("squ", "square")]
    #[case("RAMP", "ramp")]
    #[case("PULSE", "pulse")]
    #[case("NOISE", "noise")]
    #[case("DC", "dc")]
    #[case("USER\n", "user")]
    fn test_parse_waveform(#[case] response: &str, #[case] name: &str) {
        assert_eq!(parse_waveform(response).unwrap(), Value::from(name));
    }

    #[test]
    fn test_waveform_unknown() {
        assert!(matches!(
            format_waveform(&Value::from("sawtooth")),
            Err(InstrumentError::UnsupportedValue(_))
        ));
        assert!(matches!(
            parse_waveform("HARM"),
            Err(InstrumentError::ResponseParseError(_))
        ));
    }

    #[rstest]
    #[case("ON", true)]
    #[case("off", false)]
    #[case("1", true)]
    #[case("0", false)]
    fn test_parse_bool(#[case] response: &str, #[case] exp: bool) {
        assert_eq!(parse_bool(response).unwrap(), Value::Bool(exp));
    }

    #[test]
    fn test_impedance() {
        assert_eq!(
            format_impedance(&Value::Float(f64::INFINITY)).unwrap(),
            "INF"
        );
        assert_eq!(format_impedance(&Value::Float(50.0)).unwrap(), "5.000000e+01");
        assert!(matches!(
            format_impedance(&Value::Float(0.5)),
            Err(InstrumentError::FloatValueOutOfRange { .. })
        ));
        assert_eq!(
            parse_impedance("INFINITY").unwrap(),
            Value::Float(f64::INFINITY)
        );
        assert_eq!(parse_impedance("5.000000E+01").unwrap(), Value::Float(50.0));
    }

    #[rstest]
    #[case(19.9)]
    #[case(80.1)]
    #[case(f64::NAN)]
    fn test_duty_cycle_out_of_range(#[case] val: f64) {
        assert!(matches!(
            format_duty_cycle(&Value::Float(val)),
            Err(InstrumentError::FloatValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_burst_count() {
        assert_eq!(format_burst_count(&Value::Int(50_000)).unwrap(), "50000");
        assert!(matches!(
            format_burst_count(&Value::Int(0)),
            Err(InstrumentError::IntValueOutOfRange { min: 1, .. })
        ));
        assert_eq!(parse_int("1.000000E+01").unwrap(), Value::Int(10));
        assert!(parse_int("1.5").is_err());
    }

    #[test]
    fn test_handle() {
        assert_eq!(
            parse_handle("\"W0001.WFM\"").unwrap(),
            Value::from("w0001.wfm")
        );
        assert_eq!(
            format_handle(&Value::from("w0001.wfm")).unwrap(),
            "\"w0001.wfm\""
        );
        assert!(format_handle(&Value::from("")).is_err());
    }

    #[rstest]
    #[case("FG:STAT 1", "function")]
    #[case("FG:STAT 0", "arbitrary")]
    #[case("1\n", "function")]
    fn test_parse_output_mode(#[case] response: &str, #[case] name: &str) {
        assert_eq!(parse_output_mode(response).unwrap(), Value::from(name));
    }

    #[test]
    fn test_output_mode() {
        assert_eq!(format_output_mode(&Value::from("function")).unwrap(), "1");
        assert_eq!(format_output_mode(&Value::from("Arbitrary")).unwrap(), "0");
        assert!(matches!(
            format_output_mode(&Value::from("sweep")),
            Err(InstrumentError::UnsupportedValue(_))
        ));
        assert!(parse_output_mode("FG:STAT ON").is_err());
    }

    #[test]
    fn test_clock_source() {
        assert_eq!(
            format_clock_source(&Value::from("EXTERNAL")).unwrap(),
            "external"
        );
        assert!(format_clock_source(&Value::from("pll")).is_err());
        assert!(format_clock_source(&Value::Float(1.0)).is_err());
        assert_eq!(
            parse_clock_source("CLOCK:SOUR INTERNAL").unwrap(),
            Value::from("internal")
        );
    }

    #[rstest]
    #[case("CLOCK:FREQ 1.000000E+06", 1e6)]
    #[case("2.5e3", 2.5e3)]
    fn test_parse_sample_rate(#[case] response: &str, #[case] rate: f64) {
        assert_eq!(parse_sample_rate(response).unwrap(), Value::Float(rate));
    }

    #[test]
    fn test_table_unique_keys() {
        let table = descriptors();
        for (i, desc) in table.iter().enumerate() {
            assert!(table[i + 1..].iter().all(|other| other.key() != desc.key()));
        }
        assert_eq!(table.len(), 15);
    }

    #[test]
    fn test_device_wide_attributes_not_indexed() {
        let table = descriptors();
        for key in [
            Attribute::OutputMode,
            Attribute::ReferenceClockSource,
            Attribute::ArbitrarySampleRate,
        ] {
            let desc = table.iter().find(|desc| desc.key() == key).unwrap();
            assert!(!desc.is_indexed());
        }
    }
}
