//! Encoding and upload of arbitrary waveforms.
//!
//! Samples are floats in [-1, 1] that are quantized to 12 bit codes and sent to the instrument
//! as a binary block of big-endian 16 bit words, preceded by the directives that describe the
//! encoding.

use fgenrs::{InstrumentError, InstrumentInterface};
use tracing::info;

use crate::{catalog::CatalogManager, utils::fmt_sci};

/// Resolution of the waveform memory in bits.
pub const BIT_RESOLUTION: u32 = 12;
/// Sample interval that is used if no time axis is given, in seconds.
pub const DEFAULT_SAMPLE_INTERVAL: f64 = 1e-7;

/// Full scale code, i.e., the code of a sample of `1.0`.
const CODE_FULL_SCALE: f64 = ((1 << BIT_RESOLUTION) - 2) as f64;
const CODE_MASK: u32 = 0x000f_ffff;

/// Prefix of the binary block that carries the samples.
const CURVE_PREFIX: &str = ":curve ";

/// Size constraints on arbitrary waveforms, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformLimits {
    /// The number of samples must be a multiple of this.
    pub quantum: usize,
    /// Minimum number of samples.
    pub size_min: usize,
    /// Maximum number of samples.
    pub size_max: usize,
}

impl Default for WaveformLimits {
    fn default() -> Self {
        WaveformLimits {
            quantum: 8,
            size_min: 8,
            size_max: 256 * 1024,
        }
    }
}

impl WaveformLimits {
    /// Check that `len` samples form a valid waveform.
    pub fn check(&self, len: usize) -> Result<(), InstrumentError> {
        let valid = self.quantum > 0
            && len > 0
            && len % self.quantum == 0
            && (self.size_min..=self.size_max).contains(&len);
        if !valid {
            return Err(InstrumentError::InvalidSize {
                len,
                quantum: self.quantum,
                min: self.size_min,
                max: self.size_max,
            });
        }
        Ok(())
    }
}

/// Quantize one sample to its 12 bit code.
///
/// Samples outside of [-1, 1] are clamped. `-1.0` maps to 0 and `1.0` to 4094.
pub fn quantize(sample: f64) -> u16 {
    let normalized = (sample.clamp(-1.0, 1.0) + 1.0) / 2.0;
    let code = (normalized * CODE_FULL_SCALE + 0.5).floor() as u32 & CODE_MASK;
    code as u16
}

/// Quantize all samples and serialize them as big-endian 16 bit words.
pub fn encode(samples: &[f64]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| quantize(sample).to_be_bytes())
        .collect()
}

/// Sample interval of a time axis: the root mean square of the steps between consecutive times.
pub fn sample_interval(times: &[f64]) -> f64 {
    let steps = times.windows(2).map(|w| w[1] - w[0]);
    let count = times.len().saturating_sub(1);
    if count == 0 {
        return DEFAULT_SAMPLE_INTERVAL;
    }
    let sum_sq: f64 = steps.map(|step| step * step).sum();
    (sum_sq / count as f64).sqrt()
}

/// Creates arbitrary waveforms on the instrument.
#[derive(Debug, Default, Clone)]
pub(crate) struct WaveformEncoder {
    limits: WaveformLimits,
}

impl WaveformEncoder {
    pub(crate) fn new(limits: WaveformLimits) -> Self {
        WaveformEncoder { limits }
    }

    pub(crate) fn limits(&self) -> WaveformLimits {
        self.limits
    }

    /// Validate, encode, and upload a waveform under a newly allocated name.
    ///
    /// Everything is validated before any I/O. Returns the handle the waveform is stored as.
    pub(crate) fn create<T: InstrumentInterface + ?Sized>(
        &self,
        intf: &mut T,
        catalog: &mut CatalogManager,
        samples: &[f64],
        times: Option<&[f64]>,
    ) -> Result<String, InstrumentError> {
        self.limits.check(samples.len())?;
        if samples.iter().any(|s| s.is_nan()) {
            return Err(InstrumentError::InvalidArgument(
                "Waveform samples must not be NaN".to_string(),
            ));
        }
        let interval = match times {
            Some(times) if times.len() != samples.len() => {
                return Err(InstrumentError::InvalidArgument(format!(
                    "Time axis has {} points, but there are {} samples",
                    times.len(),
                    samples.len()
                )));
            }
            Some(times) if times.iter().any(|t| !t.is_finite()) => {
                return Err(InstrumentError::InvalidArgument(
                    "Time axis must only contain finite values".to_string(),
                ));
            }
            Some(times) => sample_interval(times),
            None => DEFAULT_SAMPLE_INTERVAL,
        };
        if interval <= 0.0 {
            return Err(InstrumentError::InvalidArgument(
                "Time axis must advance between samples".to_string(),
            ));
        }
        let payload = encode(samples);

        let handle = catalog.allocate_unique_name(intf)?;
        if !catalog.is_simulated() {
            for directive in directives(&handle, interval) {
                intf.sendcmd(&directive)?;
            }
            intf.write_block(CURVE_PREFIX, &payload)?;
        }
        catalog.record_upload(&handle, samples.len());
        info!(handle = %handle, samples = samples.len(), interval, "uploaded waveform");
        Ok(handle)
    }
}

/// The commands that select the destination and describe the encoding of the upload.
fn directives(handle: &str, interval: f64) -> Vec<String> {
    let ymult = 2.0 / f64::from(1u32 << BIT_RESOLUTION);
    vec![
        format!(":data:destination \"{handle}\""),
        format!(":wfmpre:bit_nr {BIT_RESOLUTION}"),
        ":wfmpre:bn_fmt rp".to_string(),
        ":wfmpre:byt_nr 2".to_string(),
        ":wfmpre:byt_or msb".to_string(),
        ":wfmpre:encdg bin".to_string(),
        ":wfmpre:pt_fmt y".to_string(),
        ":wfmpre:yzero 0".to_string(),
        format!(":wfmpre:ymult {}", fmt_sci(ymult)),
        format!(":wfmpre:xincr {}", fmt_sci(interval)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::*;

    #[rstest]
    #[case(-1.0, 0)]
    #[case(-0.5, 1024)]
    #[case(0.0, 2047)]
    #[case(0.5, 3071)]
    #[case(1.0, 4094)]
    #[case(0.75, 3582)]
    #[case(-0.75, 512)]
    #[case(-3.0, 0)]
    #[case(2.0, 4094)]
    fn test_quantize(#[case] sample: f64, #[case] code: u16) {
        assert_eq!(quantize(sample), code);
    }

    #[test]
    fn test_quantize_monotonic() {
        let codes: Vec<u16> = (-100..=100).map(|i| quantize(f64::from(i) / 100.0)).collect();
        assert!(codes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_encode_big_endian() {
        assert_eq!(encode(&[1.0, -0.5]), vec![0x0f, 0xfe, 0x04, 0x00]);
    }

    #[rstest]
    #[case(8, true)]
    #[case(16, true)]
    #[case(256 * 1024, true)]
    #[case(0, false)]
    #[case(7, false)]
    #[case(12, false)]
    #[case(256 * 1024 + 8, false)]
    fn test_limits(#[case] len: usize, #[case] ok: bool) {
        assert_eq!(WaveformLimits::default().check(len).is_ok(), ok);
    }

    #[test]
    fn test_limits_zero_quantum() {
        let limits = WaveformLimits {
            quantum: 0,
            ..Default::default()
        };
        assert!(matches!(
            limits.check(8),
            Err(InstrumentError::InvalidSize { quantum: 0, .. })
        ));
    }

    #[test]
    fn test_sample_interval() {
        let times: Vec<f64> = (0..8).map(|i| f64::from(i) * 1e-3).collect();
        assert!((sample_interval(&times) - 1e-3).abs() < 1e-12);
        assert_eq!(sample_interval(&[0.0]), DEFAULT_SAMPLE_INTERVAL);
        // rms of steps 1 and 3
        assert!((sample_interval(&[0.0, 1.0, 4.0]) - 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_directives() {
        let dirs = directives("w0001.wfm", DEFAULT_SAMPLE_INTERVAL);
        assert_eq!(dirs.first().unwrap(), ":data:destination \"w0001.wfm\"");
        assert_eq!(dirs[8], ":wfmpre:ymult 4.882812e-04");
        assert_eq!(dirs[9], ":wfmpre:xincr 1.000000e-07");
    }
}
