//! Utilities for the driver that are used in multiple places.

/// Format a float in scientific notation with six decimals and an at least two digit exponent
/// with sign, e.g. `1.000000e+03`.
///
/// This is the notation the DG1022 documentation uses for numeric arguments.
pub(crate) fn fmt_sci(value: f64) -> String {
    let formatted = format!("{value:.6e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}
