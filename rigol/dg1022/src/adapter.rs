//! Channel addressing of DG1022 commands.
//!
//! The first output is addressed by the plain command. Every other output is addressed by adding
//! `:CH<n>` to the command, where `n` is the one-based channel number: before the question mark
//! of a query, at the end of anything else. Queries on other channels are answered with the
//! channel echoed in front of the value, e.g. `CH2:ON`.

use fgenrs::CommandAdapter;

/// [`CommandAdapter`] for Rigol DG1000 series channel addressing.
#[derive(Debug, Default, Clone, Copy)]
pub struct RigolChannelAdapter;

impl CommandAdapter for RigolChannelAdapter {
    fn adapt_for_channel(&self, template: &str, channel: usize) -> String {
        if channel == 0 {
            return template.to_string();
        }
        let suffix = format!(":CH{}", channel + 1);
        match template.find('?') {
            Some(pos) => format!("{}{suffix}{}", &template[..pos], &template[pos..]),
            None => format!("{template}{suffix}"),
        }
    }

    fn adjust_response<'a>(&self, response: &'a str, channel: usize) -> &'a str {
        let prefix = format!("CH{}:", channel + 1);
        response.strip_prefix(prefix.as_str()).unwrap_or(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_channel_unchanged() {
        let adapter = RigolChannelAdapter;
        for template in ["VOLT?", "VOLT", "FUNC:SQU:DCYC?", "", "?"] {
            assert_eq!(adapter.adapt_for_channel(template, 0), template);
        }
    }

    #[test]
    fn test_query_gets_channel_before_marker() {
        let adapter = RigolChannelAdapter;
        assert_eq!(adapter.adapt_for_channel("VOLT?", 1), "VOLT:CH2?");
        assert_eq!(adapter.adapt_for_channel("VOLT:OFFS?", 1), "VOLT:OFFS:CH2?");
        // only the first marker is used
        assert_eq!(adapter.adapt_for_channel("A?B?", 1), "A:CH2?B?");
    }

    #[test]
    fn test_set_gets_channel_appended() {
        let adapter = RigolChannelAdapter;
        assert_eq!(adapter.adapt_for_channel("OUTP", 1), "OUTP:CH2");
        assert_eq!(adapter.adapt_for_channel("BURS:NCYC", 2), "BURS:NCYC:CH3");
    }

    #[test]
    fn test_adjust_response() {
        let adapter = RigolChannelAdapter;
        assert_eq!(adapter.adjust_response("CH2:ON", 1), "ON");
        assert_eq!(adapter.adjust_response("CH1:5.0", 0), "5.0");
        // other channels and plain responses are left alone
        assert_eq!(adapter.adjust_response("CH2:ON", 0), "CH2:ON");
        assert_eq!(adapter.adjust_response("ON", 1), "ON");
        assert_eq!(adapter.adjust_response("XCH2:ON", 1), "XCH2:ON");
    }
}
