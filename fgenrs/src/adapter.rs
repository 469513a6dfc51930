//! Rewriting of channel agnostic commands for a specific output channel.

/// Adapts command templates and responses to the channel they address.
///
/// Attribute descriptors hold commands as if the instrument had a single output, e.g. `"VOLT?"`.
/// A `CommandAdapter` turns such a template into the command for a given zero-indexed channel
/// and undoes any channel echo the instrument puts in front of its responses.
///
/// The default implementations leave commands and responses untouched, which is correct for
/// instruments with a single output.
pub trait CommandAdapter {
    /// Build the command that applies `template` to `channel`.
    fn adapt_for_channel(&self, template: &str, _channel: usize) -> String {
        template.to_string()
    }

    /// Remove channel related decorations from a response to a query on `channel`.
    fn adjust_response<'a>(&self, response: &'a str, _channel: usize) -> &'a str {
        response
    }
}

/// A [`CommandAdapter`] that leaves everything as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughAdapter;

impl CommandAdapter for PassThroughAdapter {}
