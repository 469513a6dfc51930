//! Declarative attributes: descriptors, values, and the registry that gets and sets them.
//!
//! A driver registers one [`AttributeDescriptor`] per setting of its instrument. The
//! [`PropertyRegistry`] then realizes get and set for all of them in the same way:
//!
//! - **get**: if the session is not simulated and the cached value is not valid, the query
//!   template is adapted to the channel, sent, the response is stripped of any channel echo and
//!   parsed, and the result is cached as valid. The cached value is returned.
//! - **set**: the value is formatted (which rejects unsupported values before any I/O), the set
//!   template is adapted to the channel and sent together with the formatted value, and the cache
//!   is updated.

use std::{collections::HashMap, fmt::Debug, fmt::Display, hash::Hash};

use tracing::{debug, warn};

use crate::{CacheStore, CommandAdapter, InstrumentError, InstrumentInterface};

/// The value of an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean, e.g., whether an output is enabled.
    Bool(bool),
    /// An integer, e.g., a burst count.
    Int(i64),
    /// A floating point number, e.g., a frequency in Hz.
    Float(f64),
    /// A string, e.g., a waveform name.
    Text(String),
}

impl Value {
    /// Get the boolean, if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the integer, if this is a [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the float, if this is a [`Value::Float`].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the string, if this is a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

/// How far the effect of writing an attribute reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheScope {
    /// Writing the attribute only changes the addressed channel.
    #[default]
    Channel,
    /// The attribute is exposed per channel, but the instrument shares it between all channels.
    /// Writing it invalidates the cached value on every channel.
    Device,
}

/// Parses the (channel adjusted) response of a query into a value.
pub type ParseFn = fn(&str) -> Result<Value, InstrumentError>;

/// Formats a value into the argument of a set command. Rejects values that are not supported.
pub type FormatFn = fn(&Value) -> Result<String, InstrumentError>;

/// Everything needed to get and set one attribute.
///
/// Descriptors are immutable once registered.
///
/// # Example
///
/// ```
/// use fgenrs::{AttributeDescriptor, InstrumentError, Value};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Attr {
///     Frequency,
/// }
///
/// fn parse(resp: &str) -> Result<Value, InstrumentError> {
///     resp.trim()
///         .parse::<f64>()
///         .map(Value::Float)
///         .map_err(|_| InstrumentError::ResponseParseError(resp.to_string()))
/// }
///
/// fn format(value: &Value) -> Result<String, InstrumentError> {
///     value
///         .as_float()
///         .map(|f| f.to_string())
///         .ok_or_else(|| InstrumentError::UnsupportedValue(value.to_string()))
/// }
///
/// let desc = AttributeDescriptor::new(Attr::Frequency, Some("FREQ?"), "FREQ", parse, format)
///     .indexed()
///     .device_wide()
///     .with_default(Value::Float(1e3));
/// assert!(desc.is_indexed());
/// ```
#[derive(Debug, Clone)]
pub struct AttributeDescriptor<K> {
    key: K,
    get_cmd: Option<&'static str>,
    set_cmd: &'static str,
    parse: ParseFn,
    format: FormatFn,
    indexed: bool,
    scope: CacheScope,
    linked: Vec<K>,
    default: Value,
}

impl<K: Copy> AttributeDescriptor<K> {
    /// Create a descriptor for a non-indexed attribute with channel scope.
    ///
    /// # Arguments
    /// * `key` - The identifier of the attribute.
    /// * `get_cmd` - The query template, e.g. `"VOLT?"`, or `None` for write-only attributes.
    /// * `set_cmd` - The set template, e.g. `"VOLT"`. The formatted value is appended after a
    ///   space.
    /// * `parse` - Turns a response into a value.
    /// * `format` - Turns a value into the argument of the set command.
    pub fn new(
        key: K,
        get_cmd: Option<&'static str>,
        set_cmd: &'static str,
        parse: ParseFn,
        format: FormatFn,
    ) -> Self {
        AttributeDescriptor {
            key,
            get_cmd,
            set_cmd,
            parse,
            format,
            indexed: false,
            scope: CacheScope::Channel,
            linked: Vec::new(),
            default: Value::Bool(false),
        }
    }

    /// Make the attribute indexed, i.e., present once per output channel.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Writing this attribute invalidates it on all channels.
    pub fn device_wide(mut self) -> Self {
        self.scope = CacheScope::Device;
        self
    }

    /// Attributes that are backed by the same instrument setting.
    ///
    /// Writing this attribute invalidates the linked ones with the same scope.
    pub fn linked(mut self, keys: &[K]) -> Self {
        self.linked = keys.to_vec();
        self
    }

    /// The value reported before anything was read or written, e.g., in simulation.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    /// The identifier of the attribute.
    pub fn key(&self) -> K {
        self.key
    }

    /// The query template, if the attribute can be read.
    pub fn get_cmd(&self) -> Option<&'static str> {
        self.get_cmd
    }

    /// The set template.
    pub fn set_cmd(&self) -> &'static str {
        self.set_cmd
    }

    /// Whether the attribute exists once per channel.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// The reach of a write to this attribute.
    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    /// The default value.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Format a value for the set command without sending anything.
    pub fn format(&self, value: &Value) -> Result<String, InstrumentError> {
        (self.format)(value)
    }

    /// Parse a response to the query command.
    pub fn parse(&self, response: &str) -> Result<Value, InstrumentError> {
        (self.parse)(response)
    }
}

/// A table of attribute descriptors together with their cache.
///
/// The registry owns no transport. Every get and set borrows the interface to talk through, so
/// the same registry can be used with a real instrument or a loopback interface. Access must be
/// serialized by the caller; drivers keep the registry and the interface behind one mutex.
#[derive(Debug)]
pub struct PropertyRegistry<K, A> {
    descriptors: HashMap<K, AttributeDescriptor<K>>,
    cache: CacheStore<K>,
    adapter: A,
    output_count: usize,
    simulate: bool,
}

impl<K, A> PropertyRegistry<K, A>
where
    K: Copy + Eq + Hash + Debug,
    A: CommandAdapter,
{
    /// Create an empty registry.
    ///
    /// # Arguments
    /// * `adapter` - Rewrites commands and responses for the addressed channel.
    /// * `output_count` - Number of output channels, i.e., cache slots of indexed attributes.
    pub fn new(adapter: A, output_count: usize) -> Self {
        PropertyRegistry {
            descriptors: HashMap::new(),
            cache: CacheStore::new(),
            adapter,
            output_count,
            simulate: false,
        }
    }

    /// Register an attribute and allocate its cache.
    ///
    /// Registering the same key twice is an error.
    pub fn register(&mut self, descriptor: AttributeDescriptor<K>) -> Result<(), InstrumentError> {
        let key = descriptor.key();
        if self.descriptors.contains_key(&key) {
            return Err(InstrumentError::InvalidArgument(format!(
                "Attribute {key:?} is already registered"
            )));
        }
        let slots = if descriptor.is_indexed() {
            self.output_count
        } else {
            1
        };
        self.cache.allocate(key, slots);
        self.descriptors.insert(key, descriptor);
        Ok(())
    }

    /// Get the descriptor of an attribute.
    pub fn descriptor(&self, key: K) -> Result<&AttributeDescriptor<K>, InstrumentError> {
        self.descriptors.get(&key).ok_or_else(|| {
            InstrumentError::InvalidArgument(format!("Attribute {key:?} is not registered"))
        })
    }

    /// The command adapter of this registry.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Read access to the cache.
    pub fn cache(&self) -> &CacheStore<K> {
        &self.cache
    }

    /// Number of output channels.
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// Whether the session is simulated, i.e., never talks to the instrument.
    pub fn is_simulated(&self) -> bool {
        self.simulate
    }

    /// Turn simulation on or off.
    pub fn set_simulate(&mut self, simulate: bool) {
        self.simulate = simulate;
    }

    /// Get the value of an attribute.
    ///
    /// The channel is ignored for non-indexed attributes.
    pub fn get<T: InstrumentInterface + ?Sized>(
        &mut self,
        intf: &mut T,
        key: K,
        channel: usize,
    ) -> Result<Value, InstrumentError> {
        let desc = self.descriptors.get(&key).ok_or_else(|| {
            InstrumentError::InvalidArgument(format!("Attribute {key:?} is not registered"))
        })?;
        let slot = resolve_slot(desc, channel, self.output_count)?;

        if !self.simulate && !self.cache.is_valid(key, slot) {
            match desc.get_cmd {
                Some(get_cmd) => {
                    let cmd = self.adapter.adapt_for_channel(get_cmd, slot);
                    debug!(attribute = ?key, slot, command = %cmd, "cache miss, querying");
                    let response = intf.query(&cmd)?;
                    let response = self.adapter.adjust_response(&response, slot);
                    let value = (desc.parse)(response)?;
                    self.cache.store(key, slot, value)?;
                }
                None if self.cache.value(key, slot).is_none() => {
                    return Err(InstrumentError::InvalidArgument(format!(
                        "Attribute {key:?} is write-only and was never set"
                    )));
                }
                None => {}
            }
        } else {
            debug!(attribute = ?key, slot, "returning cached value");
        }

        Ok(self
            .cache
            .value(key, slot)
            .cloned()
            .unwrap_or_else(|| desc.default.clone()))
    }

    /// Set the value of an attribute.
    ///
    /// The value is formatted first; unsupported values fail here without any I/O. Unless the
    /// session is simulated, the adapted set command is sent with the formatted value.
    ///
    /// The cache is updated and marked valid whether or not the write succeeded. A failed write
    /// is still reported to the caller, but the cache then holds the value that was requested,
    /// not necessarily the one on the instrument. Call [`PropertyRegistry::invalidate`] after a
    /// failed write to force the next get to query the instrument.
    ///
    /// For attributes with [`CacheScope::Device`], the attribute is invalidated on all channels
    /// before the written channel is stored. Linked attributes are invalidated with the same
    /// scope.
    pub fn set<T: InstrumentInterface + ?Sized>(
        &mut self,
        intf: &mut T,
        key: K,
        channel: usize,
        value: Value,
    ) -> Result<(), InstrumentError> {
        let desc = self.descriptors.get(&key).ok_or_else(|| {
            InstrumentError::InvalidArgument(format!("Attribute {key:?} is not registered"))
        })?;
        let slot = resolve_slot(desc, channel, self.output_count)?;
        let request = (desc.format)(&value)?;

        let result = if self.simulate {
            Ok(())
        } else {
            let cmd = self.adapter.adapt_for_channel(desc.set_cmd, slot);
            intf.sendcmd(&format!("{cmd} {request}"))
        };

        if desc.scope == CacheScope::Device {
            self.cache.invalidate_key(key);
        }
        for linked in &desc.linked {
            match (desc.scope, self.descriptors.get(linked)) {
                (CacheScope::Device, Some(_)) => self.cache.invalidate_key(*linked),
                (CacheScope::Channel, Some(other)) => {
                    let other_slot = if other.indexed { slot } else { 0 };
                    self.cache.invalidate(*linked, other_slot)?;
                }
                (_, None) => {}
            }
        }
        if let Err(e) = &result {
            warn!(attribute = ?key, slot, value = %value, error = %e, "write failed, caching value anyway");
        }
        self.cache.store(key, slot, value)?;

        result
    }

    /// Resolve `channel` to the cache slot of an attribute without any I/O.
    ///
    /// Indexed attributes fail with [`InstrumentError::ChannelIndexOutOfRange`] for channels
    /// outside `[0, output_count)`. All other attributes live in slot 0.
    pub fn resolve_channel(&self, key: K, channel: usize) -> Result<usize, InstrumentError> {
        resolve_slot(self.descriptor(key)?, channel, self.output_count)
    }

    /// Invalidate the cached value of an attribute on one channel.
    pub fn invalidate(&mut self, key: K, channel: usize) -> Result<(), InstrumentError> {
        let slot = self.resolve_channel(key, channel)?;
        self.cache.invalidate(key, slot)
    }

    /// Invalidate every cached value, e.g., after a reset of the instrument.
    pub fn invalidate_all(&mut self) {
        self.cache.invalidate_all();
    }
}

/// Resolve a channel to the cache slot of an attribute.
fn resolve_slot<K>(
    desc: &AttributeDescriptor<K>,
    channel: usize,
    output_count: usize,
) -> Result<usize, InstrumentError> {
    if !desc.indexed {
        return Ok(0);
    }
    if channel >= output_count {
        return Err(InstrumentError::ChannelIndexOutOfRange {
            idx: channel,
            nof_channels: output_count,
        });
    }
    Ok(channel)
}
