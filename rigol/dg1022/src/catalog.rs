//! The waveform catalog, i.e., the list of arbitrary waveforms stored on the instrument.
//!
//! The catalog is never cached: every lookup asks the instrument again, since waveforms can be
//! stored or deleted from the front panel at any time.

use fgenrs::{InstrumentError, InstrumentInterface};
use tracing::debug;

/// Query that lists the stored waveforms.
pub const CATALOG_QUERY: &str = "DATA:CAT?";
/// File extension of waveform handles.
pub const HANDLE_EXTENSION: &str = "wfm";

const MAX_HANDLE_INDEX: u32 = 9999;

/// A waveform stored on the instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Lowercase name of the waveform, e.g., `w0001.wfm`.
    pub name: String,
    /// Kind of the record as reported by the instrument.
    pub kind: String,
    /// Size as reported by the instrument, if it could be read.
    pub size: Option<usize>,
}

/// Snapshot of the waveforms stored on the instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse the response to [`CATALOG_QUERY`].
    ///
    /// The response is a leading token followed by a space and comma separated, optionally quoted
    /// fields, e.g., `DATA:CAT "w0001.wfm","USER","2048"`. Every three fields form a record of
    /// name, kind, and size. Everything is lowercased; records with an empty name are dropped.
    pub fn from_response(response: &str) -> Self {
        let response = response.trim().to_lowercase();
        let fields = match response.split_once(' ') {
            Some((_, rest)) => rest
                .split(',')
                .map(|field| field.trim().trim_matches('"'))
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };

        let entries = fields
            .chunks(3)
            .filter(|record| !record[0].is_empty())
            .map(|record| CatalogEntry {
                name: record[0].to_string(),
                kind: record.get(1).map(|s| s.to_string()).unwrap_or_default(),
                size: record.get(2).and_then(|s| s.parse().ok()),
            })
            .collect();
        Catalog { entries }
    }

    /// Whether a waveform with the given lowercase name is stored.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// All stored waveforms.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Iterate over the names of all stored waveforms.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Number of stored waveforms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no waveform is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Name of the waveform handle with the given index.
pub(crate) fn handle_name(index: u32) -> String {
    format!("w{index:04}.{HANDLE_EXTENSION}")
}

/// Loads the catalog, hands out unused waveform names, and checks references against the
/// catalog.
///
/// In a simulated session no query is sent. The catalog then consists of the waveforms that were
/// uploaded during the session.
#[derive(Debug, Default)]
pub(crate) struct CatalogManager {
    next_index: u32,
    simulate: bool,
    simulated: Vec<CatalogEntry>,
}

impl CatalogManager {
    pub(crate) fn new(simulate: bool) -> Self {
        CatalogManager {
            simulate,
            ..Default::default()
        }
    }

    pub(crate) fn is_simulated(&self) -> bool {
        self.simulate
    }

    /// Query and parse the catalog.
    pub(crate) fn load<T: InstrumentInterface + ?Sized>(
        &self,
        intf: &mut T,
    ) -> Result<Catalog, InstrumentError> {
        if self.simulate {
            return Ok(Catalog {
                entries: self.simulated.clone(),
            });
        }
        let response = intf.query(CATALOG_QUERY)?;
        let catalog = Catalog::from_response(&response);
        debug!(entries = catalog.len(), "loaded waveform catalog");
        Ok(catalog)
    }

    /// Return the next `wNNNN.wfm` name that is not stored on the instrument.
    ///
    /// The counter only moves forward, so names handed out in one session are strictly
    /// increasing. The catalog is reloaded before every candidate.
    pub(crate) fn allocate_unique_name<T: InstrumentInterface + ?Sized>(
        &mut self,
        intf: &mut T,
    ) -> Result<String, InstrumentError> {
        loop {
            if self.next_index >= MAX_HANDLE_INDEX {
                return Err(InstrumentError::InstrumentStatus(
                    "No unused waveform handle left".to_string(),
                ));
            }
            let catalog = self.load(intf)?;
            self.next_index += 1;
            let candidate = handle_name(self.next_index);
            if !catalog.contains(&candidate) {
                debug!(handle = %candidate, "allocated waveform handle");
                return Ok(candidate);
            }
            debug!(handle = %candidate, "waveform handle in use, trying next");
        }
    }

    /// Check that `handle` names a waveform on the instrument and return its lowercase form.
    ///
    /// The extension is checked first, without any I/O.
    pub(crate) fn validate_reference<T: InstrumentInterface + ?Sized>(
        &self,
        intf: &mut T,
        handle: &str,
    ) -> Result<String, InstrumentError> {
        let handle = handle.trim().to_lowercase();
        match handle.rsplit_once('.') {
            Some((stem, HANDLE_EXTENSION)) if !stem.is_empty() => {}
            _ => return Err(InstrumentError::UnknownReference(handle)),
        }
        if !self.load(intf)?.contains(&handle) {
            return Err(InstrumentError::UnknownReference(handle));
        }
        Ok(handle)
    }

    /// Record an upload, which only has an effect in a simulated session.
    pub(crate) fn record_upload(&mut self, handle: &str, size: usize) {
        if self.simulate {
            self.simulated.push(CatalogEntry {
                name: handle.to_string(),
                kind: "user".to_string(),
                size: Some(size),
            });
        }
    }
}
