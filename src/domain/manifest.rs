//! JAR manifest model and its byte-stable text form.
//!
//! Attribute order inside a section is preserved. Entry sections are kept in a
//! sorted map so serialization never depends on insertion or filesystem order.

use std::collections::BTreeMap;

use crate::domain::constants::{MANIFEST_LINE_WIDTH, MANIFEST_VERSION, MANIFEST_VERSION_KEY, NAME_KEY};
use crate::infra::error::{SigningError, SigningResult};

/// Ordered attribute list with ASCII case-insensitive key lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pairs: Vec<(String, String)>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Set `key`, replacing an existing value in place or appending.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self
            .pairs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            slot.1 = value;
        } else {
            self.pairs.push((key.to_string(), value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self
            .pairs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.pairs.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Main attributes plus one attribute section per entry path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    main: Attributes,
    entries: BTreeMap<String, Attributes>,
}

impl Default for Manifest {
    fn default() -> Self {
        let mut main = Attributes::new();
        main.set(MANIFEST_VERSION_KEY, MANIFEST_VERSION);
        Self {
            main,
            entries: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// Empty manifest carrying only `Manifest-Version: 1.0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    pub fn main_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&Attributes> {
        self.entries.get(path)
    }

    /// Section for `path`, created empty when absent.
    pub fn entry_mut(&mut self, path: &str) -> &mut Attributes {
        self.entries.entry(path.to_string()).or_default()
    }

    pub fn remove_entry(&mut self, path: &str) -> Option<Attributes> {
        self.entries.remove(path)
    }

    /// Entry sections in sorted path order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Parse manifest text. Accepts LF or CRLF line endings and joins continuation lines.
    pub fn parse(bytes: &[u8]) -> SigningResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            SigningError::MalformedArchive(format!("Manifest is not valid UTF-8: {e}"))
        })?;

        let mut sections: Vec<Vec<(String, String)>> = vec![Vec::new()];
        let mut pending: Option<String> = None;

        let flush = |pending: &mut Option<String>,
                     sections: &mut Vec<Vec<(String, String)>>|
         -> SigningResult<()> {
            if let Some(line) = pending.take() {
                let (key, value) = split_header(&line)?;
                if let Some(section) = sections.last_mut() {
                    section.push((key, value));
                }
            }
            Ok(())
        };

        for raw_line in text.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            if let Some(continuation) = line.strip_prefix(' ') {
                match pending.as_mut() {
                    Some(current) => current.push_str(continuation),
                    None => {
                        return Err(SigningError::MalformedArchive(
                            "Manifest continuation line without a header".to_string(),
                        ));
                    }
                }
                continue;
            }
            flush(&mut pending, &mut sections)?;
            if line.is_empty() {
                if sections.last().is_some_and(|s| !s.is_empty()) {
                    sections.push(Vec::new());
                }
            } else {
                pending = Some(line.to_string());
            }
        }
        flush(&mut pending, &mut sections)?;

        let mut iter = sections.into_iter().filter(|s| !s.is_empty());
        let mut manifest = Manifest {
            main: Attributes::new(),
            entries: BTreeMap::new(),
        };
        // A manifest starting with a blank line has an empty main section
        let starts_with_entry = text
            .trim_start_matches(['\r', '\n'])
            .get(..NAME_KEY.len() + 1)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("Name:"));
        if !starts_with_entry {
            if let Some(main) = iter.next() {
                for (k, v) in main {
                    manifest.main.set(&k, v);
                }
            }
        }
        for section in iter {
            let mut pairs = section.into_iter();
            let name = match pairs.next() {
                Some((k, v)) if k.eq_ignore_ascii_case(NAME_KEY) => v,
                _ => {
                    return Err(SigningError::MalformedArchive(
                        "Manifest entry section does not start with 'Name:'".to_string(),
                    ));
                }
            };
            let attrs = manifest.entry_mut(&name);
            for (k, v) in pairs {
                attrs.set(&k, v);
            }
        }
        Ok(manifest)
    }

    /// Serialize to manifest text with CRLF endings and 72-byte line wrapping.
    ///
    /// # Errors
    ///
    /// Returns `EncodingError` if a name, key or value contains a line break or NUL.
    pub fn to_bytes(&self) -> SigningResult<Vec<u8>> {
        let mut out = Vec::new();
        let version = self.main.get(MANIFEST_VERSION_KEY).unwrap_or(MANIFEST_VERSION);
        write_header(&mut out, MANIFEST_VERSION_KEY, version)?;
        for (key, value) in self.main.iter() {
            if !key.eq_ignore_ascii_case(MANIFEST_VERSION_KEY) {
                write_header(&mut out, key, value)?;
            }
        }
        out.extend_from_slice(b"\r\n");

        for (name, attrs) in &self.entries {
            write_header(&mut out, NAME_KEY, name)?;
            for (key, value) in attrs.iter() {
                write_header(&mut out, key, value)?;
            }
            out.extend_from_slice(b"\r\n");
        }
        Ok(out)
    }
}

fn split_header(line: &str) -> SigningResult<(String, String)> {
    let (key, value) = line.split_once(':').ok_or_else(|| {
        SigningError::MalformedArchive(format!("Manifest line is not a header: {line}"))
    })?;
    if key.is_empty() || key.contains(' ') {
        return Err(SigningError::MalformedArchive(format!(
            "Invalid manifest header name: {key:?}"
        )));
    }
    let value = value.strip_prefix(' ').unwrap_or(value);
    Ok((key.to_string(), value.to_string()))
}

/// Write `key: value` wrapped at the manifest line width on char boundaries.
///
/// A line break inside a header would start a new header or section, so
/// CR, LF and NUL are refused in both key and value.
pub(crate) fn write_header(out: &mut Vec<u8>, key: &str, value: &str) -> SigningResult<()> {
    if key.is_empty() || key.contains([':', ' ']) {
        return Err(SigningError::EncodingError(format!(
            "Invalid manifest header name: {key:?}"
        )));
    }
    if has_line_control(key) || has_line_control(value) {
        return Err(SigningError::EncodingError(format!(
            "Manifest header {key:?} contains a line break or NUL: {value:?}"
        )));
    }
    let line = format!("{key}: {value}");
    let mut rest = line.as_str();
    let mut width = MANIFEST_LINE_WIDTH;
    loop {
        if rest.len() <= width {
            out.extend_from_slice(rest.as_bytes());
            out.extend_from_slice(b"\r\n");
            return Ok(());
        }
        let mut cut = width;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.extend_from_slice(rest[..cut].as_bytes());
        out.extend_from_slice(b"\r\n ");
        rest = &rest[cut..];
        // Continuation lines spend one byte on the leading space
        width = MANIFEST_LINE_WIDTH - 1;
    }
}

/// True if `text` holds a character that ends a manifest line.
pub(crate) fn has_line_control(text: &str) -> bool {
    text.contains(['\r', '\n', '\0'])
}
