//! Parsing of the distribution catalog (`setup.ini`)
//!
//! A mirror publishes one catalog per architecture. It is a line-oriented text
//! document made of blank-line separated records:
//!
//! ```text
//! # comment
//! release: cygwin
//! arch: x86_64
//!
//! @ bash
//! sdesc: "The GNU Bourne Again SHell"
//! ldesc: "Bash is an sh-compatible shell
//! that incorporates useful features."
//! requires: _autorebase cygwin libintl8
//! install: x86_64/release/bash/bash-4.4.12-3.tar.xz 1453212 7b4e...
//! [prev]
//! install: x86_64/release/bash/bash-4.4.12-1.tar.xz 1451001 d00c...
//! ```
//!
//! Records are keyed by the name given on their `@` line. The header record has
//! no `@` line and is stored under [`ROOT_RECORD`].
//!
//! # Examples
//!
//! ```
//! use cygstrap::Catalog;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let text = "@ tar\nrequires: cygwin libiconv2\n\n";
//! let catalog = Catalog::parse(text.as_bytes())?;
//!
//! let tar = catalog.get("tar").expect("tar is in the catalog");
//! assert_eq!(tar.requirements(), vec!["cygwin", "libiconv2"]);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Name given to a record that never saw an `@` line (the document header).
pub const ROOT_RECORD: &str = "__root__";

/// Prefix marking a `requires` entry as an internal hint rather than a package.
pub const HINT_MARKER: char = '_';

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `key: value`, or a quoted literal without a leading segment.
    Scalar(String),
    /// `key: a b c`
    List(Vec<String>),
    /// `key: prefix "literal"`
    Pair(String, String),
}

impl Value {
    /// The value as a list of words. A scalar is a one-element list (or empty
    /// if blank); a pair yields nothing.
    pub fn as_list(&self) -> Vec<&str> {
        match self {
            Value::Scalar(s) if s.is_empty() => Vec::new(),
            Value::Scalar(s) => vec![s.as_str()],
            Value::List(items) => items.iter().map(String::as_str).collect(),
            Value::Pair(..) => Vec::new(),
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Location, size and digest of a package's binary archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallInfo {
    /// Path relative to the mirror root, e.g. `x86_64/release/tar/tar-1.29-1.tar.xz`.
    pub path: String,
    /// Declared byte length. `None` when the catalog value isn't a number.
    pub size: Option<u64>,
    /// Hex-encoded SHA-512/256 digest.
    pub digest: String,
}

/// One package entry from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    name: String,
    attributes: BTreeMap<String, Value>,
}

impl PackageRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Names listed on the `requires` line, in document order, hints included.
    pub fn requirements(&self) -> Vec<&str> {
        self.get("requires").map(Value::as_list).unwrap_or_default()
    }

    /// The `install` tuple of the current version.
    pub fn install_info(&self) -> Result<InstallInfo> {
        let value = self.get("install").ok_or_else(|| {
            Error::Validation(format!("package '{}' has no install attribute", self.name))
        })?;

        match value.as_list().as_slice() {
            [path, size, digest] => Ok(InstallInfo {
                path: path.to_string(),
                size: size.parse().ok(),
                digest: digest.to_string(),
            }),
            _ => Err(Error::Validation(format!(
                "package '{}' has a malformed install attribute: {:?}",
                self.name, value
            ))),
        }
    }
}

/// Every package offered by one `setup.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<PackageRecord>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Load and parse a catalog file.
    ///
    /// The file must already have passed signature verification; see
    /// [`crate::signing::verify_detached`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::parse(BufReader::new(file))
    }

    /// Parse a catalog document. Any malformed line aborts the whole parse.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut parser = Parser::new(reader);
        parser.run()?;
        Ok(parser.catalog)
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in document order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.iter()
    }

    fn push(&mut self, record: PackageRecord, line: usize) -> Result<()> {
        if self.index.contains_key(&record.name) {
            return Err(Error::parse(
                line,
                format!("duplicate package '{}'", record.name),
            ));
        }
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }
}

struct Parser<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    catalog: Catalog,
    name: Option<String>,
    prefix: String,
    attributes: BTreeMap<String, Value>,
}

impl<R: BufRead> Parser<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            catalog: Catalog::default(),
            name: None,
            prefix: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        match self.lines.next() {
            Some(line) => {
                self.line_no += 1;
                let mut line = line.map_err(|e| match e.kind() {
                    io::ErrorKind::InvalidData => Error::parse(self.line_no, "invalid UTF-8"),
                    _ => Error::Io(e),
                })?;
                if line.ends_with('\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    fn run(&mut self) -> Result<()> {
        while let Some(line) = self.next_line()? {
            if line.starts_with('#') {
                continue;
            } else if let Some(rest) = line.strip_prefix('@') {
                self.name = Some(rest.trim().to_string());
            } else if line.starts_with('[') {
                self.prefix = self.section(&line)?;
            } else if line.trim().is_empty() {
                self.close_record()?;
            } else {
                self.key_value(&line)?;
            }
        }
        // A final record without a trailing blank line still counts.
        self.close_record()
    }

    fn section(&self, line: &str) -> Result<String> {
        let trimmed = line.trim();
        trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .map(str::to_string)
            .ok_or_else(|| Error::parse(self.line_no, "unterminated section bracket"))
    }

    fn close_record(&mut self) -> Result<()> {
        let name = self.name.take();
        let attributes = std::mem::take(&mut self.attributes);
        self.prefix.clear();

        // Runs of blank lines don't produce empty records.
        if name.is_none() && attributes.is_empty() {
            return Ok(());
        }

        let record = PackageRecord {
            name: name.unwrap_or_else(|| ROOT_RECORD.to_string()),
            attributes,
        };
        self.catalog.push(record, self.line_no)
    }

    fn key_value(&mut self, line: &str) -> Result<()> {
        let colon = line
            .find(':')
            .ok_or_else(|| Error::parse(self.line_no, "expected colon"))?;
        let key = format!("{}{}", self.prefix, &line[..colon]);
        let value = line[colon + 1..]
            .strip_prefix(' ')
            .ok_or_else(|| Error::parse(self.line_no, "expected space after colon"))?;

        let value = if value.contains('"') {
            self.quoted(value)?
        } else {
            let trimmed = value.trim();
            if trimmed.contains(' ') {
                Value::List(
                    trimmed
                        .split(' ')
                        .filter(|token| !token.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            } else {
                Value::Scalar(trimmed.to_string())
            }
        };

        self.attributes.insert(key, value);
        Ok(())
    }

    /// Reads a quoted literal starting in `value`, pulling further physical
    /// lines until the closing quote shows up.
    fn quoted(&mut self, value: &str) -> Result<Value> {
        let start_line = self.line_no;
        // `value` contains a quote, so the split always succeeds.
        let (prefix, rest) = value.split_once('"').unwrap_or(("", value));
        let prefix = prefix.trim();

        let mut literal = String::new();
        let mut buffer = format!("{}\n", rest);
        let mut pos = 0;

        loop {
            let Some(c) = buffer[pos..].chars().next() else {
                match self.next_line()? {
                    Some(line) => {
                        buffer.push_str(&line);
                        buffer.push('\n');
                        continue;
                    }
                    None => {
                        return Err(Error::parse(
                            start_line,
                            "end of input inside quoted value",
                        ))
                    }
                }
            };
            pos += c.len_utf8();

            match c {
                '"' => break,
                '\\' if buffer[pos..].starts_with('"') => {
                    literal.push('"');
                    pos += 1;
                }
                other => literal.push(other),
            }
        }

        if prefix.is_empty() {
            Ok(Value::Scalar(literal))
        } else {
            Ok(Value::Pair(prefix.to_string(), literal))
        }
    }
}
