//! Identifier algebra: canonical, parseable identifiers for functions,
//! statements, callsites, variables and heap buckets.
//!
//! Contracts:
//! - `parse(stringify(x)) == x` for every identifier kind
//! - any string that parses is byte-identical to the canonical form;
//!   non-canonical percent-encodings, leading zeros and alternative path
//!   separators are rejected, never normalized
//! - comparators decompose identifiers into their logical parts and
//!   compare lexicographically (filePath, startOffset, endOffset,
//!   statementIndex, propertyName)
//!
//! Canonical forms:
//! - `f:<urlenc(path)>:<start>:<end>`
//! - `s:<urlenc(path)>:<start>:<end>:<stmtIdx>`
//! - `h:<urlenc(path)>:<start>:<end>:<stmtIdx>:<urlenc(prop)>`
//! - `p<i>` / `v<i>`

use crate::error::{FlowfactError, Result};
use crate::span::Span;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// First synthetic statement index reserved for parameter anchors.
/// Parameter `i` of a function anchors at `PARAM_ANCHOR_BASE + i`.
pub const PARAM_ANCHOR_BASE: u32 = 1_000_000_000;

/// First synthetic statement index reserved for local anchors.
/// Local `i` anchors at `LOCAL_ANCHOR_BASE + i`.
pub const LOCAL_ANCHOR_BASE: u32 = 1_500_000_000;

// ---------------------------------------------------------------------------
// Strict percent codec
// ---------------------------------------------------------------------------

/// The RFC 3986 unreserved set; everything else is percent-encoded.
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        // Canonical escapes use uppercase hex only.
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Percent-encode `s` with uppercase hex, leaving only unreserved bytes raw.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(char::from_digit((b >> 4) as u32, 16).unwrap().to_ascii_uppercase());
            out.push(char::from_digit((b & 0x0F) as u32, 16).unwrap().to_ascii_uppercase());
        }
    }
    out
}

/// Strict percent-decode: rejects anything the canonical encoder would not
/// have produced (lowercase hex, escaped unreserved bytes, raw reserved
/// bytes, truncated escapes, invalid UTF-8).
pub fn percent_decode(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let (hi, lo) = match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&h), Some(&l)) => (h, l),
                _ => {
                    return Err(FlowfactError::InvalidId(format!(
                        "truncated percent escape in '{s}'"
                    )))
                }
            };
            let (hi, lo) = match (hex_value(hi), hex_value(lo)) {
                (Some(h), Some(l)) => (h, l),
                _ => {
                    return Err(FlowfactError::InvalidId(format!(
                        "non-canonical percent escape in '{s}'"
                    )))
                }
            };
            let decoded = (hi << 4) | lo;
            if is_unreserved(decoded) {
                return Err(FlowfactError::InvalidId(format!(
                    "over-encoded byte 0x{decoded:02X} in '{s}'"
                )));
            }
            out.push(decoded);
            i += 3;
        } else if is_unreserved(b) {
            out.push(b);
            i += 1;
        } else {
            return Err(FlowfactError::InvalidId(format!(
                "raw reserved byte 0x{b:02X} in '{s}'"
            )));
        }
    }
    String::from_utf8(out)
        .map_err(|_| FlowfactError::InvalidId(format!("invalid UTF-8 after decoding '{s}'")))
}

/// Strict non-negative integer parse: no sign, no leading zeros.
fn parse_offset(s: &str) -> Result<u32> {
    if s.is_empty() {
        return Err(FlowfactError::InvalidId("empty number field".into()));
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(FlowfactError::InvalidId(format!("leading zeros in '{s}'")));
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FlowfactError::InvalidId(format!("non-digit in number '{s}'")));
    }
    s.parse::<u32>()
        .map_err(|_| FlowfactError::InvalidId(format!("number out of range '{s}'")))
}

/// Validate a repo-relative source path: non-empty, `/`-separated, no
/// empty or `.`/`..` segments, no backslashes, not absolute.
pub fn validate_repo_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(FlowfactError::InvalidId("empty file path".into()));
    }
    if path.contains('\\') {
        return Err(FlowfactError::InvalidId(format!(
            "backslash separator in path '{path}'"
        )));
    }
    if path.starts_with('/') {
        return Err(FlowfactError::InvalidId(format!("absolute path '{path}'")));
    }
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(FlowfactError::InvalidId(format!(
                "empty segment in path '{path}'"
            )));
        }
        if segment == "." || segment == ".." {
            return Err(FlowfactError::InvalidId(format!(
                "relative segment in path '{path}'"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FuncId
// ---------------------------------------------------------------------------

/// Identity of a function: repo-relative file path plus the byte span of
/// the function-like node. Immutable once indexed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId {
    path: String,
    start: u32,
    end: u32,
}

impl FuncId {
    pub fn new(path: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        let path = path.into();
        validate_repo_path(&path)?;
        if end < start {
            return Err(FlowfactError::InvalidId(format!(
                "span end {end} before start {start} in '{path}'"
            )));
        }
        Ok(Self { path, start, end })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn to_canon(&self) -> String {
        format!("f:{}:{}:{}", percent_encode(&self.path), self.start, self.end)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("f:")
            .ok_or_else(|| FlowfactError::InvalidId(format!("missing 'f:' prefix in '{s}'")))?;
        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 3 {
            return Err(FlowfactError::InvalidId(format!(
                "expected 3 fields after 'f:' in '{s}'"
            )));
        }
        let path = percent_decode(parts[0])?;
        let start = parse_offset(parts[1])?;
        let end = parse_offset(parts[2])?;
        Self::new(path, start, end)
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canon())
    }
}

impl Serialize for FuncId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canon())
    }
}

impl<'de> Deserialize<'de> for FuncId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// StmtId / CallsiteId
// ---------------------------------------------------------------------------

/// Identity of a statement site: owning function plus the statement index
/// assigned by the deterministic source-order walk. Indices at or above
/// [`PARAM_ANCHOR_BASE`] are synthetic anchors, never real sites.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId {
    func: FuncId,
    index: u32,
}

/// A callsite is a statement site whose syntactic node is a call
/// expression; the identifier space is shared.
pub type CallsiteId = StmtId;

impl StmtId {
    pub fn new(func: FuncId, index: u32) -> Self {
        Self { func, index }
    }

    /// Synthetic anchor standing in for parameter `i`'s allocation.
    pub fn param_anchor(func: FuncId, i: u32) -> Self {
        Self::new(func, PARAM_ANCHOR_BASE + i)
    }

    /// Synthetic anchor standing in for local `i`'s allocation.
    pub fn local_anchor(func: FuncId, i: u32) -> Self {
        Self::new(func, LOCAL_ANCHOR_BASE + i)
    }

    pub fn func(&self) -> &FuncId {
        &self.func
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_synthetic(&self) -> bool {
        self.index >= PARAM_ANCHOR_BASE
    }

    /// If this is a parameter anchor, the parameter index it stands for.
    pub fn as_param_anchor(&self) -> Option<u32> {
        if (PARAM_ANCHOR_BASE..LOCAL_ANCHOR_BASE).contains(&self.index) {
            Some(self.index - PARAM_ANCHOR_BASE)
        } else {
            None
        }
    }

    /// If this is a local anchor, the local index it stands for.
    pub fn as_local_anchor(&self) -> Option<u32> {
        self.index.checked_sub(LOCAL_ANCHOR_BASE)
    }

    pub fn to_canon(&self) -> String {
        format!(
            "s:{}:{}:{}:{}",
            percent_encode(self.func.path()),
            self.func.start(),
            self.func.end(),
            self.index
        )
    }

    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("s:")
            .ok_or_else(|| FlowfactError::InvalidId(format!("missing 's:' prefix in '{s}'")))?;
        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 4 {
            return Err(FlowfactError::InvalidId(format!(
                "expected 4 fields after 's:' in '{s}'"
            )));
        }
        let path = percent_decode(parts[0])?;
        let start = parse_offset(parts[1])?;
        let end = parse_offset(parts[2])?;
        let index = parse_offset(parts[3])?;
        Ok(Self::new(FuncId::new(path, start, end)?, index))
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canon())
    }
}

impl Serialize for StmtId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canon())
    }
}

impl<'de> Deserialize<'de> for StmtId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// VarId
// ---------------------------------------------------------------------------

/// A parameter (`p<i>`) or local/temp (`v<i>`) slot inside one function.
/// All parameters order before all locals, then by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarId {
    Param(u32),
    Local(u32),
}

impl VarId {
    pub fn index(&self) -> u32 {
        match self {
            Self::Param(i) | Self::Local(i) => *i,
        }
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Self::Param(_))
    }

    pub fn to_canon(&self) -> String {
        match self {
            Self::Param(i) => format!("p{i}"),
            Self::Local(i) => format!("v{i}"),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let tag = chars
            .next()
            .ok_or_else(|| FlowfactError::InvalidId("empty variable id".into()))?;
        let index = parse_offset(chars.as_str())?;
        match tag {
            'p' => Ok(Self::Param(index)),
            'v' => Ok(Self::Local(index)),
            _ => Err(FlowfactError::InvalidId(format!(
                "unknown variable tag in '{s}'"
            ))),
        }
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canon())
    }
}

impl Serialize for VarId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canon())
    }
}

impl<'de> Deserialize<'de> for VarId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// HeapId
// ---------------------------------------------------------------------------

/// Property key of a heap bucket. `Dynamic` is the canonical literal `*`;
/// a source-level property literally named `*` stays `Named` and encodes
/// as `%2A`, so the two never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropName {
    Named(String),
    Dynamic,
}

impl PropName {
    pub fn to_canon(&self) -> String {
        match self {
            Self::Named(name) => percent_encode(name),
            Self::Dynamic => "*".to_string(),
        }
    }

    fn parse(s: &str) -> Result<Self> {
        if s == "*" {
            Ok(Self::Dynamic)
        } else {
            Ok(Self::Named(percent_decode(s)?))
        }
    }
}

/// A coarse heap bucket: allocation anchor plus property name. Two heap
/// objects share a bucket iff they share an allocation anchor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapId {
    anchor: StmtId,
    prop: PropName,
}

impl HeapId {
    pub fn new(anchor: StmtId, prop: PropName) -> Self {
        Self { anchor, prop }
    }

    pub fn anchor(&self) -> &StmtId {
        &self.anchor
    }

    pub fn prop(&self) -> &PropName {
        &self.prop
    }

    pub fn to_canon(&self) -> String {
        format!(
            "h:{}:{}:{}:{}:{}",
            percent_encode(self.anchor.func().path()),
            self.anchor.func().start(),
            self.anchor.func().end(),
            self.anchor.index(),
            self.prop.to_canon()
        )
    }

    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("h:")
            .ok_or_else(|| FlowfactError::InvalidId(format!("missing 'h:' prefix in '{s}'")))?;
        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() != 5 {
            return Err(FlowfactError::InvalidId(format!(
                "expected 5 fields after 'h:' in '{s}'"
            )));
        }
        let path = percent_decode(parts[0])?;
        let start = parse_offset(parts[1])?;
        let end = parse_offset(parts[2])?;
        let index = parse_offset(parts[3])?;
        let prop = PropName::parse(parts[4])?;
        Ok(Self::new(
            StmtId::new(FuncId::new(path, start, end)?, index),
            prop,
        ))
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canon())
    }
}

impl Serialize for HeapId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canon())
    }
}

impl<'de> Deserialize<'de> for HeapId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}
