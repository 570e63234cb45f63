//! SAM-style auxiliary tags
//!
//! [`TagValue`] mirrors the SAM optional-field types so tags survive a
//! trip through FASTQ comments or BAM aux data. [`ModBaseCalls`] is the
//! decoded form of the `MM`/`ML` modified-base tags: a list of
//! `(position, probabilities)` calls per modification group, which is
//! what lets calls be split between monomers and re-encoded.

use crate::core::error::{PoreCError, Result};

/// Typed array payload of a `B` tag
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float(Vec<f32>),
}

macro_rules! each_array {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            ArrayValue::Int8($v) => $body,
            ArrayValue::UInt8($v) => $body,
            ArrayValue::Int16($v) => $body,
            ArrayValue::UInt16($v) => $body,
            ArrayValue::Int32($v) => $body,
            ArrayValue::UInt32($v) => $body,
            ArrayValue::Float($v) => $body,
        }
    };
}

impl ArrayValue {
    pub fn len(&self) -> usize {
        each_array!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owned copy of `self[start..end]`
    pub fn slice(&self, start: usize, end: usize) -> ArrayValue {
        match self {
            ArrayValue::Int8(v) => ArrayValue::Int8(v[start..end].to_vec()),
            ArrayValue::UInt8(v) => ArrayValue::UInt8(v[start..end].to_vec()),
            ArrayValue::Int16(v) => ArrayValue::Int16(v[start..end].to_vec()),
            ArrayValue::UInt16(v) => ArrayValue::UInt16(v[start..end].to_vec()),
            ArrayValue::Int32(v) => ArrayValue::Int32(v[start..end].to_vec()),
            ArrayValue::UInt32(v) => ArrayValue::UInt32(v[start..end].to_vec()),
            ArrayValue::Float(v) => ArrayValue::Float(v[start..end].to_vec()),
        }
    }

    /// SAM array subtype character
    pub fn subtype(&self) -> char {
        match self {
            ArrayValue::Int8(_) => 'c',
            ArrayValue::UInt8(_) => 'C',
            ArrayValue::Int16(_) => 's',
            ArrayValue::UInt16(_) => 'S',
            ArrayValue::Int32(_) => 'i',
            ArrayValue::UInt32(_) => 'I',
            ArrayValue::Float(_) => 'f',
        }
    }

    fn parse(subtype: char, values: &[&str]) -> Option<ArrayValue> {
        fn all<T: std::str::FromStr>(values: &[&str]) -> Option<Vec<T>> {
            values.iter().map(|v| v.parse().ok()).collect()
        }
        Some(match subtype {
            'c' => ArrayValue::Int8(all(values)?),
            'C' => ArrayValue::UInt8(all(values)?),
            's' => ArrayValue::Int16(all(values)?),
            'S' => ArrayValue::UInt16(all(values)?),
            'i' => ArrayValue::Int32(all(values)?),
            'I' => ArrayValue::UInt32(all(values)?),
            'f' => ArrayValue::Float(all(values)?),
            _ => return None,
        })
    }

    fn join(&self) -> String {
        each_array!(self, v => v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(","))
    }
}

/// Value of one SAM optional field
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Char(u8),
    Int(i64),
    Float(f32),
    String(String),
    Hex(String),
    Array(ArrayValue),
}

impl TagValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(s) | TagValue::Hex(s) => Some(s),
            _ => None,
        }
    }

    /// Integer values of an `i`-typed scalar or any integer array
    pub fn as_ints(&self) -> Option<Vec<i64>> {
        match self {
            TagValue::Int(v) => Some(vec![*v]),
            TagValue::Array(ArrayValue::Float(_)) => None,
            TagValue::Array(array) => {
                Some(each_array!(array, v => v.iter().map(|&x| x as i64).collect()))
            }
            _ => None,
        }
    }
}

/// A named optional field
#[derive(Debug, Clone, PartialEq)]
pub struct SamTag {
    pub name: String,
    pub value: TagValue,
}

impl SamTag {
    pub fn new(name: impl Into<String>, value: TagValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Parse `TAG:TYPE:VALUE` text, as found in FASTQ comments
    ///
    /// # Examples
    /// ```
    /// use porec::core::{SamTag, TagValue};
    ///
    /// let tag = SamTag::parse("MI:Z:read1").unwrap();
    /// assert_eq!(tag.name, "MI");
    /// assert_eq!(tag.value, TagValue::String("read1".to_string()));
    /// assert_eq!(tag.to_string(), "MI:Z:read1");
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || PoreCError::InvalidTag(text.to_string());
        let mut parts = text.splitn(3, ':');
        let (name, ty, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(t), Some(v)) if n.len() == 2 && t.len() == 1 => (n, t, v),
            _ => return Err(invalid()),
        };
        let value = match ty {
            "A" => TagValue::Char(*value.as_bytes().first().ok_or_else(invalid)?),
            "i" => TagValue::Int(value.parse().map_err(|_| invalid())?),
            "f" => TagValue::Float(value.parse().map_err(|_| invalid())?),
            "Z" => TagValue::String(value.to_string()),
            "H" => TagValue::Hex(value.to_string()),
            "B" => {
                let mut fields = value.split(',');
                let subtype = fields
                    .next()
                    .and_then(|s| s.chars().next())
                    .ok_or_else(invalid)?;
                let values: Vec<&str> = fields.filter(|f| !f.is_empty()).collect();
                TagValue::Array(ArrayValue::parse(subtype, &values).ok_or_else(invalid)?)
            }
            _ => return Err(invalid()),
        };
        Ok(Self::new(name, value))
    }
}

impl std::fmt::Display for SamTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            TagValue::Char(c) => write!(f, "{}:A:{}", self.name, *c as char),
            TagValue::Int(v) => write!(f, "{}:i:{}", self.name, v),
            TagValue::Float(v) => write!(f, "{}:f:{}", self.name, v),
            TagValue::String(s) => write!(f, "{}:Z:{}", self.name, s),
            TagValue::Hex(s) => write!(f, "{}:H:{}", self.name, s),
            TagValue::Array(a) if a.is_empty() => write!(f, "{}:B:{}", self.name, a.subtype()),
            TagValue::Array(a) => write!(f, "{}:B:{},{}", self.name, a.subtype(), a.join()),
        }
    }
}

/// Names under which modified-base tags appear (current and legacy)
pub const MM_TAGS: [&str; 2] = ["MM", "Mm"];
pub const ML_TAGS: [&str; 2] = ["ML", "Ml"];

/// One modification call anchored to a base of the read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModCall {
    /// 0-based offset into the read sequence
    pub position: usize,
    /// One probability per modification code of the group
    pub probs: Vec<u8>,
}

/// Calls sharing one `MM` header such as `C+m?`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModGroup {
    /// Canonical base (`N` matches any base)
    pub base: u8,
    pub strand: char,
    /// Modification codes, either letters or a single ChEBI number
    pub codes: String,
    /// `?` or `.` skip-mode marker
    pub mode: Option<char>,
    pub calls: Vec<ModCall>,
}

impl ModGroup {
    fn n_codes(&self) -> usize {
        if self.codes.bytes().all(|b| b.is_ascii_digit()) {
            1
        } else {
            self.codes.len()
        }
    }

    fn header(&self) -> String {
        let mut header = format!("{}{}{}", self.base as char, self.strand, self.codes);
        if let Some(mode) = self.mode {
            header.push(mode);
        }
        header
    }
}

/// Positions of `base` in `seq` (case-insensitive, `N` matches all)
fn base_occurrences(seq: &[u8], base: u8) -> Vec<usize> {
    let base = base.to_ascii_uppercase();
    seq.iter()
        .enumerate()
        .filter(|(_, b)| base == b'N' || b.to_ascii_uppercase() == base)
        .map(|(i, _)| i)
        .collect()
}

/// Decoded `MM`/`ML` tags of one read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModBaseCalls {
    pub groups: Vec<ModGroup>,
}

impl ModBaseCalls {
    /// Decode `MM` text and `ML` probabilities against the read sequence
    pub fn parse(read_name: &str, seq: &[u8], mm: &str, ml: &[u8]) -> Result<Self> {
        let mut groups = Vec::new();
        let mut probs = ml.iter().copied();
        for entry in mm.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let mut fields = entry.split(',');
            let header = fields.next().unwrap_or_default().as_bytes();
            if header.len() < 3 || !matches!(header[1], b'+' | b'-') {
                return Err(PoreCError::modified_bases(
                    read_name,
                    format!("malformed MM group '{}'", entry),
                ));
            }
            let (codes, mode) = match header[header.len() - 1] {
                m @ (b'?' | b'.') => (&header[2..header.len() - 1], Some(m as char)),
                _ => (&header[2..], None),
            };
            let mut group = ModGroup {
                base: header[0].to_ascii_uppercase(),
                strand: header[1] as char,
                codes: String::from_utf8_lossy(codes).into_owned(),
                mode,
                calls: Vec::new(),
            };
            let n_codes = group.n_codes();
            let occurrences = base_occurrences(seq, group.base);
            let mut next = 0usize;
            for field in fields {
                let skip: usize = field.trim().parse().map_err(|_| {
                    PoreCError::modified_bases(read_name, format!("bad MM skip count '{}'", field))
                })?;
                let idx = next + skip;
                let position = *occurrences.get(idx).ok_or_else(|| {
                    PoreCError::modified_bases(
                        read_name,
                        format!(
                            "MM group {} refers to base #{} but the read has {}",
                            group.header(),
                            idx + 1,
                            occurrences.len()
                        ),
                    )
                })?;
                let call_probs: Vec<u8> = probs.by_ref().take(n_codes).collect();
                if call_probs.len() != n_codes {
                    return Err(PoreCError::modified_bases(read_name, "ML shorter than MM"));
                }
                group.calls.push(ModCall {
                    position,
                    probs: call_probs,
                });
                next = idx + 1;
            }
            groups.push(group);
        }
        if probs.next().is_some() {
            return Err(PoreCError::modified_bases(read_name, "ML longer than MM"));
        }
        Ok(Self { groups })
    }

    pub fn num_calls(&self) -> usize {
        self.groups.iter().map(|g| g.calls.len()).sum()
    }

    /// Calls falling in `[start, end)`, rebased to `position - start`
    ///
    /// Every group header is kept, even when it ends up with no calls.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let groups = self
            .groups
            .iter()
            .map(|group| ModGroup {
                calls: group
                    .calls
                    .iter()
                    .filter(|c| c.position >= start && c.position < end)
                    .map(|c| ModCall {
                        position: c.position - start,
                        probs: c.probs.clone(),
                    })
                    .collect(),
                ..group.clone()
            })
            .collect();
        Self { groups }
    }

    /// Encode as `(MM text, ML bytes)` relative to `seq`
    pub fn encode(&self, read_name: &str, seq: &[u8]) -> Result<(String, Vec<u8>)> {
        let mut mm = String::new();
        let mut ml = Vec::with_capacity(self.num_calls());
        for group in &self.groups {
            mm.push_str(&group.header());
            let occurrences = base_occurrences(seq, group.base);
            let mut next = 0usize;
            for call in &group.calls {
                let idx = occurrences.binary_search(&call.position).map_err(|_| {
                    PoreCError::modified_bases(
                        read_name,
                        format!(
                            "call at {} is not on a {} base",
                            call.position, group.base as char
                        ),
                    )
                })?;
                if idx < next {
                    return Err(PoreCError::modified_bases(read_name, "calls are not sorted"));
                }
                mm.push_str(&format!(",{}", idx - next));
                next = idx + 1;
                ml.extend_from_slice(&call.probs);
            }
            mm.push(';');
        }
        Ok((mm, ml))
    }
}
