//! Bencode codec (BEP-3): decode a byte string into a typed tree, encode it back.
//!
//! Treated as an external, mechanical collaborator at the boundary of the
//! piece-exchange engine — the engine itself never touches a `Bencode` value
//! directly, only the typed records built from it (see `crate::metainfo` and
//! `crate::tracker`).

use std::collections::BTreeMap;

/// A decoded bencode value.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Bencode {
    BNumber(i64),
    BString(Vec<u8>),
    BList(Vec<Bencode>),
    BDict(BTreeMap<Vec<u8>, Bencode>),
}

#[derive(PartialEq, Eq, Debug)]
pub enum BencodeError {
    UnexpectedEnd,
    InvalidBencode,
    InvalidNumber,
    InvalidString,
    NonStringDictKey,
    IntegerOverflow,
}

impl Bencode {
    /// Parses a full bencoded value, erroring if trailing bytes remain.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bittorrent_client::bencode::Bencode;
    ///
    /// let bencode = Bencode::decode(b"5:hello").unwrap();
    /// assert_eq!(bencode, Bencode::BString(b"hello".to_vec()));
    ///
    /// let bencode = Bencode::decode(b"i123e").unwrap();
    /// assert_eq!(bencode, Bencode::BNumber(123));
    /// ```
    pub fn decode(data: &[u8]) -> Result<Bencode, BencodeError> {
        let (value, _) = decode_value(data, 0)?;
        Ok(value)
    }

    /// Encodes a value back into its canonical bencoded form (dict keys sorted
    /// lexicographically by raw bytes, no leading zeros, `0` rendered as `i0e`).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Bencode::BNumber(n) => {
                out.push(b'i');
                out.extend(n.to_string().as_bytes());
                out.push(b'e');
            }
            Bencode::BString(s) => {
                out.extend(s.len().to_string().as_bytes());
                out.push(b':');
                out.extend(s);
            }
            Bencode::BList(items) => {
                out.push(b'l');
                for item in items {
                    item.encode_into(out);
                }
                out.push(b'e');
            }
            Bencode::BDict(dict) => {
                out.push(b'd');
                // BTreeMap<Vec<u8>, _> already iterates in raw-byte lexicographic order.
                for (key, value) in dict {
                    Bencode::BString(key.clone()).encode_into(out);
                    value.encode_into(out);
                }
                out.push(b'e');
            }
        }
    }
}

/// Decodes the value starting at `offset`, returning it and the offset just
/// past its last byte. `pub(crate)` so `crate::metainfo` can recover the raw
/// byte span of the `info` dict without re-encoding it.
pub(crate) fn decode_value(data: &[u8], offset: usize) -> Result<(Bencode, usize), BencodeError> {
    match byte_at(data, offset)? {
        b'i' => decode_number(data, offset),
        b'l' => decode_list(data, offset),
        b'd' => decode_dict(data, offset),
        b'0'..=b'9' => decode_string(data, offset),
        _ => Err(BencodeError::InvalidBencode),
    }
}

fn byte_at(data: &[u8], offset: usize) -> Result<u8, BencodeError> {
    data.get(offset).copied().ok_or(BencodeError::UnexpectedEnd)
}

fn decode_string(data: &[u8], offset: usize) -> Result<(Bencode, usize), BencodeError> {
    let mut i = offset;
    while byte_at(data, i)? != b':' {
        i += 1;
    }
    let length: usize = std::str::from_utf8(&data[offset..i])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(BencodeError::InvalidString)?;
    let start = i + 1;
    let end = start
        .checked_add(length)
        .ok_or(BencodeError::IntegerOverflow)?;
    if end > data.len() {
        return Err(BencodeError::UnexpectedEnd);
    }
    Ok((Bencode::BString(data[start..end].to_vec()), end))
}

fn decode_number(data: &[u8], offset: usize) -> Result<(Bencode, usize), BencodeError> {
    let mut i = offset + 1;
    while byte_at(data, i)? != b'e' {
        i += 1;
    }
    let digits = &data[offset + 1..i];
    let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);
    if digits.is_empty()
        || unsigned.is_empty()
        || (unsigned.len() > 1 && unsigned[0] == b'0')
        || digits == b"-0"
    {
        return Err(BencodeError::InvalidNumber);
    }
    let number: i64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(BencodeError::InvalidNumber)?;
    Ok((Bencode::BNumber(number), i + 1))
}

fn decode_list(data: &[u8], offset: usize) -> Result<(Bencode, usize), BencodeError> {
    let mut i = offset + 1;
    let mut list = Vec::new();
    while byte_at(data, i)? != b'e' {
        let (value, next) = decode_value(data, i)?;
        list.push(value);
        i = next;
    }
    Ok((Bencode::BList(list), i + 1))
}

fn decode_dict(data: &[u8], offset: usize) -> Result<(Bencode, usize), BencodeError> {
    let mut i = offset + 1;
    let mut dict = BTreeMap::new();
    while byte_at(data, i)? != b'e' {
        let (key, next) = decode_value(data, i)?;
        i = next;
        let (value, next) = decode_value(data, i)?;
        i = next;
        match key {
            Bencode::BString(key) => {
                dict.insert(key, value);
            }
            _ => return Err(BencodeError::NonStringDictKey),
        }
    }
    Ok((Bencode::BDict(dict), i + 1))
}

/// Decodes a top-level bencoded dict, also returning the exact byte span of
/// the value stored under `span_key` if present. Used to hash the `info`
/// dict exactly as it appeared on disk, rather than re-encoding a decoded
/// tree that may not round-trip byte-for-byte with a non-canonical source.
pub(crate) fn decode_dict_with_span(
    data: &[u8],
    span_key: &[u8],
) -> Result<(BTreeMap<Vec<u8>, Bencode>, Option<(usize, usize)>), BencodeError> {
    if byte_at(data, 0)? != b'd' {
        return Err(BencodeError::InvalidBencode);
    }
    let mut i = 1;
    let mut dict = BTreeMap::new();
    let mut span = None;
    while byte_at(data, i)? != b'e' {
        let (key, next) = decode_value(data, i)?;
        i = next;
        let value_start = i;
        let (value, next) = decode_value(data, i)?;
        i = next;
        let key = match key {
            Bencode::BString(key) => key,
            _ => return Err(BencodeError::NonStringDictKey),
        };
        if key == span_key {
            span = Some((value_start, i));
        }
        dict.insert(key, value);
    }
    Ok((dict, span))
}
