//! Metainfo adapter (`.torrent` file -> typed records + initial work list).
//!
//! Converts the untyped bencode tree into a strongly-typed `Metainfo`
//! record, eliminating the implicit string/int coercion that a tree of
//! `Bencode` values would otherwise force on every caller.

use sha1::{Digest, Sha1};
use std::fs;
use std::path::Path;

use crate::bencode::{decode_dict_with_span, Bencode, BencodeError};
use crate::work_queue::PieceWork;

pub const SHA1_LEN: usize = 20;
pub const BLOCK_SIZE: u32 = 16384;

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub length: u64,
    pub path: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Info {
    pub name: String,
    pub piece_length: u32,
    pub pieces: Vec<u8>,
    pub length: Option<u64>,
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone)]
pub struct Metainfo {
    pub announce: String,
    pub announce_list: Vec<Vec<String>>,
    pub info: Info,
    pub info_hash: [u8; SHA1_LEN],
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub creation_date: Option<i64>,
    pub encoding: Option<String>,
}

#[derive(Debug)]
pub enum MetainfoError {
    Io(std::io::Error),
    Bencode(BencodeError),
    NotADict,
    MissingAnnounce,
    MissingInfo,
    InfoNotADict,
    MissingName,
    MissingPieceLength,
    InvalidPieceLength,
    MissingPieces,
    PiecesNotMultipleOf20,
    MissingLengthOrFiles,
    InvalidFileEntry,
    NameIsNotPlain,
}

impl From<std::io::Error> for MetainfoError {
    fn from(e: std::io::Error) -> Self {
        MetainfoError::Io(e)
    }
}

impl From<BencodeError> for MetainfoError {
    fn from(e: BencodeError) -> Self {
        MetainfoError::Bencode(e)
    }
}

impl Metainfo {
    /// Reads and parses a `.torrent` file from disk.
    pub fn open(path: &Path) -> Result<Metainfo, MetainfoError> {
        let bytes = fs::read(path)?;
        Metainfo::parse(&bytes)
    }

    /// Parses the raw bytes of a `.torrent` file.
    pub fn parse(data: &[u8]) -> Result<Metainfo, MetainfoError> {
        let (dict, info_span) = decode_dict_with_span(data, b"info")?;

        let announce = match dict.get(b"announce".as_slice()) {
            Some(Bencode::BString(s)) => String::from_utf8_lossy(s).into_owned(),
            _ => return Err(MetainfoError::MissingAnnounce),
        };

        let announce_list = match dict.get(b"announce-list".as_slice()) {
            Some(Bencode::BList(tiers)) => tiers
                .iter()
                .filter_map(|tier| match tier {
                    Bencode::BList(urls) => Some(
                        urls.iter()
                            .filter_map(|u| match u {
                                Bencode::BString(s) => Some(String::from_utf8_lossy(s).into_owned()),
                                _ => None,
                            })
                            .collect(),
                    ),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let info_bencode = dict.get(b"info".as_slice()).ok_or(MetainfoError::MissingInfo)?;
        let info = Info::from_bencode(info_bencode)?;

        let (start, end) = info_span.ok_or(MetainfoError::MissingInfo)?;
        let info_hash: [u8; SHA1_LEN] = Sha1::digest(&data[start..end]).into();

        Ok(Metainfo {
            announce,
            announce_list,
            info,
            info_hash,
            comment: string_field(&dict, b"comment"),
            created_by: string_field(&dict, b"created by"),
            creation_date: number_field(&dict, b"creation date"),
            encoding: string_field(&dict, b"encoding"),
        })
    }

    /// Total byte length of the payload: sum of file lengths for a
    /// multi-file torrent, or `info.length` for a single-file torrent.
    pub fn total_size(&self) -> u64 {
        if self.info.files.is_empty() {
            self.info.length.unwrap_or(0)
        } else {
            self.info.files.iter().map(|f| f.length).sum()
        }
    }

    /// Splits `info.pieces` into its 20-byte SHA-1 digests.
    pub fn piece_hashes(&self) -> Vec<[u8; SHA1_LEN]> {
        self.info
            .pieces
            .chunks_exact(SHA1_LEN)
            .map(|c| c.try_into().expect("chunks_exact(20) yields 20-byte slices"))
            .collect()
    }

    /// Builds the initial `PieceWork` list: one entry per piece, the last
    /// one possibly shorter than `piece_length`.
    pub fn work_items(&self) -> Vec<PieceWork> {
        let total_size = self.total_size();
        let piece_length = self.info.piece_length as u64;
        self.piece_hashes()
            .into_iter()
            .enumerate()
            .map(|(i, hash)| {
                let begin = i as u64 * piece_length;
                let length = piece_length.min(total_size.saturating_sub(begin));
                PieceWork {
                    index: i as u32,
                    hash,
                    length: length as u32,
                }
            })
            .collect()
    }
}

impl Info {
    fn from_bencode(bencode: &Bencode) -> Result<Info, MetainfoError> {
        let dict = match bencode {
            Bencode::BDict(d) => d,
            _ => return Err(MetainfoError::InfoNotADict),
        };

        let name = match dict.get(b"name".as_slice()) {
            Some(Bencode::BString(s)) => String::from_utf8_lossy(s).into_owned(),
            _ => return Err(MetainfoError::MissingName),
        };
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(MetainfoError::NameIsNotPlain);
        }

        let piece_length = match dict.get(b"piece length".as_slice()) {
            Some(Bencode::BNumber(n)) if *n > 0 => *n as u32,
            Some(Bencode::BNumber(_)) => return Err(MetainfoError::InvalidPieceLength),
            _ => return Err(MetainfoError::MissingPieceLength),
        };

        let pieces = match dict.get(b"pieces".as_slice()) {
            Some(Bencode::BString(s)) => s.clone(),
            _ => return Err(MetainfoError::MissingPieces),
        };
        if pieces.len() % SHA1_LEN != 0 {
            return Err(MetainfoError::PiecesNotMultipleOf20);
        }

        let length = match dict.get(b"length".as_slice()) {
            Some(Bencode::BNumber(n)) if *n >= 0 => Some(*n as u64),
            Some(_) => return Err(MetainfoError::MissingLengthOrFiles),
            None => None,
        };

        let files = match dict.get(b"files".as_slice()) {
            Some(Bencode::BList(items)) => items
                .iter()
                .map(FileInfo::from_bencode)
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(MetainfoError::InvalidFileEntry),
            None => Vec::new(),
        };

        if length.is_none() && files.is_empty() {
            return Err(MetainfoError::MissingLengthOrFiles);
        }

        Ok(Info {
            name,
            piece_length,
            pieces,
            length,
            files,
        })
    }
}

impl FileInfo {
    fn from_bencode(bencode: &Bencode) -> Result<FileInfo, MetainfoError> {
        let dict = match bencode {
            Bencode::BDict(d) => d,
            _ => return Err(MetainfoError::InvalidFileEntry),
        };
        let length = match dict.get(b"length".as_slice()) {
            Some(Bencode::BNumber(n)) if *n >= 0 => *n as u64,
            _ => return Err(MetainfoError::InvalidFileEntry),
        };
        let path = match dict.get(b"path".as_slice()) {
            Some(Bencode::BList(items)) => items
                .iter()
                .map(|p| match p {
                    Bencode::BString(s) => Ok(String::from_utf8_lossy(s).into_owned()),
                    _ => Err(MetainfoError::InvalidFileEntry),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(MetainfoError::InvalidFileEntry),
        };
        Ok(FileInfo { length, path })
    }
}

fn string_field(dict: &std::collections::BTreeMap<Vec<u8>, Bencode>, key: &[u8]) -> Option<String> {
    match dict.get(key) {
        Some(Bencode::BString(s)) => Some(String::from_utf8_lossy(s).into_owned()),
        _ => None,
    }
}

fn number_field(dict: &std::collections::BTreeMap<Vec<u8>, Bencode>, key: &[u8]) -> Option<i64> {
    match dict.get(key) {
        Some(Bencode::BNumber(n)) => Some(*n),
        _ => None,
    }
}
