//! Tracker client: builds the announce URL, issues a raw HTTP GET, and
//! parses the bencoded response into peer addresses.
//!
//! The GET itself is hand-rolled over `TcpStream`/`native_tls::TlsStream`
//! rather than pulled in from an HTTP client crate — `native-tls` is used
//! here exactly the way it names itself: TLS, not HTTP.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use native_tls::TlsConnector;

use crate::bencode::{Bencode, BencodeError};
use crate::peer::PeerAddress;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum TrackerError {
    NoHttpAnnounceUrl,
    UnsupportedScheme(String),
    BadUrl(String),
    Connect(io::Error),
    Tls(String),
    Io(io::Error),
    BadStatusLine(String),
    NonSuccessStatus(u32),
    Bencode(BencodeError),
    NotADict,
    MissingField(&'static str),
    InvalidPeers,
}

impl From<BencodeError> for TrackerError {
    fn from(e: BencodeError) -> Self {
        TrackerError::Bencode(e)
    }
}

#[derive(Debug)]
pub struct TrackerResponse {
    pub interval: i64,
    pub complete: i64,
    pub incomplete: i64,
    pub peers: Vec<PeerAddress>,
}

/// Percent-encodes raw bytes for use in a query string, per BEP-3's
/// `info_hash`/`peer_id` encoding: every byte is escaped, not just the
/// ones outside the unreserved set, since both fields are hashes/ids
/// rather than human-readable text.
pub fn percent_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        out.push('%');
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Picks the announce URL to use: the primary `announce` if it's an `http`
/// or `https` URL, otherwise the first `http`-prefixed URL found in
/// `announce-list` (the common `udp://` primary + `http://` fallback-tier
/// layout).
fn pick_announce_url(announce: &str, announce_list: &[Vec<String>]) -> Result<String, TrackerError> {
    if announce.starts_with("http://") || announce.starts_with("https://") {
        return Ok(announce.to_string());
    }
    for tier in announce_list {
        for url in tier {
            if url.starts_with("http://") || url.starts_with("https://") {
                return Ok(url.clone());
            }
        }
    }
    Err(TrackerError::NoHttpAnnounceUrl)
}

fn build_url(
    announce: &str,
    announce_list: &[Vec<String>],
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    port: u16,
    left: u64,
) -> Result<String, TrackerError> {
    let base = pick_announce_url(announce, announce_list)?;
    let separator = if base.contains('?') { "&" } else { "?" };
    Ok(format!(
        "{base}{separator}info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1",
        percent_encode(info_hash),
        percent_encode(peer_id),
        port,
        left,
    ))
}

struct ParsedUrl {
    https: bool,
    host: String,
    port: u16,
    path_and_query: String,
}

fn parse_url(url: &str) -> Result<ParsedUrl, TrackerError> {
    let (https, rest) = if let Some(rest) = url.strip_prefix("https://") {
        (true, rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (false, rest)
    } else {
        return Err(TrackerError::UnsupportedScheme(url.to_string()));
    };

    let (authority, path_and_query) = match rest.find('/') {
        Some(i) => (&rest[..i], rest[i..].to_string()),
        None => (rest, "/".to_string()),
    };
    if authority.is_empty() {
        return Err(TrackerError::BadUrl(url.to_string()));
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (
            h.to_string(),
            p.parse()
                .map_err(|_| TrackerError::BadUrl(url.to_string()))?,
        ),
        None => (authority.to_string(), if https { 443 } else { 80 }),
    };

    Ok(ParsedUrl {
        https,
        host,
        port,
        path_and_query,
    })
}

/// Fetches the peer list from the tracker for this torrent.
pub fn fetch_peers(
    announce: &str,
    announce_list: &[Vec<String>],
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    port: u16,
    total_size: u64,
) -> Result<TrackerResponse, TrackerError> {
    let url = build_url(announce, announce_list, info_hash, peer_id, port, total_size)?;
    let parsed = parse_url(&url)?;

    let addr = format!("{}:{}", parsed.host, parsed.port);
    let socket_addr = addr
        .parse()
        .or_else(|_| resolve(&parsed.host, parsed.port))
        .map_err(|_| TrackerError::BadUrl(url.clone()))?;

    let stream = TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT)
        .map_err(TrackerError::Connect)?;
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .map_err(TrackerError::Connect)?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        parsed.path_and_query, parsed.host
    );

    let body = if parsed.https {
        let connector = TlsConnector::new().map_err(|e| TrackerError::Tls(e.to_string()))?;
        let mut tls = connector
            .connect(&parsed.host, stream)
            .map_err(|e| TrackerError::Tls(e.to_string()))?;
        tls.write_all(request.as_bytes()).map_err(TrackerError::Io)?;
        read_http_body(&mut tls)?
    } else {
        let mut stream = stream;
        stream
            .write_all(request.as_bytes())
            .map_err(TrackerError::Io)?;
        read_http_body(&mut stream)?
    };

    parse_tracker_response(&body)
}

fn resolve(host: &str, port: u16) -> io::Result<std::net::SocketAddr> {
    use std::net::ToSocketAddrs;
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address found for host"))
}

fn read_http_body<R: Read>(stream: &mut R) -> Result<Vec<u8>, TrackerError> {
    let mut reader = BufReader::new(stream);

    let mut status_line = String::new();
    reader
        .read_line(&mut status_line)
        .map_err(TrackerError::Io)?;
    let status_code: u32 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| TrackerError::BadStatusLine(status_line.clone()))?;
    if !(200..300).contains(&status_code) {
        return Err(TrackerError::NonSuccessStatus(status_code));
    }

    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).map_err(TrackerError::Io)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().ok(),
                "transfer-encoding" if value.trim().eq_ignore_ascii_case("chunked") => {
                    chunked = true
                }
                _ => {}
            }
        }
    }

    if chunked {
        read_chunked_body(&mut reader)
    } else if let Some(len) = content_length {
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).map_err(TrackerError::Io)?;
        Ok(body)
    } else {
        let mut body = Vec::new();
        reader.read_to_end(&mut body).map_err(TrackerError::Io)?;
        Ok(body)
    }
}

fn read_chunked_body<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, TrackerError> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).map_err(TrackerError::Io)?;
        let size = usize::from_str_radix(size_line.trim(), 16)
            .map_err(|_| TrackerError::BadStatusLine(size_line.clone()))?;
        if size == 0 {
            break;
        }
        let mut chunk = vec![0u8; size];
        reader.read_exact(&mut chunk).map_err(TrackerError::Io)?;
        body.extend(chunk);
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).map_err(TrackerError::Io)?;
    }
    Ok(body)
}

fn parse_tracker_response(data: &[u8]) -> Result<TrackerResponse, TrackerError> {
    let dict = match Bencode::decode(data)? {
        Bencode::BDict(d) => d,
        _ => return Err(TrackerError::NotADict),
    };

    let interval = match dict.get(b"interval".as_slice()) {
        Some(Bencode::BNumber(n)) => *n,
        _ => return Err(TrackerError::MissingField("interval")),
    };
    let complete = match dict.get(b"complete".as_slice()) {
        Some(Bencode::BNumber(n)) => *n,
        _ => 0,
    };
    let incomplete = match dict.get(b"incomplete".as_slice()) {
        Some(Bencode::BNumber(n)) => *n,
        _ => 0,
    };

    let peers = match dict.get(b"peers".as_slice()) {
        Some(Bencode::BString(bytes)) => parse_compact_peers(bytes)?,
        Some(Bencode::BList(items)) => parse_dict_peers(items)?,
        _ => return Err(TrackerError::MissingField("peers")),
    };

    Ok(TrackerResponse {
        interval,
        complete,
        incomplete,
        peers,
    })
}

/// 6 bytes per peer: 4-byte big-endian IPv4 address, 2-byte big-endian port.
fn parse_compact_peers(bytes: &[u8]) -> Result<Vec<PeerAddress>, TrackerError> {
    if bytes.len() % 6 != 0 {
        return Err(TrackerError::InvalidPeers);
    }
    Ok(bytes
        .chunks_exact(6)
        .map(|chunk| {
            let ip = format!("{}.{}.{}.{}", chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            PeerAddress::new(ip, port)
        })
        .collect())
}

fn parse_dict_peers(items: &[Bencode]) -> Result<Vec<PeerAddress>, TrackerError> {
    items
        .iter()
        .map(|item| {
            let dict = match item {
                Bencode::BDict(d) => d,
                _ => return Err(TrackerError::InvalidPeers),
            };
            let ip = match dict.get(b"ip".as_slice()) {
                Some(Bencode::BString(s)) => String::from_utf8_lossy(s).into_owned(),
                _ => return Err(TrackerError::InvalidPeers),
            };
            let port = match dict.get(b"port".as_slice()) {
                Some(Bencode::BNumber(n)) if *n >= 0 && *n <= u16::MAX as i64 => *n as u16,
                _ => return Err(TrackerError::InvalidPeers),
            };
            Ok(PeerAddress::new(ip, port))
        })
        .collect()
}
