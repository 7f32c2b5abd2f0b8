//! Reads the member listing of a zip archive from its central directory only.
//!
//! The end-of-central-directory record sits in the last 64 KiB of the archive
//! and points at the central directory, so two or three small reads are enough
//! to enumerate every member of an archive of any size. Sources implement
//! [`RangeSource`]; [`HttpRangeReader`] serves those reads with HTTP byte
//! ranges and rejects servers that ignore the `Range` header.

use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};

use crate::domain::ZipMemberRecord;
use crate::error::BiaError;
use crate::http::HttpClient;

const EOCD_SIG: u32 = 0x0605_4b50;
const EOCD_LEN: u64 = 22;
const MAX_COMMENT_LEN: u64 = 65_535;
const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
const ZIP64_LOCATOR_LEN: u64 = 20;
const ZIP64_EOCD_SIG: u32 = 0x0606_4b50;
const ZIP64_EOCD_LEN: u64 = 56;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const CENTRAL_HEADER_LEN: usize = 46;
const ZIP64_EXTRA_ID: u16 = 0x0001;
const UTF8_NAME_FLAG: u16 = 0x0800;

/// Code page 437 upper half, used for member names without the UTF-8 flag.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// Random access to the bytes of an archive.
pub trait RangeSource {
    fn total_len(&self) -> u64;
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>, BiaError>;
}

/// Byte-range reader over an HTTP(S) URL.
pub struct HttpRangeReader<'a> {
    http: &'a HttpClient,
    url: String,
    len: u64,
}

impl<'a> HttpRangeReader<'a> {
    /// Probe the URL with a one-byte range request to learn the archive size
    /// and confirm the server honours ranges.
    pub fn open(http: &'a HttpClient, url: &str) -> Result<Self, BiaError> {
        let response = http.send_with_retries(|| http.get(url).header(RANGE, "bytes=0-0"))?;
        let response = HttpClient::handle_status(response)?;
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(BiaError::ZipUnavailable(format!(
                "{url} ignored the range request (status {})",
                response.status().as_u16()
            )));
        }
        let len = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                BiaError::ZipUnavailable(format!("{url} sent no usable Content-Range header"))
            })?;
        Ok(Self {
            http,
            url: url.to_string(),
            len,
        })
    }
}

impl RangeSource for HttpRangeReader<'_> {
    fn total_len(&self) -> u64 {
        self.len
    }

    fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>, BiaError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let last = offset
            .checked_add(length - 1)
            .filter(|last| *last < self.len)
            .ok_or_else(|| malformed("range read past end of archive"))?;
        let range = format!("bytes={offset}-{last}");
        let response = self
            .http
            .send_with_retries(|| self.http.get(&self.url).header(RANGE, range.as_str()))?;
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(BiaError::ZipUnavailable(format!(
                "{} answered {range} with status {}",
                self.url,
                response.status().as_u16()
            )));
        }
        let body = response
            .bytes()
            .map_err(|err| BiaError::Http(err.to_string()))?;
        if body.len() as u64 != length {
            return Err(BiaError::ZipUnavailable(format!(
                "{} returned {} bytes for {range}",
                self.url,
                body.len()
            )));
        }
        Ok(body.to_vec())
    }
}

struct DirectoryLocation {
    offset: u64,
    size: u64,
}

/// List every member declared by the archive's central directory, in
/// directory order.
pub fn read_central_directory<S: RangeSource>(
    source: &mut S,
) -> Result<Vec<ZipMemberRecord>, BiaError> {
    let len = source.total_len();
    if len < EOCD_LEN {
        return Err(malformed("file is smaller than an end-of-central-directory record"));
    }
    let tail_len = len.min(EOCD_LEN + MAX_COMMENT_LEN);
    let tail_start = len - tail_len;
    let tail = source.read_range(tail_start, tail_len)?;
    let eocd_pos =
        find_eocd(&tail).ok_or_else(|| malformed("end-of-central-directory record not found"))?;
    let eocd = &tail[eocd_pos..];

    let entries = le_u16(eocd, 10);
    let size = le_u32(eocd, 12);
    let offset = le_u32(eocd, 16);
    let location = if entries == u16::MAX || size == u32::MAX || offset == u32::MAX {
        let eocd_abs = tail_start + eocd_pos as u64;
        read_zip64_location(source, eocd_abs)?
    } else {
        DirectoryLocation {
            offset: offset as u64,
            size: size as u64,
        }
    };

    if location.offset.checked_add(location.size).is_none_or(|end| end > len) {
        return Err(malformed("central directory extends past end of file"));
    }
    let directory = source.read_range(location.offset, location.size)?;
    parse_central_directory(&directory)
}

fn read_zip64_location<S: RangeSource>(
    source: &mut S,
    eocd_abs: u64,
) -> Result<DirectoryLocation, BiaError> {
    if eocd_abs < ZIP64_LOCATOR_LEN {
        return Err(malformed("zip64 locator missing"));
    }
    let locator = source.read_range(eocd_abs - ZIP64_LOCATOR_LEN, ZIP64_LOCATOR_LEN)?;
    if le_u32(&locator, 0) != ZIP64_LOCATOR_SIG {
        return Err(malformed("zip64 locator signature mismatch"));
    }
    let record_offset = le_u64(&locator, 8);
    if record_offset
        .checked_add(ZIP64_EOCD_LEN)
        .is_none_or(|end| end > eocd_abs - ZIP64_LOCATOR_LEN)
    {
        return Err(malformed("zip64 record offset out of range"));
    }
    let record = source.read_range(record_offset, ZIP64_EOCD_LEN)?;
    if le_u32(&record, 0) != ZIP64_EOCD_SIG {
        return Err(malformed("zip64 end-of-central-directory signature mismatch"));
    }
    Ok(DirectoryLocation {
        size: le_u64(&record, 40),
        offset: le_u64(&record, 48),
    })
}

fn find_eocd(tail: &[u8]) -> Option<usize> {
    let min = EOCD_LEN as usize;
    if tail.len() < min {
        return None;
    }
    (0..=tail.len() - min).rev().find(|&pos| {
        le_u32(tail, pos) == EOCD_SIG && pos + min + le_u16(tail, pos + 20) as usize <= tail.len()
    })
}

fn parse_central_directory(directory: &[u8]) -> Result<Vec<ZipMemberRecord>, BiaError> {
    let mut members = Vec::new();
    let mut cursor = 0usize;
    while cursor < directory.len() {
        let header = directory
            .get(cursor..cursor + CENTRAL_HEADER_LEN)
            .ok_or_else(|| malformed("truncated central directory header"))?;
        if le_u32(header, 0) != CENTRAL_HEADER_SIG {
            return Err(malformed("central directory header signature mismatch"));
        }
        let flags = le_u16(header, 8);
        let uncompressed = le_u32(header, 24);
        let name_len = le_u16(header, 28) as usize;
        let extra_len = le_u16(header, 30) as usize;
        let comment_len = le_u16(header, 32) as usize;

        let name_start = cursor + CENTRAL_HEADER_LEN;
        let extra_start = name_start + name_len;
        let next = extra_start + extra_len + comment_len;
        if next > directory.len() {
            return Err(malformed("central directory entry overruns directory"));
        }
        let name_bytes = &directory[name_start..extra_start];
        let filename = if flags & UTF8_NAME_FLAG != 0 {
            String::from_utf8_lossy(name_bytes).into_owned()
        } else {
            decode_cp437(name_bytes)
        };

        let size = if uncompressed == u32::MAX {
            zip64_uncompressed_size(&directory[extra_start..extra_start + extra_len])
                .ok_or_else(|| malformed("zip64 size missing from extra field"))?
        } else {
            uncompressed as u64
        };

        members.push(ZipMemberRecord { filename, size });
        cursor = next;
    }
    Ok(members)
}

fn zip64_uncompressed_size(mut extra: &[u8]) -> Option<u64> {
    while extra.len() >= 4 {
        let id = le_u16(extra, 0);
        let len = le_u16(extra, 2) as usize;
        let data = extra.get(4..4 + len)?;
        if id == ZIP64_EXTRA_ID {
            // Uncompressed size is always the first field when present.
            return (data.len() >= 8).then(|| le_u64(data, 0));
        }
        extra = &extra[4 + len..];
    }
    None
}

fn decode_cp437(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            0..=0x7f => byte as char,
            _ => CP437_HIGH[(byte - 0x80) as usize],
        })
        .collect()
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn malformed(reason: &str) -> BiaError {
    BiaError::ZipUnavailable(format!("malformed archive: {reason}"))
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
