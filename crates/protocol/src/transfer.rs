//! File service framing: catalog listings, chunk requests and the chunk
//! preamble.
//!
//! # Chunk reply
//!
//! ```text
//! start == 0:  [1024 bytes: "<name>,<size>" + NUL padding][data]
//! start  > 0:  [data]
//! ```

use crate::ParseError;
use crate::constants::Tag;
use crate::tags::wrap;

/// Size of the header prepended to the first chunk of a file.
pub const PREAMBLE_SIZE: usize = 1024;

/// Reply to `send_file_list` for an empty catalog.
///
/// Not well-formed (the closing `<` is missing); panels in the field match
/// it byte for byte.
pub const EMPTY_FILE_LIST: &str = "<file_list>0/file_list>";

/// One catalog entry as announced to panels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListing {
    pub name: String,
    pub size: u64,
}

/// Encodes the `file_list` reply.
pub fn encode_file_list(entries: &[FileListing]) -> String {
    if entries.is_empty() {
        return EMPTY_FILE_LIST.to_string();
    }
    let list = entries
        .iter()
        .map(|e| format!("{};{}", e.name, e.size))
        .collect::<Vec<_>>()
        .join(",");
    wrap(Tag::FileList, list)
}

/// Parses a `file_list` reply (panel side). The empty-list token yields an
/// empty vector.
pub fn parse_file_list(message: &str) -> Option<Vec<FileListing>> {
    if message.contains(EMPTY_FILE_LIST) {
        return Some(Vec::new());
    }
    let list = Tag::FileList.extract(message)?;
    list.split(',')
        .map(|entry| {
            let (name, size) = entry.rsplit_once(';')?;
            Some(FileListing {
                name: name.to_string(),
                size: size.parse().ok()?,
            })
        })
        .collect()
}

/// A byte-range request: `<get>name,start,length</get>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub file_name: String,
    pub start: u64,
    pub length: u64,
}

impl GetRequest {
    /// Parses the value of a `get` element. Fields beyond the third are
    /// ignored.
    pub fn parse(token: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = token.split(',').collect();
        if fields.len() < 3 {
            return Err(ParseError::MissingFields {
                tag: Tag::Get.as_str(),
                expected: 3,
                got: fields.len(),
            });
        }
        let number = |field: &str| {
            field
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidValue {
                    tag: Tag::Get.as_str(),
                    value: token.to_string(),
                })
        };
        Ok(Self {
            file_name: fields[0].to_string(),
            start: number(fields[1])?,
            length: number(fields[2])?,
        })
    }

    /// Encodes the request (panel side).
    pub fn encode(&self) -> String {
        wrap(
            Tag::Get,
            format!("{},{},{}", self.file_name, self.start, self.length),
        )
    }
}

/// Encodes the reply for a request naming a file that does not exist.
/// `token` is the raw value of the `get` element.
pub fn encode_missing_file(token: &str) -> String {
    wrap(Tag::MissingFile, format!("get,{token}"))
}

/// Builds the [`PREAMBLE_SIZE`]-byte header for the first chunk of a file.
pub fn encode_preamble(file_name: &str, file_size: u64) -> Result<Vec<u8>, ParseError> {
    let mut buf = format!("{file_name},{file_size}").into_bytes();
    if buf.len() > PREAMBLE_SIZE {
        return Err(ParseError::PreambleOverflow {
            len: buf.len(),
            max: PREAMBLE_SIZE,
        });
    }
    buf.resize(PREAMBLE_SIZE, 0);
    Ok(buf)
}

/// Reads the file name and total size from a first-chunk frame.
pub fn decode_preamble(frame: &[u8]) -> Option<(String, u64)> {
    let header = frame.get(..PREAMBLE_SIZE)?;
    let end = header.iter().position(|&b| b == 0).unwrap_or(PREAMBLE_SIZE);
    let text = std::str::from_utf8(&header[..end]).ok()?;
    let (name, size) = text.rsplit_once(',')?;
    Some((name.to_string(), size.parse().ok()?))
}
