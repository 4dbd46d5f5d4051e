//! Message locators: map a mailbox file or folder into an ordered sequence
//! of addressable messages without materializing all bodies at once.
//!
//! For one-file-per-message formats (emlx, maildir) a locator is just a
//! file path. For mbox files it is a byte range, computed once in a single
//! delimiter scan at import time and reused for random access during the
//! upload. The mbox file must not be mutated externally during a session.

use thiserror::Error;

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("Could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Message too large: {size} bytes (limit is {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("Could not parse message envelope: {0}")]
    Envelope(String),
}

/// The line-ending convention of a message or mbox file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::CrLf => b"\r\n",
        }
    }

    /// Look at the first line terminator in `data`. Defaults to `Lf` for
    /// data without any newline.
    pub fn detect(data: &[u8]) -> LineEnding {
        match data.iter().position(|b| *b == b'\n') {
            Some(index) if index > 0 && data[index - 1] == b'\r' => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }
}

/// The locator table of one mbox file: one byte range per message. The
/// ranges exclude the `From ` delimiter lines, so the delimiter lines are
/// exactly the gaps between consecutive ranges.
#[derive(Debug, Clone)]
pub struct MboxIndex {
    pub path: PathBuf,
    pub eol: LineEnding,
    pub ranges: Vec<Range<u64>>,
}

/// Scan `path` once for `From ` delimiter lines. Any content before the
/// first delimiter (some writers put a comment preamble there) is ignored.
pub fn scan_mbox(path: &Path) -> Result<MboxIndex, LocatorError> {
    let file = File::open(path).map_err(|source| LocatorError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut eol = None;
    let mut ranges: Vec<Range<u64>> = Vec::new();
    let mut offset: u64 = 0;
    let mut in_message = false;
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| LocatorError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        // The convention of the file is taken from its first terminated line.
        if eol.is_none() && line.ends_with(b"\n") {
            eol = Some(LineEnding::detect(&line));
        }
        let line_end = offset + read as u64;
        if line.starts_with(b"From ") {
            if let Some(last) = ranges.last_mut() {
                last.end = offset;
            }
            // The message body starts right after the delimiter line.
            ranges.push(line_end..line_end);
            in_message = true;
        } else if in_message {
            if let Some(last) = ranges.last_mut() {
                last.end = line_end;
            }
        }
        offset = line_end;
    }

    Ok(MboxIndex {
        path: path.to_path_buf(),
        eol: eol.unwrap_or(LineEnding::Lf),
        ranges,
    })
}

/// Random access into an mbox file: read exactly the bytes of one range.
pub fn read_range(path: &Path, range: &Range<u64>) -> Result<Vec<u8>, LocatorError> {
    let unreadable = |source| LocatorError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(unreadable)?;
    file.seek(SeekFrom::Start(range.start)).map_err(unreadable)?;
    let len = (range.end - range.start) as usize;
    let mut data = vec![0u8; len];
    file.read_exact(&mut data).map_err(unreadable)?;
    Ok(data)
}

/// One message file of a one-file-per-message store. The seen flag is
/// known at scan time for maildir and at parse time for emlx.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    pub seen: Option<bool>,
}

/// How the files of a [`MessageStore::Files`] store are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFlavor {
    /// Apple Mail `.emlx`: a length line, the message, a property list.
    Emlx,
    /// The file is the raw RFC822 message (maildir).
    Raw,
}

/// The messages behind one outline item.
#[derive(Debug)]
pub enum MessageStore {
    /// A folder node without messages of its own.
    None,
    Files {
        flavor: FileFlavor,
        entries: Vec<FileEntry>,
    },
    Mbox(MboxIndex),
}

/// One resolved message, plus whatever the locator learned about it on
/// the way.
#[derive(Debug)]
pub struct Extracted {
    pub data: Vec<u8>,
    pub path: PathBuf,
    pub byte_range: Option<Range<u64>>,
    pub eol: LineEnding,
    pub seen: Option<bool>,
}

impl MessageStore {
    pub fn len(&self) -> usize {
        match self {
            MessageStore::None => 0,
            MessageStore::Files { entries, .. } => entries.len(),
            MessageStore::Mbox(index) => index.ranges.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The file a message at `index` lives in, for diagnostics.
    pub fn path_of(&self, index: usize) -> Option<&Path> {
        match self {
            MessageStore::None => None,
            MessageStore::Files { entries, .. } => entries.get(index).map(|e| e.path.as_path()),
            MessageStore::Mbox(index_table) => {
                index_table.ranges.get(index).map(|_| index_table.path.as_path())
            }
        }
    }

    /// The byte range of a message at `index`, for mbox stores.
    pub fn range_of(&self, index: usize) -> Option<Range<u64>> {
        match self {
            MessageStore::Mbox(index_table) => index_table.ranges.get(index).cloned(),
            _ => None,
        }
    }

    /// Resolve the message at `index`. The body is only read here, lazily,
    /// one message at a time.
    pub fn extract(&self, index: usize, max_size: u64) -> Result<Extracted, LocatorError> {
        match self {
            MessageStore::None => Err(LocatorError::Envelope("Empty store".into())),
            MessageStore::Files { flavor, entries } => {
                let entry = &entries[index];
                let data = std::fs::read(&entry.path).map_err(|source| {
                    LocatorError::Unreadable {
                        path: entry.path.clone(),
                        source,
                    }
                })?;
                let (data, seen) = match flavor {
                    FileFlavor::Emlx => {
                        let parsed = emlx::parse_emlx(&data)
                            .map_err(|e| LocatorError::Envelope(format!("{:?}", e)))?;
                        let seen = Some(parsed.flags.is_read);
                        (parsed.message.to_vec(), seen)
                    }
                    FileFlavor::Raw => (data, entry.seen),
                };
                if data.len() as u64 > max_size {
                    return Err(LocatorError::TooLarge {
                        size: data.len() as u64,
                        limit: max_size,
                    });
                }
                let eol = LineEnding::detect(&data);
                Ok(Extracted {
                    data,
                    path: entry.path.clone(),
                    byte_range: None,
                    eol,
                    seen,
                })
            }
            MessageStore::Mbox(index_table) => {
                let range = &index_table.ranges[index];
                let size = range.end - range.start;
                // Ranges are known up front, so the oversize check happens
                // before any bytes are read.
                if size > max_size {
                    return Err(LocatorError::TooLarge {
                        size,
                        limit: max_size,
                    });
                }
                let data = read_range(&index_table.path, range)?;
                Ok(Extracted {
                    data,
                    path: index_table.path.clone(),
                    byte_range: Some(range.clone()),
                    eol: index_table.eol,
                    seen: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MBOX: &[u8] = b"From alice@example.com Thu Jan  1 00:00:01 2009\n\
Subject: One\nMessage-ID: <one@example.com>\n\nHello\n\
From bob@example.com Thu Jan  1 00:00:02 2009\n\
Subject: Two\n\nFirst line\nSecond line\n\
From carol@example.com Thu Jan  1 00:00:03 2009\n\
Subject: Three\n\nBye\n";

    fn write_mbox(content: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.mbox");
        let mut file = File::create(&path).expect("create");
        file.write_all(content).expect("write");
        (dir, path)
    }

    #[test]
    fn test_scan_finds_all_messages() {
        let (_dir, path) = write_mbox(MBOX);
        let index = scan_mbox(&path).expect("scan");
        assert_eq!(index.ranges.len(), 3);
        assert_eq!(index.eol, LineEnding::Lf);
    }

    #[test]
    fn test_ranges_round_trip() {
        let (_dir, path) = write_mbox(MBOX);
        let index = scan_mbox(&path).expect("scan");
        // Delimiter lines are the gaps between ranges; gluing gaps and
        // ranges back together must reproduce the file exactly.
        let mut reconstructed: Vec<u8> = Vec::new();
        let mut cursor = 0u64;
        for range in &index.ranges {
            reconstructed.extend(read_range(&path, &(cursor..range.start)).unwrap());
            reconstructed.extend(read_range(&path, range).unwrap());
            cursor = range.end;
        }
        assert_eq!(reconstructed, MBOX);
    }

    #[test]
    fn test_crlf_detection() {
        let content = b"From alice@example.com Thu Jan  1 00:00:01 2009\r\n\
Subject: One\r\n\r\nHello\r\n";
        let (_dir, path) = write_mbox(content);
        let index = scan_mbox(&path).expect("scan");
        assert_eq!(index.eol, LineEnding::CrLf);
        assert_eq!(index.ranges.len(), 1);
        let body = read_range(&path, &index.ranges[0]).unwrap();
        assert_eq!(&body[..], b"Subject: One\r\n\r\nHello\r\n".as_slice());
    }

    #[test]
    fn test_extract_respects_size_limit() {
        let (_dir, path) = write_mbox(MBOX);
        let index = scan_mbox(&path).expect("scan");
        let store = MessageStore::Mbox(index);
        let err = store.extract(1, 4).unwrap_err();
        assert!(matches!(err, LocatorError::TooLarge { .. }));
        // A generous limit resolves fine.
        assert!(store.extract(1, 1024).is_ok());
    }

    #[test]
    fn test_preamble_is_ignored() {
        let mut content = b"This is an mbox preamble.\n".to_vec();
        content.extend_from_slice(MBOX);
        let (_dir, path) = write_mbox(&content);
        let index = scan_mbox(&path).expect("scan");
        assert_eq!(index.ranges.len(), 3);
    }
}
