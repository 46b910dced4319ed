//! Multi-document YAML stream splitting.
//!
//! The splitter never truncates: a document is either yielded whole or
//! rejected with [`GatekeeperError::DocumentTooLarge`].
use std::io::{BufRead, Read};

use crate::error::{GatekeeperError, Result};

/// Default ceiling for a single document.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;

const SEPARATOR: &[u8] = b"---";

/// Extra read allowance past the document budget so a separator line is
/// still recognised when the preceding document sits exactly at the limit.
const SEPARATOR_SLACK: usize = 256;

/// Lazy iterator over the raw documents of a YAML stream.
///
/// The sequence is single-pass and fused: after end of input or the first
/// error it yields `None` forever.
pub struct DocumentSplitter<R> {
    reader: R,
    max_document_bytes: usize,
    index: usize,
    done: bool,
}

/// Split a YAML stream on `---` boundary lines.
pub fn split<R: BufRead>(reader: R, max_document_bytes: usize) -> DocumentSplitter<R> {
    DocumentSplitter {
        reader,
        max_document_bytes,
        index: 0,
        done: false,
    }
}

impl<R: BufRead> DocumentSplitter<R> {
    fn next_document(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buffer = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            // Bounded read so an overlong line is detected without holding it
            // entirely in memory.
            let budget = (self.max_document_bytes - buffer.len() + SEPARATOR_SLACK + 1) as u64;
            let read = (&mut self.reader)
                .take(budget)
                .read_until(b'\n', &mut line)
                .map_err(|err| {
                    GatekeeperError::io(format!("read document {}", self.index), err)
                })?;
            if read == 0 {
                return Ok(keep_document(buffer));
            }
            if is_separator(&line) {
                if let Some(document) = keep_document(std::mem::take(&mut buffer)) {
                    return Ok(Some(document));
                }
                continue;
            }
            if buffer.len() + line.len() > self.max_document_bytes {
                return Err(GatekeeperError::DocumentTooLarge {
                    index: self.index,
                    limit: self.max_document_bytes,
                });
            }
            buffer.extend_from_slice(&line);
        }
    }
}

impl<R: BufRead> Iterator for DocumentSplitter<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_document() {
            Ok(Some(document)) => {
                self.index += 1;
                Some(Ok(document))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// `---` alone on a line, optionally followed by a `#` comment.
fn is_separator(line: &[u8]) -> bool {
    let Some(rest) = line.strip_prefix(SEPARATOR) else {
        return false;
    };
    match rest.iter().position(|byte| !byte.is_ascii_whitespace()) {
        None => true,
        Some(start) => rest[start] == b'#',
    }
}

fn keep_document(buffer: Vec<u8>) -> Option<Vec<u8>> {
    if buffer.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(buffer)
    }
}
