//! Incremental (push) parsing.
//!
//! The caller writes chunks with [`PushParser::push`]; a parser thread reads
//! them from a bounded channel through a blocking [`Read`] adapter and runs
//! the regular tree builder. [`PushParser::finish`] signals end of input,
//! joins the thread and hands back the [`Document`].
//!
//! ```
//! use xmlfacade::parser::PushParser;
//!
//! let mut parser = PushParser::new();
//! parser.push(b"<root>").unwrap();
//! parser.push(b"<child>Hello</child>").unwrap();
//! parser.push(b"</root>").unwrap();
//!
//! let doc = parser.finish().unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(root), Some("root"));
//! ```

use std::io::{self, BufReader, Read};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::error::{ParseError, SourceLocation};
use crate::parser::ParseOptions;
use crate::tree::Document;

/// Number of chunks that may wait in the channel before `push` blocks.
const DEFAULT_CAPACITY: usize = 16;

enum Chunk {
    Data(Vec<u8>),
    End,
}

/// Blocking reader over the chunk channel.
struct ChunkReader {
    rx: Receiver<Chunk>,
    current: Vec<u8>,
    pos: usize,
    done: bool,
}

impl Read for ChunkReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.current.len() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Chunk::Data(data)) => {
                    self.current = data;
                    self.pos = 0;
                }
                // a dropped sender is an end of input too
                Ok(Chunk::End) | Err(_) => self.done = true,
            }
        }
        let n = out.len().min(self.current.len() - self.pos);
        out[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// A push-based (incremental) parser.
///
/// Chunks may split tokens, tags or multi-byte characters at arbitrary
/// boundaries. Dropping an unfinished parser closes the channel; the parser
/// thread then sees end of input and exits on its own.
pub struct PushParser {
    tx: Option<SyncSender<Chunk>>,
    worker: Option<JoinHandle<Result<Document, ParseError>>>,
    pushed: usize,
}

impl PushParser {
    /// Creates a push parser with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Creates a push parser with the given options.
    #[must_use]
    pub fn with_options(options: ParseOptions) -> Self {
        Self::with_capacity(options, DEFAULT_CAPACITY)
    }

    /// Creates a push parser whose channel holds at most `capacity` pending
    /// chunks.
    #[must_use]
    pub fn with_capacity(options: ParseOptions, capacity: usize) -> Self {
        let (tx, rx) = sync_channel(capacity);
        let worker = thread::spawn(move || {
            let source = ChunkReader {
                rx,
                current: Vec::new(),
                pos: 0,
                done: false,
            };
            let reader = super::xml::reader(BufReader::new(source));
            super::xml::run(reader, &options)
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
            pushed: 0,
        }
    }

    /// Feeds a chunk of raw bytes, blocking while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns the parser's error if it already stopped on malformed input,
    /// or an error if [`finish`](Self::finish) was already called.
    pub fn push(&mut self, data: &[u8]) -> Result<(), ParseError> {
        let Some(tx) = &self.tx else {
            return Err(ParseError::new(
                "push parser already finished",
                SourceLocation::default(),
            ));
        };
        if data.is_empty() {
            return Ok(());
        }
        trace!(bytes = data.len(), "push");
        if tx.send(Chunk::Data(data.to_vec())).is_err() {
            // the parser thread hung up early, which only happens on error
            self.tx = None;
            return match self.join() {
                Err(err) => Err(err),
                Ok(_) => Err(ParseError::new(
                    "push parser stopped before end of input",
                    SourceLocation::default(),
                )),
            };
        }
        self.pushed += data.len();
        Ok(())
    }

    /// Signals end of input and waits for the finished document.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the pushed input was not well-formed.
    pub fn finish(mut self) -> Result<Document, ParseError> {
        if let Some(tx) = self.tx.take() {
            // a closed channel means the thread is already done
            let _ = tx.send(Chunk::End);
        }
        debug!(bytes = self.pushed, "push parser finished");
        self.join()
    }

    /// Total number of bytes accepted so far.
    #[must_use]
    pub fn pushed_bytes(&self) -> usize {
        self.pushed
    }

    fn join(&mut self) -> Result<Document, ParseError> {
        let Some(worker) = self.worker.take() else {
            return Err(ParseError::new(
                "push parser already finished",
                SourceLocation::default(),
            ));
        };
        worker.join().unwrap_or_else(|_| {
            Err(ParseError::new(
                "push parser thread panicked",
                SourceLocation::default(),
            ))
        })
    }
}

impl Default for PushParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PushParser {
    fn drop(&mut self) {
        self.tx = None;
    }
}

impl std::fmt::Debug for PushParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushParser")
            .field("pushed_bytes", &self.pushed)
            .field("open", &self.tx.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_parser_multiple_chunks() {
        let mut parser = PushParser::new();
        parser.push(b"<root>").unwrap();
        parser.push(b"<child>text</child>").unwrap();
        parser.push(b"</root>").unwrap();
        let doc = parser.finish().unwrap();
        let root = doc.root_element().unwrap();
        let child = doc.first_child(root).unwrap();
        assert_eq!(doc.node_name(child), Some("child"));
        assert_eq!(doc.text_content(child), "text");
    }

    #[test]
    fn test_push_parser_split_token() {
        let mut parser = PushParser::new();
        for chunk in [&b"<ro"[..], b"ot att", b"r=\"val", b"ue\"/>"] {
            parser.push(chunk).unwrap();
        }
        let doc = parser.finish().unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.node_name(root), Some("root"));
        assert_eq!(doc.attribute(root, "attr"), Some("value"));
    }

    #[test]
    fn test_push_parser_byte_at_a_time_small_channel() {
        let xml = "<root><child>h\u{e9}</child></root>".as_bytes();
        let mut parser = PushParser::with_capacity(ParseOptions::default(), 1);
        for &byte in xml {
            parser.push(&[byte]).unwrap();
        }
        assert_eq!(parser.pushed_bytes(), xml.len());
        let doc = parser.finish().unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.text_content(root), "h\u{e9}");
    }

    #[test]
    fn test_push_parser_declaration_split() {
        let mut parser = PushParser::new();
        parser.push(b"<?xml ver").unwrap();
        parser.push(b"sion=\"1.0\" encoding=\"UTF-8\"?>").unwrap();
        parser.push(b"<root/>").unwrap();
        let doc = parser.finish().unwrap();
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_push_parser_empty_input() {
        assert!(PushParser::new().finish().is_err());
    }

    #[test]
    fn test_push_parser_malformed() {
        let mut parser = PushParser::new();
        parser.push(b"<a></b>").unwrap();
        let err = parser.finish().unwrap_err();
        assert_eq!(err.location.byte_offset, 3);
    }

    #[test]
    fn test_push_parser_recover() {
        let mut parser = PushParser::with_options(ParseOptions::default().recover(true));
        parser.push(b"<a></b>").unwrap();
        let doc = parser.finish().unwrap();
        assert!(!doc.diagnostics.is_empty());
    }

    #[test]
    fn test_drop_unfinished_parser() {
        let mut parser = PushParser::new();
        parser.push(b"<a>").unwrap();
        drop(parser);
    }
}
