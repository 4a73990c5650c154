//! Result output as JSON Lines or a single JSON array.
//!
//! JSONL output is streamed: each image result is written as soon as it
//! completes. JSON array output buffers until [`OutputWriter::finish`].

use serde::Serialize;
use std::io::{self, Write};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One JSON array written at the end
    Json,
    /// One JSON object per line
    #[default]
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes results to an underlying writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    /// Items held back for the array in JSON mode
    buffered: Vec<serde_json::Value>,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            buffered: Vec::new(),
            items_written: 0,
        }
    }

    /// Write one item (JSONL) or buffer it for the final array (JSON).
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                writeln!(self.writer)?;
                // Keep partial output usable if the run dies mid-way
                self.writer.flush()?;
            }
            OutputFormat::Json => {
                self.buffered
                    .push(serde_json::to_value(item).map_err(io::Error::other)?);
            }
        }
        self.items_written += 1;
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Emit any buffered array and flush, returning the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, &self.buffered)
                .map_err(io::Error::other)?;
            writeln!(self.writer)?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}
