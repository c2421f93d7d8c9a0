//! Bulk request framing for newline-delimited JSON input.
//!
//! Every input line becomes two output lines: an `index` action naming the
//! target index, then the document itself with a `project` field appended.
//! The field is added by replacing the document's closing `}` rather than by
//! decoding and re-encoding it, so the fast path expects each line to be a
//! single JSON object ending in `}` with no trailing whitespace. Lines that
//! break that contract are framed anyway and get rejected by the store.
//! [`BulkFrameBuilder::with_validation`] switches to a checked mode that
//! merges the field structurally whenever the fast path would be unsafe.

use crate::utils::error::{PusherError, Result};
use serde_json::Value;

/// Accumulates one bulk payload. The buffer belongs to the builder; writes
/// need `&mut self`, and [`finish`](Self::finish) hands the payload out and
/// leaves the builder empty.
#[derive(Debug, Clone)]
pub struct BulkFrameBuilder {
    action_line: Vec<u8>,
    provenance: String,
    project_field: Vec<u8>,
    validate: bool,
    buf: Vec<u8>,
    documents: usize,
}

impl BulkFrameBuilder {
    pub fn new(index_name: &str, provenance: &str) -> Self {
        let action_line = format!(
            "{{\"index\":{{\"_index\":{}}}}}\n",
            Value::String(index_name.to_string())
        );
        let project_field = format!(",\"project\":{}}}", Value::String(provenance.to_string()));

        Self {
            action_line: action_line.into_bytes(),
            provenance: provenance.to_string(),
            project_field: project_field.into_bytes(),
            validate: false,
            buf: Vec::new(),
            documents: 0,
        }
    }

    /// Checked mode: every line must decode as a JSON object, blank lines are
    /// skipped, and objects that are empty, already carry `project`, or do
    /// not end in `}` are merged through `serde_json`.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    pub fn document_count(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Frames every `\n` separated line of `lines`.
    pub fn push_lines(&mut self, lines: &[u8]) -> Result<()> {
        for (number, line) in lines.split(|b| *b == b'\n').enumerate() {
            if self.validate {
                self.push_checked(number + 1, line)?;
            } else {
                self.push_fast(line);
            }
        }
        Ok(())
    }

    fn push_fast(&mut self, line: &[u8]) {
        let stem = line.strip_suffix(b"}").unwrap_or(line);
        self.write_pair(stem, true);
    }

    fn push_checked(&mut self, number: usize, line: &[u8]) -> Result<()> {
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(());
        }

        let mut object = match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(PusherError::ProcessingError {
                    message: format!("line {} is not a JSON object", number),
                })
            }
            Err(e) => {
                return Err(PusherError::ProcessingError {
                    message: format!("line {} is not valid JSON: {}", number, e),
                })
            }
        };

        if !object.is_empty() && !object.contains_key("project") && line.ends_with(b"}") {
            self.push_fast(line);
            return Ok(());
        }

        tracing::debug!("Line {} merged structurally", number);
        object.insert("project".to_string(), Value::String(self.provenance.clone()));
        let merged = serde_json::to_vec(&Value::Object(object))?;
        self.write_pair(&merged, false);
        Ok(())
    }

    /// Writes the action line followed by the document, closing it with the
    /// project field when `append_project` is set.
    fn write_pair(&mut self, document: &[u8], append_project: bool) {
        let extra = if append_project {
            self.project_field.len()
        } else {
            0
        };
        self.buf
            .reserve(self.action_line.len() + document.len() + extra + 1);
        self.buf.extend_from_slice(&self.action_line);
        self.buf.extend_from_slice(document);
        if append_project {
            self.buf.extend_from_slice(&self.project_field);
        }
        self.buf.push(b'\n');
        self.documents += 1;

        tracing::trace!("Adding line {}", String::from_utf8_lossy(document));
    }

    /// Returns the framed payload and resets the builder.
    pub fn finish(&mut self) -> Vec<u8> {
        tracing::debug!("Framed {} documents for bulk request", self.documents);
        self.documents = 0;
        std::mem::take(&mut self.buf)
    }
}

/// Frames `lines` for a bulk request against `index_name`, tagging every
/// document with `"project": provenance`. Each call uses its own buffer.
pub fn build_bulk_frame(lines: &[u8], index_name: &str, provenance: &str) -> Vec<u8> {
    let mut builder = BulkFrameBuilder::new(index_name, provenance);
    for line in lines.split(|b| *b == b'\n') {
        builder.push_fast(line);
    }
    builder.finish()
}
