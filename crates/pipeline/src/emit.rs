use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

/// Writes one JSON object per line and flushes after each.
#[derive(Debug)]
pub struct Emitter<W: Write> {
    out: W,
    emitted: usize,
    dropped: usize,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Emitter { out, emitted: 0, dropped: 0 }
    }

    /// `Ok(false)` when the value could not be serialized and was dropped.
    /// I/O errors on the output itself are returned.
    pub fn emit<T: Serialize>(&mut self, value: &T) -> io::Result<bool> {
        let mut line = match serde_json::to_vec(value) {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "record encoding failed; dropped");
                self.dropped += 1;
                return Ok(false);
            }
        };
        line.push(b'\n');
        self.out.write_all(&line)?;
        self.out.flush()?;
        self.emitted += 1;
        Ok(true)
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
