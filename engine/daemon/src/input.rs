//! JSON-lines event input
//!
//! One [`InboundEvent`] per line. Blank lines and `#` comments are skipped;
//! malformed lines are logged and skipped so one bad producer line never
//! stops the stream.

use std::path::Path;

use anyhow::{Context, Result};
use ethereal_core::InboundEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::warn;

/// Boxed line reader over stdin or a file
pub type EventLines = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

/// Open the event stream: the file at `path`, or stdin
pub async fn open(path: Option<&Path>) -> Result<EventLines> {
    let reader: Box<dyn AsyncBufRead + Send + Unpin> = match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input file: {path:?}"))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    Ok(reader.lines())
}

/// Parse one input line
pub fn parse_line(line_number: usize, line: &str) -> Option<InboundEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    match serde_json::from_str(trimmed) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(line = line_number, error = %e, "Skipping malformed input line");
            None
        }
    }
}
