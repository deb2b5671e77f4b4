use std::path::Path;

use git2::{DiffOptions, Patch};

use super::DOCUMENT_FILE;
use crate::error::Result;

/// Line-based unified diff of two document versions.
///
/// Only line content is compared: line terminators and a missing final
/// newline do not count as a change. Returns an empty string when the
/// documents are equal line by line.
pub fn unified_diff(old: &str, new: &str) -> Result<String> {
    let old = normalize_lines(old);
    let new = normalize_lines(new);
    if old == new {
        return Ok(String::new());
    }

    let mut opts = DiffOptions::new();
    opts.context_lines(3);

    let document = Path::new(DOCUMENT_FILE);
    let mut patch = Patch::from_buffers(
        old.as_bytes(),
        Some(document),
        new.as_bytes(),
        Some(document),
        Some(&mut opts),
    )?;

    let buf = patch.to_buf()?;
    let text = String::from_utf8_lossy(&buf).into_owned();
    if text.is_empty() {
        return Ok(format!("Binary files a/{DOCUMENT_FILE} and b/{DOCUMENT_FILE} differ\n"));
    }
    Ok(text)
}

fn normalize_lines(content: &str) -> String {
    let mut out = String::with_capacity(content.len() + 1);
    for line in content.lines() {
        out.push_str(line);
        out.push('\n');
    }
    out
}
