//! JSON Lines input. The whole stream is materialized before analysis.

use serde_json::Value;
use std::io::BufRead;

use crate::error::AnalyticsResult;

/// One line of the input stream, parsed or not.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// 1-based line number.
    pub line: usize,
    pub parsed: Result<Value, String>,
}

/// Read every non-blank line. Lines that are not JSON are kept with their
/// parse error so the normalizer can audit them; only IO errors abort.
pub fn read_json_lines<R: BufRead>(reader: R) -> AnalyticsResult<Vec<RawLine>> {
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_text = line?;
        let trimmed = line_text.trim();
        if trimmed.is_empty() {
            continue;
        }
        lines.push(RawLine {
            line: idx + 1,
            parsed: serde_json::from_str(trimmed).map_err(|e| e.to_string()),
        });
    }
    Ok(lines)
}

/// Wrap already-parsed values, numbering them from 1.
pub fn from_values(values: Vec<Value>) -> Vec<RawLine> {
    values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| RawLine {
            line: idx + 1,
            parsed: Ok(value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_json_lines_keeps_bad_lines() {
        let input = "{\"outlet_id\":\"a\"}\n\n not json\n{\"outlet_id\":\"b\"}\n";
        let lines = read_json_lines(input.as_bytes()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].line, 1);
        assert!(lines[1].parsed.is_err());
        assert_eq!(lines[1].line, 3);
        assert_eq!(lines[2].line, 4);
    }
}
