// src/csv_parser.rs

use anyhow::Context;
use log::{debug, info};

use crate::error::{CleanerError, Result};
use crate::models::{CsvTable, Row};

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Picks the delimiter with the most unquoted occurrences in `header_line`.
/// Ties keep the earlier candidate; no occurrences at all means comma.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = 0usize;
    for delimiter in CANDIDATE_DELIMITERS {
        let mut in_quotes = false;
        let mut count = 0usize;
        for byte in header_line.bytes() {
            if byte == b'"' {
                in_quotes = !in_quotes;
            } else if byte == delimiter && !in_quotes {
                count += 1;
            }
        }
        if count > best_count {
            best_count = count;
            best = delimiter;
        }
    }
    debug!(
        "Detected delimiter: {} (count: {})",
        if best == b'\t' { "TAB".to_string() } else { (best as char).to_string() },
        best_count
    );
    best
}

fn has_unterminated_quote(content: &str) -> bool {
    let mut in_quotes = false;
    for byte in content.bytes() {
        if byte == b'"' {
            // Doubled quotes toggle twice, so escapes cancel out.
            in_quotes = !in_quotes;
        }
    }
    in_quotes
}

/// Parses loosely delimited CSV text into headers and rows.
///
/// Blank lines are skipped, values are trimmed, short records are padded with
/// empty strings and surplus values are dropped.
pub fn parse_csv(content: &str) -> Result<CsvTable> {
    let Some(header_line) = content.lines().find(|l| !l.trim().is_empty()) else {
        return Ok(CsvTable::default());
    };
    if has_unterminated_quote(content) {
        return Err(CleanerError::Parse(
            "quoted field is not terminated before end of input".to_string(),
        ));
    }

    let delimiter = detect_delimiter(header_line);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CleanerError::Parse(format!("unreadable header line: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(CleanerError::Parse("header line has no columns".to_string()));
    }

    let mut rows = Vec::new();
    for (line_no, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            CleanerError::Parse(format!("record {} is malformed: {}", line_no + 1, e))
        })?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.clone(), record.get(idx).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    info!(
        "Parsed CSV: {} columns, {} rows",
        headers.len(),
        rows.len()
    );
    Ok(CsvTable { headers, rows })
}

/// Writes rows as comma-separated text in `headers` order, quoting only the
/// values that need it.
pub fn write_csv(headers: &[String], rows: &[Row]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(headers)
        .context("Failed to write CSV header")?;
    for row in rows {
        writer
            .write_record(headers.iter().map(|h| row.get(h)))
            .context("Failed to write CSV record")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    let text = String::from_utf8(bytes).context("CSV output is not valid UTF-8")?;
    Ok(text)
}
