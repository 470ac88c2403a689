//! Delimited keyword file loader.
//!
//! Reads keyword exports from Keyword Planner style tools: CSV, TSV or
//! semicolon separated, in whatever encoding the tool produced. The keyword
//! column and optional volume column are located by header alias.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info};

use crate::clustering::KeywordInput;
use crate::error::{InputError, Result};

use super::normalize::parse_volume_str;

/// Delimiters tried in order until one exposes a keyword column.
const DELIMITERS: [u8; 3] = [b',', b'\t', b';'];

/// Header names accepted for the keyword column.
pub const KEYWORD_COLUMN_ALIASES: [&str; 5] =
    ["keyword", "keywords", "search term", "search terms", "từ khóa"];

/// Header names accepted for the volume column.
pub const VOLUME_COLUMN_ALIASES: [&str; 5] = [
    "avg. monthly searches",
    "average monthly searches",
    "search volume",
    "volume",
    "số lượng tìm kiếm",
];

/// Load `(text, volume)` records from a delimited file.
pub fn load_keywords_from_file(path: impl AsRef<Path>) -> Result<Vec<KeywordInput>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(InputError::FileNotFound(path.display().to_string()).into());
    }

    let bytes = std::fs::read(path)?;
    let text = decode_bytes(&bytes);
    let records = parse_keywords(&text)?;

    info!(
        path = %path.display(),
        keywords = records.len(),
        "Loaded keyword file"
    );

    Ok(records)
}

/// Decode raw file bytes, honoring a BOM, then UTF-8, then a detector guess.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let encoding: &'static Encoding = if let Some((enc, _)) = Encoding::for_bom(bytes) {
        enc
    } else if std::str::from_utf8(bytes).is_ok() {
        UTF_8
    } else {
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        detector.guess(None, true)
    };

    let (text, used, had_errors) = encoding.decode(bytes);
    debug!(encoding = used.name(), had_errors, "Decoded keyword file");
    text.into_owned()
}

/// Parse decoded file contents into keyword records.
pub fn parse_keywords(text: &str) -> Result<Vec<KeywordInput>> {
    let mut last_columns: Vec<String> = Vec::new();

    for delimiter in DELIMITERS {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = match reader.headers() {
            Ok(h) => h
                .iter()
                .map(|c| c.trim_start_matches('\u{feff}').trim().to_string())
                .collect(),
            Err(e) => {
                debug!(delimiter = %(delimiter as char).escape_default(), error = %e, "Header read failed");
                continue;
            }
        };

        let keyword_col = match find_column(&headers, &KEYWORD_COLUMN_ALIASES) {
            Some(idx) => idx,
            None => {
                // Report the split that found the most columns.
                if headers.len() > last_columns.len() {
                    last_columns = headers;
                }
                continue;
            }
        };
        let volume_col = find_column(&headers, &VOLUME_COLUMN_ALIASES);

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for row in reader.records() {
            let row = match row {
                Ok(r) => r,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };

            // Rows wider than the header are malformed.
            if row.len() > headers.len() {
                skipped += 1;
                continue;
            }

            let keyword = row.get(keyword_col).map(str::trim).unwrap_or("");
            if keyword.is_empty() {
                continue;
            }

            let volume = volume_col
                .and_then(|idx| row.get(idx))
                .map(parse_volume_str)
                .unwrap_or(0);

            records.push(KeywordInput::new(keyword, volume));
        }

        if skipped > 0 {
            debug!(skipped, "Skipped malformed rows");
        }

        return Ok(records);
    }

    Err(InputError::MissingKeywordColumn {
        columns: last_columns,
    }
    .into())
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    aliases
        .iter()
        .find_map(|alias| lowered.iter().position(|h| h == alias))
}
