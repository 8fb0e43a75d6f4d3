use chrono::{NaiveDate, NaiveDateTime};

use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Parse a comma/whitespace separated list of positive integer ids,
/// dropping non-numeric and non-positive tokens and deduplicating while
/// preserving first-seen order.
pub fn parse_id_list(raw: &str) -> Vec<i32> {
    let mut ids = Vec::new();
    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        if let Ok(id) = token.parse::<i32>() {
            if id > 0 && !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Parse a single optional id the way the report endpoint does: blank,
/// non-numeric and non-positive values mean "no filter".
pub fn parse_optional_id(raw: Option<&str>) -> Option<i32> {
    raw.and_then(|raw| raw.trim().parse::<i32>().ok())
        .filter(|id| *id > 0)
}

/// Parse an optional id list; an absent parameter or one with no usable
/// tokens both mean "not provided".
pub fn parse_optional_id_list(raw: Option<&str>) -> Option<Vec<i32>> {
    let ids = parse_id_list(raw?);
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

/// Expand a calendar day range to its inclusive timestamp bounds
/// (00:00:00 through 23:59:59).
pub fn day_bounds(from: NaiveDate, to: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    (
        from.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
        to.and_hms_opt(23, 59, 59).expect("end of day is always valid"),
    )
}

pub fn write_string_to_file(filename: &str, content: &str) -> std::io::Result<()> {
    let path = Path::new(filename);
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
