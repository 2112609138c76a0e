//! CSV export of the page's latest comment snapshot.
//!
//! DESIGN
//! ======
//! Export is a pure function of whatever snapshot the session last received.
//! It never queries or writes the store. Quoting follows RFC 4180 via the
//! `csv` writer: a field is quoted only when it contains a delimiter, quote,
//! or line break, and inner quotes are doubled. The payload starts with a
//! UTF-8 byte-order-mark so spreadsheet tools detect the encoding.

use time::{OffsetDateTime, UtcOffset};

use crate::frame::ErrorCode;
use crate::locale::Locale;
use crate::model::Comment;
use crate::timefmt;

pub const BOM: char = '\u{feff}';
pub const CSV_MIME: &str = "text/csv;charset=utf-8";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("there are no comments to export")]
    Empty,
    #[error("csv encoding failed: {0}")]
    Csv(String),
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

impl ErrorCode for ExportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_EXPORT_EMPTY",
            Self::Csv(_) => "E_EXPORT_CSV",
        }
    }
}

/// A ready-to-download file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFile {
    pub filename: String,
    /// CSV text including the leading BOM.
    pub content: String,
}

/// Serialize `comments` in snapshot order.
///
/// # Errors
///
/// [`ExportError::Empty`] when there is nothing to export.
pub fn export_csv(
    comments: &[Comment],
    board_title: &str,
    now: OffsetDateTime,
    locale: Locale,
    offset: UtcOffset,
) -> Result<CsvFile, ExportError> {
    if comments.is_empty() {
        return Err(ExportError::Empty);
    }

    let labels = locale.labels();
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    wtr.write_record(labels.csv_headers)?;

    for comment in comments {
        let id = comment.id.to_string();
        let kind = comment
            .comment_type()
            .map_or(comment.kind.as_str(), |kind| locale.category(kind));
        let created = comment
            .timestamp
            .and_then(|ts| timefmt::export_time(ts, offset))
            .unwrap_or_else(|| labels.no_timestamp.to_owned());

        wtr.write_record([
            id.as_str(),
            comment.name.as_str(),
            kind,
            comment.comment.as_str(),
            created.as_str(),
            comment.author_id.as_str(),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(e.error().to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| ExportError::Csv(e.to_string()))?;

    let mut content = String::with_capacity(body.len() + BOM.len_utf8());
    content.push(BOM);
    content.push_str(&body);

    Ok(CsvFile { filename: export_filename(board_title, now, locale, offset), content })
}

/// `{title}_{YYYYMMDD}_{suffix}.csv`, with a fallback for a blank title.
#[must_use]
pub fn export_filename(board_title: &str, now: OffsetDateTime, locale: Locale, offset: UtcOffset) -> String {
    let labels = locale.labels();
    let title = sanitize_filename(board_title.trim());
    let title = if title.is_empty() { labels.export_fallback_title.to_owned() } else { title };
    let date = timefmt::file_date(now, offset).unwrap_or_default();
    format!("{title}_{date}_{}.csv", labels.export_suffix)
}

/// Replace characters that are illegal in filenames on common platforms.
fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
