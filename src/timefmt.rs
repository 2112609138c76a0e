//! Timestamp rendering for cards, CSV rows, and export filenames.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const CARD: &[BorrowedFormatItem<'static>] = format_description!("[year]. [month]. [day]. [hour]:[minute]");
const EXPORT: &[BorrowedFormatItem<'static>] = format_description!("[year]. [month]. [day]. [hour]:[minute]:[second]");
const FILE_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");

fn format_in(ts: OffsetDateTime, offset: UtcOffset, fmt: &[BorrowedFormatItem<'_>]) -> Option<String> {
    ts.to_offset(offset).format(fmt).ok()
}

/// Short form shown on a comment card, e.g. `2024. 05. 01. 15:04`.
#[must_use]
pub fn card_time(ts: OffsetDateTime, offset: UtcOffset) -> Option<String> {
    format_in(ts, offset, CARD)
}

/// Full form used in the CSV `Created Time` column.
#[must_use]
pub fn export_time(ts: OffsetDateTime, offset: UtcOffset) -> Option<String> {
    format_in(ts, offset, EXPORT)
}

/// `YYYYMMDD` of `ts` in the given offset.
#[must_use]
pub fn file_date(ts: OffsetDateTime, offset: UtcOffset) -> Option<String> {
    format_in(ts, offset, FILE_DATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn card_time_applies_offset() {
        let ts = datetime!(2024-05-01 06:04:09 UTC);
        assert_eq!(card_time(ts, offset!(+9)).as_deref(), Some("2024. 05. 01. 15:04"));
    }

    #[test]
    fn export_time_includes_seconds() {
        let ts = datetime!(2024-05-01 06:04:09 UTC);
        assert_eq!(export_time(ts, offset!(+9)).as_deref(), Some("2024. 05. 01. 15:04:09"));
    }

    #[test]
    fn file_date_rolls_over_midnight() {
        let ts = datetime!(2024-12-31 20:00:00 UTC);
        assert_eq!(file_date(ts, offset!(+9)).as_deref(), Some("20250101"));
        assert_eq!(file_date(ts, UtcOffset::UTC).as_deref(), Some("20241231"));
    }
}
