use super::*;
use time::macros::{datetime, offset};
use uuid::Uuid;

const NOW: OffsetDateTime = datetime!(2024-05-01 06:00:00 UTC);

fn comment(name: &str, kind: &str, body: &str) -> Comment {
    Comment {
        id: Uuid::nil(),
        name: name.into(),
        kind: kind.into(),
        comment: body.into(),
        timestamp: Some(datetime!(2024-05-01 06:04:09 UTC)),
        author_id: "author-1".into(),
    }
}

fn export(comments: &[Comment]) -> CsvFile {
    export_csv(comments, "Week 3", NOW, Locale::Ko, offset!(+9)).expect("export succeeds")
}

fn rows(file: &CsvFile) -> Vec<&str> {
    file.content
        .trim_start_matches(BOM)
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .collect()
}

#[test]
fn empty_snapshot_exports_nothing() {
    let err = export_csv(&[], "Week 3", NOW, Locale::Ko, offset!(+9)).unwrap_err();
    assert!(matches!(err, ExportError::Empty));
    assert_eq!(err.error_code(), "E_EXPORT_EMPTY");
}

#[test]
fn file_starts_with_bom_and_header() {
    let file = export(&[comment("Kim", "impressive", "Great session")]);
    assert!(file.content.starts_with('\u{feff}'));
    assert_eq!(rows(&file)[0], "ID,작성자 이름,유형,내용,작성 시간 (KST),작성자 ID");
}

#[test]
fn rows_end_with_crlf() {
    let file = export(&[comment("Kim", "impressive", "one"), comment("Lee", "difficult", "two")]);
    assert!(file.content.ends_with("author-1\r\n"));
    assert_eq!(file.content.matches("\r\n").count(), 3);
    assert_eq!(file.content.matches('\n').count(), 3, "no bare line feeds");
}

#[test]
fn plain_fields_are_not_quoted() {
    let file = export(&[comment("Kim", "impressive", "Great session")]);
    assert_eq!(
        rows(&file)[1],
        "00000000-0000-0000-0000-000000000000,Kim,인상깊은 부분,Great session,2024. 05. 01. 15:04:09,author-1"
    );
}

#[test]
fn comma_and_quote_are_escaped() {
    let file = export(&[comment("Kim", "impressive", r#"a,b"c"#)]);
    assert!(rows(&file)[1].contains(r#","a,b""c","#));
}

#[test]
fn embedded_newline_is_quoted() {
    let file = export(&[comment("Kim", "difficult", "line one\nline two")]);
    assert!(file.content.contains("\"line one\nline two\""));
}

#[test]
fn unknown_type_is_exported_raw() {
    let file = export(&[comment("Kim", "mystery", "kept")]);
    assert!(rows(&file)[1].contains(",mystery,kept,"));
}

#[test]
fn missing_timestamp_uses_placeholder() {
    let mut c = comment("Kim", "learn_more", "pending");
    c.timestamp = None;
    let file = export(&[c]);
    assert!(rows(&file)[1].contains(",pending,N/A,"));
}

#[test]
fn rows_follow_snapshot_order() {
    let file = export(&[
        comment("First", "impressive", "1"),
        comment("Second", "difficult", "2"),
        comment("Third", "learn_more", "3"),
    ]);
    let rows = rows(&file);
    assert_eq!(rows.len(), 4);
    assert!(rows[1].contains(",First,"));
    assert!(rows[2].contains(",Second,"));
    assert!(rows[3].contains(",Third,"));
}

#[test]
fn english_locale_uses_english_headers() {
    let file = export_csv(&[comment("Kim", "impressive", "x")], "Week 3", NOW, Locale::En, offset!(+9)).expect("export");
    assert!(file.content.starts_with("\u{feff}ID,Author Name,Type,Content,Created Time,Author ID\r\n"));
    assert_eq!(file.filename, "Week 3_20240501_comments.csv");
}

// =============================================================================
// filename
// =============================================================================

#[test]
fn filename_uses_title_and_local_date() {
    assert_eq!(export(&[comment("Kim", "impressive", "x")]).filename, "Week 3_20240501_코멘트.csv");
}

#[test]
fn blank_title_falls_back() {
    assert_eq!(export_filename("   ", NOW, Locale::Ko, offset!(+9)), "피드백보드_20240501_코멘트.csv");
}

#[test]
fn illegal_filename_characters_are_replaced() {
    assert_eq!(
        export_filename("Rust: ch.3/4?", NOW, Locale::Ko, offset!(+9)),
        "Rust_ ch.3_4__20240501_코멘트.csv"
    );
}
