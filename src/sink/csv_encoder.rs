//! The one CSV serialization both sinks share.
//!
//! Standard quoting (only where needed, `"` doubled) and CRLF record
//! terminators, so output bytes are identical on every platform.

use std::io::Write;

use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use serde_json::Value;

use crate::error::AppError;
use crate::records::ResultSet;

/// Creates a CSV writer with the export's dialect over any byte sink.
pub fn csv_writer<W: Write>(inner: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .from_writer(inner)
}

/// Writes the header row and one row per record.
///
/// Columns come from the first record; each row is projected by column name.
/// Returns the number of data rows written.
///
/// # Errors
///
/// - `AppError::EmptyResult` - Nothing to derive a header from; nothing is written
/// - `AppError::Io` - The underlying sink failed
pub fn encode_records<W: Write>(
    result_set: &ResultSet,
    writer: &mut Writer<W>,
) -> Result<usize, AppError> {
    let columns = result_set.columns().ok_or(AppError::EmptyResult)?;

    writer.write_record(&columns).map_err(csv_error)?;

    for record in result_set.records() {
        let row = columns
            .iter()
            .map(|column| render_cell(record.get(column).unwrap_or(&Value::Null)));
        writer.write_record(row).map_err(csv_error)?;
    }

    writer.flush().map_err(|e| AppError::Io(e.to_string()))?;
    Ok(result_set.len())
}

/// Serializes into an in-memory buffer.
pub fn encode_to_bytes(result_set: &ResultSet) -> Result<Vec<u8>, AppError> {
    let mut writer = csv_writer(Vec::new());
    encode_records(result_set, &mut writer)?;
    writer
        .into_inner()
        .map_err(|e| AppError::Io(format!("Failed to flush CSV buffer: {}", e.error())))
}

/// Text form of one JSON value as a CSV cell.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Relationship fields arrive as nested objects; keep them as JSON text.
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Io(format!("Failed to write CSV record: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::FlatRecord;
    use serde_json::json;

    fn result_set(records: Vec<FlatRecord>) -> ResultSet {
        ResultSet::new(records).unwrap()
    }

    fn encode_to_string(result_set: &ResultSet) -> String {
        String::from_utf8(encode_to_bytes(result_set).unwrap()).unwrap()
    }

    #[test]
    fn single_record_matches_expected_bytes() {
        let rs = result_set(vec![FlatRecord::from_pairs([
            ("CaseNumber", json!("001")),
            ("Status", json!("Open")),
        ])]);

        assert_eq!(encode_to_string(&rs), "CaseNumber,Status\r\n001,Open\r\n");
    }

    #[test]
    fn empty_result_set_is_rejected_without_output() {
        let rs = result_set(Vec::new());
        let mut writer = csv_writer(Vec::new());

        let result = encode_records(&rs, &mut writer);

        assert!(matches!(result, Err(AppError::EmptyResult)));
        assert!(writer.into_inner().unwrap().is_empty());
    }

    #[test]
    fn rows_follow_header_order_not_record_order() {
        let rs = result_set(vec![
            FlatRecord::from_pairs([("A", json!("a1")), ("B", json!("b1"))]),
            FlatRecord::from_pairs([("B", json!("b2")), ("A", json!("a2"))]),
        ]);

        assert_eq!(encode_to_string(&rs), "A,B\r\na1,b1\r\na2,b2\r\n");
    }

    #[test]
    fn special_characters_are_quoted() {
        let rs = result_set(vec![FlatRecord::from_pairs([
            ("CaseNumber", json!("004")),
            ("Description", json!("Needs \"urgent\" help, today\nsecond line")),
        ])]);

        assert_eq!(
            encode_to_string(&rs),
            "CaseNumber,Description\r\n004,\"Needs \"\"urgent\"\" help, today\nsecond line\"\r\n"
        );
    }

    #[test]
    fn render_cell_covers_json_kinds() {
        assert_eq!(render_cell(&Value::Null), "");
        assert_eq!(render_cell(&json!("Open")), "Open");
        assert_eq!(render_cell(&json!(true)), "true");
        assert_eq!(render_cell(&json!(42)), "42");
        assert_eq!(render_cell(&json!(1.5)), "1.5");
        assert_eq!(render_cell(&json!({"Name": "Acme"})), r#"{"Name":"Acme"}"#);
    }

    #[test]
    fn null_fields_become_empty_cells() {
        let rs = result_set(vec![FlatRecord::from_pairs([
            ("CaseNumber", json!("005")),
            ("ClosedDate", Value::Null),
        ])]);

        assert_eq!(encode_to_string(&rs), "CaseNumber,ClosedDate\r\n005,\r\n");
    }

    #[test]
    fn encode_records_returns_row_count() {
        let rs = result_set(vec![
            FlatRecord::from_pairs([("A", json!("1"))]),
            FlatRecord::from_pairs([("A", json!("2"))]),
            FlatRecord::from_pairs([("A", json!("3"))]),
        ]);
        let mut writer = csv_writer(Vec::new());

        assert_eq!(encode_records(&rs, &mut writer).unwrap(), 3);
    }
}
