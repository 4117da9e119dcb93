use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// One result row: column name to value, in the order the database returned the columns.
pub type Row = Map<String, JsonValue>;

/// Column a procedure uses to report a real total when it pages its results.
pub const TOTAL_COUNT_COLUMN: &str = "total_count";
/// Column of a status row reporting how many rows a write touched.
pub const ROWS_AFFECTED_COLUMN: &str = "rows_affected";
/// Column of a verdict row telling whether a business rule accepted the write.
pub const SUCCESS_COLUMN: &str = "success";
pub const MESSAGE_COLUMN: &str = "message";

/// How a procedure's output should be read. The rows themselves are never altered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// An ordinary row set (reads, or writes returning the written row).
    RowSet,
    /// A single status row carrying an affected-row count.
    Affected(u64),
    /// A single row carrying a success flag and an optional message.
    Verdict { success: bool, message: Option<String> },
}

/// Everything one call produced, passed through unchanged from the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallResult {
    pub rows: Vec<Row>,
}

impl CallResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Classifies the output. Only single-row results can be status or verdict rows.
    pub fn shape(&self) -> ResultShape {
        let [row] = self.rows.as_slice() else {
            return ResultShape::RowSet;
        };

        if let Some(success) = row.get(SUCCESS_COLUMN).and_then(as_flag) {
            let message = row
                .get(MESSAGE_COLUMN)
                .and_then(JsonValue::as_str)
                .map(str::to_string);
            return ResultShape::Verdict { success, message };
        }

        if let Some(affected) = row.get(ROWS_AFFECTED_COLUMN).and_then(as_count) {
            return ResultShape::Affected(affected);
        }

        ResultShape::RowSet
    }

    /// The total the procedure reported in its first row, if it reported one.
    pub fn total_count(&self) -> Option<u64> {
        self.first()
            .and_then(|row| row.get(TOTAL_COUNT_COLUMN))
            .and_then(as_count)
    }
}

fn as_flag(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

fn as_count(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn plain_rows_are_a_row_set() {
        let result = CallResult::new(vec![
            row(json!({"SalesOrderID": 43659})),
            row(json!({"SalesOrderID": 43660})),
        ]);
        assert_eq!(result.shape(), ResultShape::RowSet);
        assert_eq!(CallResult::default().shape(), ResultShape::RowSet);
    }

    #[test]
    fn single_status_row_reports_affected_count() {
        let result = CallResult::new(vec![row(json!({"rows_affected": 0}))]);
        assert_eq!(result.shape(), ResultShape::Affected(0));
    }

    #[test]
    fn verdict_row_carries_flag_and_message() {
        let result = CallResult::new(vec![row(json!({
            "success": false,
            "message": "cannot delete: referenced by other records"
        }))]);
        assert_eq!(
            result.shape(),
            ResultShape::Verdict {
                success: false,
                message: Some("cannot delete: referenced by other records".into())
            }
        );

        let bit = CallResult::new(vec![row(json!({"success": 1}))]);
        assert_eq!(
            bit.shape(),
            ResultShape::Verdict { success: true, message: None }
        );
    }

    #[test]
    fn total_count_comes_from_first_row() {
        let result = CallResult::new(vec![
            row(json!({"id": 1, "total_count": 57})),
            row(json!({"id": 2, "total_count": 57})),
        ]);
        assert_eq!(result.total_count(), Some(57));
        assert_eq!(CallResult::new(vec![row(json!({"id": 1}))]).total_count(), None);
    }
}
