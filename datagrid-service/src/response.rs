//! DataTables response envelope

use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One page of rows plus the counts the grid widget needs
///
/// Serialized with the protocol's camelCase keys:
///
/// ```json
/// { "draw": 3, "recordsTotal": 77, "recordsFiltered": 4, "data": [[1, "Chai"]] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTablesResponse {
    draw: i32,
    records_total: i64,
    records_filtered: i64,
    data: Vec<Vec<Value>>,
}

impl DataTablesResponse {
    /// Assemble an envelope, rejecting inconsistent counts
    ///
    /// Every rejection here is a server-side bug, never bad client input:
    /// the parser has already clamped `draw`.
    pub fn new(
        draw: i32,
        records_total: i64,
        records_filtered: i64,
        data: Vec<Vec<Value>>,
    ) -> Result<Self> {
        if draw <= 0 {
            return Err(Error::InvariantViolation(format!(
                "draw must be positive, got {}",
                draw
            )));
        }
        if records_total < 0 || records_filtered < 0 {
            return Err(Error::InvariantViolation(format!(
                "record counts must not be negative (total {}, filtered {})",
                records_total, records_filtered
            )));
        }
        if records_filtered > records_total {
            return Err(Error::InvariantViolation(format!(
                "filtered count {} exceeds total count {}",
                records_filtered, records_total
            )));
        }

        Ok(Self {
            draw,
            records_total,
            records_filtered,
            data,
        })
    }

    pub fn draw(&self) -> i32 {
        self.draw
    }

    pub fn records_total(&self) -> i64 {
        self.records_total
    }

    pub fn records_filtered(&self) -> i64 {
        self.records_filtered
    }

    /// Rows, each positionally aligned with the requested columns
    pub fn data(&self) -> &[Vec<Value>] {
        &self.data
    }
}

impl IntoResponse for DataTablesResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_protocol_keys() {
        let response = DataTablesResponse::new(3, 77, 1, vec![vec![json!(1), json!("Chai")]]).unwrap();
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "draw": 3,
                "recordsTotal": 77,
                "recordsFiltered": 1,
                "data": [[1, "Chai"]]
            })
        );
    }

    #[test]
    fn test_empty_page_is_valid() {
        let response = DataTablesResponse::new(1, 0, 0, vec![]).unwrap();
        assert!(response.data().is_empty());
        assert_eq!(response.records_total(), 0);
    }

    #[test]
    fn test_rejects_non_positive_draw() {
        assert!(matches!(
            DataTablesResponse::new(0, 1, 1, vec![]),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_rejects_filtered_above_total() {
        let err = DataTablesResponse::new(1, 5, 6, vec![]).unwrap_err();
        assert!(err.to_string().contains("exceeds total"));
    }

    #[test]
    fn test_rejects_negative_counts() {
        assert!(DataTablesResponse::new(1, -1, -1, vec![]).is_err());
        assert!(DataTablesResponse::new(1, 3, -1, vec![]).is_err());
    }
}
