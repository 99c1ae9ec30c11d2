use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::warn;

use super::{entities::User, error::ApiError};

const SUCCESS: &str = "success";
const DEFAULT_FAILURE: &str = "Something went wrong";

/// Every endpoint answers `{"status": ..., "message": ..., <payload>}`. The payload sits under
/// `data`, except for login (`user`) and the engineer count (`count`).
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub count: Option<Value>,
}

impl<T> Envelope<T> {
    fn rejection(&self) -> ApiError {
        ApiError::Rejected {
            message: self
                .message
                .clone()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE.into()),
        }
    }

    /// Writes only count as done when the server says so explicitly.
    pub fn ensure_success(self) -> Result<Self, ApiError> {
        match self.status.as_deref() {
            Some(SUCCESS) => Ok(self),
            _ => Err(self.rejection()),
        }
    }

    /// Reads accept a missing status, several list endpoints never send one.
    pub fn ensure_not_failed(self) -> Result<Self, ApiError> {
        match self.status.as_deref() {
            None | Some(SUCCESS) => Ok(self),
            Some(_) => Err(self.rejection()),
        }
    }
}

impl Envelope<Vec<Value>> {
    /// List payload, absent meaning empty. Rows are decoded one by one and a row that doesn't
    /// fit `T` is skipped.
    pub fn into_list<T: DeserializeOwned>(self) -> Result<Vec<T>, ApiError> {
        let rows = self.ensure_not_failed()?.data.unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row.clone()) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Skipping unreadable row {row}: {e}");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::{
        entities::{CheckinRecord, Customer},
        error::ApiError,
    };

    use super::Envelope;

    #[test]
    fn failed_write_carries_server_message() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_value(json!({"status": "error", "message": "Customer exists"}))
                .unwrap();
        match envelope.ensure_success() {
            Err(ApiError::Rejected { message }) => assert_eq!(message, "Customer exists"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn write_without_status_is_not_a_success() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_value(json!({})).unwrap();
        match envelope.ensure_success() {
            Err(ApiError::Rejected { message }) => assert_eq!(message, "Something went wrong"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn list_without_data_is_empty() {
        let envelope: Envelope<Vec<serde_json::Value>> =
            serde_json::from_value(json!({"status": "success"})).unwrap();
        assert!(envelope.into_list::<Customer>().unwrap().is_empty());
    }

    #[test]
    fn list_without_status_is_accepted() {
        let envelope: Envelope<Vec<serde_json::Value>> =
            serde_json::from_value(json!({"data": [{"id": "1", "name": "Acme"}]})).unwrap();
        let customers: Vec<Customer> = envelope.into_list().unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].id, 1);
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let envelope: Envelope<Vec<serde_json::Value>> = serde_json::from_value(json!({
            "status": "success",
            "data": [
                {"id": 1, "user_id": 7, "client": "Acme", "check_in_time": null},
                {"id": 2, "user_id": 7, "client": "Globex", "check_in_time": "2025-03-17 09:00:00"},
            ]
        }))
        .unwrap();
        let checkins: Vec<CheckinRecord> = envelope.into_list().unwrap();
        assert_eq!(checkins.len(), 1);
        assert_eq!(checkins[0].client, "Globex");
    }
}
