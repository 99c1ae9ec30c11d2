use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    entities::{
        ActivityFeedItem, ApprovalAction, BreakPayload, CheckinPayload, CheckinRecord, Customer,
        ShiftPayload, ShiftRequest, User, WeeklyActivity,
    },
    envelope::Envelope,
    error::ApiError,
    TrackerApi,
};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Longest part of a body that is copied into a decode error.
const MAX_BODY_IN_ERROR: usize = 200;

/// [TrackerApi] over HTTP. Endpoints are `<base_url><name>.php`.
pub struct HttpTrackerApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTrackerApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}{}.php", self.base_url, name)
    }

    /// The server sits behind aggressive caches, every read carries a throwaway timestamp.
    fn cache_buster() -> String {
        Utc::now().timestamp_millis().to_string()
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: Response,
    ) -> Result<Envelope<T>, ApiError> {
        let status = response.status();
        if !status.is_success() {
            warn!("Server answered {status} for {}", response.url());
            return Err(ApiError::from_status(status));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let excerpt: String = body.chars().take(MAX_BODY_IN_ERROR).collect();
            ApiError::Decode(format!("{e} in {excerpt:?}"))
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        name: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, ApiError> {
        let url = self.endpoint(name);
        debug!("GET {url} {query:?}");
        let response = self
            .authorized(self.client.get(&url))
            .query(query)
            .send()
            .await?;
        Self::read_envelope(response).await
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        name: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        self.get::<Vec<Value>>(name, query).await?.into_list()
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        name: &str,
        body: &B,
        client_ref: Option<Uuid>,
    ) -> Result<Envelope<Value>, ApiError> {
        let url = self.endpoint(name);
        debug!("POST {url}");
        let mut request = self.authorized(self.client.post(&url)).json(body);
        if let Some(client_ref) = client_ref {
            request = request.header(IDEMPOTENCY_HEADER, client_ref.to_string());
        }
        let response = request.send().await?;
        Self::read_envelope(response).await
    }

    async fn post_checked<B: Serialize + ?Sized>(
        &self,
        name: &str,
        body: &B,
        client_ref: Option<Uuid>,
    ) -> Result<(), ApiError> {
        self.post(name, body, client_ref).await?.ensure_success()?;
        Ok(())
    }
}

#[async_trait]
impl TrackerApi for HttpTrackerApi {
    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let envelope = self
            .post("login", &json!({ "email": email, "password": password }), None)
            .await?
            .ensure_success()?;
        envelope
            .user
            .ok_or_else(|| ApiError::Decode("login response has no user".into()))
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, ApiError> {
        self.get_list("get-customers", &[("t", Self::cache_buster())])
            .await
    }

    async fn create_customer(&self, name: &str) -> Result<(), ApiError> {
        self.post_checked("create-customer", &json!({ "name": name }), None)
            .await
    }

    async fn update_customer(&self, id: u64, name: &str) -> Result<(), ApiError> {
        self.post_checked("update-customer", &json!({ "id": id, "name": name }), None)
            .await
    }

    async fn delete_customer(&self, id: u64) -> Result<(), ApiError> {
        self.post_checked("delete-customer", &json!({ "id": id }), None)
            .await
    }

    async fn list_checkins(&self, user_id: Option<u64>) -> Result<Vec<CheckinRecord>, ApiError> {
        let mut query = vec![("t", Self::cache_buster())];
        if let Some(user_id) = user_id {
            query.push(("user_id", user_id.to_string()));
        }
        self.get_list("checkins-list", &query).await
    }

    #[instrument(skip(self, payload), fields(client_ref = %payload.client_ref))]
    async fn check_in(&self, payload: &CheckinPayload) -> Result<(), ApiError> {
        self.post_checked("checkin", payload, Some(payload.client_ref))
            .await
    }

    #[instrument(skip(self, payload), fields(client_ref = %payload.client_ref))]
    async fn check_out(&self, payload: &CheckinPayload) -> Result<(), ApiError> {
        self.post_checked("checkout", payload, Some(payload.client_ref))
            .await
    }

    #[instrument(skip(self, payload), fields(client_ref = %payload.client_ref))]
    async fn submit_shift(&self, payload: &ShiftPayload) -> Result<(), ApiError> {
        self.post_checked("add-shift", payload, Some(payload.client_ref))
            .await
    }

    #[instrument(skip(self, payload), fields(client_ref = %payload.client_ref))]
    async fn submit_break(&self, payload: &BreakPayload) -> Result<(), ApiError> {
        self.post_checked("break-request", payload, Some(payload.client_ref))
            .await
    }

    async fn my_requests(&self, user_id: u64) -> Result<Vec<ShiftRequest>, ApiError> {
        let url = self.endpoint("my-requests");
        debug!("GET {url} user_id={user_id}");
        let response = self
            .authorized(self.client.get(&url))
            .query(&[("user_id", user_id.to_string())])
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .header(header::EXPIRES, "0")
            .send()
            .await?;
        Self::read_envelope::<Vec<Value>>(response).await?.into_list()
    }

    async fn list_approvals(&self) -> Result<Vec<ShiftRequest>, ApiError> {
        self.get_list("approvals-list", &[("nocache", Self::cache_buster())])
            .await
    }

    #[instrument(skip(self))]
    async fn decide_approval(&self, id: u64, action: ApprovalAction) -> Result<(), ApiError> {
        self.post_checked("approve-shift", &json!({ "id": id, "action": action }), None)
            .await
    }

    async fn engineer_count(&self) -> Result<u64, ApiError> {
        let envelope = self
            .get::<Value>("get-engineers", &[("nocache", Self::cache_buster())])
            .await?
            .ensure_not_failed()?;
        Ok(match envelope.count {
            Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        })
    }

    async fn todays_shifts(&self) -> Result<Vec<Value>, ApiError> {
        self.get_list("get-today-shifts", &[("nocache", Self::cache_buster())])
            .await
    }

    async fn weekly_activity(&self) -> Result<WeeklyActivity, ApiError> {
        Ok(self
            .get::<WeeklyActivity>("weekly-activity", &[("nocache", Self::cache_buster())])
            .await?
            .ensure_not_failed()?
            .data
            .unwrap_or_default())
    }

    async fn activity_feed(&self) -> Result<Vec<ActivityFeedItem>, ApiError> {
        self.get_list("activity-feed", &[("nocache", Self::cache_buster())])
            .await
    }
}
