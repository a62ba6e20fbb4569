//! API client for the learning journey REST backend.
//!
//! This module provides the `ApiClient` struct for authenticating and making
//! journey requests. Mutating calls never refresh anything on their own; see
//! `journey::reconcile` for the follow-up refresh.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::models::{
    CompleteDayResponse, FinalTestResult, FinalTestStart, JourneyEnvelope, JourneyOverview,
    JourneyResponse, Stage,
};

use super::{ApiError, JourneyApi};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the journey backend
pub const DEFAULT_API_BASE_URL: &str = "https://api.toeic-journey.app/api";

/// Path of the current journey document, used for both overview and stages
const CURRENT_JOURNEY_PATH: &str = "/journeys/current";

/// Query parameter carrying the cache-busting timestamp
pub const CACHE_BUST_PARAM: &str = "t";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    #[serde(alias = "_id")]
    id: String,
}

/// Body of a final test submission.
#[derive(Debug, Clone, Serialize)]
pub struct FinalTestSubmission {
    pub score: f64,
    #[serde(rename = "maxScore", skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
}

/// API client for the journey backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authenticate and return session data
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SessionData> {
        let url = self.url("/auth/login");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .context("Failed to send authentication request")?;

        let response = Self::check_response(response).await?;

        let auth: AuthResponse = response.json().await.context("Failed to parse auth response")?;

        Ok(SessionData {
            token: auth.token,
            user_id: auth.user.id,
            username: email.to_string(),
            created_at: Utc::now(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Attach the cache-busting timestamp and ask intermediaries not to serve a cached copy.
    fn bust(request: RequestBuilder, cache_bust: Option<i64>) -> RequestBuilder {
        match cache_bust {
            Some(ts) => request
                .query(&[(CACHE_BUST_PARAM, ts)])
                .header(header::CACHE_CONTROL, "no-cache"),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    /// Send a request built by `build`, retrying with exponential backoff while rate limited.
    async fn send_with_retry<T, F>(&self, url: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.authorize(build()).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Self::parse(response, url).await,
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        url = url,
                        retry = retries,
                        backoff_ms = backoff_ms,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        cache_bust: Option<i64>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        self.send_with_retry(&url, || Self::bust(self.client.get(&url), cache_bust))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        self.send_with_retry(&url, || self.client.post(&url).json(body))
            .await
    }

    // ===== Journey Reads =====

    /// Fetch the current journey document. `Ok(None)` when the server has no journey (404).
    async fn fetch_journey(
        &self,
        cache_bust: Option<i64>,
    ) -> Result<Option<JourneyResponse>, ApiError> {
        match self.get::<JourneyEnvelope>(CURRENT_JOURNEY_PATH, cache_bust).await {
            Ok(envelope) => Ok(Some(envelope.into_inner())),
            Err(e) if e.is_not_found() => {
                debug!(error = %e, "No active journey on server");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn stage_path(stage_id: &str) -> String {
        format!("{}/stages/{}", CURRENT_JOURNEY_PATH, stage_id)
    }
}

#[async_trait]
impl JourneyApi for ApiClient {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn fetch_overview(&self, cache_bust: Option<i64>) -> Result<JourneyOverview, ApiError> {
        Ok(self
            .fetch_journey(cache_bust)
            .await?
            .map(|journey| journey.to_overview())
            .unwrap_or_else(JourneyOverview::no_journey))
    }

    async fn fetch_stages(&self, cache_bust: Option<i64>) -> Result<Vec<Stage>, ApiError> {
        Ok(self
            .fetch_journey(cache_bust)
            .await?
            .map(|journey| journey.to_stages())
            .unwrap_or_default())
    }

    async fn complete_day(
        &self,
        stage_id: &str,
        day_number: u32,
    ) -> Result<CompleteDayResponse, ApiError> {
        let path = format!("{}/days/{}/complete", Self::stage_path(stage_id), day_number);
        self.post(&path, &serde_json::json!({})).await
    }

    async fn start_final_test(&self, stage_id: &str) -> Result<FinalTestStart, ApiError> {
        let path = format!("{}/final-test/start", Self::stage_path(stage_id));
        self.post(&path, &serde_json::json!({})).await
    }

    async fn complete_final_test(
        &self,
        stage_id: &str,
        submission: &FinalTestSubmission,
    ) -> Result<FinalTestResult, ApiError> {
        let path = format!("{}/final-test/complete", Self::stage_path(stage_id));
        self.post(&path, submission).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn journey_body() -> String {
        json!({
            "data": {
                "_id": "j1",
                "title": "TOEIC 600",
                "stages": [
                    { "_id": "tpl-1", "stageNumber": 1, "minScore": 70, "targetScore": 450 },
                    { "_id": "tpl-2", "stageNumber": 2, "minScore": 70, "targetScore": 600 }
                ]
            }
        })
        .to_string()
    }

    fn client(server: &mockito::ServerGuard) -> ApiClient {
        ApiClient::new(server.url()).unwrap().with_token("token-1".to_string())
    }

    #[tokio::test]
    async fn test_fetch_overview_and_stages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/journeys/current")
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body(journey_body())
            .expect(2)
            .create_async()
            .await;

        let api = client(&server);
        let overview = api.fetch_overview(None).await.unwrap();
        assert_eq!(overview.id.as_deref(), Some("j1"));
        assert_eq!(overview.total_stages, 2);

        let stages = api.fetch_stages(None).await.unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].target_score, 600);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cache_bust_parameter_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/journeys/current")
            .match_query(Matcher::UrlEncoded("t".into(), "1700000000123".into()))
            .match_header("cache-control", "no-cache")
            .with_status(200)
            .with_body(journey_body())
            .create_async()
            .await;

        let api = client(&server);
        api.fetch_overview(Some(1_700_000_000_123)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_no_journey() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/journeys/current")
            .with_status(404)
            .with_body("{\"message\":\"No journey\"}")
            .expect(2)
            .create_async()
            .await;

        let api = client(&server);
        let overview = api.fetch_overview(None).await.unwrap();
        assert!(overview.no_journey_found);
        assert!(api.fetch_stages(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/journeys/current")
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server).fetch_overview(None).await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/journeys/current")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client(&server).fetch_stages(None).await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError(_)));
    }

    #[tokio::test]
    async fn test_complete_final_test_posts_score() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/journeys/current/stages/tpl-1/final-test/complete")
            .match_body(Matcher::Json(json!({ "score": 70.0 })))
            .with_status(200)
            .with_body(json!({ "stageId": "tpl-1", "score": 70.0 }).to_string())
            .create_async()
            .await;

        let submission = FinalTestSubmission {
            score: 70.0,
            max_score: None,
        };
        let result = client(&server)
            .complete_final_test("tpl-1", &submission)
            .await
            .unwrap();
        assert!(result.passed.is_none());
        assert!(result.is_passed(70.0));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_day_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/journeys/current/stages/tpl-1/days/3/complete")
            .with_status(200)
            .with_body(json!({ "dayNumber": 3, "completed": true }).to_string())
            .create_async()
            .await;

        let result = client(&server).complete_day("tpl-1", 3).await.unwrap();
        assert_eq!(result.day_number, Some(3));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_authenticate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(json!({ "token": "abc", "user": { "_id": "u1" } }).to_string())
            .create_async()
            .await;

        let api = ApiClient::new(server.url()).unwrap();
        assert!(!api.is_authenticated());
        let session = api.authenticate("learner@example.com", "pw").await.unwrap();
        assert_eq!(session.token, "abc");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.username, "learner@example.com");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let api = ApiClient::new("http://localhost:9/api/").unwrap();
        assert_eq!(api.url("/journeys/current"), "http://localhost:9/api/journeys/current");
    }
}
