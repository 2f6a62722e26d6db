//! HTTP client for the localization service.
//!
//! Two calls are made: the update check (`POST {base}/api/v2/open`) which
//! returns the localization index for this device, and a `GET` per
//! translation document, whose `data` field carries the nested payload.

use crate::error::{LocalizeError, Result};
use crate::i18n::{LocaleKey, TranslationDocument};
use crate::retry::{with_retry_if, RetryPolicy};
use crate::settings::UpdateSettings;
use reqwest::header::ACCEPT_LANGUAGE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const OPEN_PATH: &str = "/api/v2/open";
const APP_ID_HEADER: &str = "X-Application-Id";
const API_KEY_HEADER: &str = "X-Rest-Api-Key";

/// Envelope of the update-check response
#[derive(Debug, Deserialize)]
struct AppUpdateResponse {
    data: AppUpdate,
}

/// Localization index returned by the update check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppUpdate {
    #[serde(default)]
    pub localize: Vec<LocalizeEntry>,
}

/// One language the service offers, and whether this device needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizeEntry {
    pub id: u64,
    /// Where to fetch the translation document
    pub url: String,
    #[serde(default)]
    pub last_updated_at: Option<String>,
    #[serde(default)]
    pub should_update: bool,
    pub language: LanguageInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub id: u64,
    pub name: String,
    pub locale: LocaleKey,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_best_fit: bool,
}

/// Talks to the localization service on behalf of one application.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    api_key: String,
    dev: bool,
    check_policy: RetryPolicy,
    fetch_policy: RetryPolicy,
}

impl UpdateClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            api_key: api_key.into(),
            dev: false,
            check_policy: RetryPolicy::update_check(),
            fetch_policy: RetryPolicy::document_fetch(),
        }
    }

    /// Report this build as a development build in the `dev` form field.
    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    pub fn with_retry_policies(mut self, check: RetryPolicy, fetch: RetryPolicy) -> Self {
        self.check_policy = check;
        self.fetch_policy = fetch;
        self
    }

    /// Ask the service which translations this device should have.
    pub async fn post_update_check(
        &self,
        settings: &UpdateSettings,
        accept_language: &LocaleKey,
    ) -> Result<AppUpdate> {
        let url = format!("{}{}", self.base_url, OPEN_PATH);
        let form = settings.form_fields(self.dev);

        let body = with_retry_if(
            &self.check_policy,
            "Update check",
            || async {
                let response = self
                    .http
                    .post(&url)
                    .header(APP_ID_HEADER, &self.app_id)
                    .header(API_KEY_HEADER, &self.api_key)
                    .header(ACCEPT_LANGUAGE, accept_language.to_string())
                    .form(&form)
                    .send()
                    .await?;
                read_success_body(response, &url).await
            },
            LocalizeError::is_retryable,
        )
        .await?;

        let parsed: AppUpdateResponse = serde_json::from_str(&body)
            .map_err(|e| LocalizeError::Parse(format!("update check response: {}", e)))?;

        debug!(
            "Update check returned {} localization entries",
            parsed.data.localize.len()
        );
        Ok(parsed.data)
    }

    /// Fetch one translation document and unwrap its `data` payload.
    pub async fn fetch_document(&self, url: &str) -> Result<TranslationDocument> {
        let body = with_retry_if(
            &self.fetch_policy,
            &format!("Translation fetch {}", url),
            || async {
                let response = self
                    .http
                    .get(url)
                    .header(APP_ID_HEADER, &self.app_id)
                    .header(API_KEY_HEADER, &self.api_key)
                    .send()
                    .await?;
                read_success_body(response, url).await
            },
            LocalizeError::is_retryable,
        )
        .await?;

        parse_document_body(&body)
    }
}

async fn read_success_body(response: reqwest::Response, url: &str) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(LocalizeError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text().await?)
}

/// Extract the document from a `{"data": {...}}` response body.
fn parse_document_body(body: &str) -> Result<TranslationDocument> {
    let mut value: Value = serde_json::from_str(body)?;
    let data = value
        .get_mut("data")
        .map(Value::take)
        .ok_or_else(|| LocalizeError::Parse("translation response has no data field".to_string()))?;
    TranslationDocument::try_from(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn settings() -> UpdateSettings {
        UpdateSettings {
            guid: "guid-1".to_string(),
            version: "2.0.0".to_string(),
            old_version: "1.0.0".to_string(),
            platform: "linux".to_string(),
            last_updated: None,
        }
    }

    fn client(server: &MockServer) -> UpdateClient {
        UpdateClient::new(reqwest::Client::new(), server.uri(), "app-id", "api-key")
            .with_retry_policies(RetryPolicy::no_retry(), RetryPolicy::no_retry())
    }

    fn locale(s: &str) -> LocaleKey {
        LocaleKey::parse(s).unwrap()
    }

    fn open_response() -> Value {
        json!({
            "data": {
                "localize": [
                    {
                        "id": 1,
                        "url": "https://cdn.example.com/translations/1",
                        "last_updated_at": "2024-01-15T10:30:00+00:00",
                        "should_update": true,
                        "language": {
                            "id": 11,
                            "name": "English (UK)",
                            "locale": "en-GB",
                            "direction": "LRM",
                            "is_default": true,
                            "is_best_fit": false
                        }
                    },
                    {
                        "id": 2,
                        "url": "https://cdn.example.com/translations/2",
                        "should_update": false,
                        "language": {
                            "id": 12,
                            "name": "Dansk",
                            "locale": "da_DK",
                            "is_best_fit": true
                        }
                    }
                ]
            }
        })
    }

    // ==================== Wire Model Tests ====================

    #[test]
    fn test_app_update_deserialization() {
        let parsed: AppUpdateResponse = serde_json::from_value(open_response()).unwrap();
        let entries = parsed.data.localize;

        assert_eq!(entries.len(), 2);
        assert!(entries[0].should_update);
        assert!(entries[0].language.is_default);
        assert_eq!(entries[0].language.locale, locale("en-GB"));
        assert_eq!(entries[1].language.locale, locale("da-DK"));
        assert!(entries[1].language.is_best_fit);
        assert!(!entries[1].language.is_default);
        assert_eq!(entries[1].language.direction, "");
        assert!(entries[1].last_updated_at.is_none());
    }

    #[test]
    fn test_missing_localize_list_is_empty() {
        let parsed: AppUpdateResponse = serde_json::from_value(json!({"data": {}})).unwrap();
        assert!(parsed.data.localize.is_empty());
    }

    #[test]
    fn test_parse_document_body() {
        let document = parse_document_body(r#"{"data":{"general":{"ok":"OK"}},"meta":{}}"#).unwrap();
        assert!(document.sections().contains_key("general"));
    }

    #[test]
    fn test_parse_document_body_without_data() {
        let err = parse_document_body(r#"{"general":{"ok":"OK"}}"#).unwrap_err();
        assert!(matches!(err, LocalizeError::Parse(_)));
    }

    #[test]
    fn test_parse_document_body_with_non_object_data() {
        assert!(parse_document_body(r#"{"data":"nope"}"#).is_err());
        assert!(parse_document_body("<html>").is_err());
    }

    // ==================== Integration Tests with Wiremock ====================

    #[tokio::test]
    async fn test_base_url_trailing_slash_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpdateClient::new(
            reqwest::Client::new(),
            format!("{}/", server.uri()),
            "app-id",
            "api-key",
        )
        .with_retry_policies(RetryPolicy::no_retry(), RetryPolicy::no_retry());

        let update = client
            .post_update_check(&settings(), &locale("en-GB"))
            .await
            .unwrap();
        assert!(update.localize.is_empty());
    }

    #[tokio::test]
    async fn test_update_check_sends_form_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/open"))
            .and(header("X-Application-Id", "app-id"))
            .and(header("X-Rest-Api-Key", "api-key"))
            .and(header("Accept-Language", "da-DK"))
            .and(body_string_contains("guid=guid-1"))
            .and(body_string_contains("old_version=1.0.0"))
            .and(body_string_contains("dev=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_response()))
            .expect(1)
            .mount(&server)
            .await;

        let update = client(&server)
            .with_dev(true)
            .post_update_check(&settings(), &locale("da-DK"))
            .await
            .unwrap();

        assert_eq!(update.localize.len(), 2);
    }

    #[tokio::test]
    async fn test_update_check_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/open"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_update_check(&settings(), &locale("en-GB"))
            .await
            .unwrap_err();

        assert!(matches!(err, LocalizeError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_update_check_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/open"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\": [oops"))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_update_check(&settings(), &locale("en-GB"))
            .await
            .unwrap_err();

        assert!(matches!(err, LocalizeError::Parse(_)));
    }

    #[tokio::test]
    async fn test_update_check_retries_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/open"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(open_response()))
            .mount(&server)
            .await;

        let update = client(&server)
            .with_retry_policies(
                RetryPolicy::new(3, Duration::from_millis(1)),
                RetryPolicy::no_retry(),
            )
            .post_update_check(&settings(), &locale("en-GB"))
            .await
            .unwrap();

        assert_eq!(update.localize.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translations/7"))
            .and(header("X-Application-Id", "app-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"general": {"ok": "D'accord", "cancel": "Annuler"}}
            })))
            .mount(&server)
            .await;

        let url = format!("{}/translations/7", server.uri());
        let document = client(&server).fetch_document(&url).await.unwrap();

        let general = &document.sections()["general"];
        assert_eq!(general["ok"], "D'accord");
    }

    #[tokio::test]
    async fn test_fetch_document_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translations/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/translations/404", server.uri());
        let err = client(&server).fetch_document(&url).await.unwrap_err();

        assert!(matches!(err, LocalizeError::Status { status: 404, .. }));
        assert!(!err.is_retryable());
    }
}
