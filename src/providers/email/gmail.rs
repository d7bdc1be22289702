//! Gmail API mail store implementation.
//!
//! This module provides a [`MailStore`] implementation using the Gmail REST API.
//! It handles OAuth 2.0 authentication, listing and reading threads, label
//! management, and re-delivering messages via `users.messages.send`.
//!
//! # Authentication
//!
//! Gmail uses OAuth 2.0 for authentication. The refresh token and client
//! credentials are stored in the system keychain, referenced by account ID.
//! An access token is minted once per run by [`GmailMailStore::authenticate`].
//!
//! # API Usage
//!
//! This store uses the Gmail API v1:
//! - `users.settings.sendAs.list` for the account's owned addresses
//! - `users.threads.list` / `users.threads.get` for candidates and messages
//! - `users.labels.list` / `users.labels.create` for year-bucket labels
//! - `users.threads.modify` for labeling, archiving and marking read
//! - `users.messages.send` for forwarding

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{MailStore, Pagination, ProviderError, Result, ThreadPage, DEFAULT_PAGE_SIZE};
use crate::domain::{AccountId, Address, EmailId, Label, LabelId, Message, ThreadId};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const KEYCHAIN_SERVICE: &str = "evergreen";

/// System label ids that never count as a thread's own labels.
const SYSTEM_LABEL_IDS: &[&str] = &[
    "INBOX", "UNREAD", "STARRED", "IMPORTANT", "SENT", "DRAFT", "SPAM", "TRASH", "CHAT",
];

/// Gmail API thread list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadListResponse {
    threads: Option<Vec<GmailThreadRef>>,
    next_page_token: Option<String>,
}

/// Gmail API thread reference, as returned by `threads.list`.
#[derive(Debug, Deserialize)]
struct GmailThreadRef {
    id: String,
}

/// Gmail API thread.
#[derive(Debug, Deserialize)]
struct GmailThread {
    messages: Option<Vec<GmailMessage>>,
}

/// Gmail API message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    thread_id: String,
    label_ids: Option<Vec<String>>,
    payload: Option<GmailMessagePayload>,
    internal_date: Option<String>,
}

/// Gmail message payload (headers and body parts).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessagePayload {
    headers: Option<Vec<GmailHeader>>,
    parts: Option<Vec<GmailPart>>,
    body: Option<GmailBody>,
    mime_type: Option<String>,
}

/// Gmail message header.
#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

/// Gmail message part (for multipart messages).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPart {
    mime_type: Option<String>,
    body: Option<GmailBody>,
    parts: Option<Vec<GmailPart>>,
}

/// Gmail message body.
#[derive(Debug, Deserialize)]
struct GmailBody {
    data: Option<String>,
}

/// Gmail API label.
#[derive(Debug, Deserialize)]
struct GmailLabel {
    id: String,
    name: String,
    #[serde(rename = "type")]
    label_type: Option<String>,
}

impl GmailLabel {
    fn is_user(&self) -> bool {
        self.label_type.as_deref() != Some("system")
    }
}

/// Gmail labels list response.
#[derive(Debug, Deserialize)]
struct LabelsListResponse {
    labels: Option<Vec<GmailLabel>>,
}

/// Gmail send-as alias.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailSendAs {
    send_as_email: String,
    display_name: Option<String>,
}

/// Gmail send-as list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendAsListResponse {
    send_as: Option<Vec<GmailSendAs>>,
}

/// Gmail modify request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    add_label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    remove_label_ids: Vec<String>,
}

impl ModifyRequest {
    fn add(label_id: &str) -> Self {
        Self {
            add_label_ids: vec![label_id.to_string()],
            remove_label_ids: vec![],
        }
    }

    fn remove(label_id: &str) -> Self {
        Self {
            add_label_ids: vec![],
            remove_label_ids: vec![label_id.to_string()],
        }
    }
}

/// Gmail label creation request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelRequest<'a> {
    name: &'a str,
    label_list_visibility: &'a str,
    message_list_visibility: &'a str,
}

/// OAuth token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth credentials stored in keychain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailCredentials {
    /// OAuth refresh token.
    pub refresh_token: String,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

/// Gmail API mail store.
///
/// Implements [`MailStore`] using the Gmail REST API with OAuth 2.0 authentication.
///
/// # Example
///
/// ```ignore
/// use evergreen::providers::email::{GmailMailStore, MailStore};
///
/// let mut store = GmailMailStore::new(account_id);
/// store.authenticate().await?;
///
/// let addresses = store.list_owned_addresses().await?;
/// ```
pub struct GmailMailStore {
    /// Account ID for keychain credential lookup.
    account_id: AccountId,
    /// HTTP client for API requests.
    client: reqwest::Client,
    /// OAuth credentials.
    credentials: Option<GmailCredentials>,
    /// Current OAuth access token.
    access_token: Option<String>,
}

impl GmailMailStore {
    /// Creates a new Gmail store for the specified account.
    ///
    /// The store is not usable until [`authenticate`](Self::authenticate) is called.
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            client: reqwest::Client::new(),
            credentials: None,
            access_token: None,
        }
    }

    #[cfg(test)]
    fn with_credentials(account_id: AccountId, credentials: GmailCredentials) -> Self {
        Self {
            account_id,
            client: reqwest::Client::new(),
            credentials: Some(credentials),
            access_token: None,
        }
    }

    #[cfg(test)]
    fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Returns the account ID for this store.
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    /// Loads credentials from keychain if needed and mints an access token.
    pub async fn authenticate(&mut self) -> Result<()> {
        if self.credentials.is_none() {
            self.credentials = Some(self.load_credentials_from_keychain()?);
        }

        self.refresh_access_token().await?;

        tracing::info!(account_id = %self.account_id, "Gmail store authenticated");
        Ok(())
    }

    fn keychain_entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYCHAIN_SERVICE, &format!("gmail-{}", self.account_id.0))
            .map_err(|e| ProviderError::Authentication(format!("keyring error: {}", e)))
    }

    /// Loads credentials from the system keychain.
    fn load_credentials_from_keychain(&self) -> Result<GmailCredentials> {
        let creds_json = self
            .keychain_entry()?
            .get_password()
            .map_err(|e| ProviderError::Authentication(format!("no credentials found: {}", e)))?;

        serde_json::from_str(&creds_json)
            .map_err(|e| ProviderError::Authentication(format!("invalid credentials: {}", e)))
    }

    /// Exchanges the refresh token for a new access token.
    async fn refresh_access_token(&mut self) -> Result<()> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ProviderError::Authentication("no credentials available".to_string()))?;

        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Authentication(format!(
                "token refresh failed ({}): {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse token response: {}", e)))?;

        self.access_token = Some(token_response.access_token);
        Ok(())
    }

    /// Builds authorization headers for API requests.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| ProviderError::Authentication("not authenticated".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ProviderError::Internal(format!("invalid header: {}", e)))?,
        );
        Ok(headers)
    }

    /// Makes an authenticated GET request to the Gmail API.
    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", GMAIL_API_BASE, endpoint);
        let headers = self.auth_headers()?;

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        Self::handle_response(response).await
    }

    /// Makes an authenticated POST request to the Gmail API.
    async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send_post(endpoint, body).await?;
        Self::handle_response(response).await
    }

    /// Makes an authenticated POST request whose response body is ignored.
    async fn post_no_response<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<()> {
        let response = self.send_post(endpoint, body).await?;
        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }
        Ok(())
    }

    async fn send_post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{}", GMAIL_API_BASE, endpoint);
        let mut headers = self.auth_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        self.client
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))
    }

    /// Handles API response, checking for errors.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("parse response: {}", e)))
    }

    /// Handles API error responses.
    async fn handle_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error_for_status(status, body)
    }

    async fn modify_thread(&self, thread_id: &ThreadId, body: &ModifyRequest) -> Result<()> {
        let endpoint = format!("/threads/{}/modify", thread_id);
        self.post_no_response(&endpoint, body).await
    }

    async fn fetch_labels(&self) -> Result<Vec<GmailLabel>> {
        let response: LabelsListResponse = self.get("/labels", &[]).await?;
        Ok(response.labels.unwrap_or_default())
    }

    /// Converts a Gmail message to the domain [`Message`].
    ///
    /// Fails if the message carries neither `internalDate` nor a parseable
    /// `Date` header, since its age cannot be known.
    fn gmail_message_to_message(msg: &GmailMessage) -> Result<Message> {
        let headers = msg.payload.as_ref().and_then(|p| p.headers.as_ref());

        let get_header = |name: &str| -> Option<String> {
            headers.and_then(|h| {
                h.iter()
                    .find(|hdr| hdr.name.eq_ignore_ascii_case(name))
                    .map(|hdr| hdr.value.clone())
            })
        };

        let from = get_header("From")
            .map(|v| Address::parse(&v))
            .unwrap_or_else(|| Address::new("unknown@unknown.com"));

        // internalDate is when Gmail accepted the message; it is what the
        // retention clock measures, so it wins over the Date header.
        let sent_at = msg
            .internal_date
            .as_ref()
            .and_then(|d| d.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| {
                get_header("Date")
                    .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
                    .map(|d| d.with_timezone(&Utc))
            })
            .ok_or_else(|| {
                ProviderError::Internal(format!("message {} has no usable send date", msg.id))
            })?;

        let plain_body = msg
            .payload
            .as_ref()
            .and_then(extract_plain_body)
            .unwrap_or_default();

        Ok(Message {
            id: EmailId::from(msg.id.clone()),
            thread_id: ThreadId::from(msg.thread_id.clone()),
            from,
            subject: get_header("Subject"),
            plain_body,
            sent_at,
        })
    }
}

/// Maps a failed API status to a [`ProviderError`].
fn error_for_status(status: StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(format!("unauthorized: {}", body)),
        404 => ProviderError::NotFound(body),
        409 => ProviderError::AlreadyExists(body),
        400 => ProviderError::InvalidRequest(body),
        429 => ProviderError::RateLimited {
            retry_after_secs: None,
        },
        _ => ProviderError::Internal(format!("API error ({}): {}", status, body)),
    }
}

fn decode_body(body: Option<&GmailBody>) -> Option<String> {
    let data = body?.data.as_ref()?;
    let decoded = BASE64_URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .ok()?;
    String::from_utf8(decoded).ok()
}

/// Extracts the first `text/plain` body from a message payload.
fn extract_plain_body(payload: &GmailMessagePayload) -> Option<String> {
    let mime = payload.mime_type.as_deref().unwrap_or("text/plain");
    if mime == "text/plain" {
        if let Some(text) = decode_body(payload.body.as_ref()) {
            return Some(text);
        }
    }
    payload.parts.as_deref().and_then(plain_body_from_parts)
}

/// Recursively searches message parts for a `text/plain` body.
fn plain_body_from_parts(parts: &[GmailPart]) -> Option<String> {
    for part in parts {
        if part.mime_type.as_deref() == Some("text/plain") {
            if let Some(text) = decode_body(part.body.as_ref()) {
                return Some(text);
            }
        }
        if let Some(text) = part.parts.as_deref().and_then(plain_body_from_parts) {
            return Some(text);
        }
    }
    None
}

fn is_system_label_id(id: &str) -> bool {
    SYSTEM_LABEL_IDS.contains(&id) || id.starts_with("CATEGORY_")
}

/// Resolves label ids to the names of the user labels among them.
fn user_label_names(ids: &BTreeSet<String>, labels: &[GmailLabel]) -> Vec<String> {
    let by_id: HashMap<&str, &GmailLabel> = labels.iter().map(|l| (l.id.as_str(), l)).collect();
    ids.iter()
        .filter_map(|id| by_id.get(id.as_str()))
        .filter(|l| l.is_user())
        .map(|l| l.name.clone())
        .collect()
}

/// Strips line breaks so a value cannot inject extra headers.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Encodes a header value per RFC 2047 when it is not plain ASCII.
fn encode_header(value: &str) -> String {
    let value = header_value(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?UTF-8?B?{}?=", BASE64_STANDARD.encode(value.as_bytes()))
    }
}

/// Builds the RFC 5322 forward of `message` addressed to `to`.
fn build_forward_message(message: &Message, to: &Address) -> String {
    let subject = message.subject_or_empty();
    let mut raw = String::new();

    raw.push_str(&format!("From: {}\r\n", header_value(&to.email)));
    raw.push_str(&format!("To: {}\r\n", header_value(&to.email)));
    raw.push_str(&format!("Subject: {}\r\n", encode_header(&format!("Fwd: {}", subject))));
    raw.push_str("MIME-Version: 1.0\r\n");
    raw.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    raw.push_str("\r\n");

    raw.push_str("---------- Forwarded message ---------\r\n");
    raw.push_str(&format!("From: {}\r\n", message.from.display()));
    raw.push_str(&format!("Date: {}\r\n", message.sent_at.to_rfc2822()));
    raw.push_str(&format!("Subject: {}\r\n", header_value(subject)));
    raw.push_str("\r\n");
    raw.push_str(&message.plain_body);

    raw
}

#[async_trait]
impl MailStore for GmailMailStore {
    async fn list_owned_addresses(&self) -> Result<Vec<Address>> {
        let response: SendAsListResponse = self.get("/settings/sendAs", &[]).await?;

        Ok(response
            .send_as
            .unwrap_or_default()
            .into_iter()
            .map(|s| match s.display_name.filter(|n| !n.is_empty()) {
                Some(name) => Address::with_name(s.send_as_email, name),
                None => Address::new(s.send_as_email),
            })
            .collect())
    }

    async fn list_threads(&self, query: &str, pagination: Pagination) -> Result<ThreadPage> {
        let limit = pagination.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let mut params = vec![("q", query.to_string()), ("maxResults", limit.to_string())];
        if let Some(token) = pagination.page_token {
            params.push(("pageToken", token));
        }

        let response: ThreadListResponse = self.get("/threads", &params).await?;

        Ok(ThreadPage {
            threads: response
                .threads
                .unwrap_or_default()
                .into_iter()
                .map(|t| ThreadId::from(t.id))
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn get_thread_labels(&self, thread_id: &ThreadId) -> Result<Vec<String>> {
        let endpoint = format!("/threads/{}", thread_id);
        let thread: GmailThread = self
            .get(&endpoint, &[("format", "minimal".to_string())])
            .await?;

        let ids: BTreeSet<String> = thread
            .messages
            .unwrap_or_default()
            .into_iter()
            .flat_map(|m| m.label_ids.unwrap_or_default())
            .filter(|id| !is_system_label_id(id))
            .collect();

        if ids.is_empty() {
            return Ok(vec![]);
        }

        let labels = self.fetch_labels().await?;
        Ok(user_label_names(&ids, &labels))
    }

    async fn get_thread_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        let endpoint = format!("/threads/{}", thread_id);
        let thread: GmailThread = self
            .get(&endpoint, &[("format", "full".to_string())])
            .await?;

        thread
            .messages
            .unwrap_or_default()
            .iter()
            .map(Self::gmail_message_to_message)
            .collect()
    }

    async fn forward_message(&self, message: &Message, to: &Address) -> Result<()> {
        let raw = build_forward_message(message, to);
        let encoded = BASE64_URL_SAFE_NO_PAD.encode(raw.as_bytes());

        #[derive(Serialize)]
        struct SendRequest {
            raw: String,
        }

        #[derive(Deserialize)]
        struct SendResponse {
            id: String,
        }

        let response: SendResponse = self
            .post("/messages/send", &SendRequest { raw: encoded })
            .await?;

        tracing::debug!(message_id = %response.id, to = %to.email, "Forward sent via Gmail API");
        Ok(())
    }

    async fn get_label_by_name(&self, name: &str) -> Result<Option<Label>> {
        Ok(self
            .fetch_labels()
            .await?
            .into_iter()
            .find(|l| l.is_user() && l.name == name)
            .map(|l| Label {
                id: LabelId::from(l.id),
                name: l.name,
            }))
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        let request = CreateLabelRequest {
            name,
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
        };
        let created: GmailLabel = self.post("/labels", &request).await?;

        tracing::info!(label = %created.name, label_id = %created.id, "Label created");
        Ok(Label {
            id: LabelId::from(created.id),
            name: created.name,
        })
    }

    async fn attach_label(&self, label: &Label, thread_id: &ThreadId) -> Result<()> {
        self.modify_thread(thread_id, &ModifyRequest::add(&label.id.0))
            .await
    }

    async fn archive_thread(&self, thread_id: &ThreadId) -> Result<()> {
        self.modify_thread(thread_id, &ModifyRequest::remove("INBOX"))
            .await
    }

    async fn mark_thread_read(&self, thread_id: &ThreadId) -> Result<()> {
        self.modify_thread(thread_id, &ModifyRequest::remove("UNREAD"))
            .await
    }
}
