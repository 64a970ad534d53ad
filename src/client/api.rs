//! REST client with bearer authentication and token refresh
//!
//! Every request except login, register and refresh carries the current
//! access token. A `401 TOKEN_EXPIRED` answer triggers one refresh and one
//! retry of the original request. When the session cannot be recovered the
//! tokens are cleared and every registered [`SessionListener`] is notified.

use reqwest::{
    Method, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::client::ClientError;
use crate::client::tokens::TokenStore;
use crate::core::models::{
    ApiError, AuthResponse, FavoriteStatus, LoginRequest, MessageResponse, Paginated, Pollution,
    PollutionFilters, RefreshRequest, RegisterRequest, TokenPair, UserResponse,
};
use crate::core::validation::{
    FormFields, validate_login, validate_pollution_draft, validate_pollution_patch,
    validate_registration,
};

/// Endpoints that never carry a bearer token
const PUBLIC_PATHS: [&str; 3] = ["/auth/login", "/auth/register", "/auth/refresh"];

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// Notified when the session is lost (time to show the login screen)
pub trait SessionListener: Send + Sync {
    fn session_expired(&self);
}

impl<F> SessionListener for F
where
    F: Fn() + Send + Sync,
{
    fn session_expired(&self) {
        self()
    }
}

/// Photo attached to a pollution form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form {
        fields: FormFields,
        photo: Option<PhotoFile>,
    },
}

/// Request description that can be sent again after a refresh
#[derive(Debug, Clone)]
struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: RequestBody,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    fn json(method: Method, path: impl Into<String>, body: &impl Serialize) -> Result<Self, ClientError> {
        let mut request = Self::new(method, path);
        request.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(request)
    }

    fn form(method: Method, path: impl Into<String>, fields: &FormFields, photo: Option<&PhotoFile>) -> Self {
        let mut request = Self::new(method, path);
        request.body = RequestBody::Form {
            fields: fields.clone(),
            photo: photo.cloned(),
        };
        request
    }
}

fn build_form(fields: &FormFields, photo: Option<&PhotoFile>) -> Result<Form, ClientError> {
    let mut form = Form::new();
    // Null travels as an empty value, which the server reads as null
    for (name, value) in fields.iter() {
        form = form.text(name.to_string(), value.unwrap_or_default().to_string());
    }

    if let Some(photo) = photo {
        let part = Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.mime_type)?;
        form = form.part("photo", part);
    }

    Ok(form)
}

fn filter_query(filters: &PollutionFilters) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("page", filters.page.to_string()),
        ("limit", filters.limit.to_string()),
    ];
    if let Some(search) = &filters.search {
        query.push(("search", search.clone()));
    }
    if let Some(pollution_type) = filters.pollution_type {
        query.push(("type", pollution_type.to_string()));
    }
    if let Some(city) = &filters.city {
        query.push(("city", city.clone()));
    }
    if let Some(status) = filters.status {
        query.push(("status", status.to_string()));
    }
    query
}

/// Turn a non-success response into [`ClientError::Api`]
async fn api_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    match response.json::<ApiError>().await {
        Ok(body) => ClientError::Api {
            status,
            code: body.code,
            message: body.error,
            errors: body.errors.unwrap_or_default(),
        },
        Err(_) => ClientError::Api {
            status,
            code: "UNKNOWN_ERROR".to_string(),
            message: format!("Request failed with status {status}"),
            errors: Vec::new(),
        },
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        Err(api_error(response).await)
    }
}

async fn expect_success(response: Response) -> Result<(), ClientError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(api_error(response).await)
    }
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

/// EcoWatch API client
///
/// Cheap to clone; clones share tokens and listeners.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client for an API root such as `http://localhost:3000/api`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url)
    }

    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                tokens: Arc::new(TokenStore::new()),
                listeners: RwLock::new(Vec::new()),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.inner.tokens
    }

    pub fn add_session_listener(&self, listener: Arc<dyn SessionListener>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    fn expire_session(&self) {
        tracing::warn!("Session expired, clearing tokens");
        self.inner.tokens.clear();

        let listeners = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            listener.session_expired();
        }
    }

    /// Send `request` once; the flag tells whether a bearer token went with it
    async fn execute(&self, request: &ApiRequest) -> Result<(Response, bool), ClientError> {
        let url = format!("{}{}", self.inner.base_url, request.path);
        let mut builder = self.inner.http.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let token = if is_public(&request.path) {
            None
        } else {
            self.inner.tokens.access_token()
        };
        let authed = token.is_some();
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form { fields, photo } => builder.multipart(build_form(fields, photo.as_ref())?),
        };

        Ok((builder.send().await?, authed))
    }

    /// Exchange `stale` for a new pair unless another call already did
    async fn refresh_with(&self, stale: &str) -> Result<(), ClientError> {
        let _guard = self.inner.refresh_lock.lock().await;

        match self.inner.tokens.refresh_token() {
            None => return Err(ClientError::SessionExpired),
            Some(current) if current != stale => return Ok(()),
            Some(_) => {}
        }

        let request = ApiRequest::json(
            Method::POST,
            "/auth/refresh",
            &RefreshRequest {
                refresh_token: stale.to_string(),
            },
        )?;
        let (response, _) = self.execute(&request).await?;
        let pair: TokenPair = parse(response).await?;
        self.inner.tokens.set_tokens(&pair);

        tracing::debug!("Access token refreshed");
        Ok(())
    }

    /// Refresh ahead of time when the access token is about to expire
    async fn refresh_if_stale(&self) -> Result<(), ClientError> {
        let tokens = &self.inner.tokens;
        if tokens.access_token().is_none() || !tokens.is_access_token_expired() {
            return Ok(());
        }
        let Some(refresh) = tokens.refresh_token() else {
            return Ok(());
        };

        self.refresh_with(&refresh).await.inspect_err(|_| self.expire_session())
    }

    async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        if is_public(&request.path) {
            return Ok(self.execute(&request).await?.0);
        }

        self.refresh_if_stale().await?;

        let (response, authed) = self.execute(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        // No session was sent, so there is none to refresh or expire
        if !authed {
            return Err(api_error(response).await);
        }

        let error = api_error(response).await;
        match (error.code(), self.inner.tokens.refresh_token()) {
            (Some("TOKEN_EXPIRED"), Some(refresh)) => {
                self.refresh_with(&refresh)
                    .await
                    .inspect_err(|_| self.expire_session())?;

                tracing::debug!(path = %request.path, "Retrying request after refresh");
                let (retry, _) = self.execute(&request).await?;
                if retry.status() == StatusCode::UNAUTHORIZED {
                    self.expire_session();
                }
                Ok(retry)
            }
            _ => {
                self.expire_session();
                Err(error)
            }
        }
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Register and start a session
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let request = validate_registration(request)?;
        let response: AuthResponse =
            parse(self.send(ApiRequest::json(Method::POST, "/auth/register", &request)?).await?)
                .await?;
        self.inner.tokens.set_tokens(&response.tokens);
        Ok(response)
    }

    /// Log in and start a session
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let request = validate_login(request)?;
        let response: AuthResponse =
            parse(self.send(ApiRequest::json(Method::POST, "/auth/login", &request)?).await?)
                .await?;
        self.inner.tokens.set_tokens(&response.tokens);
        Ok(response)
    }

    /// Rotate the token pair explicitly
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let refresh = self
            .inner
            .tokens
            .refresh_token()
            .ok_or(ClientError::SessionExpired)?;
        self.refresh_with(&refresh).await
    }

    /// End the session on the server; local tokens are cleared regardless
    pub async fn logout(&self) -> Result<(), ClientError> {
        if !self.inner.tokens.has_tokens() {
            return Ok(());
        }

        let result = match self.send(ApiRequest::new(Method::POST, "/auth/logout")).await {
            Ok(response) => expect_success(response).await,
            Err(e) => Err(e),
        };
        self.inner.tokens.clear();
        result
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        parse(self.send(ApiRequest::new(Method::GET, "/auth/me")).await?).await
    }

    // ========================================================================
    // Pollutions
    // ========================================================================

    pub async fn list_pollutions(
        &self,
        filters: &PollutionFilters,
    ) -> Result<Paginated<Pollution>, ClientError> {
        let mut request = ApiRequest::new(Method::GET, "/pollutions");
        request.query = filter_query(filters);
        parse(self.send(request).await?).await
    }

    pub async fn get_pollution(&self, id: Uuid) -> Result<Pollution, ClientError> {
        parse(
            self.send(ApiRequest::new(Method::GET, format!("/pollutions/{id}")))
                .await?,
        )
        .await
    }

    /// Report a pollution; fields are checked locally before sending
    pub async fn create_pollution(
        &self,
        fields: &FormFields,
        photo: Option<&PhotoFile>,
    ) -> Result<Pollution, ClientError> {
        validate_pollution_draft(fields)?;
        parse(
            self.send(ApiRequest::form(Method::POST, "/pollutions", fields, photo))
                .await?,
        )
        .await
    }

    pub async fn update_pollution(
        &self,
        id: Uuid,
        fields: &FormFields,
        photo: Option<&PhotoFile>,
    ) -> Result<Pollution, ClientError> {
        validate_pollution_patch(fields)?;
        parse(
            self.send(ApiRequest::form(
                Method::PUT,
                format!("/pollutions/{id}"),
                fields,
                photo,
            ))
            .await?,
        )
        .await
    }

    pub async fn delete_pollution(&self, id: Uuid) -> Result<(), ClientError> {
        expect_success(
            self.send(ApiRequest::new(Method::DELETE, format!("/pollutions/{id}")))
                .await?,
        )
        .await
    }

    // ========================================================================
    // Favorites
    // ========================================================================

    pub async fn favorites(&self) -> Result<Vec<Pollution>, ClientError> {
        parse(self.send(ApiRequest::new(Method::GET, "/favorites")).await?).await
    }

    pub async fn is_favorite(&self, pollution_id: Uuid) -> Result<bool, ClientError> {
        let status: FavoriteStatus = parse(
            self.send(ApiRequest::new(
                Method::GET,
                format!("/favorites/{pollution_id}"),
            ))
            .await?,
        )
        .await?;
        Ok(status.is_favorite)
    }

    pub async fn add_favorite(&self, pollution_id: Uuid) -> Result<MessageResponse, ClientError> {
        parse(
            self.send(ApiRequest::new(
                Method::POST,
                format!("/favorites/{pollution_id}"),
            ))
            .await?,
        )
        .await
    }

    pub async fn remove_favorite(&self, pollution_id: Uuid) -> Result<(), ClientError> {
        expect_success(
            self.send(ApiRequest::new(
                Method::DELETE,
                format!("/favorites/{pollution_id}"),
            ))
            .await?,
        )
        .await
    }
}
