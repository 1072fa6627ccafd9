//! HTTP client for the storefront backend.
//!
//! [`ApiClient`] wraps a `reqwest::Client`, the base URL and the session token. Endpoint
//! groups live in the submodules as further `impl ApiClient` blocks. The traits at the
//! bottom are the seams the services depend on, so cart, checkout and admin logic can run
//! against something other than the live backend.

mod auth;
mod cart;
mod catalog;
mod dashboard;
mod orders;
pub mod resources;
mod reviews;

pub use auth::{ChangePasswordRequest, LoginOutcome, LoginRequest, ProfileUpdate, RegisterRequest};
pub use resources::{BrandDraft, CategoryDraft, Resource, UserDraft};
pub use reviews::NewReview;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::config::Config;
use crate::domain::aggregates::{CartLine, CreateOrderRequest, ImageUpload, OrderPlacement, PaymentCallback};
use crate::domain::value_objects::VariantKey;
use crate::{Order, Result, StorefrontError};

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Arc<RwLock<Option<String>>>,
}

/// Body of a mutation request.
#[derive(Debug)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

#[derive(Debug, Default)]
pub struct MultipartBody {
    fields: Vec<(String, String)>,
    files: Vec<(String, ImageUpload)>,
}

impl MultipartBody {
    pub fn new() -> Self { Self::default() }
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
    pub fn file(mut self, name: impl Into<String>, upload: ImageUpload) -> Self {
        self.files.push((name.into(), upload));
        self
    }
    pub fn fields(&self) -> &[(String, String)] { &self.fields }
    pub fn file_count(&self) -> usize { self.files.len() }

    fn into_form(self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in self.fields { form = form.text(name, value); }
        for (name, upload) in self.files {
            let part = Part::bytes(upload.bytes).file_name(upload.file_name).mime_str(&upload.content_type)?;
            form = form.part(name, part);
        }
        Ok(form)
    }
}

#[derive(Deserialize)]
struct ErrorBody { message: Option<String>, error: Option<String> }

/// Path below the base URL. Fixed parts come from a `/`-separated literal; values added
/// with [`Endpoint::param`] always stay one percent-encoded segment.
#[derive(Clone, Debug)]
pub(crate) struct Endpoint<'a> { segments: Vec<&'a str> }

impl<'a> Endpoint<'a> {
    pub(crate) fn new(path: &'a str) -> Self { Self { segments: path.split('/').filter(|s| !s.is_empty()).collect() } }
    pub(crate) fn param(mut self, value: &'a str) -> Self {
        self.segments.push(value);
        self
    }
}

impl<'a> From<&'a str> for Endpoint<'a> {
    fn from(path: &'a str) -> Self { Self::new(path) }
}

/// Plain `{ "message": ... }` acknowledgement.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody { #[serde(default)] pub message: String }

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.api_url).map_err(|e| StorefrontError::Config(format!("invalid API URL {:?}: {}", config.api_url, e)))?;
        if base_url.cannot_be_a_base() { return Err(StorefrontError::Config(format!("API URL {:?} cannot take a path", config.api_url))); }
        let mut builder = reqwest::Client::builder().user_agent(concat!("maison-storefront/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.http_timeout { builder = builder.timeout(timeout); }
        Ok(Self {
            http: builder.build()?,
            base_url,
            token: Arc::new(RwLock::new(config.token.clone())),
        })
    }

    pub fn base_url(&self) -> &str { self.base_url.as_str() }
    pub async fn token(&self) -> Option<String> { self.token.read().await.clone() }
    pub async fn set_token(&self, token: Option<String>) { *self.token.write().await = token; }
    pub async fn is_authenticated(&self) -> bool { self.token.read().await.is_some() }

    fn url(&self, endpoint: &Endpoint<'_>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorefrontError::Config(format!("API URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(endpoint.segments.iter());
        Ok(url)
    }

    async fn request(&self, method: Method, endpoint: Endpoint<'_>) -> Result<RequestBuilder> {
        let builder = self.http.request(method, self.url(&endpoint)?);
        Ok(match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    pub(crate) async fn get<'a, T: DeserializeOwned>(&self, endpoint: impl Into<Endpoint<'a>>) -> Result<T> {
        let builder = self.request(Method::GET, endpoint.into()).await?;
        Self::json(builder).await
    }

    pub(crate) async fn send_json<'a, B: Serialize + ?Sized, T: DeserializeOwned>(&self, method: Method, endpoint: impl Into<Endpoint<'a>>, body: &B) -> Result<T> {
        let builder = self.request(method, endpoint.into()).await?.json(body);
        Self::json(builder).await
    }

    pub(crate) async fn send_body<'a, T: DeserializeOwned>(&self, method: Method, endpoint: impl Into<Endpoint<'a>>, body: RequestBody) -> Result<T> {
        let builder = self.request(method, endpoint.into()).await?;
        let builder = match body {
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(multipart) => builder.multipart(multipart.into_form()?),
        };
        Self::json(builder).await
    }

    pub(crate) async fn delete_path<'a>(&self, endpoint: impl Into<Endpoint<'a>>) -> Result<()> {
        let builder = self.request(Method::DELETE, endpoint.into()).await?;
        check(builder.send().await?).await?;
        Ok(())
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let response = check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Turns non-2xx responses into errors, using the backend's `message` when it sends one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() { return Ok(response); }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    tracing::debug!(status = status.as_u16(), %message, "request failed");
    Err(match status {
        StatusCode::UNAUTHORIZED => StorefrontError::Unauthorized,
        StatusCode::NOT_FOUND => StorefrontError::NotFound(message),
        _ => StorefrontError::Api { status: status.as_u16(), message },
    })
}

// =============================================================================
// Service seams
// =============================================================================

/// Backend cart operations used by cart reconciliation.
#[async_trait]
pub trait CartRemote: Send + Sync {
    /// Current backend cart in display shape.
    async fn fetch_cart(&self) -> Result<Vec<CartLine>>;
    /// Adds `delta` units to a line; negative values decrease or remove it.
    async fn add_to_cart(&self, key: &VariantKey, delta: i64) -> Result<()>;
    /// Authoritative stock of a product.
    async fn fetch_stock(&self, product_id: &str) -> Result<u32>;
}

#[async_trait]
pub trait OrderRemote: Send + Sync {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderPlacement>;
    async fn verify_payment(&self, callback: &PaymentCallback) -> Result<Order>;
}

/// Admin CRUD endpoints of one resource.
#[async_trait]
pub trait ResourceRemote<R: Resource>: Send + Sync {
    async fn list(&self) -> Result<Vec<R>>;
    async fn create(&self, draft: &R::Draft) -> Result<R>;
    async fn update(&self, id: &str, draft: &R::Draft) -> Result<R>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = Config { api_url: "http://localhost:5000/api/".into(), ..Config::default() };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.url(&"/products/live".into()).unwrap().as_str(), "http://localhost:5000/api/products/live");
        assert_eq!(client.url(&"cart".into()).unwrap().as_str(), "http://localhost:5000/api/cart");

        let bare = ApiClient::new(&Config { api_url: "http://localhost:5000".into(), ..Config::default() }).unwrap();
        assert_eq!(bare.url(&"/products".into()).unwrap().as_str(), "http://localhost:5000/products");
    }

    #[test]
    fn test_ids_stay_in_one_segment() {
        let client = ApiClient::new(&Config { api_url: "http://localhost:5000/api".into(), ..Config::default() }).unwrap();
        let url = client.url(&Endpoint::new("/orders").param("a/b?c#d")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/orders/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = client.url(&Endpoint::new("/reviews/product").param("../admin")).unwrap();
        assert_eq!(url.path_segments().unwrap().last(), Some("..%2Fadmin"));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let config = Config { api_url: "not a url".into(), ..Config::default() };
        assert!(matches!(ApiClient::new(&config), Err(StorefrontError::Config(_))));
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let client = ApiClient::new(&Config::default()).unwrap();
        assert!(!client.is_authenticated().await);
        client.set_token(Some("abc".into())).await;
        assert_eq!(client.token().await.as_deref(), Some("abc"));
        let clone = client.clone();
        clone.set_token(None).await;
        assert!(!client.is_authenticated().await);
    }

    #[test]
    fn test_multipart_builder() {
        let body = MultipartBody::new()
            .text("name", "Clutch")
            .file("images", ImageUpload { file_name: "a.jpg".into(), content_type: "image/jpeg".into(), bytes: vec![1, 2, 3] });
        assert_eq!(body.fields().len(), 1);
        assert_eq!(body.file_count(), 1);
        assert!(body.into_form().is_ok());
    }
}
