//! Admin-managed resources and their forms.
//!
//! Each resource knows its collection path (also its cache tag), how to build an
//! optimistic placeholder from its form, and how its form goes on the wire.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;
use super::{ApiClient, Endpoint, MultipartBody, RequestBody, ResourceRemote};
use crate::domain::aggregates::ProductDraft;
use crate::{Brand, Category, Product, Result, Role, User};

pub trait Resource: Clone + Send + Sync + DeserializeOwned + 'static {
    /// Collection path segment and cache tag.
    const TAG: &'static str;
    type Draft: Validate + Send + Sync;

    fn id(&self) -> &str;
    /// Placeholder shown before the backend confirms a create.
    fn preview(draft: &Self::Draft, id: String) -> Self;
    /// This entry with `draft` applied, shown before the backend confirms an update.
    fn patched(&self, draft: &Self::Draft) -> Self { Self::preview(draft, self.id().to_string()) }
    fn body(draft: &Self::Draft) -> Result<RequestBody>;
}

fn json_body<T: Serialize>(draft: &T) -> Result<RequestBody> {
    Ok(RequestBody::Json(serde_json::to_value(draft)?))
}

#[derive(Clone, Debug, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BrandDraft {
    #[validate(length(min = 2, max = 60, message = "name must be between 2 and 60 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "description is too long"))]
    pub description: String,
    #[validate(url(message = "logo must be a URL"))]
    pub logo: Option<String>,
    pub is_active: bool,
}

#[derive(Clone, Debug, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    #[validate(length(min = 2, max = 60, message = "name must be between 2 and 60 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "description is too long"))]
    pub description: String,
    #[validate(url(message = "image must be a URL"))]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[validate(length(min = 2, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 3, max = 30, message = "username must be between 3 and 30 characters"))]
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Resource for Brand {
    const TAG: &'static str = "brands";
    type Draft = BrandDraft;
    fn id(&self) -> &str { &self.id }
    fn preview(draft: &BrandDraft, id: String) -> Self {
        Brand { id, name: draft.name.clone(), description: draft.description.clone(), logo: draft.logo.clone(), is_active: draft.is_active, product_count: 0 }
    }
    fn patched(&self, draft: &BrandDraft) -> Self {
        Brand { product_count: self.product_count, ..Self::preview(draft, self.id.clone()) }
    }
    fn body(draft: &BrandDraft) -> Result<RequestBody> { json_body(draft) }
}

impl Resource for Category {
    const TAG: &'static str = "categories";
    type Draft = CategoryDraft;
    fn id(&self) -> &str { &self.id }
    fn preview(draft: &CategoryDraft, id: String) -> Self {
        Category { id, name: draft.name.clone(), description: draft.description.clone(), image: draft.image.clone(), product_count: 0 }
    }
    fn patched(&self, draft: &CategoryDraft) -> Self {
        Category { product_count: self.product_count, ..Self::preview(draft, self.id.clone()) }
    }
    fn body(draft: &CategoryDraft) -> Result<RequestBody> { json_body(draft) }
}

impl Resource for Product {
    const TAG: &'static str = "products";
    type Draft = ProductDraft;
    fn id(&self) -> &str { &self.id }
    fn preview(draft: &ProductDraft, id: String) -> Self { draft.preview(id) }
    fn patched(&self, draft: &ProductDraft) -> Self {
        Product { sold: self.sold, ..draft.preview(self.id.clone()) }
    }
    /// Products always go as multipart so images can ride along.
    fn body(draft: &ProductDraft) -> Result<RequestBody> {
        let mut form = MultipartBody::new();
        for (name, value) in draft.form_fields() { form = form.text(name, value); }
        for upload in &draft.uploads { form = form.file("images", upload.clone()); }
        Ok(RequestBody::Multipart(form))
    }
}

impl Resource for User {
    const TAG: &'static str = "users";
    type Draft = UserDraft;
    fn id(&self) -> &str { &self.id }
    fn preview(draft: &UserDraft, id: String) -> Self {
        User {
            id,
            name: draft.name.clone(),
            email: draft.email.clone(),
            username: draft.username.clone(),
            role: draft.role,
            phone: draft.phone.clone(),
            bio: None,
            image: None,
            two_factor_enabled: false,
            created_at: Some(chrono::Utc::now()),
        }
    }
    fn patched(&self, draft: &UserDraft) -> Self {
        User { bio: self.bio.clone(), image: self.image.clone(), two_factor_enabled: self.two_factor_enabled, created_at: self.created_at, ..Self::preview(draft, self.id.clone()) }
    }
    fn body(draft: &UserDraft) -> Result<RequestBody> { json_body(draft) }
}

#[async_trait]
impl<R: Resource> ResourceRemote<R> for ApiClient {
    async fn list(&self) -> Result<Vec<R>> { self.get(R::TAG).await }

    async fn create(&self, draft: &R::Draft) -> Result<R> {
        self.send_body(Method::POST, R::TAG, R::body(draft)?).await
    }

    async fn update(&self, id: &str, draft: &R::Draft) -> Result<R> {
        self.send_body(Method::PUT, Endpoint::new(R::TAG).param(id), R::body(draft)?).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.delete_path(Endpoint::new(R::TAG).param(id)).await
    }
}
