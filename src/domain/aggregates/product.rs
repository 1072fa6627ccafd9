//! Product Aggregate
//!
//! Storefront-side rules for products: variant selection, purchasability, and the admin
//! product form.

use rust_decimal::Decimal;
use serde::Serialize;
use validator::{Validate, ValidationError};
use crate::domain::aggregates::cart::CartLine;
use crate::domain::value_objects::VariantKey;
use crate::{EntityRef, Product, ProductStatus, Specification};

impl Product {
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }

    /// Live, active and with stock left.
    pub fn is_purchasable(&self) -> bool {
        self.is_live && self.status == ProductStatus::Active && self.is_in_stock()
    }

    pub fn display_image(&self) -> Option<&str> {
        self.main_image.as_deref().or_else(|| self.images.first().map(String::as_str))
    }

    /// Builds the cart key for a size/color choice. When the product offers sizes or colors,
    /// one of them must be picked.
    pub fn variant_key(&self, size: Option<&str>, color: Option<&str>) -> Result<VariantKey, ProductError> {
        let size = pick(&self.sizes, size, ProductError::SizeRequired, ProductError::UnknownSize)?;
        let color = pick(&self.colors, color, ProductError::ColorRequired, ProductError::UnknownColor)?;
        Ok(VariantKey::new(self.id.clone(), size, color))
    }

    /// Cart line snapshot for `key`, with quantity left at zero for the caller to decide.
    pub fn to_cart_line(&self, key: VariantKey) -> CartLine {
        CartLine {
            key,
            name: self.name.clone(),
            unit_price: self.price,
            image: self.display_image().map(String::from),
            quantity: 0,
        }
    }
}

fn pick(options: &[String], chosen: Option<&str>, missing: ProductError, unknown: fn(String) -> ProductError) -> Result<Option<String>, ProductError> {
    let chosen = chosen.map(str::trim).filter(|c| !c.is_empty());
    match (options.is_empty(), chosen) {
        (true, _) => Ok(None),
        (false, None) => Err(missing),
        (false, Some(c)) => options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(c))
            .map(|o| Some(o.clone()))
            .ok_or_else(|| unknown(c.to_string())),
    }
}

/// Image file attached to the product form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Admin product form.
#[derive(Clone, Debug, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[validate(length(min = 2, max = 120, message = "name must be between 2 and 120 characters"))]
    pub name: String,
    #[validate(length(min = 10, message = "description is too short"))]
    pub description: String,
    #[validate(custom = "positive_price")]
    pub price: Decimal,
    pub stock: u32,
    #[validate(length(min = 1, message = "brand is required"))]
    pub brand: String,
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub specifications: Vec<Specification>,
    pub is_live: bool,
    pub is_main: bool,
    pub is_featured: bool,
    pub is_hot_deal: bool,
    pub status: ProductStatus,
    /// Index into `images` of the main image.
    pub main_image_index: usize,
    /// Existing image URLs kept on update.
    pub images: Vec<String>,
    #[serde(skip)]
    pub uploads: Vec<ImageUpload>,
}

fn positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_positive() && !price.is_zero() { Ok(()) } else { Err(ValidationError::new("price must be greater than zero")) }
}

impl ProductDraft {
    /// Text fields of the multipart form. List values are JSON-encoded, flags are
    /// `"true"`/`"false"`.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("name".into(), self.name.clone()),
            ("description".into(), self.description.clone()),
            ("price".into(), self.price.to_string()),
            ("stock".into(), self.stock.to_string()),
            ("brand".into(), self.brand.clone()),
            ("category".into(), self.category.clone()),
            ("sizes".into(), to_json(&self.sizes)),
            ("colors".into(), to_json(&self.colors)),
            ("specifications".into(), to_json(&self.specifications)),
            ("images".into(), to_json(&self.images)),
            ("mainImageIndex".into(), self.main_image_index.to_string()),
            ("isLive".into(), self.is_live.to_string()),
            ("isMain".into(), self.is_main.to_string()),
            ("isFeatured".into(), self.is_featured.to_string()),
            ("isHotDeal".into(), self.is_hot_deal.to_string()),
            ("status".into(), self.status.as_str().to_string()),
        ]
    }

    /// Optimistic stand-in shown until the backend answers.
    pub fn preview(&self, id: String) -> Product {
        Product {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            sold: 0,
            brand: Some(EntityRef::Id(self.brand.clone())),
            category: Some(EntityRef::Id(self.category.clone())),
            images: self.images.clone(),
            main_image: self.images.get(self.main_image_index).cloned(),
            sizes: self.sizes.clone(),
            colors: self.colors.clone(),
            specifications: self.specifications.clone(),
            is_live: self.is_live,
            is_main: self.is_main,
            is_featured: self.is_featured,
            is_hot_deal: self.is_hot_deal,
            status: self.status,
            updated_at: Some(chrono::Utc::now()),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError { SizeRequired, ColorRequired, UnknownSize(String), UnknownColor(String), NotPurchasable(String) }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SizeRequired => write!(f, "Please select a size"),
            Self::ColorRequired => write!(f, "Please select a color"),
            Self::UnknownSize(s) => write!(f, "Size {} is not available", s),
            Self::UnknownColor(c) => write!(f, "Color {} is not available", c),
            Self::NotPurchasable(name) => write!(f, "{} is not available for purchase", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        ProductDraft {
            name: "Cashmere Coat".into(),
            description: "Double-faced cashmere coat".into(),
            price: Decimal::new(2400, 0),
            stock: 4,
            brand: "b-1".into(),
            category: "c-1".into(),
            sizes: vec!["S".into(), "M".into()],
            colors: vec!["Camel".into()],
            is_live: true,
            images: vec!["/img/front.jpg".into(), "/img/back.jpg".into()],
            main_image_index: 1,
            ..Default::default()
        }
        .preview("p-1".into())
    }

    #[test]
    fn test_variant_key_requires_choice() {
        let p = product();
        assert_eq!(p.variant_key(None, Some("Camel")), Err(ProductError::SizeRequired));
        assert_eq!(p.variant_key(Some("XL"), Some("Camel")), Err(ProductError::UnknownSize("XL".into())));
        let key = p.variant_key(Some("M"), Some("camel")).unwrap();
        assert_eq!(key.size(), Some("M"));
        assert_eq!(key.color(), Some("Camel"));
        assert_eq!(key.product_id(), "p-1");
    }

    #[test]
    fn test_purchasable_and_image() {
        let mut p = product();
        assert!(p.is_purchasable());
        assert_eq!(p.display_image(), Some("/img/back.jpg"));
        p.stock = 0;
        assert!(!p.is_purchasable());
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = ProductDraft { name: "X".into(), price: Decimal::ZERO, ..Default::default() };
        let errors = draft.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key("brand"));
        draft.name = "Leather Tote".into();
        draft.description = "Hand-stitched calfskin tote".into();
        draft.price = Decimal::new(1800, 0);
        draft.brand = "b-1".into();
        draft.category = "c-1".into();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_form_fields_encode_lists() {
        let draft = ProductDraft { sizes: vec!["S".into(), "M".into()], status: ProductStatus::OutOfStock, ..Default::default() };
        let fields = draft.form_fields();
        assert!(fields.contains(&("sizes".to_string(), "[\"S\",\"M\"]".to_string())));
        assert!(fields.contains(&("status".to_string(), "Out of Stock".to_string())));
    }
}
