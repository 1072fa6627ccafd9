//! Product reviews.

use reqwest::Method;
use serde::Serialize;
use validator::Validate;
use super::{ApiClient, Endpoint};
use crate::{Result, Review};

#[derive(Clone, Debug, Serialize, Validate)]
pub struct NewReview {
    #[validate(length(min = 1, message = "product is required"))]
    pub product: String,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(min = 3, max = 1000, message = "comment must be between 3 and 1000 characters"))]
    pub comment: String,
}

impl ApiClient {
    pub async fn product_reviews(&self, product_id: &str) -> Result<Vec<Review>> {
        self.get(Endpoint::new("/reviews/product").param(product_id)).await
    }

    pub async fn create_review(&self, review: &NewReview) -> Result<Review> {
        review.validate()?;
        self.send_json(Method::POST, "/reviews", review).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let mut review = NewReview { product: "p-1".into(), rating: 6, comment: "Exquisite".into() };
        assert!(review.validate().is_err());
        review.rating = 5;
        assert!(review.validate().is_ok());
    }
}
