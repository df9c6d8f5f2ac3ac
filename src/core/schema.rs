// 模型輸出一律先反序列化並驗證，才交給呼叫端

use crate::domain::model::{IdentificationResult, RetailerOffer};
use crate::utils::error::{FinderError, Result};
use crate::utils::validation::Validate;
use serde_json::json;

pub const SCHEMA_NAME: &str = "identification_result";
pub const MIN_PRODUCTS: usize = 1;
pub const MAX_PRODUCTS: usize = 5;
pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

/// JSON schema of an [`IdentificationResult`].
pub fn identification_schema() -> serde_json::Value {
    let retailer = json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Name of the retailer (e.g., CVS Pharmacy, Walgreens, Amazon Pharmacy, Rite Aid)"
            },
            "price": { "type": "number", "minimum": 0, "description": "Price in USD" },
            "availability": { "type": "string", "enum": ["in-stock", "low-stock", "out-of-stock"] },
            "rating": {
                "type": "number",
                "minimum": MIN_RATING,
                "maximum": MAX_RATING,
                "description": "Customer rating out of 5"
            },
            "shippingTime": {
                "type": "string",
                "description": "Estimated shipping time (e.g., \"2-3 days\", \"Next day\")"
            }
        },
        "required": ["name", "price", "availability"],
        "additionalProperties": false
    });

    let product = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "Full product name including dosage/strength" },
            "description": { "type": "string", "description": "Brief description of the product and its uses" },
            "category": {
                "type": "string",
                "description": "Product category (e.g., pain-relief, vitamins, cold-flu, first-aid)"
            },
            "activeIngredients": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Active ingredients if applicable"
            },
            "retailers": {
                "type": "array",
                "items": retailer,
                "description": "List of retailers selling this product with pricing"
            }
        },
        "required": ["name", "description", "category", "retailers"],
        "additionalProperties": false
    });

    json!({
        "type": "object",
        "properties": {
            "products": {
                "type": "array",
                "items": product,
                "minItems": MIN_PRODUCTS,
                "maxItems": MAX_PRODUCTS,
                "description": "List of identified products or alternatives"
            },
            "confidence": {
                "type": "string",
                "enum": ["high", "medium", "low"],
                "description": "Confidence level of the identification"
            },
            "notes": { "type": "string", "description": "Additional notes or warnings about the products" }
        },
        "required": ["products", "confidence"],
        "additionalProperties": false
    })
}

/// Deserialize raw model output and enforce the invariants serde cannot express.
pub fn parse_identification(value: serde_json::Value) -> Result<IdentificationResult> {
    let result: IdentificationResult = serde_json::from_value(value)
        .map_err(|e| FinderError::schema("$", format!("does not match schema: {}", e)))?;
    result.validate()?;
    Ok(result)
}

impl Validate for IdentificationResult {
    fn validate(&self) -> Result<()> {
        let count = self.products.len();
        if !(MIN_PRODUCTS..=MAX_PRODUCTS).contains(&count) {
            return Err(FinderError::schema(
                "products",
                format!(
                    "expected between {} and {} products, got {}",
                    MIN_PRODUCTS, MAX_PRODUCTS, count
                ),
            ));
        }

        for (p, product) in self.products.iter().enumerate() {
            for (r, offer) in product.retailers.iter().enumerate() {
                validate_offer(&format!("products[{}].retailers[{}]", p, r), offer)?;
            }
        }

        Ok(())
    }
}

fn validate_offer(path: &str, offer: &RetailerOffer) -> Result<()> {
    if !offer.price.is_finite() || offer.price < 0.0 {
        return Err(FinderError::schema(
            format!("{}.price", path),
            format!("price must be a non-negative number, got {}", offer.price),
        ));
    }

    if let Some(rating) = offer.rating {
        if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(FinderError::schema(
                format!("{}.rating", path),
                format!("rating must be within [0, 5], got {}", rating),
            ));
        }
    }

    Ok(())
}
