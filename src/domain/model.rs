use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `POST /api/identify-product` 的請求內容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// data URI 格式的圖片 (例如 `data:image/png;base64,...`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl IdentifyRequest {
    pub fn new(query: Option<String>, image: Option<String>) -> Self {
        Self { query, image }
    }

    /// 非空字串的 query，原樣傳遞不修剪
    pub fn query_text(&self) -> Option<&str> {
        non_empty(self.query.as_deref())
    }

    pub fn image_data(&self) -> Option<&str> {
        non_empty(self.image.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.query_text().is_none() && self.image_data().is_none()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    InStock,
    LowStock,
    OutOfStock,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::InStock => "in-stock",
            Availability::LowStock => "low-stock",
            Availability::OutOfStock => "out-of-stock",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Availability::InStock => "✓ In Stock",
            Availability::LowStock => "⚠ Low Stock",
            Availability::OutOfStock => "✕ Out of Stock",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        f.write_str(s)
    }
}

/// 模型回傳的單一零售商報價
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetailerOffer {
    pub name: String,
    pub price: f64,
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_ingredients: Option<Vec<String>>,
    pub retailers: Vec<RetailerOffer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub products: Vec<IdentifiedProduct>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// 結果來源：模型產生或備援的示範資料
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Generated,
    Fallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Generated => "generated",
            Provenance::Fallback => "fallback",
        }
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(Provenance::Generated),
            "fallback" => Ok(Provenance::Fallback),
            other => Err(format!("unknown provenance: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub result: IdentificationResult,
    pub provenance: Provenance,
}

/// 顯示用的零售商資料 (含購買連結)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retailer {
    pub name: String,
    pub price: f64,
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_time: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_ref: String,
    pub retailers: Vec<Retailer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Product>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>, image: Option<String>) -> Self {
        Self::new(Role::User, content.into(), image, None)
    }

    pub fn assistant(content: impl Into<String>, results: Option<Vec<Product>>) -> Self {
        Self::new(Role::Assistant, content.into(), None, results)
    }

    fn new(role: Role, content: String, image: Option<String>, results: Option<Vec<Product>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            image,
            results,
            created_at: Utc::now(),
        }
    }
}
