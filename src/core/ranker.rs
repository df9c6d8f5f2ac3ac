use crate::domain::model::{Availability, Retailer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    PriceLow,
    PriceHigh,
    Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvailabilityFilter {
    #[default]
    All,
    InStock,
    LowStock,
}

impl AvailabilityFilter {
    pub fn matches(&self, availability: Availability) -> bool {
        match self {
            AvailabilityFilter::All => true,
            AvailabilityFilter::InStock => availability == Availability::InStock,
            AvailabilityFilter::LowStock => availability == Availability::LowStock,
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price-low" => Ok(SortKey::PriceLow),
            "price-high" => Ok(SortKey::PriceHigh),
            "rating" => Ok(SortKey::Rating),
            other => Err(format!(
                "unknown sort key '{}' (expected price-low, price-high or rating)",
                other
            )),
        }
    }
}

impl FromStr for AvailabilityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(AvailabilityFilter::All),
            "in-stock" => Ok(AvailabilityFilter::InStock),
            "low-stock" => Ok(AvailabilityFilter::LowStock),
            other => Err(format!(
                "unknown availability filter '{}' (expected all, in-stock or low-stock)",
                other
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortKey::PriceLow => "Price: Low to High",
            SortKey::PriceHigh => "Price: High to Low",
            SortKey::Rating => "Highest Rated",
        })
    }
}

impl fmt::Display for AvailabilityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AvailabilityFilter::All => "All",
            AvailabilityFilter::InStock => "In Stock",
            AvailabilityFilter::LowStock => "Low Stock",
        })
    }
}

/// 目前選擇的排序與篩選
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RankView {
    pub sort: SortKey,
    pub filter: AvailabilityFilter,
}

impl RankView {
    pub fn new(sort: SortKey, filter: AvailabilityFilter) -> Self {
        Self { sort, filter }
    }

    pub fn apply(&self, retailers: &[Retailer]) -> Vec<Retailer> {
        rank(retailers, self.sort, self.filter)
    }
}

/// 篩選後排序。使用穩定排序，鍵值相同時保留原本的相對順序。
pub fn rank(retailers: &[Retailer], sort: SortKey, filter: AvailabilityFilter) -> Vec<Retailer> {
    let mut ranked: Vec<Retailer> = retailers
        .iter()
        .filter(|r| filter.matches(r.availability))
        .cloned()
        .collect();

    ranked.sort_by(|a, b| compare(a, b, sort));
    ranked
}

fn compare(a: &Retailer, b: &Retailer, sort: SortKey) -> Ordering {
    match sort {
        SortKey::PriceLow => a.price.total_cmp(&b.price),
        SortKey::PriceHigh => b.price.total_cmp(&a.price),
        // 沒有評分視為 0
        SortKey::Rating => b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)),
    }
}
