use crate::domain::model::{
    Availability, Confidence, IdentificationResult, IdentifiedProduct, RetailerOffer,
};

pub const DEMO_MODE_NOTICE: &str = "Demo mode: Using sample data. Add a credit card to Vercel AI Gateway for real AI-powered product identification.";

/// 備援用的固定示範目錄；不論輸入為何都回傳相同內容
pub fn mock(seed_query: &str) -> IdentificationResult {
    tracing::debug!("Serving sample catalog for query: {:?}", seed_query);

    IdentificationResult {
        products: vec![
            product(
                "Ibuprofen 200mg Tablets",
                "Fast-acting pain reliever and fever reducer. Effective for headaches, muscle aches, and minor arthritis pain.",
                "Ibuprofen 200mg",
                vec![
                    offer("CVS Pharmacy", 8.99, Availability::InStock, 4.5, "2-3 days"),
                    offer("Walgreens", 9.49, Availability::InStock, 4.3, "Next day"),
                    offer("Amazon Pharmacy", 7.99, Availability::InStock, 4.7, "1-2 days"),
                    offer("Rite Aid", 9.99, Availability::LowStock, 4.2, "3-4 days"),
                ],
            ),
            product(
                "Acetaminophen 500mg Extra Strength",
                "Extra strength pain reliever and fever reducer. Gentle on stomach, suitable for those who can't take NSAIDs.",
                "Acetaminophen 500mg",
                vec![
                    offer("CVS Pharmacy", 10.99, Availability::InStock, 4.6, "2-3 days"),
                    offer("Target", 9.99, Availability::InStock, 4.4, "2-3 days"),
                    offer("Walmart", 8.49, Availability::InStock, 4.5, "3-5 days"),
                    offer("Amazon Pharmacy", 9.29, Availability::InStock, 4.8, "1-2 days"),
                ],
            ),
            product(
                "Naproxen Sodium 220mg",
                "Long-lasting pain relief for up to 12 hours. Effective for arthritis, back pain, and menstrual cramps.",
                "Naproxen Sodium 220mg",
                vec![
                    offer("Walgreens", 11.99, Availability::InStock, 4.4, "Next day"),
                    offer("CVS Pharmacy", 12.49, Availability::InStock, 4.3, "2-3 days"),
                    offer("Rite Aid", 11.49, Availability::InStock, 4.1, "3-4 days"),
                ],
            ),
        ],
        confidence: Confidence::Medium,
        notes: Some(DEMO_MODE_NOTICE.to_string()),
    }
}

fn product(
    name: &str,
    description: &str,
    ingredient: &str,
    retailers: Vec<RetailerOffer>,
) -> IdentifiedProduct {
    IdentifiedProduct {
        name: name.to_string(),
        description: description.to_string(),
        category: "pain-relief".to_string(),
        active_ingredients: Some(vec![ingredient.to_string()]),
        retailers,
    }
}

fn offer(
    name: &str,
    price: f64,
    availability: Availability,
    rating: f64,
    shipping_time: &str,
) -> RetailerOffer {
    RetailerOffer {
        name: name.to_string(),
        price,
        availability,
        rating: Some(rating),
        shipping_time: Some(shipping_time.to_string()),
    }
}
