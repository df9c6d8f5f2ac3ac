pub mod conversation;
pub mod identification;
pub mod mock;
pub mod ranker;
pub mod schema;
pub mod symptoms;

pub use crate::domain::model::{
    Identification, IdentificationResult, IdentifyRequest, Message, Product, Provenance, Retailer,
};
pub use crate::domain::ports::{ConfigProvider, ProductIdentifier, StructuredGenerator};
pub use crate::utils::error::Result;
