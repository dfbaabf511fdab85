//! Read-only collaborator models: channels, products, choice combinations.

pub mod channel;
pub mod product;

pub use channel::{Channel, NotIncludedType, PricingType};
pub use product::{ChoiceCombination, Product};
