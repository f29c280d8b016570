pub mod currency;
pub mod order;
pub mod pricing_rules;
pub mod product;
