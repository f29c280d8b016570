pub mod config;
pub mod domain;
pub mod errors;
pub mod formula;
pub mod pricing;
pub mod reference;

pub use domain::currency::{Currency, ExchangeRate, ExchangeRates};
pub use domain::order::{ContactDetails, OrderId, OrderSnapshot, OrderStatus};
pub use domain::pricing_rules::{CuttingFee, PriceFormulaRecord, StandardFormula};
pub use domain::product::{ProductId, ProductQuoteInput, ProductRecord, ProductType};
pub use errors::{ApplicationError, DomainError, InterfaceError, PricingError};
pub use formula::{Formula, FormulaError, FormulaKind, Variable};
pub use pricing::{
    quote, DeterministicPricingEngine, PricingContext, PricingEngine, PricingMode, Quote,
    QuoteBreakdown, QuoteTotals,
};
pub use reference::{
    FileReferenceSource, ReferenceData, ReferenceError, ReferenceSource, StaticReferenceSource,
};
