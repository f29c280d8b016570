use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::PricingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "TRY")]
    Try,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Self::Try => "TRY",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = PricingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRY" | "TL" => Ok(Self::Try),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            other => Err(PricingError::invalid_input(
                "currency",
                format!("unsupported currency `{other}` (expected TRY|USD|EUR)"),
            )),
        }
    }
}

/// One admin-maintained exchange rate row: how many TRY one unit of `currency` buys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency: Currency,
    pub rate: f64,
}

/// Exchange rates loaded for a single pricing request.
///
/// TRY converts at 1 without a record. Every other currency must have been
/// loaded; there is no fallback rate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    rates: BTreeMap<Currency, f64>,
}

impl ExchangeRates {
    pub fn from_records(records: &[ExchangeRate]) -> Result<Self, PricingError> {
        let mut rates = BTreeMap::new();
        for record in records {
            if record.currency == Currency::Try {
                continue;
            }
            if !record.rate.is_finite() || record.rate <= 0.0 {
                return Err(PricingError::invalid_input(
                    "exchange_rate",
                    format!("{} rate must be a positive number, got {}", record.currency, record.rate),
                ));
            }
            rates.insert(record.currency, record.rate);
        }
        Ok(Self { rates })
    }

    pub fn with_rate(mut self, currency: Currency, rate: f64) -> Self {
        if currency != Currency::Try {
            self.rates.insert(currency, rate);
        }
        self
    }

    pub fn get(&self, currency: Currency) -> Option<f64> {
        match currency {
            Currency::Try => Some(1.0),
            other => self.rates.get(&other).copied(),
        }
    }

    pub fn rate_to_try(&self, currency: Currency) -> Result<f64, PricingError> {
        self.get(currency).ok_or_else(|| {
            PricingError::missing_reference(format!("exchange rate for {currency}"))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
