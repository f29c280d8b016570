use paperquote_core::config::LoadOptions;
use paperquote_core::pricing::{DeterministicPricingEngine, PricingEngine, PricingMode};
use paperquote_core::{ProductId, ProductQuoteInput};

use crate::commands::{
    load_reference, CommandResult, EXIT_INTERNAL, EXIT_REFERENCE_DATA, EXIT_REJECTED,
};

const COMMAND: &str = "quote";

/// What to price: an explicit calculation, or a catalog product plus the
/// customer's input.
#[derive(Debug, Clone)]
pub enum QuoteTarget {
    Mode { mode: PricingMode, product_type: Option<String> },
    Product { id: ProductId, input: ProductQuoteInput },
}

pub fn run(options: LoadOptions, target: QuoteTarget) -> CommandResult {
    let (config, data) = match load_reference(COMMAND, options) {
        Ok(loaded) => loaded,
        Err(result) => return result,
    };

    let (mode, product_type) = match target {
        QuoteTarget::Mode { mode, product_type } => (mode, product_type),
        QuoteTarget::Product { id, input } => {
            let Some(product) = data.product(&id) else {
                return CommandResult::failure(
                    COMMAND,
                    "not_found",
                    format!("product `{}` does not exist", id.0),
                    EXIT_REJECTED,
                );
            };
            match product.pricing_mode(&input) {
                Ok(mode) => (mode, Some(product.product_type.as_str().to_string())),
                Err(error) => return CommandResult::pricing_failure(COMMAND, &error),
            }
        }
    };

    let context = match data.context(&config.pricing, product_type.as_deref()) {
        Ok(context) => context,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "reference_data",
                error.to_string(),
                EXIT_REFERENCE_DATA,
            );
        }
    };

    match DeterministicPricingEngine.price(&mode, &context) {
        Ok(quote) => {
            tracing::info!(
                event_name = "cli.quote.priced",
                correlation_id = "cli",
                mode = ?quote.mode,
                total = quote.total(),
                "quote calculated"
            );
            let display = quote.totals.display();
            let message = format!(
                "subtotal {} TRY, VAT {} TRY, total {} TRY",
                display.subtotal, display.vat_amount, display.total
            );
            match serde_json::to_value(&quote) {
                Ok(details) => CommandResult::success_with_details(COMMAND, message, Some(details)),
                Err(error) => CommandResult::failure(
                    COMMAND,
                    "serialization",
                    format!("{message}; breakdown could not be serialized: {error}"),
                    EXIT_INTERNAL,
                ),
            }
        }
        Err(error) => {
            tracing::warn!(
                event_name = "cli.quote.rejected",
                correlation_id = "cli",
                error_class = error.class(),
                error = %error,
                "quote rejected"
            );
            CommandResult::pricing_failure(COMMAND, &error)
        }
    }
}
