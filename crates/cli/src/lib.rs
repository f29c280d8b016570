pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use paperquote_core::config::{ConfigOverrides, LoadOptions};
use paperquote_core::formula::FormulaKind;
use paperquote_core::pricing::validation::OrderLimits;
use paperquote_core::pricing::{
    CustomCutRequest, PricingMode, StandardRequest, UnitRequest,
};
use paperquote_core::{Currency, ProductId, ProductQuoteInput};
use tracing_subscriber::EnvFilter;

use crate::commands::quote::QuoteTarget;

#[derive(Debug, Parser)]
#[command(
    name = "paperquote",
    about = "Paperquote pricing CLI",
    long_about = "Price paper orders, check admin formulas, and inspect runtime readiness.",
    after_help = "Examples:\n  paperquote quote box --unit-price 10 --currency EUR --quantity 3 --vat-rate 10\n  paperquote formula preview --expr 'width * height' --bind width=70 --bind height=100\n  paperquote doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to read instead of paperquote.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Reference data file (overrides reference.path)")]
    reference: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand, about = "Calculate a quote and print it as JSON")]
    Quote(QuoteCommand),
    #[command(subcommand, about = "Validate or preview admin pricing formulas")]
    Formula(FormulaCommand),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and reference data readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum QuoteCommand {
    #[command(about = "Roll or sheet paper priced by the standard formula")]
    Standard {
        #[arg(long)]
        width_cm: f64,
        #[arg(long)]
        length_cm: f64,
        #[arg(long)]
        weight_gsm: f64,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        packages: i64,
        #[arg(long, help = "Standard formula to use, e.g. roll or sheet")]
        product_type: Option<String>,
        #[command(flatten)]
        limits: LimitArgs,
    },
    #[command(about = "Digital print paper cut to a custom size")]
    CustomCut {
        #[arg(long)]
        width_cm: f64,
        #[arg(long)]
        height_cm: f64,
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        packages: i64,
        #[arg(long)]
        weight_gsm: f64,
        #[arg(long)]
        sheets_per_package: u32,
        #[arg(long)]
        ton_price: f64,
        #[arg(long, default_value = "TRY")]
        currency: Currency,
        #[arg(long)]
        vat_rate: f64,
        #[arg(long)]
        waste_rate: Option<f64>,
        #[command(flatten)]
        limits: LimitArgs,
    },
    #[command(about = "Whole boxes at a unit price")]
    Box(UnitArgs),
    #[command(about = "Single sheets at a unit price")]
    Sheet(UnitArgs),
    #[command(about = "A catalog product from the reference data")]
    Product {
        #[arg(long)]
        id: String,
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
        #[arg(long)]
        width_cm: Option<f64>,
        #[arg(long)]
        height_cm: Option<f64>,
        #[arg(long)]
        length_cm: Option<f64>,
        #[arg(long)]
        waste_rate: Option<f64>,
    },
}

#[derive(Debug, Args)]
struct UnitArgs {
    #[arg(long)]
    unit_price: f64,
    #[arg(long, default_value = "TRY")]
    currency: Currency,
    #[arg(long, allow_negative_numbers = true)]
    quantity: i64,
    #[arg(long)]
    vat_rate: f64,
    #[command(flatten)]
    limits: LimitArgs,
}

#[derive(Debug, Args)]
struct LimitArgs {
    #[arg(long, help = "Minimum order quantity")]
    min_order: Option<u32>,
    #[arg(long, help = "Units in stock")]
    stock: Option<u32>,
}

impl LimitArgs {
    fn limits(&self) -> OrderLimits {
        OrderLimits::new(self.min_order, self.stock)
    }
}

impl UnitArgs {
    fn request(&self) -> UnitRequest {
        UnitRequest {
            unit_price: self.unit_price,
            currency: self.currency,
            quantity: self.quantity,
            vat_rate: self.vat_rate,
            limits: self.limits.limits(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum FormulaCommand {
    #[command(about = "Check one expression, or every formula in the reference data")]
    Check {
        #[arg(long)]
        expr: Option<String>,
        #[arg(long, default_value = "product")]
        kind: FormulaKind,
    },
    #[command(about = "Evaluate an expression against explicit variable values")]
    Preview {
        #[arg(long)]
        expr: String,
        #[arg(long, default_value = "product")]
        kind: FormulaKind,
        #[arg(long = "bind", value_parser = commands::formula::parse_binding)]
        bindings: Vec<(String, f64)>,
    },
}

impl QuoteCommand {
    fn into_target(self) -> QuoteTarget {
        match self {
            Self::Standard { width_cm, length_cm, weight_gsm, packages, product_type, limits } => {
                QuoteTarget::Mode {
                    mode: PricingMode::Standard(StandardRequest {
                        width_cm,
                        length_cm,
                        weight_gsm,
                        package_count: packages,
                        limits: limits.limits(),
                    }),
                    product_type,
                }
            }
            Self::CustomCut {
                width_cm,
                height_cm,
                packages,
                weight_gsm,
                sheets_per_package,
                ton_price,
                currency,
                vat_rate,
                waste_rate,
                limits,
            } => QuoteTarget::Mode {
                mode: PricingMode::CustomCut(CustomCutRequest {
                    width_cm,
                    height_cm,
                    package_count: packages,
                    weight_gsm,
                    sheets_per_package,
                    ton_price,
                    currency,
                    vat_rate,
                    waste_rate,
                    limits: limits.limits(),
                }),
                product_type: None,
            },
            Self::Box(args) => {
                QuoteTarget::Mode { mode: PricingMode::PerBox(args.request()), product_type: None }
            }
            Self::Sheet(args) => {
                QuoteTarget::Mode { mode: PricingMode::PerSheet(args.request()), product_type: None }
            }
            Self::Product { id, quantity, width_cm, height_cm, length_cm, waste_rate } => {
                QuoteTarget::Product {
                    id: ProductId(id),
                    input: ProductQuoteInput { quantity, width_cm, height_cm, length_cm, waste_rate },
                }
            }
        }
    }
}

fn init_logging() {
    // stdout carries command output; diagnostics go to stderr.
    let filter = EnvFilter::try_from_env("PAPERQUOTE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .compact()
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: ConfigOverrides { reference_path: cli.reference, ..ConfigOverrides::default() },
    };

    let result = match cli.command {
        Command::Quote(command) => commands::quote::run(options, command.into_target()),
        Command::Formula(FormulaCommand::Check { expr, kind }) => {
            commands::formula::check(options, expr.map(|source| (source, kind)))
        }
        Command::Formula(FormulaCommand::Preview { expr, kind, bindings }) => {
            commands::formula::preview(&expr, kind, &bindings)
        }
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
