use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use dealer_quote::format::CENTS;
use dealer_quote::health::HealthReport;
use dealer_quote::presets::{TermUnit, VehicleType};
use dealer_quote::{compute_quote, LoanRequest, Quote, ValidationError};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use thiserror::Error;

/// Vehicle loan quotes with a full amortization schedule
#[derive(Parser)]
#[command(name = "dealer-quote", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Price a loan and build its amortization schedule
    Quote(QuoteArgs),
    /// Report liveness and the current server date
    Health,
    /// List the default APR and term for each vehicle type
    Presets,
}

#[derive(Args)]
struct QuoteArgs {
    /// JSON loan request file, or `-` for stdin
    #[arg(
        long,
        conflicts_with_all = [
            "price", "down", "apr", "term", "term_unit", "fees", "trade_in", "tax_percent", "vehicle"
        ]
    )]
    input: Option<PathBuf>,

    /// Vehicle price
    #[arg(long, allow_negative_numbers = true)]
    price: Option<f64>,

    /// Down payment
    #[arg(long, default_value_t = 0., allow_negative_numbers = true)]
    down: f64,

    /// Annual percentage rate, in percent
    #[arg(long, allow_negative_numbers = true)]
    apr: Option<f64>,

    /// Loan term, in --term-unit
    #[arg(long, allow_negative_numbers = true)]
    term: Option<i64>,

    /// Unit for --term (months or years)
    #[arg(long, default_value = "months")]
    term_unit: TermUnit,

    /// Dealer and registration fees
    #[arg(long, default_value_t = 0., allow_negative_numbers = true)]
    fees: f64,

    /// Trade-in value
    #[arg(long, default_value_t = 0., allow_negative_numbers = true)]
    trade_in: f64,

    /// Sales tax, in percent
    #[arg(long, default_value_t = 0., allow_negative_numbers = true)]
    tax_percent: f64,

    /// Fill in APR and term from a vehicle preset (auto, rv, moto, ski)
    #[arg(long)]
    vehicle: Option<VehicleType>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse loan request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing --{0} (or pass a request with --input)")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to start logger: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl QuoteArgs {
    fn into_request(self) -> Result<LoanRequest, CliError> {
        if let Some(path) = self.input {
            return read_request(&path);
        }

        let preset = self.vehicle.map(|v| v.preset());
        let price = self.price.ok_or(CliError::MissingArgument("price"))?;
        let apr = self
            .apr
            .or(preset.map(|p| p.apr))
            .ok_or(CliError::MissingArgument("apr"))?;
        let term_months = match (self.term, preset) {
            (Some(term), _) => self.term_unit.to_months(term),
            (None, Some(p)) => p.term_months(),
            (None, None) => return Err(CliError::MissingArgument("term")),
        };

        Ok(LoanRequest {
            vehicle_price: price,
            down_payment: self.down,
            apr,
            term_months,
            tax_rate: self.tax_percent / 100.,
            fees: self.fees,
            trade_in_value: self.trade_in,
        })
    }
}

fn read_request(path: &Path) -> Result<LoanRequest, CliError> {
    let contents = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(path)
    }
    .map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let value: serde_json::Value = serde_json::from_str(&contents)?;
    Ok(LoanRequest::from_json(&value)?)
}

fn init_logging(verbose: u8) -> Result<(), CliError> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_amortization(quote: &Quote) {
    println!("{}", quote);
    if !quote.schedule.is_empty() {
        println!();
    }
    for row in &quote.schedule {
        println!("{}", row);
    }
}

fn run_quote(args: QuoteArgs, output: OutputFormat) -> Result<(), CliError> {
    let request = args.into_request()?;
    info!(
        "quoting price {} at {}% over {} months",
        request.vehicle_price, request.apr, request.term_months
    );

    let quote = compute_quote(&request)?;
    info!("amount financed {}, {} payments", quote.amount_financed, quote.term_months());

    // the engine keeps full precision, only the output is rounded
    let quote = quote.rounded(CENTS);
    match output {
        OutputFormat::Json => print_json(&quote),
        OutputFormat::Table => {
            show_amortization(&quote);
            Ok(())
        }
    }
}

fn run_presets(output: OutputFormat) -> Result<(), CliError> {
    match output {
        OutputFormat::Json => {
            let mut presets = serde_json::Map::new();
            for vehicle in VehicleType::ALL {
                presets.insert(vehicle.to_string(), serde_json::to_value(vehicle.preset())?);
            }
            print_json(&presets)
        }
        OutputFormat::Table => {
            for vehicle in VehicleType::ALL {
                let preset = vehicle.preset();
                println!("{:<5} {:>6.2}% {:>3} years", vehicle, preset.apr, preset.term_years);
            }
            Ok(())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Quote(args) => run_quote(args, cli.output),
        Commands::Health => {
            let report = HealthReport::now();
            match cli.output {
                OutputFormat::Json => print_json(&report),
                OutputFormat::Table => {
                    println!("ok {}", report.server_date);
                    Ok(())
                }
            }
        }
        Commands::Presets => run_presets(cli.output),
    }
}

fn main() {
    let cli = Cli::parse();
    let output = cli.output;

    match run(cli) {
        Ok(()) => {}
        Err(CliError::Validation(e)) => {
            match output {
                OutputFormat::Json => {
                    if let Err(err) = print_json(&e) {
                        eprintln!("error: {}", err);
                    }
                }
                OutputFormat::Table => {
                    for field_error in &e.errors {
                        eprintln!("error: {}", field_error);
                    }
                }
            }
            process::exit(2);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}
