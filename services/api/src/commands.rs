use crate::infra::build_service;
use clap::Args;
use ecotrack::config::{AppConfig, DatabaseLocation};
use ecotrack::emissions::EmissionCategory;
use ecotrack::error::AppError;
use ecotrack::history::{CalculationRecord, UserId};
use ecotrack::service::{CalculationOutcome, CalculatorServiceError, SaveStatus};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct CalculateArgs {
    /// Category name, e.g. electricity, transport-car, water
    #[arg(long, default_value = "electricity")]
    pub(crate) category: String,
    /// Vehicle type when the category is plain `transport`
    #[arg(long)]
    pub(crate) vehicle_type: Option<String>,
    /// Save the result to this user's history
    #[arg(long)]
    pub(crate) user: Option<String>,
    /// Override the history database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    /// Consumption figure exactly as typed (kWh, km, or liters)
    pub(crate) value: String,
}

#[derive(Args, Debug)]
pub(crate) struct HistoryArgs {
    /// User whose history to show
    #[arg(long)]
    pub(crate) user: String,
    /// Number of records to show (capped at 100)
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Override the history database path
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

fn load_config(database: Option<PathBuf>) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load()?;
    if let Some(path) = database {
        config.storage.database = DatabaseLocation::parse(&path.to_string_lossy());
    }
    Ok(config)
}

pub(crate) fn run_calculate(args: CalculateArgs) -> Result<(), AppError> {
    let CalculateArgs {
        category,
        vehicle_type,
        user,
        database,
        value,
    } = args;

    let config = load_config(database)?;
    let category = EmissionCategory::resolve(&category, vehicle_type.as_deref())
        .map_err(CalculatorServiceError::from)?;
    let service = build_service(&config.storage)?;
    let user = user.map(UserId::from);

    let outcome = service.calculate_text(user.as_ref(), category, &value)?;
    println!("{}", render_outcome(&outcome));
    Ok(())
}

pub(crate) fn run_history(args: HistoryArgs) -> Result<(), AppError> {
    let config = load_config(args.database)?;
    let service = build_service(&config.storage)?;
    let user = UserId::from(args.user);

    let records = service.history(&user, args.limit)?;
    if records.is_empty() {
        println!("No calculations recorded for {user}.");
        return Ok(());
    }

    println!("Recent calculations for {user}");
    for record in &records {
        println!("{}", render_record(record));
    }
    Ok(())
}

fn render_outcome(outcome: &CalculationOutcome) -> String {
    let estimate = &outcome.estimate;
    let saved = match &outcome.saved {
        SaveStatus::Saved { .. } => "saved to history".to_string(),
        SaveStatus::NotSaved { reason } => format!("not saved: {reason}"),
        SaveStatus::Skipped => "not saved (no user)".to_string(),
    };
    format!(
        "{:.2} {} ({}) -> {:.2} kg CO2e [{}]",
        estimate.input_value,
        estimate.unit.label(),
        estimate.category,
        estimate.co2_rounded(),
        saved
    )
}

fn render_record(record: &CalculationRecord) -> String {
    format!(
        "- {} | {:<22} | {:>10.2} {:<6} | {:>10.2} kg CO2e",
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.category.as_str(),
        record.input_value,
        record.category.unit().label(),
        record.co2_result
    )
}
