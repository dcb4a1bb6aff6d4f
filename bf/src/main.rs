//! budgetflow - budget saga orchestration
//!
//! CLI entry point: an end-to-end demo over the in-process backend and an
//! outdated-budget report over a JSON export.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use clap::Parser;
use eyre::{Context, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};

use budgetflow::cli::{Cli, Command, OutputFormat, get_log_path};
use budgetflow::clock::{Clock, SystemClock};
use budgetflow::config::Config;
use budgetflow::domain::{
    AmountInput, BudgetId, BudgetInput, BudgetRecord, BudgetStatus, Customer, ProductLine, find_outdated,
};
use budgetflow::ipc::ipc_pair;
use budgetflow::{BudgetOrchestrator, BudgetOutcome, BudgetState, MemoryBackend};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(creator = %config.orchestrator.creator, "budgetflow loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Demo => {
            debug!("main: matched Demo command");
            cmd_demo(&config).await
        }
        Command::Outdated { input, today, format } => {
            debug!(?input, ?today, ?format, "main: matched Outdated command");
            cmd_outdated(&input, today, format)
        }
    }
}

/// Run every budget operation against the in-process backend
async fn cmd_demo(config: &Config) -> Result<()> {
    debug!("cmd_demo: called");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let today = clock.today();

    let expired = demo_budget("Carlos", 1, today.checked_sub_days(Days::new(3)).unwrap_or(today))
        .normalize()
        .context("Invalid demo budget")?;
    let mut expired = expired.to_record().context("Invalid demo budget")?;
    expired.id = Some(BudgetId::new("1"));

    let backend = MemoryBackend::new().with_budgets(vec![expired]);
    backend.set_stock("p1", 100);
    backend.set_stock("p2", 100);

    let (front, back) = ipc_pair();
    let server = backend.spawn(back);
    let orchestrator = BudgetOrchestrator::connect(front, BudgetState::default(), clock, config);

    let validity = today.checked_add_days(Days::new(30)).unwrap_or(today);
    print_outcome(&orchestrator.read_all().await);

    let created = orchestrator.create(demo_budget("Ana", 2, validity)).await;
    print_outcome(&created);
    let created_id = match &created {
        BudgetOutcome::Created(view) => view.budget.id.clone(),
        _ => None,
    };

    let second = orchestrator.create(demo_budget("Bruno", 4, validity)).await;
    print_outcome(&second);

    if let BudgetOutcome::Created(view) = &second {
        let mut changed = BudgetInput::from(&view.budget);
        changed.products[0].quantity = 1;
        changed.subtotal = AmountInput::from("5.25");
        changed.total = AmountInput::from("5.25");
        print_outcome(&orchestrator.update(changed).await);

        let paid = orchestrator
            .state()
            .snapshot()
            .into_iter()
            .find(|budget| budget.id == view.budget.id);
        if let Some(budget) = paid {
            print_outcome(&orchestrator.confirm_payment(budget).await);
        }
    }

    print_outcome(&orchestrator.mark_outdated().await);

    if let Some(id) = created_id {
        print_outcome(&orchestrator.delete(id).await);
    }

    orchestrator.unsubscribe_events().await.context("Failed to release subscriptions")?;
    drop(orchestrator);
    server.await.context("Backend task failed")?;

    println!();
    println!("Backend: {} budgets, {} sales, {} commands served", backend.budgets().len(), backend.sales().len(), backend.served());
    println!("Stock: p1={} p2={}", backend.stock_level("p1"), backend.stock_level("p2"));
    Ok(())
}

fn demo_budget(customer: &str, quantity: u32, validity: NaiveDate) -> BudgetInput {
    let price = Decimal::new(525, 2);
    let total = price * Decimal::from(quantity);
    BudgetInput {
        id: None,
        customer: Customer {
            id: None,
            name: Some(customer.to_string()),
        },
        products: vec![ProductLine {
            id: "p1".to_string(),
            name: "Cement bag".to_string(),
            quantity,
            price,
        }],
        subtotal: AmountInput::Text(total.to_string()),
        total: AmountInput::Value(total),
        validity,
        status: BudgetStatus::Pending,
        salesman: None,
    }
}

fn print_outcome(outcome: &BudgetOutcome) {
    match outcome {
        BudgetOutcome::Created(view) => println!(
            "Created    #{} {} {} (valid until {})",
            view.budget.id.as_ref().map(BudgetId::as_str).unwrap_or("-"),
            view.customer_name,
            view.total_text,
            view.validity_date
        ),
        BudgetOutcome::Loaded(views) => println!("Loaded     {} budgets", views.len()),
        BudgetOutcome::Updated(view) => println!("Updated    {} {}", view.customer_name, view.total_text),
        BudgetOutcome::Deleted(id) => println!("Deleted    #{}", id),
        BudgetOutcome::PaymentConfirmed(id) => println!("Paid       #{}", id),
        BudgetOutcome::OutdatedMarked(ids) => println!("Outdated   {} budgets", ids.len()),
        failure => println!("FAILED     {}", failure.operation()),
    }
}

/// Report outdated budgets from a JSON array of records
fn cmd_outdated(input: &Path, today: Option<NaiveDate>, format: OutputFormat) -> Result<()> {
    debug!(?input, ?today, ?format, "cmd_outdated: called");
    let content = fs::read_to_string(input).context(format!("Failed to read {}", input.display()))?;
    let records: Vec<BudgetRecord> =
        serde_json::from_str(&content).context(format!("Failed to parse budgets from {}", input.display()))?;
    let today = today.unwrap_or_else(|| SystemClock.today());

    let outdated = find_outdated(today, &records);
    info!(total = records.len(), outdated = outdated.len(), %today, "cmd_outdated: scan complete");

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outdated).context("Failed to serialize budgets")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if outdated.is_empty() {
                println!("No outdated budgets as of {}", today);
            }
            for record in &outdated {
                println!(
                    "{}\t{}\t{}",
                    record.id.as_ref().map(BudgetId::as_str).unwrap_or("-"),
                    record.validity,
                    record.customer.name.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
