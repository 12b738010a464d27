use anyhow::Context;
use colored::Colorize;
use kemah_ledger::{Booking, Order};
use kemah_reconcile::{PaymentOutcome, Reconciliation};
use kemah_server::{AppConfig, AppState, KemahServer};
use kemah_store::SchemaStatus;
use kemah_types::{BookingStatus, OrderStatus};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(path = ?cli.config, backend = ?config.server.store, "configuration loaded");
    match cli.command {
        Command::Serve(args) => {
            if let Some(bind) = args.bind {
                config.server.bind_addr = bind;
            }
            cmd_serve(config).await
        }
        Command::Schema => cmd_schema(&state(&config)?, cli.format).await,
        Command::Orders(args) => cmd_orders(&state(&config)?, args, cli.format).await,
        Command::Bookings(args) => cmd_bookings(&state(&config)?, args, cli.format).await,
        Command::Reconcile(args) => cmd_reconcile(&state(&config)?, args, cli.format).await,
    }
}

fn state(config: &AppConfig) -> anyhow::Result<AppState> {
    AppState::from_config(config).context("wiring ledgers")
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.server.bind_addr;
    let server = KemahServer::new(config)?;
    println!("{} Kemah API on {}", "▶".green().bold(), addr.to_string().bold());
    server.serve().await?;
    Ok(())
}

async fn cmd_schema(state: &AppState, format: OutputFormat) -> anyhow::Result<()> {
    let results = state.ensure_schema().await?;
    if format == OutputFormat::Json {
        let entries: Vec<_> = results
            .iter()
            .map(|(table, status)| serde_json::json!({ "table": table, "schema": status }))
            .collect();
        return print_json(&entries);
    }
    for (table, status) in &results {
        match status {
            SchemaStatus::Created => println!("{} {} created", "✓".green().bold(), table.bold()),
            SchemaStatus::HeadersWritten => println!("{} {} header row written", "✓".green().bold(), table.bold()),
            SchemaStatus::Present => println!("{} {} up to date", "✓".green(), table.bold()),
            SchemaStatus::Drifted { missing } => {
                println!("{} {} is missing columns:", "!".yellow().bold(), table.bold());
                for column in missing {
                    println!("    {}", column.yellow());
                }
            }
        }
    }
    Ok(())
}

fn colored_order_status(status: OrderStatus) -> colored::ColoredString {
    match status {
        OrderStatus::PendingPayment | OrderStatus::VerifyingPayment => status.as_str().yellow(),
        OrderStatus::Cancelled | OrderStatus::Refunded => status.as_str().red(),
        OrderStatus::Settled | OrderStatus::Archived => status.as_str().dimmed(),
        _ => status.as_str().green(),
    }
}

async fn cmd_orders(state: &AppState, args: OrdersArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.totals {
        let totals = state.orders.totals_by_status().await?;
        if format == OutputFormat::Json {
            let entries: Vec<_> = totals
                .iter()
                .map(|(status, total)| serde_json::json!({ "status": status, "total": total }))
                .collect();
            return print_json(&entries);
        }
        for (status, total) in totals {
            println!("{:<22} {}", colored_order_status(status), total.to_idr().bold());
        }
        return Ok(());
    }

    let status = args
        .status
        .as_deref()
        .map(OrderStatus::parse)
        .transpose()
        .context("--status")?;
    let mut orders: Vec<Order> = match args.buyer.as_deref() {
        Some(email) => state.orders.list_for_buyer(email).await?,
        None => state.orders.list().await?,
    };
    if let Some(status) = status {
        orders.retain(|order| order.status == status);
    }

    if format == OutputFormat::Json {
        return print_json(&orders);
    }
    if orders.is_empty() {
        println!("No orders.");
        return Ok(());
    }
    for order in &orders {
        println!(
            "{}  {:<22} {} x{}  {}  {}",
            order.id.as_str().yellow().bold(),
            colored_order_status(order.status),
            order.item_name,
            order.quantity,
            order.total_price.to_idr().bold(),
            order.buyer_email.dimmed(),
        );
    }
    println!("{} orders", orders.len());
    Ok(())
}

async fn cmd_bookings(state: &AppState, args: BookingsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let status = args
        .status
        .as_deref()
        .map(BookingStatus::parse)
        .transpose()
        .context("--status")?;
    let mut bookings: Vec<Booking> = state.bookings.list().await?;
    if let Some(status) = status {
        bookings.retain(|booking| booking.status == status);
    }
    if let Some(event) = args.event.as_deref() {
        bookings.retain(|booking| booking.event_name.trim().eq_ignore_ascii_case(event.trim()));
    }

    if format == OutputFormat::Json {
        return print_json(&bookings);
    }
    if bookings.is_empty() {
        println!("No bookings.");
        return Ok(());
    }
    for booking in &bookings {
        let status = match booking.status {
            BookingStatus::PendingPayment => booking.status.as_str().yellow(),
            BookingStatus::ConfirmedPayment => booking.status.as_str().green(),
            BookingStatus::Cancelled => booking.status.as_str().red(),
        };
        let lot = if booking.has_lot() { booking.lot.as_str() } else { "-" };
        let arrived = if booking.checked_in { "✓".green() } else { " ".normal() };
        println!(
            "{}  {:<18} {} {}  {} pax  lot {}  {}",
            booking.code.as_str().yellow().bold(),
            status,
            arrived,
            booking.event_name,
            booking.participants,
            lot.cyan(),
            booking.email.dimmed(),
        );
    }
    println!("{} bookings", bookings.len());
    Ok(())
}

async fn cmd_reconcile(state: &AppState, args: ReconcileArgs, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = match args.outcome {
        OutcomeArg::Success => PaymentOutcome::Success,
        OutcomeArg::Pending => PaymentOutcome::Pending,
        OutcomeArg::Failure => PaymentOutcome::Failure,
    };
    let result = state.reconciler.reconcile(&args.id, outcome).await?;
    if format == OutputFormat::Json {
        return print_json(&result);
    }
    match &result {
        Reconciliation::Applied { target, id } => {
            println!("{} {:?} {} marked paid", "✓".green().bold(), target, id.yellow())
        }
        Reconciliation::AlreadyApplied { target, id } => {
            println!("{} {:?} {} was already paid", "✓".green(), target, id.yellow())
        }
        Reconciliation::Observed { id, outcome } => {
            println!("{} {} {}; nothing changed", "·".dimmed(), id.yellow(), outcome)
        }
        Reconciliation::NotFound { id } => {
            println!("{} no booking or order {}", "?".yellow().bold(), id.yellow())
        }
        Reconciliation::Rejected { target, id, reason } => {
            println!("{} {:?} {} refused: {}", "✗".red().bold(), target, id.yellow(), reason)
        }
    }
    Ok(())
}
