use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kemah",
    about = "Kemah camp booking and marketplace ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Create missing order and booking tables and report header drift
    Schema,
    /// List marketplace orders
    Orders(OrdersArgs),
    /// List event bookings
    Bookings(BookingsArgs),
    /// Apply a payment outcome to a booking or order
    Reconcile(ReconcileArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override `server.bind_addr`
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct OrdersArgs {
    /// Only orders in this status (e.g. "Paid", "on_shipment")
    #[arg(long)]
    pub status: Option<String>,
    /// Only orders placed by this email
    #[arg(long)]
    pub buyer: Option<String>,
    /// Print total value per status instead of the orders
    #[arg(long)]
    pub totals: bool,
}

#[derive(Args)]
pub struct BookingsArgs {
    #[arg(long)]
    pub status: Option<String>,
    /// Only bookings for this event name (case-insensitive)
    #[arg(long)]
    pub event: Option<String>,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Booking code or order id as sent to the payment gateway
    pub id: String,
    pub outcome: OutcomeArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutcomeArg {
    Success,
    Pending,
    Failure,
}
