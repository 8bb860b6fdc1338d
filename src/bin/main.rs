// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use campus_wallet::api::{TopUpRequest, TopUpSource};
use campus_wallet::qr::{QrDecoder, ReplayCamera};
use campus_wallet::{
    BalanceAnimator, HttpWalletApi, MealType, ProjectionEngine, ScanReport, SharedClock, SystemClock,
    VendorTerminal, Venue, WalletApi, WalletConfig, format_rupees,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Campus Wallet - meal redemption terminal and wallet dashboard
///
/// Configuration comes from `CAMPUS_WALLET_*` environment variables; flags
/// given here take precedence.
#[derive(Parser, Debug)]
#[command(name = "campus-wallet")]
#[command(about = "Campus meal wallet client", long_about = None)]
struct Args {
    /// Backend base URL
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show balance, recent activity and the smart top-up hint
    Dashboard {
        /// Animate the balance on stderr before printing
        #[arg(long)]
        animate: bool,
    },
    /// Scan frames from a directory of images and redeem the first QR code
    Scan {
        /// Directory holding the camera frames, read in name order
        #[arg(value_name = "DIR")]
        frames: PathBuf,
        #[command(flatten)]
        meal: MealArgs,
    },
    /// Redeem the QR code in a single image
    RedeemImage {
        #[arg(value_name = "FILE")]
        image: PathBuf,
        #[command(flatten)]
        meal: MealArgs,
    },
    /// Show reported meal skips (waste intel), tomorrow by default
    Skips {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Generate a payment QR token for the signed-in student
    Token,
    /// Add funds to the wallet
    TopUp {
        #[arg(long)]
        amount: Decimal,
        #[arg(long, value_enum, default_value_t = SourceArg::Student)]
        source: SourceArg,
    },
}

#[derive(clap::Args, Debug)]
struct MealArgs {
    #[arg(long, value_enum, default_value_t = MealArg::Lunch)]
    meal: MealArg,

    /// Overrides the preset price of the meal
    #[arg(long)]
    cost: Option<Decimal>,

    /// Venue served by this terminal
    #[arg(long)]
    venue: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MealArg {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl From<MealArg> for MealType {
    fn from(arg: MealArg) -> Self {
        match arg {
            MealArg::Breakfast => MealType::Breakfast,
            MealArg::Lunch => MealType::Lunch,
            MealArg::Dinner => MealType::Dinner,
            MealArg::Snack => MealType::Snack,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    #[value(name = "self")]
    Student,
    Parent,
}

impl From<SourceArg> for TopUpSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Student => TopUpSource::Student,
            SourceArg::Parent => TopUpSource::Parent,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match WalletConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }
    if args.token.is_some() {
        config.auth_token = args.token;
    }

    let api: Arc<dyn WalletApi> = match HttpWalletApi::new(&config) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            eprintln!("Cannot create backend client: {}", e);
            process::exit(1);
        }
    };

    let code = match args.command {
        Command::Dashboard { animate } => dashboard(&config, api, animate).await,
        Command::Scan { frames, meal } => {
            let mut terminal =
                terminal(&config, api, meal).with_camera(Arc::new(ReplayCamera::new(frames)));
            let cancel = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            match terminal.scan(cancel).await {
                Ok(report) => finish(&terminal, &report),
                Err(e) => {
                    eprintln!("Scanner error: {}", e);
                    1
                }
            }
        }
        Command::RedeemImage { image, meal } => {
            // The camera is never opened for uploads.
            let mut terminal = terminal(&config, api, meal);
            let report = terminal.redeem_image(&image).await;
            finish(&terminal, &report)
        }
        Command::Skips { date } => {
            let terminal = VendorTerminal::new(
                Arc::new(QrDecoder),
                api,
                SystemClock::shared(),
                config.venue.clone(),
            );
            match terminal.waste_intel(date).await {
                Ok(summary) => print_json(&summary),
                Err(e) => fail(e),
            }
        }
        Command::Token => match api.generate_token().await {
            Ok(token) => print_json(&json!({
                "qr_image": token.qr_image,
                "expires_at": token.expires_at,
            })),
            Err(e) => fail(e),
        },
        Command::TopUp { amount, source } => {
            let request = TopUpRequest {
                amount,
                source: source.into(),
            };
            match api.top_up(&request).await {
                Ok(response) => {
                    println!("{} New balance: {}", response.message, format_rupees(response.new_balance));
                    0
                }
                Err(e) => fail(e),
            }
        }
    };

    process::exit(code);
}

fn terminal(
    config: &WalletConfig,
    api: Arc<dyn WalletApi>,
    meal: MealArgs,
) -> VendorTerminal {
    let venue = meal.venue.map(Venue::new).unwrap_or_else(|| config.venue.clone());
    let terminal = VendorTerminal::new(Arc::new(QrDecoder), api, SystemClock::shared(), venue);

    let selection = terminal.selection();
    selection.select_preset(meal.meal.into());
    if let Some(cost) = meal.cost {
        if let Err(e) = selection.set_cost(cost) {
            eprintln!("Ignoring --cost: {}", e);
        }
    }
    terminal
}

/// Prints the outcome and the shift totals; returns the exit code.
fn finish(terminal: &VendorTerminal, report: &ScanReport) -> i32 {
    match report {
        ScanReport::Redeemed(receipt) => println!("{} Student #{}", report.message(), receipt.user_id),
        _ => eprintln!("{}", report.message()),
    }
    print_json(terminal.stats());
    if report.is_success() { 0 } else { 1 }
}

async fn dashboard(config: &WalletConfig, api: Arc<dyn WalletApi>, animate: bool) -> i32 {
    let clock = SystemClock::shared();
    let engine = ProjectionEngine::new(api, clock.clone(), config.smart_top_up.clone());
    let dashboard = engine.load().await;

    if let (true, Some(balance)) = (animate, dashboard.balance) {
        animate_balance(&clock, config.animation_duration, balance).await;
    }

    print_json(&json!({
        "balance": dashboard.balance,
        "meal_slot": dashboard.meal_slot.to_string(),
        "recent_activity": dashboard.recent_activity,
        "projection": dashboard.projection,
        "smart_top_up": dashboard.smart_top_up,
        "smart_top_up_label": dashboard.smart_top_up.label(),
    }))
}

async fn animate_balance(clock: &SharedClock, duration: Duration, balance: Decimal) {
    let mut animator = BalanceAnimator::new(duration, Decimal::ZERO);
    animator.set_target(balance, clock.instant());

    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    let mut stderr = std::io::stderr();
    while !animator.is_settled() {
        ticker.tick().await;
        let shown = animator.sample(clock.instant());
        let _ = write!(stderr, "\r{}", format_rupees(shown));
    }
    let _ = writeln!(stderr);
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error writing output: {}", e);
            1
        }
    }
}

fn fail(error: impl std::fmt::Display) -> i32 {
    eprintln!("{}", error);
    1
}
