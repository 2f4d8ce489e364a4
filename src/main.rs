//! # identity-sync
//!
//! Command-line front end for the identity reconciler.
//!
//! Reads declared clients and accounts from a YAML file, reconciles them
//! against the identity API and records the reconciled state in a JSON file
//! that becomes the previous state of the next run.
//!
//! ## Usage
//!
//! ```bash
//! # Show what would change, without contacting the API
//! identity-sync plan -f identity.yaml
//!
//! # Reconcile every declared client and account
//! identity-sync apply -f identity.yaml --state identity-state.json
//!
//! # Show the remote state of everything in the state file
//! identity-sync read
//!
//! # Delete clients and disable accounts recorded in the state file
//! identity-sync destroy
//! ```
//!
//! Connection settings come from `IDENTITY_*` environment variables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use identity_reconciler::config::IdentityConfig;
use identity_reconciler::constants::DEFAULT_LOG_FILTER;
use identity_reconciler::observability::metrics;
use identity_reconciler::provider::rest::IdentityApiRest;
use identity_reconciler::reconciler::{
    plan_account_create, plan_account_update, plan_create, plan_update, ReconcileError,
};
use identity_reconciler::state::{
    load_declarations, merge_account, merge_client, Declarations, ReconciledState,
};
use identity_reconciler::sync::{AccountSync, ClientSync};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Identity reconciler CLI
#[derive(Parser)]
#[command(name = "identity-sync")]
#[command(
    about = "Reconcile identity clients and accounts from a declaration file",
    long_about = None,
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("BUILD_GIT_HASH"),
        ", built ",
        env!("BUILD_DATETIME"),
        ")"
    )
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Reconciled state file
    #[arg(short, long, global = true, default_value = "identity-state.json")]
    state: PathBuf,

    /// Tracing filter, overrides RUST_LOG (e.g. "debug" or "identity_reconciler=trace")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print Prometheus metrics for the run on exit
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the changes a run would make. Never contacts the API.
    Plan {
        /// Declaration file (YAML)
        #[arg(short = 'f', long, value_name = "FILE")]
        declarations: PathBuf,
    },
    /// Reconcile every declared client and account
    Apply {
        /// Declaration file (YAML)
        #[arg(short = 'f', long, value_name = "FILE")]
        declarations: PathBuf,
    },
    /// Print the remote state of every entity in the state file
    Read,
    /// Delete every client and disable every account in the state file
    Destroy,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider FIRST, before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    metrics::register_metrics().context("Failed to register metrics")?;

    let result = match &cli.command {
        Commands::Plan { declarations } => {
            plan_command(&load_declarations(declarations)?, &cli.state)
        }
        Commands::Apply { declarations } => {
            let declarations = load_declarations(declarations)?;
            let api = connect().await?;
            apply_command(&api, &declarations, &cli.state).await
        }
        Commands::Read => {
            let api = connect().await?;
            read_command(&api, &cli.state).await
        }
        Commands::Destroy => {
            let api = connect().await?;
            destroy_command(&api, &cli.state).await
        }
    };

    if cli.metrics {
        println!("{}", metrics::render()?);
    }
    result
}

async fn connect() -> Result<IdentityApiRest> {
    let config = IdentityConfig::from_env();
    debug!(?config, "Loaded identity API configuration");
    config.validate().context("Invalid identity API configuration")?;
    IdentityApiRest::connect(&config)
        .await
        .context("Failed to connect to the identity API")
}

fn plan_command(declarations: &Declarations, state_path: &Path) -> Result<()> {
    let state = ReconciledState::load(state_path)?;
    let mut failures = 0;

    for declaration in &declarations.clients {
        let previous = state.client(&declaration.name);
        let desired = merge_client(declaration, previous);
        let plan = match previous {
            Some(previous) => plan_update(previous, &desired),
            None => plan_create(&desired),
        };
        match plan {
            Ok(plan) => {
                let action = if previous.is_some() { "update" } else { "create" };
                println!("client {} ({action}): {}", declaration.name, plan.summary());
            }
            Err(e) => {
                failures += 1;
                println!("client {}: {e}", declaration.name);
            }
        }
    }

    for declaration in &declarations.accounts {
        let previous = state.account(&declaration.username);
        let desired = merge_account(declaration, previous);
        let plan = match previous {
            Some(previous) => plan_account_update(previous, &desired),
            None => plan_account_create(&desired),
        };
        match plan {
            Ok(plan) => {
                let action = if previous.is_some() { "update" } else { "create" };
                println!(
                    "account {} ({action}): role {}, {} properties to write",
                    declaration.username,
                    plan.role_change.as_deref().unwrap_or("unchanged"),
                    plan.properties_to_put.len()
                );
            }
            Err(e) => {
                failures += 1;
                println!("account {}: {e}", declaration.username);
            }
        }
    }

    if failures > 0 {
        bail!("{failures} declarations are invalid");
    }
    Ok(())
}

async fn apply_command(
    api: &IdentityApiRest,
    declarations: &Declarations,
    state_path: &Path,
) -> Result<()> {
    let mut state = ReconciledState::load(state_path)?;
    let clients = ClientSync::new(api);
    let accounts = AccountSync::new(api);
    let mut failures = 0;

    for declaration in &declarations.clients {
        let previous = state.client(&declaration.name).cloned();
        let mut client = merge_client(declaration, previous.as_ref());
        let result = match &previous {
            Some(previous) => clients.update(previous, &mut client).await,
            None => clients.create(&mut client).await,
        };
        match result {
            Ok(report) => {
                println!(
                    "client {} reconciled (id {}): {}, {} secrets created",
                    declaration.name,
                    report.client_id,
                    report.summary,
                    report.secrets_created.len()
                );
                state.upsert_client(client);
            }
            Err(e) => {
                failures += 1;
                eprintln!("client {}: {e}", declaration.name);
                if keeps_progress(&e, previous.is_none(), client.id) {
                    state.upsert_client(client);
                }
            }
        }
        state.save(state_path)?;
    }

    for declaration in &declarations.accounts {
        let previous = state.account(&declaration.username).cloned();
        let mut account = merge_account(declaration, previous.as_ref());
        let result = match &previous {
            Some(previous) => accounts.update(previous, &mut account).await,
            None => accounts.create(&mut account).await,
        };
        match result {
            Ok(_) => {
                println!(
                    "account {} reconciled (id {})",
                    declaration.username, account.id
                );
                state.upsert_account(account);
            }
            Err(e) => {
                failures += 1;
                eprintln!("account {}: {e}", declaration.username);
                if keeps_progress(&e, previous.is_none(), account.id) {
                    state.upsert_account(account);
                }
            }
        }
        state.save(state_path)?;
    }

    info!(failures, "Apply finished");
    if failures > 0 {
        bail!("{failures} entities failed to reconcile; see {}", state_path.display());
    }
    Ok(())
}

/// Whether a failed run left remote changes the state file must record
///
/// A created entity is recorded as soon as it has an id, so the next run
/// updates it instead of creating it again. Created secrets are recorded
/// after a partial failure.
fn keeps_progress(error: &ReconcileError, created: bool, id: u64) -> bool {
    matches!(error, ReconcileError::PartialFailure { .. }) || (created && id != 0)
}

async fn read_command(api: &IdentityApiRest, state_path: &Path) -> Result<()> {
    let state = ReconciledState::load(state_path)?;
    let clients = ClientSync::new(api);
    let accounts = AccountSync::new(api);

    for recorded in &state.clients {
        let client = clients
            .read(recorded.id)
            .await
            .with_context(|| format!("Failed to read client {}", recorded.name))?;
        println!("{}", serde_json::to_string_pretty(&client)?);
    }
    for recorded in &state.accounts {
        match accounts
            .read(recorded.username())
            .await
            .with_context(|| format!("Failed to read account {}", recorded.username()))?
        {
            Some(account) => println!("{}", serde_json::to_string_pretty(&account)?),
            None => println!("account {} does not exist or is disabled", recorded.username()),
        }
    }
    Ok(())
}

async fn destroy_command(api: &IdentityApiRest, state_path: &Path) -> Result<()> {
    let mut state = ReconciledState::load(state_path)?;
    let clients = ClientSync::new(api);
    let accounts = AccountSync::new(api);

    for recorded in state.clients.clone() {
        clients
            .delete(recorded.id)
            .await
            .with_context(|| format!("Failed to delete client {}", recorded.name))?;
        println!("client {} deleted", recorded.name);
        state.remove_client(&recorded.name);
        state.save(state_path)?;
    }
    for recorded in state.accounts.clone() {
        let disabled = accounts
            .delete(&recorded)
            .await
            .with_context(|| format!("Failed to disable account {}", recorded.username()))?;
        if disabled {
            println!("account {} disabled", recorded.username());
        } else {
            println!("account {} was already inactive", recorded.username());
        }
        state.remove_account(recorded.username());
        state.save(state_path)?;
    }
    Ok(())
}
