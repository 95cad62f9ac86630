use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{error, info};

use daohub_core::chain::{JsonRpcChain, JsonRpcTransport, RpcWallet};
use daohub_core::config::DashboardConfig;
use daohub_core::dashboard::{Dashboard, Route};
use daohub_core::governance::{GovernanceSession, ProposalStatus, ProposalVariant, SessionObserver};
use daohub_core::{Address, DaoError};

#[derive(Parser)]
#[command(name = "daohub", version, about = "DAO governance dashboard")]
struct Cli {
    /// Configuration file (defaults to ./daohub.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the DAO's stored value
    Value,
    /// Show the connected account's token balance
    Balance,
    /// List DAO members
    Members,
    /// Ask the treasury to fund an account
    RequestFunds { account: String },
    /// Draft and submit a governance proposal
    Propose {
        #[arg(short, long)]
        description: String,

        #[command(subcommand)]
        kind: ProposalCommand,
    },
    /// Render a dashboard page
    Page {
        #[arg(default_value = "/")]
        path: String,
    },
    /// List dashboard routes
    Routes,
    /// Print the effective configuration
    ShowConfig,
}

#[derive(Subcommand)]
enum ProposalCommand {
    SendToken { recipient: String, amount: u128 },
    SendEther { recipient: String, amount: u128 },
    AddMember { address: String, name: String },
    RemoveMember { address: String },
    MintNft { recipient: String, token_uri: String },
    StoreValue { new_value: u128 },
}

impl From<ProposalCommand> for ProposalVariant {
    fn from(command: ProposalCommand) -> Self {
        match command {
            ProposalCommand::SendToken { recipient, amount } => {
                ProposalVariant::SendToken { recipient, amount }
            }
            ProposalCommand::SendEther { recipient, amount } => {
                ProposalVariant::SendEther { recipient, amount }
            }
            ProposalCommand::AddMember { address, name } => {
                ProposalVariant::AddMember { address, name }
            }
            ProposalCommand::RemoveMember { address } => ProposalVariant::RemoveMember { address },
            ProposalCommand::MintNft { recipient, token_uri } => {
                ProposalVariant::MintNft { recipient, token_uri }
            }
            ProposalCommand::StoreValue { new_value } => ProposalVariant::StoreValue { new_value },
        }
    }
}

/// Prints every status transition as it happens
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_status_changed(&self, status: &ProposalStatus) {
        let line = format!("proposal: {}", status);
        match status {
            ProposalStatus::Confirmed(_) => println!("{}", line.green()),
            ProposalStatus::Failed(_) => println!("{}", line.red()),
            _ => println!("{}", line.cyan()),
        }
    }

    fn name(&self) -> &str {
        "console"
    }
}

async fn connect(
    config: &DashboardConfig,
    dashboard: &mut Dashboard,
) -> Result<Arc<GovernanceSession>, DaoError> {
    let chain = JsonRpcTransport::new(&config.chain.rpc_url, Some(config.request_timeout()))?;
    // Signing waits on a person, so the chain deadline does not apply.
    let wallet = JsonRpcTransport::new(&config.wallet.rpc_url, config.sign_timeout())?;

    let chain = JsonRpcChain::new(chain);
    let wallet = RpcWallet::new(wallet);

    let session = dashboard
        .connect(Arc::new(wallet), Arc::new(chain), config.session_settings())
        .await?;
    session.subscribe(Arc::new(ConsoleObserver));
    Ok(session)
}

async fn run(cli: Cli) -> Result<(), DaoError> {
    let (config, validation) = DashboardConfig::load_validated(cli.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log_level),
    )
    .init();
    for warning in &validation.warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }

    let mut dashboard = Dashboard::new(config.chain.explorer_url.clone());

    match cli.command {
        Command::Routes => {
            for route in Route::ALL {
                println!("{:<18} {}", route.path(), route.title());
            }
        }
        Command::ShowConfig => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|err| DaoError::Io(std::io::Error::other(err)))?;
            print!("{}", rendered);
        }
        Command::Value => {
            let session = connect(&config, &mut dashboard).await?;
            let value = session.refresh_value().await?;
            println!("{}", value.to_string().bold());
        }
        Command::Balance => {
            let session = connect(&config, &mut dashboard).await?;
            let balance = session.refresh_balance().await?;
            println!(
                "{}: {} {}",
                balance.owner,
                balance.amount.to_string().bold(),
                config.display.balance_unit
            );
        }
        Command::Members => {
            let session = connect(&config, &mut dashboard).await?;
            for member in session.refresh_members().await? {
                println!("{}", member);
            }
        }
        Command::RequestFunds { account } => {
            let account: Address = account.parse().map_err(|err| DaoError::address(&account, err))?;
            let session = connect(&config, &mut dashboard).await?;
            let receipt = session.request_funds(&account).await?;
            println!("funds requested: {} (block {})", receipt.tx, receipt.block_number);
        }
        Command::Propose { description, kind } => {
            let session = connect(&config, &mut dashboard).await?;
            // Best effort: lets the builder catch duplicate members before signing.
            if let Err(err) = session.refresh_members().await {
                info!("Member list unavailable, leaving duplicate check to the contract: {}", err);
            }
            session.draft_proposal(kind.into(), &description)?;
            let confirmation = session.submit_draft().await?;
            println!(
                "{}",
                confirmation.receipt.tx.explorer_url(&config.chain.explorer_url).underline()
            );
        }
        Command::Page { path } => {
            let session = connect(&config, &mut dashboard).await?;
            // Read failures are shown on the page as stale or missing values.
            let _ = session.refresh_value().await;
            let _ = session.refresh_balance().await;
            let _ = session.refresh_members().await;

            let page = dashboard.navigate(&path)?;
            for line in page.summary(&config.display.balance_unit) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
