use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{eyre, Result};
use monkabreak_client::abi::MONKABREAK_ABI;
use monkabreak_client::{
    Address, Amount, ClientConfig, GameClient, GameId, RpcBackend, Team, TransactionSigner,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "monkabreak")]
#[command(about = "Play MonkaBreak against the deployed contract")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint, overrides the configuration file
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Contract address, required without a configuration file
    #[arg(long, env = "CONTRACT_ADDRESS", value_parser = parse_address)]
    contract: Option<Address>,

    /// Hex private key used to sign transactions
    #[arg(long, env = "PRIV_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a game with the given entry fee in MON
    Create { entry_fee: Amount },
    /// Join a game; pays the game's entry fee unless --fee is given
    Join {
        game_id: GameId,
        #[arg(long, default_value = "")]
        nickname: String,
        /// Join the police instead of the thieves
        #[arg(long)]
        police: bool,
        #[arg(long)]
        fee: Option<Amount>,
    },
    /// Start a game, optionally attaching a stake in MON
    Start {
        game_id: GameId,
        #[arg(long)]
        stake: Option<Amount>,
    },
    /// Commit a path for the current stage (0 = A, 1 = B, 2 = C)
    Commit { game_id: GameId, path: u8 },
    /// Vote to block a path (0 = A, 1 = B, 2 = C)
    Vote { game_id: GameId, path: u8 },
    /// Resolve the current stage
    Process { game_id: GameId },
    /// Finalize a game and pay out the vault
    Finalize { game_id: GameId },
    /// Print a game's state, vault and players
    State { game_id: GameId },
    /// Print a game's players
    Players { game_id: GameId },
    /// Print a game's vault balance in MON
    Vault { game_id: GameId },
    /// Check whether an address won a game
    Winner {
        game_id: GameId,
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Print the latest game id
    CurrentId,
    /// Print the contract's minimum entry fee in MON
    MinFee,
    /// Print the native balance of an address (defaults to the signer)
    Balance {
        #[arg(value_parser = parse_address)]
        address: Option<Address>,
    },
    /// Stream contract events until interrupted
    Watch {
        #[arg(long)]
        from_block: Option<u64>,
    },
    /// Print the contract ABI
    ExportAbi,
}

fn parse_address(input: &str) -> Result<Address, String> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|e| format!("{input:?} is not an address: {e:?}"))
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match (&cli.config, cli.contract) {
        (Some(path), _) => ClientConfig::from_file(path)?,
        (None, Some(contract)) => ClientConfig::new(contract),
        (None, None) => {
            return Err(eyre!(
                "No contract configured: pass --config or set CONTRACT_ADDRESS"
            ))
        }
    };
    if let Some(contract) = cli.contract {
        config.contract.address = contract;
    }
    if let Some(rpc_url) = &cli.rpc_url {
        config.network.rpc_url = rpc_url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    if let Command::ExportAbi = cli.command {
        println!("{MONKABREAK_ABI}");
        return Ok(());
    }

    let config = load_config(&cli)?;
    info!(
        rpc_url = %config.network.rpc_url,
        contract = ?config.contract.address,
        "using MonkaBreak contract"
    );

    match &cli.private_key {
        Some(key) => {
            let client = GameClient::connect_with_key(&config, key)?;
            client.verify_chain().await?;
            run(&client, cli.command).await
        }
        None => {
            let client = GameClient::read_only(&config)?;
            run(&client, cli.command).await
        }
    }
}

async fn run<R, S>(client: &GameClient<R, S>, command: Command) -> Result<()>
where
    R: RpcBackend + 'static,
    S: TransactionSigner,
{
    match command {
        Command::Create { entry_fee } => {
            let created = client.create_game(entry_fee).await?;
            println!("Game created with ID: {}", created.game_id);
            println!("Transaction: {:?}", created.receipt.tx_hash);
        }
        Command::Join {
            game_id,
            nickname,
            police,
            fee,
        } => {
            let team = if police { Team::Police } else { Team::Thieves };
            let receipt = client.join_game(game_id, &nickname, team, fee).await?;
            println!("Joined game {game_id} as {team} in {:?}", receipt.tx_hash);
        }
        Command::Start { game_id, stake } => {
            let receipt = client.start_game(game_id, stake).await?;
            println!("Started game {game_id} in {:?}", receipt.tx_hash);
        }
        Command::Commit { game_id, path } => {
            let receipt = client.commit_move(game_id, path).await?;
            println!("Committed move in {:?}", receipt.tx_hash);
        }
        Command::Vote { game_id, path } => {
            let receipt = client.vote_block(game_id, path).await?;
            println!("Vote cast in {:?}", receipt.tx_hash);
        }
        Command::Process { game_id } => {
            let receipt = client.process_stage(game_id).await?;
            println!("Stage processed in {:?}", receipt.tx_hash);
        }
        Command::Finalize { game_id } => {
            let receipt = client.finalize_game(game_id).await?;
            println!("Game finalized in {:?}", receipt.tx_hash);
        }
        Command::State { game_id } => print_json(&client.get_game_snapshot(game_id).await?)?,
        Command::Players { game_id } => print_json(&client.get_players(game_id).await?)?,
        Command::Vault { game_id } => {
            println!("{} MON", client.get_vault_balance(game_id).await?);
        }
        Command::Winner { game_id, address } => {
            println!("{}", client.is_winner(game_id, address).await?);
        }
        Command::CurrentId => println!("{}", client.get_current_game_id().await?),
        Command::MinFee => println!("{} MON", client.get_min_entry_fee().await?),
        Command::Balance { address } => {
            let address = address.unwrap_or_else(|| client.account());
            println!("{} MON", client.get_balance(address).await?);
        }
        Command::Watch { from_block } => {
            let mut subscription = client.subscribe(from_block);
            loop {
                tokio::select! {
                    item = subscription.next() => match item {
                        Some(Ok(logged)) => println!("{}", serde_json::to_string(&logged)?),
                        Some(Err(e)) => tracing::warn!(error = %e, "event error"),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            subscription.unsubscribe();
        }
        Command::ExportAbi => println!("{MONKABREAK_ABI}"),
    }
    Ok(())
}
