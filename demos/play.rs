//! Example on how to interact with the deployed MonkaBreak contract.
//! It connects with a private key, listens for contract events, creates a game,
//! joins it as a thief and prints the resulting state and roster.

use eyre::eyre;
use monkabreak_client::{Amount, ClientConfig, GameClient, LoggingHandler, Team};

/// Your private key environment variable name.
const PRIV_KEY_ENV: &str = "PRIV_KEY";

/// RPC endpoint URL environment variable name.
const RPC_URL_ENV: &str = "RPC_URL";

/// Deployed contract address environment variable name.
const CONTRACT_ADDRESS_ENV: &str = "CONTRACT_ADDRESS";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let privkey =
        std::env::var(PRIV_KEY_ENV).map_err(|_| eyre!("No {} env var set", PRIV_KEY_ENV))?;
    let rpc_url =
        std::env::var(RPC_URL_ENV).map_err(|_| eyre!("No {} env var set", RPC_URL_ENV))?;
    let contract_address = std::env::var(CONTRACT_ADDRESS_ENV)
        .map_err(|_| eyre!("No {} env var set", CONTRACT_ADDRESS_ENV))?;

    println!("RPC URL: {}", rpc_url);
    println!("Contract address: {}", contract_address);

    let mut config = ClientConfig::new(contract_address.parse()?);
    config.network.rpc_url = rpc_url;

    let game = GameClient::connect_with_key(&config, &privkey)?;
    game.verify_chain().await?;
    println!("Connected as {:?}", game.account());

    // Log every contract event while the example runs
    let listener = game.setup_event_listeners(LoggingHandler);

    let min_fee = game.get_min_entry_fee().await?;
    println!("Minimum entry fee: {} MON", min_fee);

    // Create a new game with a 3 MON entry fee
    let entry_fee = Amount::parse("3")?.max(min_fee);
    println!("Creating new game with an entry fee of {} MON", entry_fee);
    let created = game.create_game(entry_fee).await?;
    println!("Game created with ID: {}", created.game_id);

    // Join the game as a thief, paying the game's entry fee
    println!("Joining game as thief...");
    game.join_game(created.game_id, "Alice", Team::Thieves, None)
        .await?;

    let snapshot = game.get_game_snapshot(created.game_id).await?;
    println!("Game State: {:#?}", snapshot.state);
    println!("Vault: {} MON", snapshot.vault_balance);
    println!("Players: {:#?}", snapshot.players);

    listener.unsubscribe();
    Ok(())
}
