//! Crash Console - line-oriented front end for the crash game
//!
//! Connects to the game server and reads commands from stdin.
//!
//! Usage:
//!   CRASH_CONFIG_PATH=config/client_config.yaml ./crash_console
//!   ./crash_console path/to/config.yaml

use anyhow::Result;
use crypto_crash_client::bin_common::{
    load_client_config, load_config_from_env, parse_args, ConfigType,
};
use crypto_crash_client::crash_sync::{
    init_tracing, ClientEvent, ClientSnapshot, Cryptocurrency, GameClient, LogLevel,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const HELP: &str = "\
Commands:
  name <player name>        set your player name
  bet <amount> [crypto]     place a bet (bitcoin, ethereum, binancecoin, cardano)
  cashout                   cash out the active bet
  status                    show game and player state
  connect                   reconnect after giving up
  offline | online          simulate network loss / recovery
  logs [level|json]         show recent log records
  help                      show this help
  quit                      exit";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config
    let args = parse_args();
    let config_type = match args.first() {
        Some(path) => ConfigType::Custom(path.clone()),
        None => ConfigType::Client,
    };
    let config_path = load_config_from_env(config_type);
    let config = load_client_config(&config_path)?;

    // Initialize logging
    init_tracing(config.logging.level);
    config.log();

    let client = GameClient::start(&config)?;
    client.connect()?;

    // Print notices as they arrive
    let events = client.events();
    std::thread::spawn(move || {
        while let Ok(event) = events.recv() {
            if let ClientEvent::Notice(notice) = event {
                println!("{}", notice);
            }
        }
    });

    println!("{}", HELP);
    let default_bet = config.betting.default_bet_usd;
    let default_crypto = config.betting.default_cryptocurrency.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C");
                None
            }
        };
        let Some(line) = line else { break };

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else { continue };

        let result = match command {
            "name" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                client.set_player_name(name)
            }
            "bet" => {
                let amount = match parts.next() {
                    Some(raw) => match raw.parse::<f64>() {
                        Ok(amount) => amount,
                        Err(_) => {
                            println!("Invalid bet amount: {}", raw);
                            continue;
                        }
                    },
                    None => default_bet,
                };
                let crypto = parts
                    .next()
                    .map(Cryptocurrency::from)
                    .unwrap_or_else(|| default_crypto.clone());
                client.place_bet(amount, crypto)
            }
            "cashout" => client.cash_out(),
            "connect" => client.connect(),
            "offline" => client.set_online(false),
            "online" => client.set_online(true),
            "status" => {
                print_status(&client.snapshot(), default_bet);
                Ok(())
            }
            "logs" => {
                print_logs(&client, parts.next());
                Ok(())
            }
            "help" => {
                println!("{}", HELP);
                Ok(())
            }
            "quit" | "exit" => break,
            other => {
                println!("Unknown command: {} (try 'help')", other);
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Command failed: {}", e);
            break;
        }
    }

    client.shutdown().await?;
    Ok(())
}

fn print_status(snapshot: &ClientSnapshot, default_bet: f64) {
    println!("Connection: {}", snapshot.status.label());
    if snapshot.exhausted {
        println!("  Automatic reconnection stopped; use 'connect' to retry");
    }
    println!(
        "Network: {} (attempts {}/{})",
        if snapshot.network.is_online { "online" } else { "offline" },
        snapshot.network.reconnect_attempts,
        snapshot
            .network
            .max_reconnect_attempts
            .map_or_else(|| "-".to_string(), |m| m.to_string())
    );
    println!("Game: {}", snapshot.status_text);
    if let Some(game) = &snapshot.game {
        println!(
            "  Round {} | {} | {:.2}x",
            game.current_round, game.phase, game.multiplier
        );
    }

    let player = &snapshot.player;
    let name = if player.player_name.is_empty() {
        "(not set)"
    } else {
        player.player_name.as_str()
    };
    println!("Player: {} | balance ${:.2}", name, player.balance);
    match &player.current_bet {
        Some(bet) => {
            let symbol = bet.cryptocurrency.symbol().to_string();
            println!("  Active bet: ${:.2} in {}", bet.usd_amount, symbol);
            if let Some(win) = snapshot.potential_win {
                println!("  Potential win: ${:.2}", win);
            }
        }
        None => println!("  No active bet"),
    }
    println!(
        "Can bet ${:.2}: {} | Can cash out: {}",
        default_bet,
        snapshot.can_place_bet(default_bet),
        snapshot.can_cash_out()
    );
}

fn print_logs(client: &GameClient, arg: Option<&str>) {
    let logger = client.logger();
    match arg {
        Some("json") => match logger.export_json() {
            Ok(json) => println!("{}", json),
            Err(e) => println!("Failed to export logs: {}", e),
        },
        Some(level) => match level.parse::<LogLevel>() {
            Ok(level) => {
                for entry in logger.entries_at(level) {
                    println!("{} [{}] {}", entry.timestamp.format("%H:%M:%S"), entry.level, entry.message);
                }
            }
            Err(e) => println!("{}", e),
        },
        None => {
            let entries = logger.entries();
            let skip = entries.len().saturating_sub(20);
            for entry in entries.into_iter().skip(skip) {
                println!("{} [{}] {}", entry.timestamp.format("%H:%M:%S"), entry.level, entry.message);
            }
        }
    }
}
