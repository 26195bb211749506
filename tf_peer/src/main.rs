//! Terminal peer for a two player 24 points room.
//!
//! One peer hosts a room on a TCP socket, the other joins it by address.
//! Commands are read line by line from stdin while session updates are
//! printed as they arrive.

mod commands;
mod config;

use std::net::SocketAddr;

use anyhow::Error;
use ctrlc::set_handler;
use log::{info, warn};
use pico_args::Arguments;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use twentyfour::{
    Card, ConnStatus, GameState, PeerId, Phase, Seat, SessionHandle,
    net::{TcpTransport, Transport},
    session::{self, SessionSnapshot, SessionUpdate},
};

use commands::{COMMANDS_HELP, Command, parse_command};
use config::PeerConfig;

const HELP: &str = "\
Host or join a two player 24 points room

USAGE:
  tf_peer host [OPTIONS]
  tf_peer join HOST_ADDR [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Address to host on  [default: env TF_BIND or 127.0.0.1:6969]

FLAGS:
  --manual                 Don't advance housekeeping phases automatically
  -h, --help               Print help information

ENVIRONMENT:
  TF_BIND                  Address to host on
  TF_HOST_CAPACITY         Guests admitted into a hosted room
  TF_TICK_MS               Delay between automatic phase steps
  TF_AUTO_ADVANCE          Advance housekeeping phases automatically (true/false)
";

enum Mode {
    Host,
    Join(PeerId),
}

struct Args {
    mode: Mode,
    bind: Option<SocketAddr>,
    manual: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let mode = match pargs.subcommand()?.as_deref() {
        Some("host") => Mode::Host,
        Some("join") => Mode::Join(PeerId::new(&pargs.free_from_str::<String>()?)),
        _ => {
            print!("{HELP}");
            std::process::exit(1);
        }
    };
    let args = Args {
        mode,
        bind: pargs.opt_value_from_str("--bind")?,
        manual: pargs.contains("--manual"),
    };

    let config = PeerConfig::from_env(args.bind, args.manual.then_some(false))?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();

    let (transport, events) = match args.mode {
        Mode::Host => TcpTransport::bind(config.bind).await?,
        Mode::Join(_) => TcpTransport::client(),
    };
    info!("Starting peer {}", transport.local_id());

    let handle = session::spawn(config.session, transport, events);
    let updates = handle.subscribe(256).await?;
    tokio::spawn(print_updates(updates));

    match args.mode {
        Mode::Host => {
            handle.host().await?;
            let snapshot = handle.state().await?;
            if let Some(id) = snapshot.room.my_id {
                println!("Hosting at {id}. Waiting for a guest...");
            }
        }
        Mode::Join(host_id) => handle.join(host_id).await?,
    }
    print!("{COMMANDS_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => execute(&handle, command).await?,
            Err(error) => println!("{error}"),
        }
    }

    if let Err(error) = handle.close().await {
        warn!("Session already closed: {error}");
    }
    Ok(())
}

async fn execute(handle: &SessionHandle, command: Command) -> Result<(), Error> {
    match command {
        Command::Perform(intent) => handle.perform(intent).await?,
        Command::Say(text) => handle.say(text).await?,
        Command::Status => println!("{}", render(&handle.state().await?)),
        Command::Auto(enabled) => {
            handle.set_auto_advance(enabled).await?;
            println!("Auto advance {}.", if enabled { "on" } else { "off" });
        }
        Command::Leave => {
            handle.leave().await?;
            println!("Left the room.");
        }
        Command::Help => print!("{COMMANDS_HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

/// Print what changed as session updates come in.
async fn print_updates(mut updates: mpsc::Receiver<SessionUpdate>) {
    let mut last: Option<(u32, Phase)> = None;

    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::Logged(line) => println!("{line}"),
            SessionUpdate::RoomChanged(room) => {
                if let Some(error) = &room.error
                    && room.status == ConnStatus::Disconnected
                {
                    println!("Connection error: {error}");
                }
            }
            SessionUpdate::GameChanged(game) => {
                let current = (game.round, game.phase);
                if last != Some(current) {
                    println!("{}", describe(&game));
                    last = Some(current);
                }
            }
            // Already shown through the room log.
            SessionUpdate::TextReceived { .. } => {}
            SessionUpdate::Closed => break,
        }
    }
}

fn describe(game: &GameState) -> String {
    match game.phase {
        Phase::GameReady => "No game in progress.".to_string(),
        Phase::DrawCards => format!("Round {}: drawing cards.", game.round),
        Phase::PlayCards => format!("Round {}: play your cards ('play').", game.round),
        Phase::VoteWinner => format!(
            "Round {}: field is {}. Who made 24? ('vote me|them|tie')",
            game.round,
            cards(&game.field)
        ),
        Phase::LootCards => match game.round_winner {
            Some(verdict) => format!("Round {}: {verdict} takes the field.", game.round),
            None => format!("Round {}: looting.", game.round),
        },
        Phase::NextRound => format!("Round {} is over.", game.round),
        Phase::GameOver => match game.game_winner {
            Some(seat) => format!("Game over, {seat} wins!"),
            None => "Game over.".to_string(),
        },
    }
}

fn cards(cards: &[Card]) -> String {
    if cards.is_empty() {
        return "-".to_string();
    }
    cards
        .iter()
        .map(|card| card.to_string().trim().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn render(snapshot: &SessionSnapshot) -> String {
    let room = &snapshot.room;
    let game = &snapshot.game;
    let mut out = vec![format!(
        "Room: {} (peers: {}) auto: {}",
        room.status,
        room.peers_id.len(),
        if snapshot.auto_advance { "on" } else { "off" }
    )];

    out.push(format!("Round {}, {}", game.round, game.phase));
    for seat in Seat::ALL {
        let player = game.players.get(seat);
        let you = if snapshot.my_seat() == Some(seat) {
            " (you)"
        } else {
            ""
        };
        let vote = game
            .votes
            .get(seat)
            .map_or_else(|| "-".to_string(), |verdict| verdict.to_string());
        out.push(format!(
            "{seat}{you}: hand {} | deck {} | loot {} | vote {vote}",
            cards(&player.hand),
            player.deck.len(),
            player.loot.len(),
        ));
    }
    out.push(format!("Field: {}", cards(&game.field)));
    out.join("\n")
}
