//! Terminal client for roomcast.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};

use roomcast::client::{format_help, parse_input, ClientCommand, ClientInput};
use roomcast::{
    AgentOptions, ChatLine, ChatTransport, Config, ControlAgent, Presenter, Result, RoomInfo,
    RoomcastError,
};

/// Prints everything straight to the terminal.
struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn room_added(&self, room: &RoomInfo) {
        println!("  {}", format_room(room));
    }

    fn chat_line(&self, line: &ChatLine) {
        println!("{} {}", line.received_at.format("%H:%M"), line.render());
    }

    fn notice(&self, text: &str) {
        println!("*** {text}");
    }
}

fn format_room(room: &RoomInfo) -> String {
    format!(
        "[{}] {} (by {}) {}:{}",
        room.id, room.name, room.creator, room.group, room.port
    )
}

type InputLines = Lines<BufReader<Stdin>>;

async fn prompt(lines: &mut InputLines, text: &str) -> Option<String> {
    print!("{text}");
    let _ = std::io::stdout().flush();
    lines.next_line().await.ok().flatten()
}

/// Ask for a display name until a usable one is entered.
async fn ask_user_name(lines: &mut InputLines) -> Option<String> {
    loop {
        let name = prompt(lines, "Your name: ").await?;
        let name = name.trim();
        match roomcast::protocol::validate_token("name", name) {
            Ok(()) => return Some(name.to_string()),
            Err(e) => println!("{e}"),
        }
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await?
        .next()
        .ok_or_else(|| RoomcastError::ConnectionFailure(format!("cannot resolve {addr}")))
}

async fn leave_current(agent: &ControlAgent, current: &mut Option<ChatTransport>) {
    if let Some(transport) = current.take() {
        let name = transport.room().name.clone();
        match agent.leave_room(transport).await {
            Ok(()) => println!("*** Left {name}"),
            Err(e) => println!("*** Error while leaving {name}: {e}"),
        }
    }
}

async fn show_rooms(agent: &ControlAgent) {
    println!("=== Rooms ===");
    match agent.list_rooms().await {
        Ok(rooms) if rooms.is_empty() => println!("  (no rooms yet, /create <name> to start one)"),
        Ok(_) => {}
        Err(e) => println!("*** Could not list rooms: {e}"),
    }
}

async fn run(config: Config, lines: &mut InputLines, user: String) -> Result<()> {
    let addr = resolve(&config.client.server_addr()).await?;
    let agent = ControlAgent::connect(
        addr,
        &user,
        Arc::new(TerminalPresenter),
        AgentOptions::from_config(&config),
    )
    .await?;

    println!("Connected to {addr} as {user}. Type /help for commands.");
    show_rooms(&agent).await;

    let mut current: Option<ChatTransport> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        let command = match parse_input(&line) {
            ClientInput::Message(text) if text.is_empty() => continue,
            ClientInput::Message(text) => {
                match &current {
                    Some(transport) => {
                        if let Err(e) = agent.say(transport, &text).await {
                            println!("*** Message not sent: {e}");
                        }
                    }
                    None => println!("*** Not in a room. Use /join <id> or /create <name>."),
                }
                continue;
            }
            ClientInput::Command(command) => command,
        };

        match command {
            ClientCommand::List => show_rooms(&agent).await,
            ClientCommand::Create(name) if name.is_empty() => println!("Usage: /create <name>"),
            ClientCommand::Create(name) => {
                leave_current(&agent, &mut current).await;
                match agent.create_and_join_room(&name).await {
                    Ok(transport) => {
                        println!("*** Joined {}", format_room(transport.room()));
                        current = Some(transport);
                    }
                    Err(e) => println!("*** Could not create {name}: {e}"),
                }
            }
            ClientCommand::Join(target) if target.is_empty() => println!("Usage: /join <id|name>"),
            ClientCommand::Join(target) => match agent.find_room(&target) {
                Some(room) => {
                    leave_current(&agent, &mut current).await;
                    match agent.join_room(&room).await {
                        Ok(transport) => {
                            println!("*** Joined {}", format_room(&room));
                            current = Some(transport);
                        }
                        Err(e) => println!("*** Could not join {}: {e}", room.name),
                    }
                }
                None => println!("*** No room {target} in the list. Try /list."),
            },
            ClientCommand::Leave => {
                if current.is_none() {
                    println!("*** Not in a room.");
                }
                leave_current(&agent, &mut current).await;
            }
            ClientCommand::Help => println!("{}", format_help()),
            ClientCommand::Quit => break,
            ClientCommand::Unknown(cmd) => {
                println!("*** Unknown command /{cmd}. Type /help for commands.")
            }
        }

        if agent.is_closed() {
            break;
        }
    }

    leave_current(&agent, &mut current).await;
    info!("Client exiting");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(_) => Config::default(),
    };
    config.apply_env_overrides();

    // Keep the terminal for the conversation; log next to the server log
    let mut logging = config.logging.clone();
    logging.file = Path::new(&logging.file)
        .with_file_name("roomcast-client.log")
        .to_string_lossy()
        .into_owned();
    if let Err(e) = roomcast::logging::init_file_only(&logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let user = match config.client.user.clone() {
        Some(user) => user,
        None => match ask_user_name(&mut lines).await {
            Some(user) => user,
            None => return ExitCode::SUCCESS,
        },
    };

    match run(config, &mut lines, user).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Client failed: {}", e);
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
