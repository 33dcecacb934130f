use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use salon_application::engine::ApiSpeakerEngine;
use salon_application::poller::AutoContinuationPoller;
use salon_application::scheduler::TurnScheduler;
use salon_core::config::AiConfig;
use salon_core::persona::{InMemoryPersonaRegistry, Persona, PersonaRegistry};
use salon_core::session::{ChatMessage, InMemorySessionStore, SessionStore};
use salon_interaction::{CompletionClient, fetch_available_models};

const HUMAN_ID: &str = "user-me";

const COMMANDS: &[&str] = &[
    "/auto", "/poke", "/members", "/invite", "/clear", "/models", "/sessions", "/switch",
    "/status",
];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Demo roster seeded at startup.
fn default_personas() -> Vec<Persona> {
    vec![
        Persona::human(HUMAN_ID, "Me"),
        Persona::ai(
            "ai-ada",
            "Ada Lovelace",
            "Victorian mathematician and the first programmer",
            "You are Ada Lovelace. You see poetry in mathematics and believe machines \
             will one day compose music. Speak with precise, elegant enthusiasm.",
        ),
        Persona::ai(
            "ai-alan",
            "Alan Turing",
            "Logician and father of computer science",
            "You are Alan Turing. You are curious, direct, and a little mischievous. \
             You love puzzles and questioning whether machines can think.",
        ),
        Persona::ai(
            "ai-grace",
            "Grace Hopper",
            "Rear admiral and compiler pioneer",
            "You are Grace Hopper. You are pragmatic and witty, fond of saying it is \
             easier to ask forgiveness than permission. Keep things grounded.",
        ),
    ]
}

/// The main entry point for the Salon REPL.
///
/// Sets up the in-memory store and registry, the turn scheduler with its
/// HTTP-backed speaker engine, the auto-continuation poller, and a
/// rustyline-based input loop with slash-command completion.
#[tokio::main]
async fn main() -> Result<()> {
    // ===== Backend Initialization =====
    let registry = Arc::new(InMemoryPersonaRegistry::with_personas(default_personas()));
    let store = Arc::new(InMemorySessionStore::new());
    let config = AiConfig::from_env();
    let configured = config.is_configured();

    let scheduler = Arc::new(TurnScheduler::new(
        store.clone() as Arc<dyn SessionStore>,
        registry.clone() as Arc<dyn PersonaRegistry>,
        Arc::new(ApiSpeakerEngine::new()),
        config,
    ));

    let participant_ids: Vec<String> = default_personas().iter().map(|p| p.id.clone()).collect();
    let mut active_session = store.create_group("The Salon", participant_ids).await;

    // Print messages as they land in the store, whoever produced them.
    let printer_registry = registry.clone();
    let mut events = store.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) => print_message(&printer_registry, &msg).await,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let poller = AutoContinuationPoller::new(
        scheduler.clone(),
        store.clone() as Arc<dyn SessionStore>,
    );
    let poller_handle = poller.spawn();

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== The Salon ===".bright_magenta().bold());
    println!(
        "{}",
        "Chat with the roster, '/auto' for self-sustaining mode, '/poke' to prompt a reply, \
         'quit' to exit."
            .bright_black()
    );
    if !configured {
        println!(
            "{}",
            "No API key found. Set SALON_API_KEY (and optionally SALON_BASE_URL, SALON_MODEL) \
             to enable AI replies."
                .yellow()
        );
    }
    println!();

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                if let Some(command) = trimmed.strip_prefix('/') {
                    handle_command(
                        command,
                        &store,
                        &registry,
                        &scheduler,
                        &mut active_session,
                    )
                    .await;
                    continue;
                }

                // A human message, then an immediate reaction turn.
                let message = ChatMessage::from_sender(HUMAN_ID, trimmed);
                if let Err(e) = store.append_message(&active_session, message).await {
                    eprintln!("{}", format!("Failed to send: {e}").red());
                    continue;
                }

                let scheduler = scheduler.clone();
                let session_id = active_session.clone();
                tokio::spawn(async move {
                    scheduler.try_advance(&session_id, false).await;
                });
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {err:?}").red());
                break;
            }
        }
    }

    poller_handle.stop();
    poller_handle.join().await;

    Ok(())
}

async fn print_message(registry: &Arc<InMemoryPersonaRegistry>, msg: &ChatMessage) {
    if msg.sender_id == HUMAN_ID {
        // The user just typed it; echoing would duplicate the line.
        return;
    }
    if msg.is_system {
        println!("{}", format!("* {}", msg.content).bright_black());
        return;
    }
    let name = registry
        .get(&msg.sender_id)
        .await
        .map(|p| p.name)
        .unwrap_or_else(|| "Unknown".to_string());
    println!("{}", format!("[{name}]").bright_magenta());
    for line in msg.content.lines() {
        println!("{}", line.bright_blue());
    }
    println!();
}

async fn handle_command(
    command: &str,
    store: &Arc<InMemorySessionStore>,
    registry: &Arc<InMemoryPersonaRegistry>,
    scheduler: &Arc<TurnScheduler>,
    active_session: &mut String,
) {
    let mut parts = command.splitn(2, ' ');
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or("").trim();

    match name {
        "auto" => {
            let config = scheduler.global_config().await;
            if !config.is_configured() {
                println!(
                    "{}",
                    "Set SALON_API_KEY first; auto mode needs a configured endpoint.".yellow()
                );
                return;
            }
            let enabled = !store.auto_flag(active_session).await;
            store.set_auto_flag(active_session, enabled).await;
            let state = if enabled { "on" } else { "off" };
            println!("{}", format!("Auto chat {state}").green());
        }
        "poke" => {
            let scheduler = scheduler.clone();
            let session_id = active_session.clone();
            tokio::spawn(async move {
                scheduler.try_advance(&session_id, true).await;
            });
        }
        "members" => {
            if let Some(session) = store.get_session(active_session).await {
                for id in &session.participant_ids {
                    match registry.get(id).await {
                        Some(p) if p.is_human => {
                            println!("{}", format!("  {} (you)", p.name).green())
                        }
                        Some(p) => println!("  {} - {}", p.name.bright_blue(), p.description),
                        None => println!("{}", format!("  {id} (unknown)").bright_black()),
                    }
                }
            }
        }
        "invite" => {
            if arg.is_empty() {
                println!("{}", "Usage: /invite <persona name>".bright_black());
                return;
            }
            let lowered = arg.to_lowercase();
            let found = registry
                .list()
                .await
                .into_iter()
                .find(|p| !p.is_human && p.name.to_lowercase().contains(&lowered));
            match found {
                Some(persona) => {
                    if let Err(e) = store.add_participant(active_session, &persona).await {
                        eprintln!("{}", format!("Invite failed: {e}").red());
                    }
                }
                None => println!("{}", format!("No persona matching '{arg}'").yellow()),
            }
        }
        "clear" => match store.clear_history(active_session).await {
            Ok(()) => println!("{}", "History cleared (auto chat off)".green()),
            Err(e) => eprintln!("{}", format!("Clear failed: {e}").red()),
        },
        "models" => {
            let config = scheduler.global_config().await;
            if !config.is_configured() {
                println!("{}", "Set SALON_API_KEY first.".yellow());
                return;
            }
            let client = CompletionClient::new();
            match fetch_available_models(&client, &config.base_url, &config.api_key).await {
                Ok(catalog) => {
                    println!(
                        "{}",
                        format!(
                            "{} models via {}",
                            catalog.models.len(),
                            catalog.active_base_url
                        )
                        .green()
                    );
                    for model in catalog.models {
                        println!("  {model}");
                    }
                }
                Err(e) => eprintln!("{}", format!("Model listing failed: {e}").red()),
            }
        }
        "sessions" => {
            for (index, session) in store.list_sessions().await.iter().enumerate() {
                let marker = if session.id == *active_session {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {index}: {} ({} messages)",
                    session.name.bright_blue(),
                    session.messages.len()
                );
            }
        }
        "switch" => {
            let sessions = store.list_sessions().await;
            match arg.parse::<usize>().ok().and_then(|i| sessions.get(i)) {
                Some(session) => {
                    *active_session = session.id.clone();
                    println!("{}", format!("Switched to {}", session.name).green());
                }
                None => println!("{}", "Usage: /switch <index from /sessions>".bright_black()),
            }
        }
        "status" => {
            let auto = store.auto_flag(active_session).await;
            println!("Auto chat: {}", if auto { "on".green() } else { "off".red() });
            match scheduler.typing() {
                Some((session_id, persona_id)) => {
                    let name = registry
                        .get(&persona_id)
                        .await
                        .map(|p| p.name)
                        .unwrap_or(persona_id);
                    let location = if session_id == *active_session {
                        "here".to_string()
                    } else {
                        "another session".to_string()
                    };
                    println!("{}", format!("{name} is typing ({location})...").bright_black());
                }
                None => println!("{}", "Nobody is typing".bright_black()),
            }
        }
        other => {
            println!("{}", format!("Unknown command: /{other}").bright_black());
        }
    }
}
