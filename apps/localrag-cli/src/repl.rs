use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use localrag_core::config::Settings;
use localrag_llm::OllamaClient;
use localrag_rag::{format_results, ChatSession, RagOrchestrator};

use crate::commands::ReplyPrinter;

pub const HELP: &str = "\
Commands:
  /help            show this help
  /clear           forget the conversation so far
  /rag on|off      ground answers on retrieved chunks
  /stream on|off   print answers as they are generated
  /k N             number of chunks to retrieve
  /model NAME      switch model
  /models          list models installed on the server
  /history         show the conversation so far
  /quit            leave
Anything else is sent as a question.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    Help,
    Clear,
    Rag(bool),
    Stream(bool),
    K(usize),
    Model(String),
    Models,
    History,
    Quit,
    Empty,
}

/// Parse one input line. Errors are user-facing messages.
pub fn parse_line(line: &str, max_k: usize) -> Result<ReplCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplCommand::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ReplCommand::Ask(line.to_string()));
    };
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    match (name, arg) {
        ("help" | "h" | "?", _) => Ok(ReplCommand::Help),
        ("clear", _) => Ok(ReplCommand::Clear),
        ("rag", Some(v)) => on_off(v).map(ReplCommand::Rag),
        ("stream", Some(v)) => on_off(v).map(ReplCommand::Stream),
        ("k", Some(v)) => match v.parse::<usize>() {
            Ok(k) if (1..=max_k).contains(&k) => Ok(ReplCommand::K(k)),
            _ => Err(format!("k must be a number between 1 and {max_k}")),
        },
        ("model", Some(m)) => Ok(ReplCommand::Model(m.to_string())),
        ("models", _) => Ok(ReplCommand::Models),
        ("history", _) => Ok(ReplCommand::History),
        ("quit" | "exit" | "q", _) => Ok(ReplCommand::Quit),
        ("rag" | "stream" | "k" | "model", None) => Err(format!("/{name} needs an argument (see /help)")),
        _ => Err(format!("unknown command /{name} (see /help)")),
    }
}

fn on_off(v: &str) -> Result<bool, String> {
    match v {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected on or off, got {v}")),
    }
}

fn prompt(session: &ChatSession) -> std::io::Result<()> {
    let o = &session.options;
    let mut out = std::io::stdout().lock();
    write!(out, "\n[{} | rag {} | k {} | stream {}] > ", o.model, flag(o.use_retrieval), o.k, flag(o.stream))?;
    out.flush()
}

fn flag(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub async fn run(settings: &Settings, orchestrator: &RagOrchestrator, client: &OllamaClient, mut session: ChatSession) -> Result<()> {
    println!("localrag chat: {} chunks indexed. Type /help for commands.", orchestrator.retriever().knowledge_base().ntotal());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&session)?;
        let Some(line) = lines.next_line().await? else { break };
        let command = match parse_line(&line, settings.retrieval.max_k) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
            ReplCommand::Clear => {
                session.clear();
                println!("Conversation cleared.");
            }
            ReplCommand::Rag(on) => session.options.use_retrieval = on,
            ReplCommand::Stream(on) => session.options.stream = on,
            ReplCommand::K(k) => session.options.k = k,
            ReplCommand::Model(model) => session.options.model = model,
            ReplCommand::Models => match client.list_models().await {
                Ok(models) if models.is_empty() => println!("No models installed."),
                Ok(models) => models.iter().for_each(|m| println!("  {m}")),
                Err(e) => println!("Could not list models: {e}"),
            },
            ReplCommand::History => {
                for (i, turn) in session.history().iter().enumerate() {
                    println!("#{} Q: {}\n   A: {}", i + 1, turn.query, turn.answer);
                }
            }
            ReplCommand::Ask(query) => {
                let mut printer = ReplyPrinter::default();
                let mut print_error = None;
                let outcome = session
                    .respond(orchestrator, &query, |reply| {
                        if let Err(e) = printer.print(reply) {
                            print_error.get_or_insert(e);
                        }
                    })
                    .await;
                println!();
                if let Some(e) = print_error {
                    return Err(e.into());
                }
                match outcome {
                    Ok(Some(reply)) if session.options.use_retrieval => {
                        println!("\n🔍 Retrieved context\n{}", format_results(&reply.results));
                    }
                    Ok(_) => {}
                    Err(e) => println!("❌ {e}"),
                }
            }
        }
    }
    Ok(())
}
