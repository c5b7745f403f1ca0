//! Interactive REPL over a shared state registry
//!
//! Every namespace touched from the REPL is persistent. `watch` binds a
//! printer to a namespace so later updates are echoed as they happen.

use crate::state::{Binding, StateRegistry, StoreOptions};
use anyhow::{bail, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::collections::HashMap;

const HELP: &str = "\
commands:
  get <namespace>              show the current value
  set <namespace> <value>      update (or create) a persistent namespace
  persist <namespace> <value>  registry persist: stored value wins for new namespaces
  clear <namespace>            delete the persisted entry (memory is kept)
  watch <namespace>            print every update of an existing namespace
  unwatch <namespace>          stop printing updates
  list                         show all namespaces in this session
  help                         this text
  exit | quit                  leave";

/// A parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get(String),
    Set(String, Value),
    Persist(String, Value),
    Clear(String),
    Watch(String),
    Unwatch(String),
    List,
    Help,
    Exit,
}

/// Result of executing a command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(String, Value),
    Done(String),
    Listing(Vec<(String, Value)>),
    Help,
    Exit,
}

/// Parse a value argument: JSON when it parses, a plain string otherwise
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Parse one input line
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let namespace = |rest: &str| -> Result<String> {
        match rest.split_whitespace().next() {
            Some(ns) => Ok(ns.to_string()),
            None => bail!("'{}' needs a namespace", word),
        }
    };
    let namespace_and_value = |rest: &str| -> Result<(String, Value)> {
        match rest.split_once(char::is_whitespace) {
            Some((ns, value)) if !value.trim().is_empty() => {
                Ok((ns.to_string(), parse_value(value.trim())))
            }
            _ => bail!("'{}' needs a namespace and a value", word),
        }
    };

    Ok(match word {
        "get" => Command::Get(namespace(rest)?),
        "set" => {
            let (ns, value) = namespace_and_value(rest)?;
            Command::Set(ns, value)
        }
        "persist" => {
            let (ns, value) = namespace_and_value(rest)?;
            Command::Persist(ns, value)
        }
        "clear" => Command::Clear(namespace(rest)?),
        "watch" => Command::Watch(namespace(rest)?),
        "unwatch" => Command::Unwatch(namespace(rest)?),
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "exit" | "quit" => Command::Exit,
        other => bail!("unknown command '{}' (try 'help')", other),
    })
}

/// REPL session state
pub struct Session<'a> {
    registry: &'a StateRegistry,
    watches: HashMap<String, Binding<Value>>,
}

impl<'a> Session<'a> {
    pub fn new(registry: &'a StateRegistry) -> Self {
        Self {
            registry,
            watches: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &StateRegistry {
        self.registry
    }

    pub fn is_watching(&self, namespace: &str) -> bool {
        self.watches.contains_key(namespace)
    }

    /// Execute a parsed command
    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        let persistent = StoreOptions::persistent();

        let reply = match command {
            Command::Get(ns) => {
                // Reading must not seed storage for an unknown namespace
                let value = self.registry.peek(&ns).unwrap_or(Value::Null);
                Reply::Value(ns, value)
            }
            Command::Set(ns, value) => {
                let cell = self.registry.get_or_create(&ns, value.clone(), persistent)?;
                cell.update(value.clone());
                Reply::Value(ns, value)
            }
            Command::Persist(ns, value) => {
                self.registry.persist(&ns, value)?;
                let value = self.registry.get(&ns).map(|c| c.value()).unwrap_or_default();
                Reply::Value(ns, value)
            }
            Command::Clear(ns) => {
                self.registry.clear_persisted(&ns);
                Reply::Done(format!("cleared persisted entry for '{}'", ns))
            }
            Command::Watch(ns) => {
                if self.watches.contains_key(&ns) {
                    return Ok(Reply::Done(format!("already watching '{}'", ns)));
                }
                let Some(current) = self.registry.peek(&ns) else {
                    bail!("'{}' has no value yet; set it before watching", ns);
                };
                let label = ns.clone();
                let binding = self.registry.bind(&ns, current, persistent, move |v| {
                    println!("{} {} = {}", "~".yellow(), label.cyan(), v);
                })?;
                self.watches.insert(ns.clone(), binding);
                Reply::Done(format!("watching '{}'", ns))
            }
            Command::Unwatch(ns) => match self.watches.remove(&ns) {
                Some(_) => Reply::Done(format!("stopped watching '{}'", ns)),
                None => Reply::Done(format!("not watching '{}'", ns)),
            },
            Command::List => Reply::Listing(
                self.registry
                    .namespaces()
                    .into_iter()
                    .filter_map(|ns| self.registry.get(&ns).map(|c| (ns, c.value())))
                    .collect(),
            ),
            Command::Help => Reply::Help,
            Command::Exit => Reply::Exit,
        };
        Ok(reply)
    }
}

/// Print a reply to stdout
pub fn render(reply: &Reply) {
    match reply {
        Reply::Value(ns, value) => println!("{} = {}", ns.cyan(), value),
        Reply::Done(msg) => println!("{}", msg.green()),
        Reply::Listing(entries) if entries.is_empty() => println!("{}", "(no namespaces)".dimmed()),
        Reply::Listing(entries) => {
            for (ns, value) in entries {
                println!("  {} = {}", ns.cyan(), value);
            }
        }
        Reply::Help => println!("{}", HELP),
        Reply::Exit => {}
    }
}

/// Run the interactive shell until `exit` or end of input
pub fn run_repl(registry: &StateRegistry) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = Session::new(registry);

    println!("{}", "shared-store REPL, type 'help' for commands".bold());

    loop {
        match rl.readline("store> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                let result = parse_command(&line).and_then(|cmd| session.execute(cmd));
                match result {
                    Ok(Reply::Exit) => break,
                    Ok(reply) => render(&reply),
                    Err(e) => println!("{} {}", "error:".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
