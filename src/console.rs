use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use pluto_wallet_bridge::bridge::{BridgeServer, ConfirmationUi, PromptBody, PromptView, RequestId};

/// Prints prompts to the terminal; decisions are typed back in.
pub struct TerminalUi;

impl ConfirmationUi for TerminalUi {
    fn present(&self, view: &PromptView) {
        println!();
        println!("📝 {} [{}]", view.title, view.id.0);
        println!("   {}", view.description);
        println!("   Origin: {}", view.origin);
        match &view.body {
            PromptBody::Message { text, hex } => {
                println!("   Message: {}", text);
                if !hex.is_empty() {
                    println!("   Hex: {}", hex);
                }
            }
            PromptBody::Transaction { preview } => {
                println!(
                    "   Instructions: {}  Accounts: {}  Size: {} bytes",
                    preview.instruction_count, preview.account_count, preview.byte_size
                );
                println!("   Blockhash: {}", preview.blockhash);
            }
            PromptBody::UndecodableTransaction { error } => {
                println!("   Unable to decode transaction: {}", error);
            }
            PromptBody::SignIn { domain, statement } => {
                if let Some(domain) = domain {
                    println!("   Domain: {}", domain);
                }
                if let Some(statement) = statement {
                    println!("   Statement: {}", statement);
                }
            }
        }
        println!("   → approve {0} ({1}) | reject {0}", view.id.0, view.primary_label);
    }

    fn dismiss(&self, id: RequestId) {
        println!("⌛ Prompt {} closed", id.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Approve(RequestId),
    Reject(RequestId),
    List,
    Enable,
    Disable,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or("help");
    let id = |arg: Option<&str>| {
        arg.ok_or_else(|| format!("{} needs a prompt id", verb))?
            .parse::<u64>()
            .map(RequestId)
            .map_err(|e| format!("invalid prompt id: {}", e))
    };

    match verb {
        "approve" | "a" => id(words.next()).map(Command::Approve),
        "reject" | "r" => id(words.next()).map(Command::Reject),
        "list" | "ls" => Ok(Command::List),
        "enable" => Ok(Command::Enable),
        "disable" => Ok(Command::Disable),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command: {}", other)),
    }
}

fn print_help() {
    println!("Commands: approve <id> | reject <id> | list | enable | disable | quit");
}

/// Reads commands until `quit` or end of input.
pub async fn run(server: Arc<BridgeServer>) -> anyhow::Result<()> {
    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Approve(id)) => match server.decide(id, true) {
                Ok(()) => println!("✅ Approved {}", id.0),
                Err(e) => println!("❌ {}", e),
            },
            Ok(Command::Reject(id)) => match server.decide(id, false) {
                Ok(()) => println!("🚫 Rejected {}", id.0),
                Err(e) => println!("❌ {}", e),
            },
            Ok(Command::List) => {
                let prompts = server.pending_prompts();
                if prompts.is_empty() {
                    println!("No pending requests ({} pages connected)", server.session_count());
                }
                for prompt in prompts {
                    println!(
                        "  [{}] {} from {} at {}",
                        prompt.id.0,
                        prompt.request.tag().label(),
                        prompt.origin,
                        prompt.created_at.format("%H:%M:%S")
                    );
                }
            }
            Ok(Command::Enable) => server.set_enabled(true),
            Ok(Command::Disable) => server.set_enabled(false),
            Ok(Command::Help) => print_help(),
            Ok(Command::Quit) => break,
            Err(e) => println!("❌ {}", e),
        }
    }
    Ok(())
}
