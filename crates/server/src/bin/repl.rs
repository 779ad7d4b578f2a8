//! Text-mode call runner
//!
//! Plays the prospect from the terminal against the configured collaborators.
//! Usage: `cold-call-repl [context.json]`. Type `state`, `summary` or `quit`
//! at any point.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use cold_call_config::{load_settings, Settings};
use cold_call_core::CallContext;
use cold_call_server::AppState;

const SESSION_ID: &str = "repl";

fn demo_context() -> CallContext {
    CallContext::new("James")
        .with_title("VP of Sales")
        .with_company("TechCorp")
        .with_industry("SaaS")
        .with_company_size("50")
        .with_hook("recently posted 3 SDR job openings on LinkedIn")
        .with_pain_hypothesis("scaling outbound is hard with a small team")
}

fn load_context(path: Option<String>) -> anyhow::Result<CallContext> {
    let Some(path) = path else {
        return Ok(demo_context());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid call context in {}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("COLD_CALL_ENV").ok();
    let settings = load_settings(env.as_deref()).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    // Logs go to stderr and stay quiet unless RUST_LOG asks for more
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let context = load_context(std::env::args().nth(1))?;
    let state = AppState::new(settings).context("Failed to build collaborators")?;
    let calls = &state.calls;

    println!("{}", "=".repeat(60));
    println!(
        "  Cold call: {} ({}, {})",
        context.prospect_name, context.prospect_title, context.prospect_company
    );
    println!("  Commands: state | summary | quit");
    println!("{}\n", "=".repeat(60));

    let opening = calls.start(SESSION_ID, context).await?;
    println!("[{}] Agent: {}\n", opening.state, opening.agent_message);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "quit" | "exit" => break,
            "state" => {
                let summary = calls.summary(SESSION_ID).await?;
                let valid: Vec<&str> =
                    summary.state.valid_triggers().iter().map(|t| t.as_str()).collect();
                println!("  state: {}  valid triggers: {}\n", summary.state, valid.join(", "));
                continue;
            }
            "summary" => {
                let summary = calls.summary(SESSION_ID).await?;
                println!("{}\n", serde_json::to_string_pretty(&summary)?);
                continue;
            }
            _ => {}
        }

        match calls.turn(SESSION_ID, input).await {
            Ok(result) => {
                println!("[{}] Agent: {}\n", result.state, result.agent_message);
                if result.is_call_over {
                    break;
                }
            }
            Err(e) => println!("  error: {}\n", e),
        }
    }

    let summary = calls.summary(SESSION_ID).await?;
    let visited: Vec<String> = summary.states_visited.iter().map(|s| s.to_string()).collect();
    println!("{}", "=".repeat(60));
    println!("  Outcome: {:?}", summary.outcome);
    println!("  Turns: {}", summary.total_turns);
    println!("  States: {}", visited.join(" → "));
    println!("{}", "=".repeat(60));

    Ok(())
}
