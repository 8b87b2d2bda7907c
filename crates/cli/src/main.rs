use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "munbot")]
#[command(about = "MunBoT gateway CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the gateway (WhatsApp webhook, bridge socket, browser socket, health).
    Gateway {
        /// Config file path (default: MUNBOT_CONFIG_PATH or ~/.munbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP and WebSocket port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat through the bridge socket of a running gateway (interactive).
    Chat {
        /// Config file path (default: MUNBOT_CONFIG_PATH or ~/.munbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Sender number to present to the gateway.
        #[arg(long, short, value_name = "PHONE", default_value = "+10000000000")]
        number: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("munbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, number }) => {
            if let Err(e) = run_chat(config, number).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = munbot::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    munbot::gateway::run_gateway(config).await
}

/// Any frame the bridge socket writes: a reply, an error, or a fanned-out webhook message.
#[derive(Debug, Deserialize)]
struct ServerFrame {
    reply: Option<String>,
    error: Option<String>,
    number: Option<String>,
    text: Option<String>,
}

fn print_frame(text: &str) {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame { reply: Some(r), .. }) => println!("< {}", r.trim()),
        Ok(ServerFrame { error: Some(e), .. }) => eprintln!("! {}", e),
        Ok(ServerFrame {
            number: Some(n),
            text: Some(t),
            ..
        }) => println!("[wa {}] {}", n, t),
        _ => println!("? {}", text),
    }
}

async fn run_chat(config_path: Option<std::path::PathBuf>, number: String) -> anyhow::Result<()> {
    let (config, _) = munbot::config::load_config(config_path)?;
    let ws_url = format!(
        "ws://{}:{}/ws",
        config.gateway.bind.trim(),
        config.gateway.port
    );
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url).await?;
    log::info!("connected to {}", ws_url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
                    break;
                }
                let frame = serde_json::json!({ "number": number, "text": input });
                ws.send(Message::Text(frame.to_string())).await?;
                // The bridge answers each frame in order; wait for this one's reply, printing
                // any fan-out frames that arrive first.
                while let Some(msg) = ws.next().await {
                    let Message::Text(text) = msg? else { continue };
                    print_frame(&text);
                    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
                    if parsed.get("reply").is_some() || parsed.get("error").is_some() {
                        break;
                    }
                }
            }
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        println!();
                        print_frame(&text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        println!();
                        log::info!("gateway closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }

    let _ = ws.close(None).await;
    Ok(())
}
