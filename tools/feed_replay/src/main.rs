use std::{
    fs, iter,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use arena_mirror::transport::{read_envelope, write_envelope};
use arena_proto::{RawEnvelope, MAX_FRAME_LEN};
use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Replays a scripted arena stream to mirror clients", long_about = None)]
struct Args {
    /// Address to accept mirror clients on
    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// JSON-lines file of envelopes ({"event": ..., "data": ...}); '#' starts a comment line
    #[arg(long)]
    script: PathBuf,

    /// Token clients must present; any token is accepted when omitted
    #[arg(long)]
    token: Option<String>,

    /// Delay between scripted envelopes (milliseconds)
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Restart the script (minus its first envelope) once it ends
    #[arg(long = "loop")]
    repeat: bool,
}

struct ReplayPlan {
    envelopes: Vec<RawEnvelope>,
    token: Option<String>,
    interval: Duration,
    repeat: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let envelopes = load_script(&args.script)?;
    if envelopes.is_empty() {
        bail!("script {} contains no envelopes", args.script.display());
    }
    if args.repeat && envelopes.len() == 1 {
        warn!("--loop has nothing to repeat after the first envelope; playing once");
    }
    let plan = Arc::new(ReplayPlan {
        envelopes,
        token: args.token,
        interval: Duration::from_millis(args.interval_ms),
        repeat: args.repeat,
    });

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind replay server at {}", args.bind))?;
    info!(
        bind = %args.bind,
        envelopes = plan.envelopes.len(),
        "Arena replay server ready"
    );

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Mirror client connected: {}", addr);
        let plan = Arc::clone(&plan);
        tokio::spawn(async move {
            if let Err(err) = serve_client(stream, &plan).await {
                warn!("Dropping mirror client {}: {:#}", addr, err);
            }
        });
    }
}

async fn serve_client(mut stream: TcpStream, plan: &ReplayPlan) -> Result<()> {
    stream.set_nodelay(true)?;
    let hello = tokio::time::timeout(AUTH_TIMEOUT, read_envelope(&mut stream, MAX_FRAME_LEN))
        .await
        .context("client sent no auth frame")??;
    let presented = hello.auth_token();
    if let Some(expected) = plan.token.as_deref() {
        if presented != Some(expected) {
            write_envelope(&mut stream, &RawEnvelope::disconnect()).await?;
            bail!("rejected client with invalid token");
        }
    }

    write_envelope(&mut stream, &RawEnvelope::connect()).await?;
    for round in replay_rounds(&plan.envelopes, plan.repeat) {
        for envelope in round {
            write_envelope(&mut stream, envelope).await?;
            tokio::time::sleep(plan.interval).await;
        }
    }

    write_envelope(&mut stream, &RawEnvelope::disconnect()).await?;
    Ok(())
}

/// The whole script, then with `repeat` everything after the opening
/// snapshot, forever. A script with nothing after its snapshot plays once.
fn replay_rounds(
    envelopes: &[RawEnvelope],
    repeat: bool,
) -> impl Iterator<Item = &[RawEnvelope]> {
    let rest = envelopes.get(1..).unwrap_or_default();
    let repeats = if repeat && !rest.is_empty() {
        usize::MAX
    } else {
        0
    };
    iter::once(envelopes).chain(iter::repeat(rest).take(repeats))
}

fn load_script(path: &Path) -> Result<Vec<RawEnvelope>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script at {}", path.display()))?;
    parse_script(&contents).with_context(|| format!("Invalid script {}", path.display()))
}

fn parse_script(contents: &str) -> Result<Vec<RawEnvelope>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(number, line)| {
            serde_json::from_str::<RawEnvelope>(line)
                .with_context(|| format!("line {} is not an envelope", number + 1))
        })
        .collect()
}
