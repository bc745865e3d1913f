use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use arena_mirror::{load_mirror_config_from_env, MirrorConfig, Session, TcpChannel};
use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::runtime::Handle;
use tracing::info;

mod app;
mod ui;

use app::InspectorApp;

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Arena mirror terminal inspector", long_about = None)]
struct Cli {
    /// Address of the simulator stream. Overrides the config file.
    #[arg(long)]
    endpoint: Option<String>,
    /// Mirror config JSON. Defaults to ARENA_MIRROR_CONFIG_PATH, then builtin values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Access token presented when the stream opens. Prefer ARENA_MIRROR_TOKEN.
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = MirrorConfig::from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => load_mirror_config_from_env().0,
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(token) = cli.token {
        config.credential = token;
    }
    info!("Connecting to arena stream at {}", config.endpoint);

    let (channel, receiver) = TcpChannel::new(Handle::current(), config.transport_settings());
    let session = Session::new(channel, config.event_log_capacity);
    let credential = config.credential();
    let render_interval = config.render_interval();

    let ui_handle = std::thread::spawn(move || -> Result<()> {
        let app = InspectorApp::new(session, credential, receiver, log_rx, render_interval)?;
        app.run()
    });

    match tokio::task::spawn_blocking(move || ui_handle.join()).await? {
        Ok(result) => result,
        Err(_) => Err(eyre!("inspector UI thread panicked")),
    }
}
