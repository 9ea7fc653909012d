mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::runtime::Handle;
use tokio::time::{sleep, timeout};
use tracing::info;

use cue_link::commands;
use cue_link::session::SessionEvent;
use cue_link::transport::WebSocketConnector;
use cue_link::{
    telemetry, Config, ConnectionState, FrameRate, MemoryTimeline, PollingScheduler, Session,
    TimelineHost,
};

use crate::cli::{Cli, Commands};

/// How long a request may wait for its reply once connected.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init("info")?;
    let cli = Cli::parse();
    let config = cli.config();
    config.validate()?;
    run(cli.command, config).await
}

async fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Download { timeline, fps } => {
            let mut doc = load_timeline(&timeline, fps).await?;
            let (session, scheduler) = open_session(config).await?;
            session.request_download()?;
            let event = pump_until(&session, &scheduler, &mut doc, |event| {
                matches!(
                    event,
                    SessionEvent::ProjectApplied(_) | SessionEvent::ProjectRejected(_)
                )
            })
            .await?;
            session.disconnect();
            match event {
                SessionEvent::ProjectApplied(report) => {
                    save_timeline(&timeline, &doc).await?;
                    println!(
                        "Applied {} scenes, {} markers, {} zones on channel {}",
                        report.created_scenes,
                        report.created_markers,
                        report.created_zones,
                        report.channel
                    );
                }
                SessionEvent::ProjectRejected(err) => bail!("server sent an invalid project: {err}"),
                _ => {}
            }
        }
        Commands::Upload { timeline } => {
            let doc = load_timeline(&timeline, None).await?;
            let flush = config.drain_interval;
            let (session, _scheduler) = open_session(config).await?;
            let scenes = session.upload_project(&doc)?;
            // Give the socket a moment to write the frame before closing.
            sleep(flush).await;
            session.disconnect();
            println!("Uploaded {scenes} scenes");
        }
        Commands::Sources => {
            let mut doc = MemoryTimeline::default();
            let (session, scheduler) = open_session(config).await?;
            session.request_sources()?;
            let event = pump_until(&session, &scheduler, &mut doc, |event| {
                matches!(event, SessionEvent::Sources(_))
            })
            .await?;
            session.disconnect();
            if let SessionEvent::Sources(sources) = event {
                if sources.is_empty() {
                    println!("No sources reported.");
                }
                for source in sources {
                    println!("{source}");
                }
            }
        }
        Commands::AddCue {
            timeline,
            frame,
            text,
            no_prefix,
        } => {
            let mut doc = load_timeline(&timeline, None).await?;
            doc.current_frame = frame;
            let id = commands::add_cue_marker(&mut doc, &text, !no_prefix);
            let name = doc.marker(id).map(|m| m.name.clone()).unwrap_or_default();
            save_timeline(&timeline, &doc).await?;
            println!("Added marker \"{name}\" at frame {frame}");
        }
        Commands::AddScene {
            timeline,
            frame,
            name,
        } => {
            let mut doc = load_timeline(&timeline, None).await?;
            doc.current_frame = frame;
            let id = commands::add_scene(&mut doc, &name);
            let channel = doc.strip(id).map(|s| s.channel).unwrap_or_default();
            save_timeline(&timeline, &doc).await?;
            println!("Added scene \"{name}\" on channel {channel}");
        }
    }
    Ok(())
}

async fn load_timeline(path: &Path, fps: Option<f64>) -> Result<MemoryTimeline> {
    let mut doc = match tokio::fs::read_to_string(path).await {
        Ok(text) => MemoryTimeline::from_json(&text)
            .with_context(|| format!("failed to parse timeline {}", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "starting a new timeline");
            MemoryTimeline::default()
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    if let Some(fps) = fps {
        doc.frame_rate = FrameRate::new(fps)?;
    }
    Ok(doc)
}

async fn save_timeline(path: &Path, doc: &MemoryTimeline) -> Result<()> {
    let text = doc.to_json()?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Connects and waits for the socket to open.
async fn open_session(config: Config) -> Result<(Session, Arc<PollingScheduler>)> {
    let scheduler = Arc::new(PollingScheduler::new(config.drain_interval));
    let connect_timeout = config.connect_timeout;
    let session = Session::new(
        config,
        Arc::new(WebSocketConnector),
        scheduler.clone(),
        Handle::current(),
    );
    session.connect_configured()?;

    // The session enforces its own connect timeout; this only bounds the wait.
    let opened = timeout(connect_timeout + Duration::from_secs(1), async {
        loop {
            match session.state() {
                ConnectionState::Connecting => sleep(Duration::from_millis(20)).await,
                state => return state,
            }
        }
    })
    .await;
    match opened {
        Ok(ConnectionState::Connected) => Ok((session, scheduler)),
        Ok(state) => Err(anyhow!(
            "{state}: {}",
            session.config().server_url()?
        )),
        Err(_) => Err(anyhow!("timed out connecting to {}", session.config().server_url()?)),
    }
}

/// Drains on every tick until `done` accepts an event or the reply deadline
/// passes.
async fn pump_until<F>(
    session: &Session,
    scheduler: &PollingScheduler,
    doc: &mut MemoryTimeline,
    done: F,
) -> Result<SessionEvent>
where
    F: Fn(&SessionEvent) -> bool,
{
    let event = timeout(REPLY_TIMEOUT, session.drain_until(scheduler, doc, done))
        .await
        .map_err(|_| anyhow!("no reply from the server within {REPLY_TIMEOUT:?}"))?
        .context("connection lost while waiting for the server")?;
    Ok(event)
}
