use clap::Parser;
use face_ng::config_loader::Settings;
use face_ng::controller::InteractionController;
use face_ng::ear::Ear;
use face_ng::engine;
use face_ng::render::LogRenderer;
use face_ng::runtime::{event_queue, ControlLoop};
use face_ng::service::{self, FaceService};
use face_ng::stt;
use face_ng::utterance::utterance_queue;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Voice-driven animated face daemon
#[derive(Parser)]
#[command(name = "face-ng")]
#[command(version)]
#[command(about = "Listens for the wake word, answers commands and drives the face", long_about = None)]
struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not open the microphone
    #[arg(long)]
    no_asr: bool,

    /// Never speak (replies still drive the face)
    #[arg(long)]
    no_tts: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("face-ng: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if cli.no_asr {
        settings.enable_asr = false;
    }
    if cli.no_tts {
        settings.enable_tts = false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,face_ng={}", settings.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Arc::new(settings)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Arc<Settings>) -> face_ng::error::FaceResult<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "face-ng starting");
    let cancel = CancellationToken::new();

    let output = tokio::task::spawn_blocking({
        let settings = settings.clone();
        move || engine::build_output(&settings)
    })
    .await
    .map_err(|e| face_ng::error::FaceError::Playback(e.to_string()))?;

    let (utter_tx, utter_rx) = utterance_queue();
    let (event_tx, event_rx) = event_queue();

    let ear = if settings.enable_asr {
        match stt::build_recognizer(&settings, tokio::runtime::Handle::current()) {
            Ok(recognizer) => {
                info!(backend = recognizer.id(), "speech recognition enabled");
                Some(Ear::spawn(settings.clone(), recognizer, utter_tx.clone(), cancel.clone())?)
            }
            Err(e) => {
                warn!(error = %e, "speech recognition unavailable, running without microphone");
                None
            }
        }
    } else {
        info!("speech recognition disabled by configuration");
        None
    };

    let controller = InteractionController::new(settings.clone(), output, Instant::now());
    let control = ControlLoop::new(
        controller,
        utter_rx,
        event_rx,
        Box::new(LogRenderer::new()),
        settings.frame_period(),
    );
    let status = control.subscribe();
    let control_task = tokio::spawn(control.run(cancel.clone()));

    // Held for the lifetime of the daemon; dropping it releases the name.
    let _bus = if settings.enable_dbus {
        match service::serve(FaceService::new(status, event_tx, utter_tx)).await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "D-Bus control surface unavailable");
                None
            }
        }
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    if let Err(e) = control_task.await {
        warn!(error = %e, "control loop ended abnormally");
    }

    if let Some(handle) = ear {
        let joined = tokio::time::timeout(
            CAPTURE_JOIN_TIMEOUT,
            tokio::task::spawn_blocking(move || handle.join()),
        )
        .await;
        if joined.is_err() {
            warn!("capture thread did not stop in time");
        }
    }

    Ok(())
}
