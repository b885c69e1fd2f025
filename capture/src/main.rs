mod cli;
mod encoder;
mod pipeline;
mod sampler;
mod sink;
#[cfg(test)]
mod testing;
mod viewer;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cloud_vision_client::{ClientError, CloudRequest, Completion, Dispatcher, PlatformClient, RequestKind};
use cloud_vision_common::config::Config;
use cloud_vision_common::detection::{CallError, DetectionResult};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::cli::{Cli, Command, DetectArgs};
use crate::encoder::CodecEncoder;
use crate::pipeline::{CaptureLoop, StopCondition, StopSignal};
use crate::sampler::{HttpSnapshotSampler, SampleError, Sampler, StillImageSampler};
use crate::sink::log::LogSink;
use crate::sink::overlay::{Canvas, OverlaySink};
use crate::sink::speech::{SpeechSink, SpeechWorker};
use crate::sink::{FanoutSink, ResultSink};
use crate::viewer::{Viewer, ViewerError};

const VIEWER_SHUTDOWN: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(#[from] SampleError),
    #[error("platform client: {0}")]
    Client(#[from] ClientError),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
    #[error("no reply from platform within {0:?}")]
    ServicesTimeout(Duration),
    #[error("services request failed: {0}")]
    Services(CallError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        platform = config.platform.base_url(),
        camera = config.camera.url,
        "starting cloud-vision"
    );

    let result = match cli.command {
        Command::Face { detect, fast } => {
            run_detection(&config, detect, RequestKind::FaceDetection { fast }).await
        }
        Command::Human { detect } => run_detection(&config, detect, RequestKind::HumanDetection).await,
        Command::Object { detect } => {
            run_detection(&config, detect, RequestKind::ObjectRecognition).await
        }
        Command::Services { speak } => run_services(&config, speak).await,
    };

    if let Err(e) = result {
        error!(error = %e, "cloud-vision failed");
        std::process::exit(1);
    }
}

async fn run_detection(config: &Config, args: DetectArgs, kind: RequestKind) -> Result<(), AppError> {
    match (&args.image, &args.device) {
        (Some(path), _) => {
            info!(path = %path.display(), "using still image");
            let sampler = StillImageSampler::open(path)?;
            drive(config, sampler, kind, args.once).await
        }
        (None, device) => {
            let camera = match device {
                Some(d) => config.camera.with_device(d),
                None => config.camera.clone(),
            };
            let sampler = HttpSnapshotSampler::new(&camera)?;
            info!(url = sampler.url(), "using camera");
            drive(config, sampler, kind, args.once).await
        }
    }
}

async fn drive<S: Sampler>(
    config: &Config,
    mut sampler: S,
    kind: RequestKind,
    once: bool,
) -> Result<(), AppError> {
    // A source that cannot deliver a single frame at startup is fatal.
    let probe = sampler.try_capture().await?;
    info!(width = probe.width(), height = probe.height(), "frame source ready");

    let client = PlatformClient::new(&config.platform)?;
    let stop = StopSignal::new();
    watch_for_stop(stop.clone(), !once);

    let mut sinks: Vec<Arc<dyn ResultSink>> = vec![Arc::new(LogSink)];

    let mut viewer_task = None;
    if config.viewer.enabled && !once {
        let canvas = Arc::new(Canvas::new());
        canvas.set_frame(&probe);
        sinks.push(Arc::new(OverlaySink::new(Arc::clone(&canvas))));
        let viewer = Viewer::bind(&config.viewer.bind, kind.name(), canvas, stop.clone()).await?;
        viewer_task = Some(tokio::spawn(viewer.serve()));
    }
    drop(probe);

    let speech = speech_sink(config, config.speech.enabled, &mut sinks);

    let condition = if once {
        StopCondition::any(vec![
            StopCondition::single_shot(),
            StopCondition::signal(stop.clone()),
        ])
    } else {
        StopCondition::signal(stop.clone())
    };

    let fanout = FanoutSink::new(sinks);
    info!(sinks = fanout.len(), once, "result sinks ready");

    let mut capture = CaptureLoop::new(
        sampler,
        CodecEncoder::new(&config.encoder),
        client,
        Arc::new(fanout),
        kind,
    );
    capture
        .configure(config.capture.min_interval(), condition)
        .set_poll_interval(config.capture.poll_interval());

    let stats = capture.run().await;
    let slot = capture.call_slot();
    drop(capture);

    if once && slot.is_busy() {
        let grace = config.capture.once_grace();
        info!(grace_ms = grace.as_millis() as u64, "waiting for the reply");
        if tokio::time::timeout(grace, slot.wait_idle(config.capture.poll_interval()))
            .await
            .is_err()
        {
            warn!("no reply within the grace period, exiting anyway");
        }
    }

    stop.raise();
    if let Some(task) = viewer_task {
        match tokio::time::timeout(VIEWER_SHUTDOWN, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "viewer stopped with error"),
            Ok(Err(e)) => warn!(error = %e, "viewer task failed"),
            Err(_) => warn!("viewer did not shut down in time"),
        }
    }
    if let Some(worker) = speech {
        worker.drain(config.capture.once_grace()).await;
    }

    info!(
        dispatches = stats.dispatches,
        sample_failures = stats.sample_failures,
        "cloud-vision finished"
    );
    Ok(())
}

async fn run_services(config: &Config, speak: bool) -> Result<(), AppError> {
    let client = PlatformClient::new(&config.platform)?;
    let mut sinks: Vec<Arc<dyn ResultSink>> = vec![Arc::new(LogSink)];
    let speech = speech_sink(config, speak, &mut sinks);
    let sink = FanoutSink::new(sinks);

    let (tx, rx) = oneshot::channel();
    client.dispatch(
        CloudRequest::AvailableServices,
        Completion::new(move |result| {
            let _ = tx.send(result);
        }),
    );

    let limit = config.platform.connect_timeout() + config.platform.request_timeout();
    let result = tokio::time::timeout(limit, rx)
        .await
        .map_err(|_| AppError::ServicesTimeout(limit))?
        .unwrap_or(DetectionResult::Failed(CallError::Abandoned));

    let outcome = match &result {
        DetectionResult::Failed(e) => Err(AppError::Services(e.clone())),
        DetectionResult::Services(services) => {
            for service in services {
                println!("{}\t{}", service.name, service.url);
            }
            Ok(())
        }
        _ => Ok(()),
    };
    sink.apply(0, result);
    drop(sink);

    if let Some(worker) = speech {
        worker.drain(limit).await;
    }
    outcome
}

fn speech_sink(config: &Config, enabled: bool, sinks: &mut Vec<Arc<dyn ResultSink>>) -> Option<SpeechWorker> {
    if !enabled {
        return None;
    }
    let (sink, worker) = SpeechSink::spawn(config.speech.command.clone());
    sinks.push(Arc::new(sink));
    Some(worker)
}

/// Raise `stop` on Ctrl-C and, when `keypress` is set, on Enter.
fn watch_for_stop(stop: StopSignal, keypress: bool) {
    let signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            signal.raise();
        }
    });

    if keypress {
        // Detached thread: tokio's stdin reader would keep the runtime alive on exit.
        std::thread::spawn(move || {
            let mut line = String::new();
            if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
                info!("key pressed, stopping");
                stop.raise();
            }
        });
    }
}
