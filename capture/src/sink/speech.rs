use std::time::Duration;

use cloud_vision_common::detection::DetectionResult;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::ResultSink;

/// Speaks results through an external text-to-speech command.
///
/// Utterances are queued to a single speaker task so they never overlap,
/// whichever thread the result arrives on.
pub struct SpeechSink {
    tx: mpsc::UnboundedSender<String>,
}

/// Handle on the speaker task, used to let queued utterances finish.
pub struct SpeechWorker {
    handle: JoinHandle<()>,
}

impl SpeechSink {
    /// Spawn the speaker task on the current runtime.
    pub fn spawn(command: String) -> (Self, SpeechWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_speaker(command, rx));
        (Self { tx }, SpeechWorker { handle })
    }

    fn say(&self, text: String) {
        if self.tx.send(text).is_err() {
            debug!("speaker task gone, dropping utterance");
        }
    }
}

impl ResultSink for SpeechSink {
    fn apply(&self, _seq: u64, result: DetectionResult) {
        for text in utterances(&result) {
            self.say(text);
        }
    }

    fn name(&self) -> &str {
        "speech"
    }
}

impl SpeechWorker {
    /// Wait for the queue to drain once every sink handle has been dropped.
    pub async fn drain(self, limit: Duration) {
        if tokio::time::timeout(limit, self.handle).await.is_err() {
            warn!(limit_ms = limit.as_millis() as u64, "speech queue did not drain in time");
        }
    }
}

/// What to say for a result. Failures stay silent.
fn utterances(result: &DetectionResult) -> Vec<String> {
    match result {
        DetectionResult::Services(services) => services.iter().map(|s| s.name.clone()).collect(),
        DetectionResult::Object(Some(label)) => vec![label.clone()],
        DetectionResult::Faces(faces) if !faces.is_empty() => {
            vec![plural(faces.len(), "face", "faces")]
        }
        DetectionResult::Humans(humans) if !humans.is_empty() => {
            vec![plural(humans.len(), "human", "humans")]
        }
        _ => Vec::new(),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("I see one {one}")
    } else {
        format!("I see {n} {many}")
    }
}

async fn run_speaker(command: String, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        match Command::new(&command)
            .arg(&text)
            .stdout(std::process::Stdio::null())
            .status()
            .await
        {
            Ok(status) if status.success() => {
                debug!(text, "spoke");
            }
            Ok(status) => {
                warn!(command, %status, "speech command exited with error");
            }
            Err(e) => {
                warn!(command, error = %e, "failed to run speech command");
            }
        }
    }
    debug!("speaker task finished");
}
