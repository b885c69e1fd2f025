use cloud_vision_common::detection::DetectionResult;
use tracing::{info, warn};

use super::ResultSink;

/// Reports results through the log, one line per finding.
#[derive(Debug, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn apply(&self, seq: u64, result: DetectionResult) {
        match result {
            DetectionResult::Faces(faces) => {
                info!(seq, count = faces.len(), "found {} faces", faces.len());
                for face in faces {
                    info!(seq, left = face.left, top = face.top, right = face.right, bottom = face.bottom, "face");
                }
            }
            DetectionResult::Humans(humans) => {
                info!(seq, count = humans.len(), "found {} humans", humans.len());
            }
            DetectionResult::Object(Some(label)) => {
                info!(seq, label, "found object");
            }
            DetectionResult::Object(None) => {
                info!(seq, "no objects found");
            }
            DetectionResult::Services(services) => {
                info!(count = services.len(), "available services");
                for service in services {
                    info!(name = service.name, url = service.url, "service");
                }
            }
            DetectionResult::Failed(e) => {
                warn!(seq, error = %e, "call produced no result");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
