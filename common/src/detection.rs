use serde::Serialize;

/// Axis-aligned box in pixel coordinates of the frame that was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    /// Build a region from two opposite corners in any order.
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            left: x0.min(x1),
            top: y0.min(y1),
            right: x0.max(x1),
            bottom: y0.max(y1),
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub url: String,
}

/// Why a remote call produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("platform returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("call abandoned before completion")]
    Abandoned,
}

/// Typed outcome delivered to a completion handler, exactly once per call.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    Faces(Vec<Region>),
    Humans(Vec<Region>),
    /// Recognized object class, `None` when nothing was recognized.
    Object(Option<String>),
    Services(Vec<ServiceInfo>),
    Failed(CallError),
}

impl DetectionResult {
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionResult::Faces(_) => "faces",
            DetectionResult::Humans(_) => "humans",
            DetectionResult::Object(_) => "object",
            DetectionResult::Services(_) => "services",
            DetectionResult::Failed(_) => "failed",
        }
    }

    /// Number of items found; zero for failures and unrecognized objects.
    pub fn count(&self) -> usize {
        match self {
            DetectionResult::Faces(r) | DetectionResult::Humans(r) => r.len(),
            DetectionResult::Object(label) => usize::from(label.is_some()),
            DetectionResult::Services(s) => s.len(),
            DetectionResult::Failed(_) => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DetectionResult::Failed(_))
    }

    pub fn regions(&self) -> &[Region] {
        match self {
            DetectionResult::Faces(r) | DetectionResult::Humans(r) => r,
            _ => &[],
        }
    }
}
