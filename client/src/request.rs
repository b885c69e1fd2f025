use cloud_vision_common::detection::{CallError, DetectionResult, Region, ServiceInfo};
use cloud_vision_common::frame::EncodedPayload;
use serde::Deserialize;

/// Which image service a capture loop calls for every sampled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    FaceDetection { fast: bool },
    HumanDetection,
    ObjectRecognition,
}

impl RequestKind {
    pub fn with_image(self, image: EncodedPayload) -> CloudRequest {
        match self {
            RequestKind::FaceDetection { fast } => CloudRequest::FaceDetection { image, fast },
            RequestKind::HumanDetection => CloudRequest::HumanDetection { image },
            RequestKind::ObjectRecognition => CloudRequest::ObjectRecognition { image },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RequestKind::FaceDetection { .. } => "face_detection",
            RequestKind::HumanDetection => "human_detection",
            RequestKind::ObjectRecognition => "object_recognition",
        }
    }
}

/// A typed call to the platform. Each variant maps to one service endpoint.
#[derive(Debug, Clone)]
pub enum CloudRequest {
    FaceDetection { image: EncodedPayload, fast: bool },
    HumanDetection { image: EncodedPayload },
    ObjectRecognition { image: EncodedPayload },
    AvailableServices,
}

impl CloudRequest {
    /// Path below `/hop/` on the platform.
    pub fn service(&self) -> &'static str {
        match self {
            CloudRequest::FaceDetection { .. } => "face_detection",
            CloudRequest::HumanDetection { .. } => "human_detection",
            CloudRequest::ObjectRecognition { .. } => "object_recognition_caffe",
            CloudRequest::AvailableServices => "available_services",
        }
    }

    pub fn image(&self) -> Option<&EncodedPayload> {
        match self {
            CloudRequest::FaceDetection { image, .. }
            | CloudRequest::HumanDetection { image }
            | CloudRequest::ObjectRecognition { image } => Some(image),
            CloudRequest::AvailableServices => None,
        }
    }

    /// Service arguments sent in the `json` multipart field.
    pub fn arguments(&self) -> serde_json::Value {
        match self {
            CloudRequest::FaceDetection { fast, .. } => serde_json::json!({ "fast": fast }),
            _ => serde_json::json!({}),
        }
    }

    /// Decode a response body into the result variant matching this request.
    pub fn parse_response(&self, body: &[u8]) -> DetectionResult {
        let parsed = match self {
            CloudRequest::FaceDetection { .. } => serde_json::from_slice::<FacesResponse>(body)
                .map(|r| checked(r.error, || DetectionResult::Faces(regions(r.faces)))),
            CloudRequest::HumanDetection { .. } => serde_json::from_slice::<HumansResponse>(body)
                .map(|r| checked(r.error, || DetectionResult::Humans(regions(r.humans)))),
            CloudRequest::ObjectRecognition { .. } => {
                serde_json::from_slice::<ObjectResponse>(body).map(|r| {
                    checked(r.error, || {
                        let label = r.object_class.trim().to_string();
                        DetectionResult::Object((!label.is_empty()).then_some(label))
                    })
                })
            }
            CloudRequest::AvailableServices => serde_json::from_slice::<ServicesResponse>(body)
                .map(|r| {
                    checked(r.error, || {
                        DetectionResult::Services(
                            r.services
                                .into_iter()
                                .map(|s| ServiceInfo { name: s.name, url: s.url })
                                .collect(),
                        )
                    })
                }),
        };
        parsed.unwrap_or_else(|e| DetectionResult::Failed(CallError::Decode(e.to_string())))
    }
}

fn checked(error: String, ok: impl FnOnce() -> DetectionResult) -> DetectionResult {
    if error.is_empty() {
        ok()
    } else {
        DetectionResult::Failed(CallError::Platform(error))
    }
}

fn regions(boxes: Vec<BoxDto>) -> Vec<Region> {
    boxes
        .into_iter()
        .map(|b| {
            Region::from_corners(
                b.up_left_point.x,
                b.up_left_point.y,
                b.down_right_point.x,
                b.down_right_point.y,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PointDto {
    x: i32,
    y: i32,
}

#[derive(Debug, Deserialize)]
struct BoxDto {
    up_left_point: PointDto,
    down_right_point: PointDto,
}

#[derive(Debug, Deserialize)]
struct FacesResponse {
    #[serde(default)]
    faces: Vec<BoxDto>,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct HumansResponse {
    #[serde(default)]
    humans: Vec<BoxDto>,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    #[serde(default)]
    object_class: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct ServiceDto {
    name: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ServicesResponse {
    #[serde(default)]
    services: Vec<ServiceDto>,
    #[serde(default)]
    error: String,
}
