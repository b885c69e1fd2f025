use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cloud_vision_common::detection::{DetectionResult, Region, ServiceInfo};
use cloud_vision_common::frame::Frame;
use image::{Rgb, RgbImage};
use serde::Serialize;

use super::ResultSink;

const FACE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const FACE_THICKNESS: u32 = 1;
const HUMAN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const HUMAN_THICKNESS: u32 = 2;

/// Latest sampled frame plus the latest result, shared between the capture
/// loop, call completions and the viewer.
#[derive(Debug, Default)]
pub struct Canvas {
    state: Mutex<CanvasState>,
}

#[derive(Debug, Default)]
struct CanvasState {
    frame: Option<Frame>,
    result: Option<(u64, DetectionResult)>,
}

/// Serializable view of the latest result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSnapshot {
    pub frame_seq: Option<u64>,
    pub seq: Option<u64>,
    pub kind: Option<&'static str>,
    pub count: usize,
    pub label: Option<String>,
    pub services: Vec<ServiceInfo>,
    pub error: Option<String>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CanvasState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_frame(&self, frame: &Frame) {
        self.lock().frame = Some(frame.clone());
    }

    pub fn set_result(&self, seq: u64, result: DetectionResult) {
        self.lock().result = Some((seq, result));
    }

    /// The latest frame with the latest result's boxes drawn on it.
    /// Results stay on screen until the next one arrives.
    pub fn render(&self) -> Option<Frame> {
        let state = self.lock();
        let mut frame = state.frame.clone()?;
        match &state.result {
            Some((_, DetectionResult::Faces(regions))) => {
                for region in regions {
                    draw_rect(&mut frame.image, region, FACE_COLOR, FACE_THICKNESS);
                }
            }
            Some((_, DetectionResult::Humans(regions))) => {
                for region in regions {
                    draw_rect(&mut frame.image, region, HUMAN_COLOR, HUMAN_THICKNESS);
                }
            }
            _ => {}
        }
        Some(frame)
    }

    pub fn snapshot(&self) -> ResultSnapshot {
        let state = self.lock();
        let mut snapshot = ResultSnapshot {
            frame_seq: state.frame.as_ref().map(|f| f.seq),
            ..ResultSnapshot::default()
        };
        if let Some((seq, result)) = &state.result {
            snapshot.seq = Some(*seq);
            snapshot.kind = Some(result.kind());
            snapshot.count = result.count();
            match result {
                DetectionResult::Object(label) => snapshot.label = label.clone(),
                DetectionResult::Services(services) => snapshot.services = services.clone(),
                DetectionResult::Failed(e) => snapshot.error = Some(e.to_string()),
                _ => {}
            }
        }
        snapshot
    }
}

/// Draws results onto the shared [`Canvas`].
pub struct OverlaySink {
    canvas: Arc<Canvas>,
}

impl OverlaySink {
    pub fn new(canvas: Arc<Canvas>) -> Self {
        Self { canvas }
    }
}

impl ResultSink for OverlaySink {
    fn apply(&self, seq: u64, result: DetectionResult) {
        self.canvas.set_result(seq, result);
    }

    fn present(&self, frame: &Frame) {
        self.canvas.set_frame(frame);
    }

    fn name(&self) -> &str {
        "overlay"
    }
}

/// Outline `region` with a border `thickness` pixels wide, drawn inward and
/// clipped to the image.
fn draw_rect(image: &mut RgbImage, region: &Region, color: Rgb<u8>, thickness: u32) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    if width == 0 || height == 0 {
        return;
    }
    let left = (region.left as i64).clamp(0, width - 1);
    let right = (region.right as i64).clamp(0, width - 1);
    let top = (region.top as i64).clamp(0, height - 1);
    let bottom = (region.bottom as i64).clamp(0, height - 1);

    for t in 0..thickness as i64 {
        let (l, r, tp, b) = (left + t, right - t, top + t, bottom - t);
        if l > r || tp > b {
            break;
        }
        for x in l..=r {
            image.put_pixel(x as u32, tp as u32, color);
            image.put_pixel(x as u32, b as u32, color);
        }
        for y in tp..=b {
            image.put_pixel(l as u32, y as u32, color);
            image.put_pixel(r as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_vision_common::detection::CallError;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn blank(seq: u64) -> Frame {
        Frame::new(RgbImage::new(20, 20), 0, seq)
    }

    #[test]
    fn nothing_to_render_before_first_frame() {
        let canvas = Canvas::new();
        assert!(canvas.render().is_none());
        assert_eq!(canvas.snapshot(), ResultSnapshot::default());
    }

    #[test]
    fn face_boxes_drawn_on_latest_frame() {
        let canvas = Arc::new(Canvas::new());
        let sink = OverlaySink::new(Arc::clone(&canvas));
        sink.present(&blank(1));
        sink.apply(1, DetectionResult::Faces(vec![Region::from_corners(2, 3, 10, 12)]));
        sink.present(&blank(2));

        let frame = canvas.render().unwrap();
        assert_eq!(frame.seq, 2);
        assert_eq!(*frame.image.get_pixel(2, 3), FACE_COLOR);
        assert_eq!(*frame.image.get_pixel(10, 12), FACE_COLOR);
        assert_eq!(*frame.image.get_pixel(6, 7), BLACK);
        // One pixel wide: the next ring inward is untouched.
        assert_eq!(*frame.image.get_pixel(3, 4), BLACK);
    }

    #[test]
    fn human_boxes_are_thicker_and_clipped() {
        let canvas = Canvas::new();
        canvas.set_frame(&blank(0));
        canvas.set_result(0, DetectionResult::Humans(vec![Region::from_corners(-5, -5, 40, 40)]));
        let frame = canvas.render().unwrap();
        assert_eq!(*frame.image.get_pixel(0, 0), HUMAN_COLOR);
        assert_eq!(*frame.image.get_pixel(1, 1), HUMAN_COLOR);
        assert_eq!(*frame.image.get_pixel(19, 19), HUMAN_COLOR);
        assert_eq!(*frame.image.get_pixel(2, 2), BLACK);
    }

    #[test]
    fn snapshot_reports_label_and_failure() {
        let canvas = Canvas::new();
        canvas.set_frame(&blank(4));
        canvas.set_result(4, DetectionResult::Object(Some("banana".into())));
        let snapshot = canvas.snapshot();
        assert_eq!(snapshot.kind, Some("object"));
        assert_eq!(snapshot.label.as_deref(), Some("banana"));
        assert_eq!(snapshot.frame_seq, Some(4));

        canvas.set_result(5, DetectionResult::Failed(CallError::Status(500)));
        let snapshot = canvas.snapshot();
        assert_eq!(snapshot.seq, Some(5));
        assert_eq!(snapshot.count, 0);
        assert!(snapshot.error.unwrap().contains("500"));
    }

    #[test]
    fn failure_leaves_frame_clean() {
        let canvas = Canvas::new();
        canvas.set_frame(&blank(0));
        canvas.set_result(0, DetectionResult::Failed(CallError::Abandoned));
        let frame = canvas.render().unwrap();
        assert!(frame.image.pixels().all(|p| *p == BLACK));
    }
}
