//! Frame capture and the vision-model seam.
//!
//! Both sides are black boxes to the scan loop: a `FrameGrabber` hands
//! over encoded frames and a `Detector` turns a frame into zero or
//! more labelled detections. An empty detection list is a normal
//! outcome; `Err` is reserved for the capture path or model itself
//! breaking, which the loop degrades to "no detections this tick".

use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgb};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::ScanError;
use crate::models::Detection;

/// One captured frame, already JPEG-encoded.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub trait FrameGrabber: Send {
    fn grab(&mut self) -> Result<Frame, ScanError>;
}

pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, ScanError>;
}

/// Stand-in camera rendering a scrolling gradient, so saved frames are
/// distinguishable when eyeballing a session directory.
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    tick: u64,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            width: 160,
            height: 120,
            tick: 0,
        }
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGrabber for SimulatedCamera {
    fn grab(&mut self) -> Result<Frame, ScanError> {
        self.tick = self.tick.wrapping_add(1);
        let shift = (self.tick % 256) as u32;

        let buffer = ImageBuffer::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift) % 256) as u8,
                (shift % 256) as u8,
            ])
        });

        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(buffer)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .map_err(|err| ScanError::DetectionUnavailable(format!("frame encode failed: {err}")))?;

        Ok(Frame {
            jpeg,
            width: self.width,
            height: self.height,
        })
    }
}

/// Stand-in for the road-defect model: most frames are clean, a small
/// fraction report a pothole at a plausible confidence.
pub struct SimulatedDetector {
    rng: StdRng,
    pothole_rate: f64,
}

impl SimulatedDetector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            pothole_rate: 0.02,
        }
    }
}

impl Default for SimulatedDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for SimulatedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, ScanError> {
        if self.rng.gen_bool(self.pothole_rate) {
            Ok(vec![Detection {
                label: "Pothole".to_string(),
                confidence: self.rng.gen_range(0.3..0.95),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}
