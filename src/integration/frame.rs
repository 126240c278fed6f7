//! Owned video frame and cropping.

use crate::tracker::BoundingBox;

/// Interleaved 8-bit image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, channels: u32) -> Self {
        debug_assert_eq!(pixels.len(), buffer_len(width, height, channels));
        Self {
            pixels,
            width,
            height,
            channels,
        }
    }

    /// A zero-filled frame.
    pub fn blank(width: u32, height: u32, channels: u32) -> Self {
        Self::new(
            vec![0; buffer_len(width, height, channels)],
            width,
            height,
            channels,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copy out the region under `bbox`, clipped to the frame.
    ///
    /// Corners are rounded to whole pixels. Returns `None` when nothing of
    /// the box lies inside the frame, or when `pixels` is shorter than the
    /// frame dimensions claim.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        if bbox.is_degenerate() || self.is_empty() {
            return None;
        }

        let [x1, y1, x2, y2] = bbox.to_tlbr();
        let clip = |v: f32, max: u32| (v.round() as i64).clamp(0, max as i64) as usize;
        let (x1, x2) = (clip(x1, self.width), clip(x2, self.width));
        let (y1, y2) = (clip(y1, self.height), clip(y2, self.height));
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let stride = self.width as usize * channels;
        let row_len = (x2 - x1) * channels;
        let mut pixels = Vec::with_capacity(row_len * (y2 - y1));
        for row in y1..y2 {
            let start = row * stride + x1 * channels;
            pixels.extend_from_slice(self.pixels.get(start..start + row_len)?);
        }

        Some(Frame {
            pixels,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
            channels: self.channels,
        })
    }
}

fn buffer_len(width: u32, height: u32, channels: u32) -> usize {
    width as usize * height as usize * channels as usize
}
