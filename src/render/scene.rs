use std::sync::Arc;

use glam::Mat4;

use crate::processing::geometry::{BufferId, VertexBuffer};
use crate::state::entities::{DisplayType, SegmentId};

/// One drawable built from a segment. Line and scatter objects for the same
/// segment share one vertex buffer.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub segment_id: SegmentId,
    pub display_type: DisplayType,
    pub buffer: Arc<VertexBuffer>,
}

/// Translucent band drawn behind the waveform for one mask.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskQuad {
    pub mask_id: String,
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub color: [u8; 4],
    /// Higher draws later, on top.
    pub priority: u32,
}

/// Everything one channel draws, in render units.
#[derive(Debug, Default)]
pub struct ChannelScene {
    objects: Vec<SceneObject>,
    masks: Vec<MaskQuad>,
}

impl ChannelScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    /// Removes every object of a segment, returning the buffers no object
    /// refers to anymore.
    pub fn remove_segment(&mut self, segment_id: SegmentId) -> Vec<BufferId> {
        let mut removed: Vec<BufferId> = Vec::new();
        self.objects.retain(|o| {
            if o.segment_id == segment_id {
                if !removed.contains(&o.buffer.id()) {
                    removed.push(o.buffer.id());
                }
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn clear_objects(&mut self) -> Vec<BufferId> {
        let mut ids: Vec<BufferId> = self.objects.iter().map(|o| o.buffer.id()).collect();
        ids.sort();
        ids.dedup();
        self.objects.clear();
        ids
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn has_segment(&self, segment_id: SegmentId) -> bool {
        self.objects.iter().any(|o| o.segment_id == segment_id)
    }

    pub fn set_masks(&mut self, mut masks: Vec<MaskQuad>) {
        masks.sort_by_key(|m| m.priority);
        self.masks = masks;
    }

    /// Masks in draw order.
    pub fn masks(&self) -> &[MaskQuad] {
        &self.masks
    }
}

/// 2D orthographic camera over render units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoCamera {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for OrthoCamera {
    fn default() -> Self {
        Self {
            left: 0.0,
            right: 100.0,
            top: 1.0,
            bottom: -1.0,
        }
    }
}

impl OrthoCamera {
    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(
            self.left as f32,
            self.right as f32,
            self.bottom as f32,
            self.top as f32,
            -1.0,
            1.0,
        )
    }

    /// Narrows the camera to a sub-rectangle of what it currently shows.
    /// Fractions run left to right and top to bottom, like screen space.
    pub fn cropped(&self, x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        let w = self.right - self.left;
        let h = self.top - self.bottom;
        Self {
            left: self.left + x0 * w,
            right: self.left + x1 * w,
            top: self.top - y0 * h,
            bottom: self.top - y1 * h,
        }
    }

    /// Render-space y at a vertical fraction of the view (0 = top).
    pub fn y_at(&self, fraction: f64) -> f64 {
        self.top - fraction * (self.top - self.bottom)
    }
}
