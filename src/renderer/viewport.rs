//! Host ↔ logical coordinate transform
//!
//! The logical view box surrounds the bucket with a margin, plus headroom
//! above for the score. It is fitted uniformly into the host area and
//! centered, so nothing is stretched or cropped.

use glam::Vec2;

use crate::consts::{VIEW_HEADROOM, VIEW_MARGIN};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Top-left corner of the view box in logical space
    min: Vec2,
    /// View box size in logical units
    size: Vec2,
    /// Host area in host units (pixels)
    host: Vec2,
    /// Host units per logical unit
    scale: f32,
    /// Host position of the view box's top-left corner
    offset: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        let size = Self::view_size(12.0, 20.0);
        Self::fit(12.0, 20.0, size.x, size.y)
    }
}

impl Viewport {
    fn view_size(bucket_width: f32, bucket_height: f32) -> Vec2 {
        Vec2::new(
            bucket_width + 2.0 * VIEW_MARGIN,
            bucket_height + 2.0 * VIEW_MARGIN + VIEW_HEADROOM,
        )
    }

    /// View box for a bucket, fitted into a host area
    pub fn fit(bucket_width: f32, bucket_height: f32, host_width: f32, host_height: f32) -> Self {
        let size = Self::view_size(bucket_width, bucket_height);
        let min = Vec2::new(
            -bucket_width / 2.0 - VIEW_MARGIN,
            -bucket_height / 2.0 - VIEW_MARGIN - VIEW_HEADROOM,
        );
        let mut viewport = Self {
            min,
            size,
            host: size,
            scale: 1.0,
            offset: Vec2::ZERO,
        };
        viewport.resize(host_width, host_height);
        viewport
    }

    /// Refit into a new host area; degenerate sizes are ignored
    pub fn resize(&mut self, host_width: f32, host_height: f32) {
        if !(host_width > 0.0 && host_height > 0.0) {
            log::debug!("Ignoring degenerate host size {}x{}", host_width, host_height);
            return;
        }
        self.host = Vec2::new(host_width, host_height);
        self.scale = (self.host / self.size).min_element();
        self.offset = (self.host - self.size * self.scale) / 2.0;
    }

    #[inline]
    pub fn to_host(&self, logical: Vec2) -> Vec2 {
        self.offset + (logical - self.min) * self.scale
    }

    #[inline]
    pub fn to_logical(&self, host: Vec2) -> Vec2 {
        self.min + (host - self.offset) / self.scale
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn host_size(&self) -> Vec2 {
        self.host
    }
}
