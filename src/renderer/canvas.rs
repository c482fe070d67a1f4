//! Canvas 2D surface (WASM only)
//!
//! Keeps a `Scene` and repaints it onto an HTML canvas on every present.

use std::f64::consts::TAU;

use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::surface::{Primitive, PrimitiveId, Scene, Surface, SurfaceError};
use super::viewport::Viewport;

/// Fill color per fruit level, 1-based
const FRUIT_COLORS: [&str; 11] = [
    "#c0392b", "#e74c3c", "#9b59b6", "#f39c12", "#e67e22", "#d35400", "#f1c40f", "#f5b7b1",
    "#f7dc6f", "#82e0aa", "#27ae60",
];

const BACKGROUND: &str = "#fdf6e3";
const BUCKET_FILL: &str = "#eee8d5";
const OUTLINE: &str = "#586e75";

pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    scene: Scene,
}

impl CanvasSurface {
    /// Look up `<canvas id=...>` and take its 2D context
    pub fn from_element_id(id: &str) -> Result<Self, SurfaceError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| SurfaceError::Unavailable("no document".into()))?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id(id)
            .ok_or_else(|| SurfaceError::Unavailable(format!("no element '{}'", id)))?
            .dyn_into()
            .map_err(|_| SurfaceError::Unavailable(format!("'{}' is not a canvas", id)))?;
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(|e| SurfaceError::Context(format!("{:?}", e)))?
            .ok_or_else(|| SurfaceError::Context("2d context not supported".into()))?
            .dyn_into()
            .map_err(|_| SurfaceError::Context("unexpected context type".into()))?;
        Ok(Self {
            canvas,
            ctx,
            scene: Scene::new(),
        })
    }

    fn paint(&self, primitive: &Primitive, vp: &Viewport) {
        let scale = vp.scale() as f64;
        match primitive {
            Primitive::Circle { center, radius, level } => {
                let c = vp.to_host(*center);
                let index = (*level as usize).clamp(1, FRUIT_COLORS.len()) - 1;
                self.ctx.begin_path();
                let _ = self.ctx.arc(c.x as f64, c.y as f64, (*radius as f64 * scale).max(0.0), 0.0, TAU);
                self.ctx.set_fill_style_str(FRUIT_COLORS[index]);
                self.ctx.fill();
                self.ctx.set_stroke_style_str(OUTLINE);
                self.ctx.set_line_width(0.06 * scale);
                self.ctx.stroke();
            }
            Primitive::Rect {
                min,
                size,
                corner_radius,
            } => {
                let p = vp.to_host(*min);
                let (x, y) = (p.x as f64, p.y as f64);
                let (w, h) = (size.x as f64 * scale, size.y as f64 * scale);
                let r = (*corner_radius as f64 * scale).min(w / 2.0).min(h / 2.0);
                self.ctx.begin_path();
                self.ctx.move_to(x + r, y);
                let _ = self.ctx.arc_to(x + w, y, x + w, y + h, r);
                let _ = self.ctx.arc_to(x + w, y + h, x, y + h, r);
                let _ = self.ctx.arc_to(x, y + h, x, y, r);
                let _ = self.ctx.arc_to(x, y, x + w, y, r);
                self.ctx.close_path();
                self.ctx.set_fill_style_str(BUCKET_FILL);
                self.ctx.fill();
                self.ctx.set_stroke_style_str(OUTLINE);
                self.ctx.set_line_width(0.12 * scale);
                self.ctx.stroke();
            }
            Primitive::Text { anchor, content } => {
                let p = vp.to_host(*anchor);
                self.ctx.set_font(&format!("bold {}px sans-serif", (1.2 * scale).round()));
                self.ctx.set_fill_style_str(OUTLINE);
                let _ = self.ctx.fill_text(content, p.x as f64, p.y as f64);
            }
        }
    }
}

impl Surface for CanvasSurface {
    fn add(&mut self, primitive: Primitive) -> PrimitiveId {
        self.scene.add(primitive)
    }

    fn update(&mut self, id: PrimitiveId, primitive: Primitive) {
        self.scene.update(id, primitive);
    }

    fn remove(&mut self, id: PrimitiveId) {
        self.scene.remove(id);
    }

    fn present(&mut self, viewport: &Viewport) {
        let host = viewport.host_size();
        let (w, h) = (host.x.round() as u32, host.y.round() as u32);
        if self.canvas.width() != w || self.canvas.height() != h {
            self.canvas.set_width(w);
            self.canvas.set_height(h);
        }
        self.ctx.set_fill_style_str(BACKGROUND);
        self.ctx.fill_rect(0.0, 0.0, w as f64, h as f64);
        for primitive in self.scene.painted() {
            self.paint(primitive, viewport);
        }
        self.scene.present(viewport);
    }
}
