// 2D pixel-space helpers
//
// Builds vertex arrays for the classic canvas primitives. Pixel coordinates
// (origin top-left, y down) are mapped into the normalized [0,1] 2D space the
// ortho projection covers, with y pointing up.

use crate::vertex::Vertex;

pub type Color = [f32; 4];

pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];

/// Per-corner colors for `bitmap`: top-left, top-right, bottom-right, bottom-left
pub const WHITE_CORNERS: [Color; 4] = [WHITE; 4];

/// Maps pixels of a `width` x `height` screen into normalized 2D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    width: f32,
    height: f32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1) as f32,
            height: height.max(1) as f32,
        }
    }

    pub fn x(&self, px: f32) -> f32 {
        px / self.width
    }

    pub fn y(&self, py: f32) -> f32 {
        1.0 - py / self.height
    }

    /// Filled rectangle covering pixels `left..=right`, `top..=bottom`, as a fan
    pub fn rect(&self, left: i32, top: i32, right: i32, bottom: i32, color: Color) -> [Vertex; 4] {
        let x0 = self.x(left as f32);
        let x1 = self.x((right + 1) as f32);
        let y0 = self.y(top as f32);
        let y1 = self.y((bottom + 1) as f32);
        [
            Vertex::colored([x0, y0, 0.0], color),
            Vertex::colored([x0, y1, 0.0], color),
            Vertex::colored([x1, y1, 0.0], color),
            Vertex::colored([x1, y0, 0.0], color),
        ]
    }

    /// Line between two pixels; y sits on the pixel center row
    pub fn line(&self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) -> [Vertex; 2] {
        [
            Vertex::colored([self.x(x0 as f32), self.y(y0 as f32 + 0.5), 0.0], color),
            Vertex::colored([self.x(x1 as f32), self.y(y1 as f32 + 0.5), 0.0], color),
        ]
    }

    /// Single pixel as a fan
    pub fn pixel(&self, x: i32, y: i32, color: Color) -> [Vertex; 4] {
        let x0 = self.x(x as f32);
        let y0 = self.y(y as f32);
        let w = 1.0 / self.width;
        let h = 1.0 / self.height;
        [
            Vertex::colored([x0, y0, 0.0], color),
            Vertex::colored([x0 + w, y0, 0.0], color),
            Vertex::colored([x0 + w, y0 - h, 0.0], color),
            Vertex::colored([x0, y0 - h, 0.0], color),
        ]
    }

    /// Textured `w` x `h` quad at pixel `(x, y)` as a fan.
    ///
    /// `uv_scale` restricts sampling to the valid part of a padded texture.
    pub fn bitmap(
        &self,
        x: i32,
        y: i32,
        w: u32,
        h: u32,
        uv_scale: (f32, f32),
        corners: [Color; 4],
    ) -> [Vertex; 4] {
        let x0 = self.x(x as f32);
        let y0 = self.y(y as f32);
        let x1 = x0 + w as f32 / self.width;
        let y1 = y0 - h as f32 / self.height;
        let (u, v) = uv_scale;
        [
            Vertex::new([x0, y0, 0.0], corners[0], [0.0, 0.0]),
            Vertex::new([x1, y0, 0.0], corners[1], [u, 0.0]),
            Vertex::new([x1, y1, 0.0], corners[2], [u, v]),
            Vertex::new([x0, y1, 0.0], corners[3], [0.0, v]),
        ]
    }

    /// Crosshair centered on pixel `(cx, cy)`; `size` is the arm length in
    /// normalized units. Two line segments.
    pub fn reticle(&self, cx: i32, cy: i32, size: f32, color: Color) -> [Vertex; 4] {
        let x = self.x(cx as f32);
        let y = self.y(cy as f32);
        [
            Vertex::colored([x - size, y, 0.0], color),
            Vertex::colored([x + size, y, 0.0], color),
            Vertex::colored([x, y - size, 0.0], color),
            Vertex::colored([x, y + size, 0.0], color),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = [1.0, 0.0, 0.0, 1.0];

    fn assert_at(v: &Vertex, x: f32, y: f32) {
        assert!(
            (v.position[0] - x).abs() < 1e-6 && (v.position[1] - y).abs() < 1e-6,
            "expected ({x}, {y}), got ({}, {})",
            v.position[0],
            v.position[1]
        );
    }

    #[test]
    fn corners_map_with_y_up() {
        let canvas = Canvas::new(800, 600);
        assert_eq!((canvas.x(0.0), canvas.y(0.0)), (0.0, 1.0));
        assert_eq!((canvas.x(800.0), canvas.y(600.0)), (1.0, 0.0));
        assert_eq!(canvas.x(400.0), 0.5);
    }

    #[test]
    fn rect_is_inclusive_of_right_and_bottom() {
        let canvas = Canvas::new(100, 100);
        let fan = canvas.rect(10, 20, 19, 29, RED);
        assert_at(&fan[0], 0.1, 0.8);
        assert_at(&fan[1], 0.1, 0.7);
        assert_at(&fan[2], 0.2, 0.7);
        assert_at(&fan[3], 0.2, 0.8);
        assert!(fan.iter().all(|v| v.color == RED));
    }

    #[test]
    fn line_uses_pixel_center_rows() {
        let canvas = Canvas::new(100, 100);
        let [a, b] = canvas.line(0, 0, 50, 99, RED);
        assert_at(&a, 0.0, 0.995);
        assert_at(&b, 0.5, 0.005);
    }

    #[test]
    fn pixel_covers_one_pixel() {
        let canvas = Canvas::new(4, 2);
        let fan = canvas.pixel(1, 0, RED);
        assert_at(&fan[0], 0.25, 1.0);
        assert_at(&fan[1], 0.5, 1.0);
        assert_at(&fan[2], 0.5, 0.5);
        assert_at(&fan[3], 0.25, 0.5);
    }

    #[test]
    fn bitmap_scales_uvs_to_valid_region() {
        let canvas = Canvas::new(200, 100);
        let fan = canvas.bitmap(0, 0, 100, 50, (0.75, 0.5), WHITE_CORNERS);
        assert_at(&fan[0], 0.0, 1.0);
        assert_at(&fan[2], 0.5, 0.5);
        assert_eq!(fan[0].tex_coord, [0.0, 0.0]);
        assert_eq!(fan[1].tex_coord, [0.75, 0.0]);
        assert_eq!(fan[2].tex_coord, [0.75, 0.5]);
        assert_eq!(fan[3].tex_coord, [0.0, 0.5]);
    }

    #[test]
    fn bitmap_keeps_corner_colors_in_order() {
        let canvas = Canvas::new(10, 10);
        let corners = [RED, WHITE, [0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];
        let fan = canvas.bitmap(0, 0, 10, 10, (1.0, 1.0), corners);
        for (v, c) in fan.iter().zip(corners) {
            assert_eq!(v.color, c);
        }
    }

    #[test]
    fn reticle_is_two_segments_through_center() {
        let canvas = Canvas::new(100, 100);
        let lines = canvas.reticle(50, 50, 0.02, RED);
        assert_at(&lines[0], 0.48, 0.5);
        assert_at(&lines[1], 0.52, 0.5);
        assert_at(&lines[2], 0.5, 0.48);
        assert_at(&lines[3], 0.5, 0.52);
    }

    #[test]
    fn zero_sized_screen_does_not_divide_by_zero() {
        let canvas = Canvas::new(0, 0);
        assert!(canvas.x(1.0).is_finite());
        assert!(canvas.y(1.0).is_finite());
    }
}
