// Matrix/transform state
//
// Software replacement for the fixed-function projection/modelview stacks.
// Matrices are column-major; the combined transform is the only value the draw
// path reads.

use glam::Mat4;

/// Capacity of each save/restore stack
pub const MATRIX_STACK_DEPTH: usize = 8;

/// Fixed vertical field of view used by the 3D pass
pub const DEFAULT_FOV_Y_DEGREES: f32 = 90.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 5000.0;

pub fn identity() -> Mat4 {
    Mat4::IDENTITY
}

/// OpenGL-style orthographic projection (glOrtho)
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::orthographic_rh_gl(left, right, bottom, top, near, far)
}

/// Perspective projection (gluPerspective layout); the shader remaps depth to [0, 1].
pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh_gl(fov_y_degrees.to_radians(), aspect, near, far)
}

/// `a * b` in column-major convention (b applied first)
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    *a * *b
}

/// Parameters of the perspective installed by `start_3d_pass`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection3d {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection3d {
    fn default() -> Self {
        Self {
            fov_y_degrees: DEFAULT_FOV_Y_DEGREES,
            aspect: 1.0,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }
}

/// Fixed-capacity save/restore stack
#[derive(Debug, Clone)]
struct MatrixStack {
    slots: [Mat4; MATRIX_STACK_DEPTH],
    depth: usize,
}

impl MatrixStack {
    fn new() -> Self {
        Self {
            slots: [Mat4::IDENTITY; MATRIX_STACK_DEPTH],
            depth: 0,
        }
    }

    fn push(&mut self, m: Mat4) -> bool {
        if self.depth == MATRIX_STACK_DEPTH {
            return false;
        }
        self.slots[self.depth] = m;
        self.depth += 1;
        true
    }

    fn pop(&mut self) -> Option<Mat4> {
        if self.depth == 0 {
            return None;
        }
        self.depth -= 1;
        Some(self.slots[self.depth])
    }
}

/// Projection, modelview, their product, and the two save/restore stacks.
#[derive(Debug, Clone)]
pub struct TransformState {
    projection: Mat4,
    modelview: Mat4,
    mvp: Mat4,
    projection_stack: MatrixStack,
    modelview_stack: MatrixStack,
    is_3d: bool,
    projection_3d: Projection3d,
}

impl Default for TransformState {
    fn default() -> Self {
        Self::new(Projection3d::default())
    }
}

impl TransformState {
    pub fn new(projection_3d: Projection3d) -> Self {
        Self {
            projection: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
            mvp: Mat4::IDENTITY,
            projection_stack: MatrixStack::new(),
            modelview_stack: MatrixStack::new(),
            is_3d: false,
            projection_3d,
        }
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn modelview(&self) -> &Mat4 {
        &self.modelview
    }

    /// Combined `projection x modelview`
    pub fn mvp(&self) -> &Mat4 {
        &self.mvp
    }

    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    pub fn projection_3d(&self) -> &Projection3d {
        &self.projection_3d
    }

    pub fn set_projection(&mut self, m: Mat4) {
        self.projection = m;
        self.update_mvp();
    }

    pub fn set_modelview(&mut self, m: Mat4) {
        self.modelview = m;
        self.update_mvp();
    }

    /// Perspective projection and identity modelview
    pub fn start_3d_pass(&mut self) {
        let p = self.projection_3d;
        self.is_3d = true;
        self.projection = perspective(p.fov_y_degrees, p.aspect, p.near, p.far);
        self.modelview = Mat4::IDENTITY;
        self.update_mvp();
    }

    /// Orthographic projection over the whole normalized 2D surface
    pub fn end_3d_pass(&mut self) {
        self.is_3d = false;
        self.projection = ortho(0.0, 1.0, 0.0, 1.0, -1.0, 1.0);
        self.modelview = Mat4::IDENTITY;
        self.update_mvp();
    }

    pub fn push_projection(&mut self) -> bool {
        let ok = self.projection_stack.push(self.projection);
        if !ok {
            log::warn!("Projection matrix stack overflow (capacity {})", MATRIX_STACK_DEPTH);
        }
        ok
    }

    pub fn pop_projection(&mut self) -> bool {
        match self.projection_stack.pop() {
            Some(m) => {
                self.set_projection(m);
                true
            }
            None => {
                log::warn!("Projection matrix stack underflow");
                false
            }
        }
    }

    pub fn push_modelview(&mut self) -> bool {
        let ok = self.modelview_stack.push(self.modelview);
        if !ok {
            log::warn!("Modelview matrix stack overflow (capacity {})", MATRIX_STACK_DEPTH);
        }
        ok
    }

    pub fn pop_modelview(&mut self) -> bool {
        match self.modelview_stack.pop() {
            Some(m) => {
                self.set_modelview(m);
                true
            }
            None => {
                log::warn!("Modelview matrix stack underflow");
                false
            }
        }
    }

    fn update_mvp(&mut self) {
        self.mvp = multiply(&self.projection, &self.modelview);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn assert_mat_eq(a: &Mat4, b: &Mat4) {
        assert!(a.abs_diff_eq(*b, 1e-5), "{a:?} != {b:?}");
    }

    #[test]
    fn perspective_uses_gl_layout() {
        let m = perspective(90.0, 1.0, 0.1, 5000.0).to_cols_array();
        assert!((m[0] - 1.0).abs() < 1e-6);
        assert!((m[5] - 1.0).abs() < 1e-6);
        assert!((m[10] - (5000.1 / (0.1 - 5000.0))).abs() < 1e-6);
        assert_eq!(m[11], -1.0);
        assert!((m[14] - (2.0 * 5000.0 * 0.1 / (0.1 - 5000.0))).abs() < 1e-6);
        assert_eq!(m[15], 0.0);
    }

    #[test]
    fn perspective_scales_by_aspect() {
        let m = perspective(90.0, 2.0, 1.0, 10.0).to_cols_array();
        assert!((m[0] - 0.5).abs() < 1e-6);
        assert!((m[5] - 1.0).abs() < 1e-6);
        assert_eq!(&m[1..5], &[0.0; 4]);
        assert_eq!(&m[12..14], &[0.0; 2]);
    }

    #[test]
    fn ortho_uses_gl_layout() {
        let m = ortho(-2.0, 6.0, -1.0, 3.0, 1.0, 5.0).to_cols_array();
        assert_eq!(m[0], 2.0 / 8.0);
        assert_eq!(m[5], 2.0 / 4.0);
        assert_eq!(m[10], -2.0 / 4.0);
        assert_eq!(m[12], -4.0 / 8.0);
        assert_eq!(m[13], -2.0 / 4.0);
        assert_eq!(m[14], -6.0 / 4.0);
        assert_eq!(m[15], 1.0);
        assert_eq!(m[11], 0.0);
    }

    #[test]
    fn ortho_maps_unit_square_to_clip_space() {
        let m = ortho(0.0, 1.0, 0.0, 1.0, -1.0, 1.0);
        let lo = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let hi = m * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert!(lo.abs_diff_eq(Vec4::new(-1.0, -1.0, 0.0, 1.0), 1e-6));
        assert!(hi.abs_diff_eq(Vec4::new(1.0, 1.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn multiply_is_column_major() {
        let t = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let s = Mat4::from_scale(glam::Vec3::splat(2.0));
        // Scale first, then translate
        let m = multiply(&t, &s);
        let p = m * Vec4::new(1.0, 1.0, 1.0, 1.0);
        assert!(p.abs_diff_eq(Vec4::new(3.0, 4.0, 5.0, 1.0), 1e-6));

        let cols = m.to_cols_array();
        assert_eq!(&cols[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn mvp_tracks_both_inputs() {
        let mut state = TransformState::default();
        assert_mat_eq(state.mvp(), &Mat4::IDENTITY);

        let p = ortho(0.0, 2.0, 0.0, 2.0, -1.0, 1.0);
        state.set_projection(p);
        assert_mat_eq(state.mvp(), &p);

        let mv = Mat4::from_translation(glam::Vec3::X);
        state.set_modelview(mv);
        assert_mat_eq(state.mvp(), &(p * mv));
    }

    #[test]
    fn passes_install_expected_projection() {
        let mut state = TransformState::default();
        state.start_3d_pass();
        assert!(state.is_3d());
        assert_mat_eq(state.projection(), &perspective(90.0, 1.0, 0.1, 5000.0));
        assert_mat_eq(state.modelview(), &Mat4::IDENTITY);

        state.end_3d_pass();
        assert!(!state.is_3d());
        assert_mat_eq(state.mvp(), &ortho(0.0, 1.0, 0.0, 1.0, -1.0, 1.0));
    }

    #[test]
    fn stack_restores_and_bounds_depth() {
        let mut state = TransformState::default();
        let saved = Mat4::from_scale(glam::Vec3::splat(3.0));
        state.set_modelview(saved);
        assert!(state.push_modelview());
        state.set_modelview(Mat4::IDENTITY);
        assert!(state.pop_modelview());
        assert_mat_eq(state.modelview(), &saved);
        assert_mat_eq(state.mvp(), &saved);

        for _ in 0..MATRIX_STACK_DEPTH {
            assert!(state.push_projection());
        }
        assert!(!state.push_projection());
        for _ in 0..MATRIX_STACK_DEPTH {
            assert!(state.pop_projection());
        }
        assert!(!state.pop_projection());
    }
}
