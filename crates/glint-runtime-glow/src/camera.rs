use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y_deg: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

/// Projection + view matrices, with the eye/target kept so the view can be rebuilt.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Projection,
    eye: Vec3,
    target: Vec3,
    up: Vec3,
    projection_matrix: Mat4,
    view_matrix: Mat4,
}

impl Camera {
    pub fn perspective(fov_y_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Perspective {
            fov_y_deg,
            aspect,
            near,
            far,
        })
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self::with_projection(Projection::Orthographic {
            left,
            right,
            bottom,
            top,
            near,
            far,
        })
    }

    fn with_projection(projection: Projection) -> Self {
        let mut cam = Self {
            projection,
            eye: Vec3::ZERO,
            target: Vec3::NEG_Z,
            up: Vec3::Y,
            projection_matrix: Mat4::IDENTITY,
            view_matrix: Mat4::IDENTITY,
        };
        cam.rebuild_projection();
        cam.rebuild_view();
        cam
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    pub fn inverse_view(&self) -> Mat4 {
        self.view_matrix.inverse()
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.eye = eye;
        self.target = target;
        self.up = up;
        self.rebuild_view();
    }

    /// Move the eye along z, keeping the target.
    pub fn set_zoom(&mut self, z: f32) {
        self.eye.z = z;
        self.rebuild_view();
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.eye += offset;
        self.target += offset;
        self.rebuild_view();
    }

    /// No-op for orthographic cameras.
    pub fn update_aspect_ratio(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = &mut self.projection {
            *a = aspect;
            self.rebuild_projection();
        }
    }

    fn rebuild_projection(&mut self) {
        self.projection_matrix = match self.projection {
            Projection::Perspective {
                fov_y_deg,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh_gl(fov_y_deg.to_radians(), aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh_gl(left, right, bottom, top, near, far),
        };
    }

    fn rebuild_view(&mut self) {
        self.view_matrix = Mat4::look_at_rh(self.eye, self.target, self.up);
    }
}
