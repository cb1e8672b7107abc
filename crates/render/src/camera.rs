use glam::Vec3;

/// First-person camera: eye position plus yaw/pitch in radians.
///
/// The eye is also the player's position for streaming and culling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(8.0, 80.0, 8.0),
            yaw: -90.0_f32.to_radians(),
            pitch: 0.0,
            speed: 10.0,
            sensitivity: 0.003,
        }
    }
}

impl Camera {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn forward(&self) -> Vec3 {
        direction(self.yaw, self.pitch)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Move along the horizontal projection of the view direction.
    pub fn walk(&mut self, dt: f32) {
        let flat = Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin());
        self.position += flat * self.speed * dt;
    }

    pub fn strafe(&mut self, dt: f32) {
        self.position += self.right() * self.speed * dt;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self.pitch.clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    pub fn orientation(&self) -> (f32, f32) {
        (self.yaw, self.pitch)
    }

    pub fn set_orientation(&mut self, (yaw, pitch): (f32, f32)) {
        self.yaw = yaw;
        self.pitch = pitch;
    }
}

/// Unit vector for a yaw (around +Y, zero along +X) and an elevation.
pub fn direction(yaw: f32, elevation: f32) -> Vec3 {
    Vec3::new(
        yaw.cos() * elevation.cos(),
        elevation.sin(),
        yaw.sin() * elevation.cos(),
    )
    .normalize()
}
