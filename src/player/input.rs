#[derive(Default)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    /// Left mouse button held: mouse motion orbits the camera.
    pub orbiting: bool,
    pub mouse_dx: f32,
    pub mouse_dy: f32,
    pub wheel_delta: f32,
}

impl InputState {
    /// Mouse deltas accumulate across events within a frame; the camera
    /// consumes them once per update.
    pub fn take_mouse_deltas(&mut self) -> (f32, f32, f32) {
        let deltas = (self.mouse_dx, self.mouse_dy, self.wheel_delta);
        self.mouse_dx = 0.0;
        self.mouse_dy = 0.0;
        self.wheel_delta = 0.0;
        deltas
    }
}
