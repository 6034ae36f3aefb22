use winit::dpi::LogicalSize;
use winit::window::Window;

/// The surface the viewer draws into.
pub trait Container {
    /// Client area in logical pixels.
    fn client_size(&self) -> (u32, u32);

    /// Physical pixels per logical pixel.
    fn pixel_ratio(&self) -> f64;
}

impl Container for Window {
    fn client_size(&self) -> (u32, u32) {
        let size: LogicalSize<u32> = self.inner_size().to_logical(self.scale_factor());
        (size.width, size.height)
    }

    fn pixel_ratio(&self) -> f64 {
        self.scale_factor()
    }
}

/// Logical size scaled to device pixels, never zero.
pub fn physical_size(width: u32, height: u32, ratio: f64) -> (u32, u32) {
    let scale = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}
