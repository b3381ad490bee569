use std::path::{Path, PathBuf};

use onac_experiment::FrameContent;
use tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

/// Minimal frame painter for the experiment shell. Real stimulus rendering
/// sits outside the timing core; this draws the frames the protocol needs
/// to hold on screen: blank, fixation cross, centered stimulus images, and
/// a neutral marker for text and movie placeholders.
pub struct Scene {
    width: u32,
    height: u32,
    /// Last stimulus image, or `None` payload when it failed to load so a
    /// missing asset is probed (and warned about) once, not every frame.
    cached_image: Option<(PathBuf, Option<image::RgbaImage>)>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cached_image: None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn render(&mut self, content: &FrameContent, canvas: &mut Pixmap) {
        canvas.fill(Color::BLACK);
        match content {
            FrameContent::Blank => {}
            FrameContent::Fixation => self.draw_fixation(canvas),
            FrameContent::Image(path) => self.draw_image(path, canvas),
            // Text and movie stimuli render as a neutral marker; glyph and
            // video pipelines live outside the shell.
            FrameContent::Text(_) | FrameContent::Movie(_) => self.draw_marker(canvas),
        }
    }

    fn draw_fixation(&self, canvas: &mut Pixmap) {
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(96, 96, 255, 255));
        let cx = self.width as f32 / 2.0;
        let cy = self.height as f32 / 2.0;
        let arm = (self.height as f32 * 0.04).max(12.0);
        let thickness = (arm / 6.0).max(2.0);
        let bars = [
            Rect::from_xywh(cx - arm, cy - thickness / 2.0, arm * 2.0, thickness),
            Rect::from_xywh(cx - thickness / 2.0, cy - arm, thickness, arm * 2.0),
        ];
        for bar in bars.into_iter().flatten() {
            canvas.fill_rect(bar, &paint, Transform::identity(), None);
        }
    }

    fn draw_marker(&self, canvas: &mut Pixmap) {
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(200, 200, 200, 255));
        let w = self.width as f32 * 0.4;
        let h = self.height as f32 * 0.08;
        if let Some(rect) = Rect::from_xywh(
            (self.width as f32 - w) / 2.0,
            (self.height as f32 - h) / 2.0,
            w,
            h,
        ) {
            canvas.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    fn draw_image(&mut self, path: &Path, canvas: &mut Pixmap) {
        if self
            .cached_image
            .as_ref()
            .is_none_or(|(cached, _)| cached != path)
        {
            let loaded = match image::open(path) {
                Ok(img) => Some(img.into_rgba8()),
                Err(err) => {
                    eprintln!("Could not load {}: {err}", path.display());
                    None
                }
            };
            self.cached_image = Some((path.to_owned(), loaded));
        }
        let Some((_, Some(img))) = self.cached_image.as_ref() else {
            self.draw_marker(canvas);
            return;
        };

        let (iw, ih) = img.dimensions();
        let x0 = (self.width.saturating_sub(iw)) / 2;
        let y0 = (self.height.saturating_sub(ih)) / 2;
        let copy_w = iw.min(self.width) as usize;
        let copy_h = ih.min(self.height) as usize;
        let stride = self.width as usize * 4;
        let data = canvas.data_mut();
        for row in 0..copy_h {
            let src_start = row * iw as usize * 4;
            let dst_start = (y0 as usize + row) * stride + x0 as usize * 4;
            let src = &img.as_raw()[src_start..src_start + copy_w * 4];
            data[dst_start..dst_start + copy_w * 4].copy_from_slice(src);
        }
    }
}
