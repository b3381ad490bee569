use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use onac_core::{AudioSink, NullAudio};
use onac_experiment::{Directive, ExperimentDriver, FrameContent};
use onac_timing::Timer;
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use tiny_skia::Pixmap;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::scene::Scene;

/// Frames sampled before the measured refresh rate is logged and stamped
/// into the session manifest.
const CALIBRATION_FRAMES: usize = 120;

/// Fullscreen shell around the experiment driver. The winit redraw loop is
/// the sole scheduling heartbeat: every redraw samples the session clock
/// once, feeds the driver one tick, draws the frame the driver asked for,
/// and requests the next redraw. Keys collect between redraws and are
/// handed to the driver on the following tick.
pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    canvas: Option<Pixmap>,
    scene: Option<Scene>,
    driver: ExperimentDriver<ThreadRng>,
    audio: NullAudio,
    pending_keys: Vec<String>,
    last_tick_ns: u64,
    calibrated: bool,
    should_exit: bool,
}

impl App {
    pub fn new(driver: ExperimentDriver<ThreadRng>) -> Self {
        let last_tick_ns = driver.session().timer.now_ns();
        Self {
            window: None,
            pixels: None,
            canvas: None,
            scene: None,
            driver,
            audio: NullAudio,
            pending_keys: Vec::new(),
            last_tick_ns,
            calibrated: false,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        println!("Press any key to advance instruction screens, ESC between tasks to exit.\n");
        event_loop.run_app(&mut self)?;
        // Let the last trigger byte drain before the port handle drops.
        self.driver.session().timer.sleep(Duration::from_millis(200));
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;

        let refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("ONAC")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();

        println!("Display: {}×{}", size.width, size.height);
        if let Some(rate) = refresh_rate {
            println!("Nominal refresh rate: {rate:.1} Hz");
        }

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);
        self.canvas = Pixmap::new(size.width, size.height);
        self.scene = Some(Scene::new(size.width, size.height));

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let session = self.driver.session_mut();
        let frame_delta = session.timer.elapsed_since(self.last_tick_ns);
        self.last_tick_ns = session.timer.now_ns();
        session.timer.record_frame(frame_delta);
        self.maybe_log_calibration()?;

        let session = self.driver.session();
        let now = session.clock.elapsed(&session.timer);
        let keys = std::mem::take(&mut self.pending_keys);
        let directive = self.driver.tick(now, &keys)?;

        let (Some(scene), Some(canvas), Some(pixels)) =
            (self.scene.as_mut(), self.canvas.as_mut(), self.pixels.as_mut())
        else {
            return Ok(());
        };

        match directive {
            Directive::Frame { frame, sound } => {
                if let Some(sound) = sound {
                    self.audio.play(&sound);
                }
                scene.render(&frame, canvas);
            }
            Directive::WaitKey { image } => {
                scene.render(&FrameContent::Image(image), canvas);
            }
            Directive::Finished => {
                self.should_exit = true;
                scene.render(&FrameContent::Blank, canvas);
            }
        }

        let frame = pixels.frame_mut();
        if frame.len() == canvas.data().len() {
            frame.copy_from_slice(canvas.data());
        }
        pixels.render()?;

        if let Some(window) = &self.window {
            window.request_redraw();
        }
        Ok(())
    }

    /// Logs measured refresh behavior once enough frames are in, and stamps
    /// the rate into the session manifest.
    fn maybe_log_calibration(&mut self) -> Result<()> {
        let timer = &self.driver.session().timer;
        if self.calibrated || timer.frame_count() < CALIBRATION_FRAMES {
            return Ok(());
        }
        let stats = timer.refresh_stats();
        println!(
            "Calibration: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms",
            stats.average_frame_ns / 1_000_000.0,
            stats.effective_hz,
            stats.jitter_ns / 1_000_000.0,
        );
        self.driver.session_mut().set_frame_rate(stats.effective_hz);
        self.driver.session().write_manifest()?;
        self.calibrated = true;
        Ok(())
    }

    fn handle_key(&mut self, key: Key) {
        let name = match key {
            Key::Named(NamedKey::Escape) => Some("escape".to_owned()),
            Key::Named(NamedKey::Space) => Some("space".to_owned()),
            Key::Named(NamedKey::Enter) => Some("enter".to_owned()),
            Key::Named(NamedKey::ArrowLeft) => Some("left".to_owned()),
            Key::Named(NamedKey::ArrowRight) => Some("right".to_owned()),
            Key::Named(NamedKey::ArrowUp) => Some("up".to_owned()),
            Key::Named(NamedKey::ArrowDown) => Some("down".to_owned()),
            Key::Character(c) => Some(c.to_string().to_lowercase()),
            _ => None,
        };
        if let Some(name) = name {
            self.pending_keys.push(name);
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                eprintln!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                eprintln!("Failed to resize buffer: {e}");
            }
        }
        self.canvas = Pixmap::new(new_size.width, new_size.height);
        if let Some(scene) = &mut self.scene {
            scene.resize(new_size.width, new_size.height);
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        println!("\nExperiment session closed.");
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                eprintln!("Failed to create window and surface: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    eprintln!("{e}");
                    self.should_exit = true;
                }
                if self.should_exit {
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(event.logical_key);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
