//! Live preview window via `minifb`.

use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

const WINDOW_TITLE: &str = "Rollcall Attendance";
const TARGET_FPS: usize = 30;

/// Key used to leave the capture loop.
const QUIT_KEY: Key = Key::Q;
/// Key used to start enrollment of the pending unknown face.
const ENROLL_KEY: Key = Key::E;

/// Operator input observed while presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    Quit,
    Enroll,
}

/// Window showing the annotated feed and polling operator keys.
pub struct Display {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl Display {
    pub fn open(width: u32, height: u32) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            WINDOW_TITLE,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )?;
        window.set_target_fps(TARGET_FPS);

        Ok(Self {
            window,
            buffer: vec![0; (width * height) as usize],
            width: width as usize,
            height: height as usize,
        })
    }

    /// Closing the window counts as quitting.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// Present one annotated frame and report any operator command.
    pub fn show(&mut self, frame: &RgbImage) -> Result<Command, minifb::Error> {
        for (slot, pixel) in self.buffer.iter_mut().zip(frame.pixels()) {
            let [r, g, b] = pixel.0;
            *slot = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
        }
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;

        if self.window.is_key_pressed(QUIT_KEY, KeyRepeat::No) {
            return Ok(Command::Quit);
        }
        if self.window.is_key_pressed(ENROLL_KEY, KeyRepeat::No) {
            return Ok(Command::Enroll);
        }
        Ok(Command::None)
    }
}
