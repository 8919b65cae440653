use log::error;
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};

use crate::keyboard::{self, Input};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

const ON_COLOR: u32 = 0x00FF_FFFF;
const OFF_COLOR: u32 = 0x0000_0000;

/// Rendering surface consumed by the framebuffer model. One `set_pixel` per
/// toggled pixel, one `present` per sprite draw or explicit clear.
pub trait Screen {
    fn clear(&mut self);
    fn set_pixel(&mut self, x: usize, y: usize, on: bool);
    fn present(&mut self);
}

/// The 64x32 monochrome pixel grid. Sprites are XORed in; a draw is atomic
/// with respect to screen state and reports whether it turned any lit pixel
/// off.
pub struct FrameBuffer {
    pixels: [[bool; WIDTH]; HEIGHT],
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: [[false; WIDTH]; HEIGHT],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[y][x]
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|row| row.iter().all(|&p| !p))
    }

    pub fn clear<S: Screen>(&mut self, screen: &mut S) {
        self.pixels = [[false; WIDTH]; HEIGHT];
        screen.clear();
        screen.present();
    }

    /// XOR-draws an 8-bit-wide sprite, one byte per row, at (x, y). The
    /// origin always wraps onto the grid; pixels past the right or bottom
    /// edge are skipped when `clip` is set and wrap around otherwise.
    /// Returns the collision flag: true when any pixel flipped from on to
    /// off, accumulated across the whole sprite.
    pub fn draw_sprite<S: Screen>(
        &mut self,
        x: u8,
        y: u8,
        rows: &[u8],
        clip: bool,
        screen: &mut S,
    ) -> bool {
        let origin_x = x as usize % WIDTH;
        let origin_y = y as usize % HEIGHT;
        let mut collision = false;
        for (row_offset, &row) in rows.iter().enumerate() {
            for bit in 0..8 {
                if (row >> (7 - bit)) & 1 == 0 {
                    continue;
                }
                let (mut px, mut py) = (origin_x + bit, origin_y + row_offset);
                if clip {
                    if px >= WIDTH || py >= HEIGHT {
                        continue;
                    }
                } else {
                    px %= WIDTH;
                    py %= HEIGHT;
                }
                let was_lit = self.pixels[py][px];
                self.pixels[py][px] = !was_lit;
                if was_lit {
                    collision = true;
                }
                screen.set_pixel(px, py, !was_lit);
            }
        }
        screen.present();
        collision
    }
}

/// A minifb window serving as both the rendering surface and the host input
/// source; minifb refreshes its key state on `present`.
pub struct WindowScreen {
    window: Window,
    buffer: Vec<u32>,
}

impl WindowScreen {
    pub fn new(title: &str) -> anyhow::Result<Self> {
        let mut window = Window::new(
            title,
            WIDTH,
            HEIGHT,
            WindowOptions {
                scale: Scale::X16,
                ..WindowOptions::default()
            },
        )?;
        window.limit_update_rate(Some(std::time::Duration::from_micros(16600)));
        Ok(Self {
            window,
            buffer: vec![OFF_COLOR; WIDTH * HEIGHT],
        })
    }
}

impl Screen for WindowScreen {
    fn clear(&mut self) {
        self.buffer.fill(OFF_COLOR);
    }

    fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        self.buffer[y * WIDTH + x] = if on { ON_COLOR } else { OFF_COLOR };
    }

    fn present(&mut self) {
        if let Err(e) = self.window.update_with_buffer(&self.buffer, WIDTH, HEIGHT) {
            error!("window update failed: {e}");
        }
    }
}

impl Input for WindowScreen {
    fn pressed_keys(&self) -> Vec<u8> {
        keyboard::keypad_codes(&self.window.get_keys())
    }

    fn keys_down(&self) -> Vec<u8> {
        keyboard::keypad_codes(&self.window.get_keys_pressed(KeyRepeat::No))
    }

    fn keys_up(&self) -> Vec<u8> {
        keyboard::keypad_codes(&self.window.get_keys_released())
    }

    fn quit_requested(&self) -> bool {
        !self.window.is_open() || self.window.is_key_down(Key::Escape)
    }
}
