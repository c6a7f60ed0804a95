// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Frame presentation and key input
//!
//! - [`MacroquadDisplay`]: window, the frame pump runs inside the macroquad
//!   loop and awaits `next_frame()` between steps
//! - [`HeadlessDisplay`]: no window, frames are only counted

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use macroquad::prelude::{
    clear_background, draw_texture_ex, get_char_pressed, is_key_pressed, screen_height,
    screen_width, vec2, DrawTextureParams, FilterMode, Image, KeyCode, Texture2D, BLACK, WHITE,
};
use tracing::{debug, info};

use crate::detection::Frame;

/// Shows annotated frames and reports pressed keys
pub trait Display {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()>;

    /// Key pressed since the last call, if any
    fn poll_key(&mut self) -> Option<char>;

    fn close(&mut self) {}
}

/// Escape as reported by [`Display::poll_key`]
pub const KEY_ESCAPE: char = '\u{1b}';

/// Key reported once the stop flag is raised (Ctrl-C)
const STOP_KEY: char = 'q';

fn stop_requested(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref().map(|f| f.load(Ordering::SeqCst)).unwrap_or(false)
}

#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    shown: u64,
    stop: Option<Arc<AtomicBool>>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an exit key once `stop` is set
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl Display for HeadlessDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        if self.shown == 0 {
            info!("🖥️ headless mode: {} ({}x{}) not displayed", window, frame.width(), frame.height());
        }
        self.shown += 1;
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        stop_requested(&self.stop).then_some(STOP_KEY)
    }

    fn close(&mut self) {
        debug!("headless display closed after {} frames", self.shown);
    }
}

/// Window backed by macroquad; must be used from inside `macroquad::Window`
#[derive(Default)]
pub struct MacroquadDisplay {
    texture: Option<Texture2D>,
    rgba: Vec<u8>, // reused RGBA upload buffer
    stop: Option<Arc<AtomicBool>>,
}

impl MacroquadDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn upload(&mut self, frame: &Frame) {
        let (w, h) = frame.dimensions();
        self.rgba.clear();
        self.rgba.reserve((w * h * 4) as usize);
        for px in frame.pixels() {
            self.rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }

        // rebuild only when the resolution changes
        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != w as f32 || tex.height() != h as f32,
            None => true,
        };
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w as u16, h as u16, &self.rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            let img = Image {
                bytes: self.rgba.clone(),
                width: w as u16,
                height: h as u16,
            };
            tex.update(&img);
        }
    }
}

impl Display for MacroquadDisplay {
    fn show(&mut self, _window: &str, frame: &Frame) -> Result<()> {
        self.upload(frame);
        clear_background(BLACK);

        if let Some(texture) = &self.texture {
            // fit inside the window, keep aspect ratio
            let scale = (screen_width() / texture.width()).min(screen_height() / texture.height());
            let (dw, dh) = (texture.width() * scale, texture.height() * scale);
            draw_texture_ex(
                texture,
                (screen_width() - dw) / 2.0,
                (screen_height() - dh) / 2.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(dw, dh)),
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        if stop_requested(&self.stop) {
            return Some(STOP_KEY);
        }
        if is_key_pressed(KeyCode::Escape) {
            return Some(KEY_ESCAPE);
        }
        get_char_pressed()
    }

    fn close(&mut self) {
        self.texture = None;
        info!("🪟 window closed");
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::collections::VecDeque;

    /// Display recording what was shown and replaying scripted keys
    #[derive(Default)]
    pub struct ScriptedDisplay {
        pub keys: VecDeque<Option<char>>,
        pub shown: Vec<Frame>,
        pub fail_next_show: bool,
        pub closed: bool,
    }

    impl Display for ScriptedDisplay {
        fn show(&mut self, _window: &str, frame: &Frame) -> Result<()> {
            if std::mem::take(&mut self.fail_next_show) {
                anyhow::bail!("window lost");
            }
            self.shown.push(frame.clone());
            Ok(())
        }

        fn poll_key(&mut self) -> Option<char> {
            self.keys.pop_front().flatten()
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }
}
