#![cfg(feature = "display-minifb")]

//! Live display window.
//!
//! The window is both the frame sink (redraw on emit) and the host event
//! pump: `pump_events` services window input and turns Escape/Q or a closed
//! window into a stop request on the shared cancel token. This is the
//! single-threaded cooperative host the session loop is designed around.

use anyhow::{Context, Result};
use minifb::{Key, Window, WindowOptions};

use crate::frame::Frame;
use crate::session::{CancelToken, HostPump};
use crate::sink::FrameSink;

pub struct DisplayWindow {
    window: Window,
    cancel: CancelToken,
    /// Last frame packed as 0RGB, kept so pump-only iterations can redraw.
    buffer: Vec<u32>,
    buffer_size: (usize, usize),
}

impl DisplayWindow {
    pub fn open(title: &str, width: u32, height: u32, cancel: CancelToken) -> Result<Self> {
        let window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )
        .context("could not open display window")?;

        Ok(Self {
            window,
            cancel,
            buffer: vec![0; (width * height) as usize],
            buffer_size: (width as usize, height as usize),
        })
    }
}

impl FrameSink for DisplayWindow {
    fn emit(&mut self, frame: &Frame) -> Result<()> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        self.buffer.clear();
        self.buffer.extend(
            frame
                .pixels()
                .chunks_exact(3)
                .map(|px| (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32),
        );
        self.buffer_size = (w, h);

        self.window
            .update_with_buffer(&self.buffer, w, h)
            .context("window redraw failed")
    }

    fn close(&mut self) {
        log::debug!("DisplayWindow: closed");
    }
}

impl HostPump for DisplayWindow {
    fn pump_events(&mut self) {
        self.window.update();

        if !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Q)
        {
            self.cancel.request_stop();
        }
    }
}
