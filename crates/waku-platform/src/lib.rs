// SPDX-License-Identifier: CEPL-1.0
//! winit window host. Owns the event loop and the one window, and forwards
//! window events as [`PlatformEvent`] values through a registered sink.

use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info};
use waku_render::{RenderSize, WindowHost};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowId},
};

pub use winit;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    Resized(RenderSize),
    Key { code: KeyCode, pressed: bool },
    Focused(bool),
    CloseRequested,
}

pub type EventSink = Box<dyn FnMut(PlatformEvent)>;

#[derive(Clone, Debug)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            title: "Waku".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

struct Shell {
    desc: WindowDesc,
    window: Option<Window>,
    sink: Option<EventSink>,
    closing: bool,
    error: Option<anyhow::Error>,
}

impl Shell {
    fn emit(&mut self, ev: PlatformEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink(ev);
        }
    }
}

/// Translate the window events the app cares about. Key repeats are dropped.
fn translate(event: &WindowEvent) -> Option<PlatformEvent> {
    match event {
        WindowEvent::CloseRequested => Some(PlatformEvent::CloseRequested),
        WindowEvent::Resized(size) => Some(PlatformEvent::Resized(RenderSize::new(
            size.width,
            size.height,
        ))),
        WindowEvent::Focused(f) => Some(PlatformEvent::Focused(*f)),
        WindowEvent::KeyboardInput { event, .. } if !event.repeat => match event.physical_key {
            PhysicalKey::Code(code) => Some(PlatformEvent::Key {
                code,
                pressed: event.state == ElementState::Pressed,
            }),
            PhysicalKey::Unidentified(_) => None,
        },
        _ => None,
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.desc.title.clone())
            .with_inner_size(LogicalSize::new(self.desc.width, self.desc.height))
            .with_resizable(true);
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let size = window.inner_size();
                info!("window created {}x{}", size.width, size.height);
                self.window = Some(window);
            }
            Err(e) => {
                self.error = Some(anyhow!(e).context("create_window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window.as_ref().is_some_and(|w| w.id() != id) {
            return;
        }
        let Some(ev) = translate(&event) else {
            return;
        };
        match ev {
            PlatformEvent::CloseRequested => {
                info!("CloseRequested");
                self.closing = true;
            }
            PlatformEvent::Resized(size) => debug!("Resized → {}x{}", size.width, size.height),
            _ => {}
        }
        self.emit(ev);
    }
}

pub struct Platform {
    event_loop: EventLoop<()>,
    shell: Shell,
}

impl Platform {
    /// Create the event loop and pump it until the window exists.
    pub fn new(desc: WindowDesc) -> Result<Self> {
        let event_loop = EventLoop::new().context("EventLoop::new")?;
        let mut platform = Self {
            event_loop,
            shell: Shell {
                desc,
                window: None,
                sink: None,
                closing: false,
                error: None,
            },
        };
        while platform.shell.window.is_none() {
            platform.pump_with(Some(Duration::from_millis(10)))?;
            if platform.shell.closing {
                bail!("event loop exited before the window was created");
            }
        }
        Ok(platform)
    }

    /// Register the closure that receives every translated window event.
    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.shell.sink = Some(sink);
    }

    pub fn window(&self) -> Result<&Window> {
        self.shell
            .window
            .as_ref()
            .ok_or_else(|| anyhow!("window not created"))
    }

    pub fn set_title(&self, title: &str) {
        if let Some(w) = &self.shell.window {
            w.set_title(title);
        }
    }

    /// Dispatch pending events without blocking.
    pub fn pump(&mut self) -> Result<()> {
        self.pump_with(Some(Duration::ZERO))
    }

    fn pump_with(&mut self, timeout: Option<Duration>) -> Result<()> {
        let status = self.event_loop.pump_app_events(timeout, &mut self.shell);
        if let Some(e) = self.shell.error.take() {
            return Err(e);
        }
        if let PumpStatus::Exit(code) = status {
            debug!("event loop exit ({code})");
            self.shell.closing = true;
        }
        Ok(())
    }
}

impl WindowHost for Platform {
    fn framebuffer_size(&self) -> RenderSize {
        self.shell
            .window
            .as_ref()
            .map(|w| {
                let s = w.inner_size();
                RenderSize::new(s.width, s.height)
            })
            .unwrap_or_default()
    }

    fn wait_events(&mut self) {
        // None blocks until the OS delivers something.
        if let Err(e) = self.pump_with(None) {
            tracing::error!("event pump failed: {e:#}");
            self.shell.closing = true;
        }
    }

    fn is_closing(&self) -> bool {
        self.shell.closing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalSize;

    #[test]
    fn resize_is_forwarded_in_physical_pixels() {
        let ev = translate(&WindowEvent::Resized(PhysicalSize::new(1280, 0)));
        assert_eq!(ev, Some(PlatformEvent::Resized(RenderSize::new(1280, 0))));
    }

    #[test]
    fn focus_and_close_are_forwarded() {
        assert_eq!(
            translate(&WindowEvent::Focused(false)),
            Some(PlatformEvent::Focused(false))
        );
        assert_eq!(
            translate(&WindowEvent::CloseRequested),
            Some(PlatformEvent::CloseRequested)
        );
    }

    #[test]
    fn unrelated_events_are_ignored() {
        assert_eq!(translate(&WindowEvent::Occluded(true)), None);
    }

    #[test]
    fn default_window_matches_app_title() {
        let d = WindowDesc::default();
        assert_eq!((d.title.as_str(), d.width, d.height), ("Waku", 800, 600));
    }
}
