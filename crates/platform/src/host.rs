//! Event pumping and the renderer-facing window interface.
//!
//! The renderer never touches winit directly. It sees a [`WindowEvents`]
//! implementation that answers four questions: how big is the framebuffer,
//! has it been resized since the last check, does the user want to close,
//! and please block until something happens.
//!
//! [`WindowHost`] drives winit with `pump_app_events` so the frame loop stays
//! in control of the thread. Events are forwarded from the winit callback as
//! [`WindowSignal`]s over an mpsc channel and folded into [`EventState`]
//! after each pump.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use trigon_core::{EngineConfig, Error, Result};

use crate::window::Window;

/// Pumps needed before giving up on the initial `resumed` callback.
const MAX_STARTUP_PUMPS: usize = 100;

/// Narrow interface the frame loop and resize handler use.
pub trait WindowEvents {
    /// Current framebuffer size in pixels. Zero while minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Processes pending events without blocking.
    fn poll_events(&mut self);

    /// Blocks until at least one event arrives, then processes it.
    fn wait_events(&mut self);

    /// Returns the latest size change since the previous call, if any.
    fn take_resize(&mut self) -> Option<(u32, u32)>;

    /// Whether the user asked to close the window.
    fn close_requested(&self) -> bool;
}

/// Window event forwarded out of the winit callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowSignal {
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// Accumulated result of the signals seen so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventState {
    pub size: (u32, u32),
    pub pending_resize: Option<(u32, u32)>,
    pub close_requested: bool,
}

impl EventState {
    pub fn new(size: (u32, u32)) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Folds one signal in. Consecutive resizes coalesce to the latest size.
    pub fn apply(&mut self, signal: WindowSignal) {
        match signal {
            WindowSignal::Resized { width, height } => {
                self.size = (width, height);
                self.pending_resize = Some((width, height));
            }
            WindowSignal::CloseRequested => self.close_requested = true,
        }
    }
}

/// winit application handler. Creates the window on `resumed` and forwards
/// window events.
struct HostHandler {
    title: String,
    width: u32,
    height: u32,
    /// Holds the new window until the host takes it.
    window: Option<Window>,
    created: bool,
    error: Option<Error>,
    sender: Sender<WindowSignal>,
}

impl ApplicationHandler for HostHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created {
            return;
        }

        match Window::new(event_loop, self.width, self.height, &self.title) {
            Ok(window) => {
                self.window = Some(window);
                self.created = true;
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let signal = match event {
            WindowEvent::Resized(size) => WindowSignal::Resized {
                width: size.width,
                height: size.height,
            },
            WindowEvent::CloseRequested => WindowSignal::CloseRequested,
            _ => return,
        };

        // The receiver lives as long as the host, so a send only fails
        // during teardown.
        let _ = self.sender.send(signal);
    }
}

/// Owns the event loop and the single application window.
pub struct WindowHost {
    window: Window,
    handler: HostHandler,
    signals: Receiver<WindowSignal>,
    state: EventState,
    // Dropped last: the window must go before its event loop.
    event_loop: EventLoop<()>,
}

impl WindowHost {
    /// Creates the event loop and pumps it until the window exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the event loop or window cannot be
    /// created.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut event_loop =
            EventLoop::new().map_err(|e| Error::Window(format!("Failed to create event loop: {}", e)))?;

        let (sender, signals) = mpsc::channel();
        let mut handler = HostHandler {
            title: config.title.clone(),
            width: config.width,
            height: config.height,
            window: None,
            created: false,
            error: None,
            sender,
        };

        for _ in 0..MAX_STARTUP_PUMPS {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut handler);

            if let Some(e) = handler.error.take() {
                return Err(e);
            }
            if handler.window.is_some() {
                break;
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::Window(format!(
                    "Event loop exited with code {} before the window was created",
                    code
                )));
            }
        }

        let window = handler
            .window
            .take()
            .ok_or_else(|| Error::Window("Window was never created".to_string()))?;
        let size = window.size();

        Ok(Self {
            window,
            handler,
            signals,
            state: EventState::new(size),
            event_loop,
        })
    }

    /// The application window.
    pub fn window(&self) -> &Window {
        &self.window
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        let status = self.event_loop.pump_app_events(timeout, &mut self.handler);

        while let Ok(signal) = self.signals.try_recv() {
            self.state.apply(signal);
        }

        if let PumpStatus::Exit(_) = status {
            self.state.close_requested = true;
        }

        let (width, height) = self.state.size;
        if self.window.size() != (width, height) {
            self.window.set_size(width, height);
        }
    }
}

impl WindowEvents for WindowHost {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.state.size
    }

    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn take_resize(&mut self) -> Option<(u32, u32)> {
        self.state.pending_resize.take()
    }

    fn close_requested(&self) -> bool {
        self.state.close_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resizes_coalesce() {
        let mut state = EventState::new((800, 600));
        state.apply(WindowSignal::Resized {
            width: 1024,
            height: 768,
        });
        state.apply(WindowSignal::Resized {
            width: 1280,
            height: 720,
        });

        assert_eq!(state.size, (1280, 720));
        assert_eq!(state.pending_resize.take(), Some((1280, 720)));
        assert_eq!(state.pending_resize, None);
    }

    #[test]
    fn test_minimize_reports_zero_size() {
        let mut state = EventState::new((800, 600));
        state.apply(WindowSignal::Resized {
            width: 0,
            height: 0,
        });
        assert_eq!(state.size, (0, 0));
        assert!(!state.close_requested);
    }

    #[test]
    fn test_close_is_sticky() {
        let mut state = EventState::new((800, 600));
        state.apply(WindowSignal::CloseRequested);
        state.apply(WindowSignal::Resized {
            width: 10,
            height: 10,
        });
        assert!(state.close_requested);
    }
}
