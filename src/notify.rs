//! The window procedure driving balloon-dismissal teardown.
//!
//! Invoked synchronously by the message loop (or by the OS during a
//! `destroy_window` call) for every message addressed to the owning window.
//! Teardown order is a hard invariant: the icon entry is removed while the
//! window-destroy notification is being processed, so removal always
//! completes before the destruction does, and the class is unregistered only
//! after the destroying call returns.

use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use crate::error::EXIT_API_ERROR;
use crate::native::{
    CALLBACK_MESSAGE, MessageHandler, NIN_BALLOONHIDE, NIN_BALLOONTIMEOUT, NIN_BALLOONUSERCLICK,
    NativeApi, WM_DESTROY, WindowHandle,
};
use crate::registry::WindowClassRegistry;
use crate::tray::TrayIconController;

pub struct NotifyProcedure {
    api: Arc<dyn NativeApi>,
    tray: Arc<Mutex<TrayIconController>>,
    registry: Arc<Mutex<WindowClassRegistry>>,
    class_name: String,
    icon_id: u32,
}

impl NotifyProcedure {
    pub fn new(
        api: Arc<dyn NativeApi>,
        tray: Arc<Mutex<TrayIconController>>,
        registry: Arc<Mutex<WindowClassRegistry>>,
        class_name: impl Into<String>,
        icon_id: u32,
    ) -> Self {
        Self {
            api,
            tray,
            registry,
            class_name: class_name.into(),
            icon_id,
        }
    }

    /// Balloon dismissed (hidden, timed out, or clicked): destroy the owning
    /// window, then unregister its class. All three events get identical
    /// fire-and-teardown treatment. Failures here leak native resources, so
    /// they escalate to an API-error exit code.
    fn tear_down(&self, window: WindowHandle) {
        if let Err(e) = self.api.destroy_window(window) {
            error!(%e, "window destruction failed during balloon teardown");
            self.api.post_quit(i32::from(EXIT_API_ERROR));
            return;
        }
        if let Err(e) = self.registry.lock().unwrap().unregister(&self.class_name) {
            error!(%e, "class unregistration failed during balloon teardown");
            self.api.post_quit(i32::from(EXIT_API_ERROR));
        }
    }

    /// The window is going away: issue the minimal removal request for the
    /// entry (when one was added) and request quit. Exit code 0 only when the
    /// tray is left clean.
    fn on_destroy(&self, window: WindowHandle) {
        let mut tray = self.tray.lock().unwrap();
        if tray.is_active(window, self.icon_id) {
            match tray.remove(window, self.icon_id) {
                Ok(()) => self.api.post_quit(0),
                Err(e) => {
                    error!(%e, "icon removal failed during window teardown");
                    self.api.post_quit(i32::from(EXIT_API_ERROR));
                }
            }
        } else {
            self.api.post_quit(0);
        }
    }
}

impl MessageHandler for NotifyProcedure {
    fn handle(&self, window: WindowHandle, message: u32, wparam: usize, lparam: isize) -> isize {
        match message {
            CALLBACK_MESSAGE => {
                let event = (lparam & 0xFFFF) as u32;
                match event {
                    NIN_BALLOONHIDE | NIN_BALLOONTIMEOUT | NIN_BALLOONUSERCLICK => {
                        debug!(event, "balloon dismissed");
                        self.tear_down(window);
                    }
                    _ => debug!(event, "balloon event ignored"),
                }
                0
            }
            WM_DESTROY => {
                debug!("window destroy notification");
                self.on_destroy(window);
                0
            }
            _ => self.api.default_procedure(window, message, wparam, lparam),
        }
    }
}
