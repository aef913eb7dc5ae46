//! One notification delivery, end to end.
//!
//! Setup runs leaf-first (class → window → glyph → tray entry → balloon) and
//! any late failure unwinds the steps already completed, in reverse order,
//! before the error is surfaced. After the loop returns, the class is
//! unregistered here unless the balloon-dismissal path already did it (the
//! close-request path destroys the window but leaves the class to us).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::Result;
use crate::guid::Guid;
use crate::msgloop::MessageLoop;
use crate::native::{
    BalloonPayload, CALLBACK_MESSAGE, INFO_CAPACITY, INFO_TITLE_CAPACITY, NativeApi, Severity,
    TIP_CAPACITY, TrayAttributes, WindowHandle, truncate_to_capacity,
};
use crate::notify::NotifyProcedure;
use crate::registry::WindowClassRegistry;
use crate::tray::{TrayIconController, acquire_glyph};

/// Window class owned by this process for the notification's lifetime.
pub const CLASS_NAME: &str = "traybell_notify";
/// Window title and tray tip text.
pub const APP_NAME: &str = "Traybell";
/// Numeric id of the single tray entry.
pub const TRAY_ICON_ID: u32 = 0;

/// Everything one delivery needs, distilled from the CLI.
pub struct NotifyRequest {
    pub message: String,
    pub title: String,
    pub severity: Severity,
    pub guid: Option<Guid>,
    pub icon_path: Option<PathBuf>,
}

fn unwind_setup(
    api: &Arc<dyn NativeApi>,
    registry: &Arc<Mutex<WindowClassRegistry>>,
    window: Option<WindowHandle>,
) {
    if let Some(window) = window {
        if let Err(e) = api.destroy_window(window) {
            warn!(%e, "window destruction failed while unwinding setup");
        }
    }
    let mut registry = registry.lock().unwrap();
    if registry.is_registered(CLASS_NAME) {
        if let Err(e) = registry.unregister(CLASS_NAME) {
            warn!(%e, "class unregistration failed while unwinding setup");
        }
    }
}

/// Deliver one balloon notification and block until it is dismissed.
/// Returns the message loop's exit code.
pub fn deliver(api: Arc<dyn NativeApi>, request: &NotifyRequest) -> Result<i32> {
    let module = api.module_handle()?;
    let registry = Arc::new(Mutex::new(WindowClassRegistry::new(api.clone(), module)));
    let tray = Arc::new(Mutex::new(TrayIconController::new(api.clone())));
    let handler = Arc::new(NotifyProcedure::new(
        api.clone(),
        tray.clone(),
        registry.clone(),
        CLASS_NAME,
        TRAY_ICON_ID,
    ));

    registry.lock().unwrap().register(CLASS_NAME, handler)?;

    let window = match api.create_window(CLASS_NAME, APP_NAME, module) {
        Ok(window) => window,
        Err(e) => {
            unwind_setup(&api, &registry, None);
            return Err(e);
        }
    };

    // Ctrl+C must not touch native teardown from the signal thread; posting a
    // close request routes shutdown through the normal destroy path on the
    // loop thread, so the icon still comes out of the tray.
    #[cfg(windows)]
    {
        let api_for_signal = api.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::info!("interrupt received; requesting window close");
            api_for_signal.post_close(window);
        }) {
            warn!(%e, "interrupt handler not installed");
        }
    }

    let glyph = match acquire_glyph(&api, request.icon_path.as_deref()) {
        Ok(glyph) => glyph,
        Err(e) => {
            unwind_setup(&api, &registry, Some(window));
            return Err(e);
        }
    };

    if let Some(guid) = request.guid {
        info!(guid = %guid, "tagging tray entry with GUID identity");
    }

    let attrs = TrayAttributes {
        glyph,
        tip: truncate_to_capacity(APP_NAME, TIP_CAPACITY),
        callback_message: CALLBACK_MESSAGE,
        guid: request.guid,
    };
    // Bind each controller result before unwinding: the unwind destroys the
    // window, and the destroy notification re-enters the controller lock.
    let added = tray.lock().unwrap().add(window, TRAY_ICON_ID, attrs);
    if let Err(e) = added {
        // The entry never took ownership of the glyph.
        api.destroy_icon(glyph);
        unwind_setup(&api, &registry, Some(window));
        return Err(e);
    }

    let payload = BalloonPayload {
        title: truncate_to_capacity(&request.title, INFO_TITLE_CAPACITY),
        message: truncate_to_capacity(&request.message, INFO_CAPACITY),
        severity: request.severity,
        timeout_or_version: 0,
    };
    let posted = tray
        .lock()
        .unwrap()
        .post_balloon(window, TRAY_ICON_ID, &payload);
    if let Err(e) = posted {
        unwind_setup(&api, &registry, Some(window));
        return Err(e);
    }

    let exit_code = match MessageLoop::new(api.clone(), window).run() {
        Ok(code) => code,
        Err(e) => {
            unwind_setup(&api, &registry, Some(window));
            return Err(e);
        }
    };

    {
        let mut registry = registry.lock().unwrap();
        if registry.is_registered(CLASS_NAME) {
            registry.unregister(CLASS_NAME)?;
        }
    }

    info!(exit_code, "notification delivered");
    Ok(exit_code)
}
