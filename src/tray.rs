//! Tray icon lifecycle controller.
//!
//! Each entry is identified by the (owning window, numeric id) pair and moves
//! through `Unregistered → Added → Updated* → Removed`; `Removed` is
//! terminal. No transition skips `Added`: modifying or deleting an entry the
//! shell has never seen is a contract violation, reported as
//! `InvalidStateTransition` without touching the OS.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{NotifyError, Result};
use crate::guid::Guid;
use crate::native::{BalloonPayload, IconHandle, NativeApi, TrayAttributes, WindowHandle};

/// Lifecycle state of one tray entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconState {
    Unregistered,
    Added,
    Updated,
    Removed,
}

impl fmt::Display for IconState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IconState::Unregistered => "unregistered",
            IconState::Added => "added",
            IconState::Updated => "updated",
            IconState::Removed => "removed",
        };
        f.write_str(name)
    }
}

struct Entry {
    state: IconState,
    glyph: Option<IconHandle>,
    guid: Option<Guid>,
}

pub struct TrayIconController {
    api: Arc<dyn NativeApi>,
    entries: HashMap<(WindowHandle, u32), Entry>,
}

impl TrayIconController {
    pub fn new(api: Arc<dyn NativeApi>) -> Self {
        Self {
            api,
            entries: HashMap::new(),
        }
    }

    /// Current state of the (window, id) entry; unknown pairs are
    /// `Unregistered`.
    pub fn state(&self, window: WindowHandle, id: u32) -> IconState {
        self.entries
            .get(&(window, id))
            .map_or(IconState::Unregistered, |e| e.state)
    }

    /// True while the entry is present in the tray (`Added` or `Updated`).
    pub fn is_active(&self, window: WindowHandle, id: u32) -> bool {
        matches!(
            self.state(window, id),
            IconState::Added | IconState::Updated
        )
    }

    /// Insert the entry into the tray with icon, callback message and tip.
    pub fn add(&mut self, window: WindowHandle, id: u32, attrs: TrayAttributes) -> Result<()> {
        let state = self.state(window, id);
        if state != IconState::Unregistered {
            return Err(NotifyError::InvalidStateTransition {
                operation: "add",
                state,
            });
        }
        self.api.notify_icon_add(window, id, &attrs)?;
        self.entries.insert(
            (window, id),
            Entry {
                state: IconState::Added,
                glyph: Some(attrs.glyph),
                guid: attrs.guid,
            },
        );
        info!(id, tip = %attrs.tip, "tray icon added");
        Ok(())
    }

    /// Post a balloon by modifying an added entry with only the balloon-info
    /// flag set. The payload is handed to the shell and not retained.
    pub fn post_balloon(
        &mut self,
        window: WindowHandle,
        id: u32,
        payload: &BalloonPayload,
    ) -> Result<()> {
        let entry = match self.entries.get_mut(&(window, id)) {
            Some(entry) if matches!(entry.state, IconState::Added | IconState::Updated) => entry,
            other => {
                return Err(NotifyError::InvalidStateTransition {
                    operation: "post_balloon",
                    state: other.map_or(IconState::Unregistered, |e| e.state),
                });
            }
        };
        self.api.notify_icon_balloon(window, id, payload, entry.guid)?;
        entry.state = IconState::Updated;
        info!(
            id,
            title = %payload.title,
            info_flags = payload.severity.info_flags(),
            "balloon posted"
        );
        Ok(())
    }

    /// Delete the entry from the tray and release its glyph handle.
    pub fn remove(&mut self, window: WindowHandle, id: u32) -> Result<()> {
        let entry = match self.entries.get_mut(&(window, id)) {
            Some(entry) if matches!(entry.state, IconState::Added | IconState::Updated) => entry,
            other => {
                return Err(NotifyError::InvalidStateTransition {
                    operation: "remove",
                    state: other.map_or(IconState::Unregistered, |e| e.state),
                });
            }
        };
        self.api.notify_icon_delete(window, id, entry.guid)?;
        entry.state = IconState::Removed;
        if let Some(glyph) = entry.glyph.take() {
            self.api.destroy_icon(glyph);
        }
        info!(id, "tray icon removed");
        Ok(())
    }
}

/// Load the balloon glyph: the icon file when present, otherwise the stock
/// information icon. Fails only when both loads fail.
pub fn acquire_glyph(api: &Arc<dyn NativeApi>, icon_path: Option<&Path>) -> Result<IconHandle> {
    if let Some(path) = icon_path {
        match api.load_icon_file(path) {
            Ok(glyph) => return Ok(glyph),
            Err(e) => {
                warn!(path = %path.display(), %e, "icon file unavailable; using stock glyph");
            }
        }
    }
    api.load_stock_info_icon()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::fake::FakeNative;
    use crate::native::{CALLBACK_MESSAGE, Severity};
    use std::sync::atomic::Ordering;

    const ID: u32 = 0;

    fn attrs(glyph: IconHandle) -> TrayAttributes {
        TrayAttributes {
            glyph,
            tip: "Traybell".into(),
            callback_message: CALLBACK_MESSAGE,
            guid: None,
        }
    }

    fn payload() -> BalloonPayload {
        BalloonPayload {
            title: "Traybell".into(),
            message: "You've been bugged!".into(),
            severity: Severity::User,
            timeout_or_version: 0,
        }
    }

    fn controller(api: &Arc<FakeNative>) -> TrayIconController {
        let shared: Arc<dyn NativeApi> = api.clone();
        TrayIconController::new(shared)
    }

    #[test]
    fn add_transitions_to_added() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        let window = WindowHandle(1);
        tray.add(window, ID, attrs(IconHandle(7))).unwrap();
        assert_eq!(tray.state(window, ID), IconState::Added);
        assert!(tray.is_active(window, ID));
    }

    #[test]
    fn double_add_is_a_contract_violation() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        let window = WindowHandle(1);
        tray.add(window, ID, attrs(IconHandle(7))).unwrap();
        let err = tray.add(window, ID, attrs(IconHandle(8))).unwrap_err();
        assert!(matches!(
            err,
            NotifyError::InvalidStateTransition {
                operation: "add",
                state: IconState::Added,
            }
        ));
    }

    #[test]
    fn balloon_before_add_is_a_contract_violation() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        let err = tray
            .post_balloon(WindowHandle(1), ID, &payload())
            .unwrap_err();
        assert!(matches!(
            err,
            NotifyError::InvalidStateTransition {
                operation: "post_balloon",
                state: IconState::Unregistered,
            }
        ));
    }

    #[test]
    fn balloon_after_add_transitions_to_updated() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        let window = WindowHandle(1);
        tray.add(window, ID, attrs(IconHandle(7))).unwrap();
        tray.post_balloon(window, ID, &payload()).unwrap();
        assert_eq!(tray.state(window, ID), IconState::Updated);
        // A second balloon on an updated entry is still valid.
        tray.post_balloon(window, ID, &payload()).unwrap();
        assert_eq!(tray.state(window, ID), IconState::Updated);
    }

    #[test]
    fn remove_before_add_is_a_contract_violation() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        let err = tray.remove(WindowHandle(1), ID).unwrap_err();
        assert!(matches!(
            err,
            NotifyError::InvalidStateTransition {
                operation: "remove",
                state: IconState::Unregistered,
            }
        ));
    }

    #[test]
    fn remove_is_terminal_and_releases_the_glyph() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        let window = WindowHandle(1);
        tray.add(window, ID, attrs(IconHandle(7))).unwrap();
        tray.remove(window, ID).unwrap();
        assert_eq!(tray.state(window, ID), IconState::Removed);
        assert!(api.op_index("icon-glyph-release").is_some());
        assert!(api.op_index("icon-remove").unwrap() < api.op_index("icon-glyph-release").unwrap());

        let err = tray.remove(window, ID).unwrap_err();
        assert!(matches!(
            err,
            NotifyError::InvalidStateTransition {
                operation: "remove",
                state: IconState::Removed,
            }
        ));
        // Re-adding a removed entry is equally invalid.
        let err = tray.add(window, ID, attrs(IconHandle(9))).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidStateTransition { .. }));
    }

    #[test]
    fn os_rejection_does_not_advance_state() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        let window = WindowHandle(1);

        api.fail_icon_add.store(true, Ordering::Relaxed);
        let err = tray.add(window, ID, attrs(IconHandle(7))).unwrap_err();
        assert!(matches!(err, NotifyError::IconAddFailed(_)));
        assert_eq!(tray.state(window, ID), IconState::Unregistered);

        api.fail_icon_add.store(false, Ordering::Relaxed);
        tray.add(window, ID, attrs(IconHandle(7))).unwrap();

        api.fail_balloon.store(true, Ordering::Relaxed);
        let err = tray.post_balloon(window, ID, &payload()).unwrap_err();
        assert!(matches!(err, NotifyError::BalloonPostFailed(_)));
        assert_eq!(tray.state(window, ID), IconState::Added);

        api.fail_icon_delete.store(true, Ordering::Relaxed);
        let err = tray.remove(window, ID).unwrap_err();
        assert!(matches!(err, NotifyError::IconRemoveFailed(_)));
        assert_eq!(tray.state(window, ID), IconState::Added);
    }

    #[test]
    fn entries_are_keyed_per_window_and_id() {
        let api = FakeNative::new();
        let mut tray = controller(&api);
        tray.add(WindowHandle(1), 0, attrs(IconHandle(7))).unwrap();
        tray.add(WindowHandle(1), 1, attrs(IconHandle(8))).unwrap();
        tray.add(WindowHandle(2), 0, attrs(IconHandle(9))).unwrap();
        assert_eq!(tray.state(WindowHandle(1), 1), IconState::Added);
        tray.remove(WindowHandle(1), 0).unwrap();
        assert_eq!(tray.state(WindowHandle(1), 0), IconState::Removed);
        assert_eq!(tray.state(WindowHandle(1), 1), IconState::Added);
        assert_eq!(tray.state(WindowHandle(2), 0), IconState::Added);
    }

    #[test]
    fn glyph_prefers_the_icon_file() {
        let api = FakeNative::new();
        let shared: Arc<dyn NativeApi> = api.clone();
        acquire_glyph(&shared, Some(Path::new("traybell.ico"))).unwrap();
        assert!(api.op_index("icon-file-load").is_some());
        assert!(api.op_index("icon-stock-load").is_none());
    }

    #[test]
    fn glyph_falls_back_to_the_stock_icon() {
        let api = FakeNative::new();
        api.fail_load_file_icon.store(true, Ordering::Relaxed);
        let shared: Arc<dyn NativeApi> = api.clone();
        acquire_glyph(&shared, Some(Path::new("traybell.ico"))).unwrap();
        assert!(api.op_index("icon-stock-load").is_some());
    }

    #[test]
    fn glyph_fails_only_when_both_loads_fail() {
        let api = FakeNative::new();
        api.fail_load_file_icon.store(true, Ordering::Relaxed);
        api.fail_load_stock_icon.store(true, Ordering::Relaxed);
        let shared: Arc<dyn NativeApi> = api.clone();
        let err = acquire_glyph(&shared, Some(Path::new("traybell.ico"))).unwrap_err();
        assert!(matches!(err, NotifyError::IconLoadFailed(_)));
    }

    #[test]
    fn glyph_without_a_path_uses_the_stock_icon() {
        let api = FakeNative::new();
        let shared: Arc<dyn NativeApi> = api.clone();
        acquire_glyph(&shared, None).unwrap();
        assert!(api.op_index("icon-stock-load").is_some());
        assert!(api.op_index("icon-file-load").is_none());
    }
}
