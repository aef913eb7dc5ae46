//! Native API capability boundary.
//!
//! The process-wide native surface (class registration, window lifetime,
//! message retrieval, tray operations) is modeled as a trait object injected
//! into each component instead of ambient globals, so the whole lifecycle is
//! drivable by a fake in tests. The window procedure is the single-method
//! [`MessageHandler`] capability, bound once at class-registration time; the
//! concurrency contract (single thread, synchronous dispatch, no reentry into
//! the loop) must be preserved by any implementation.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::guid::Guid;

/// Opaque window handle (only meaningful to the implementation that issued it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Opaque icon glyph handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IconHandle(pub isize);

/// Owning process module handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleHandle(pub isize);

/// Non-zero token returned by a successful class registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassAtom(pub u16);

/// Window-destroy notification.
pub const WM_DESTROY: u32 = 0x0002;
/// Close request; the default procedure answers it by destroying the window.
pub const WM_CLOSE: u32 = 0x0010;
/// Base of the application-defined message range.
pub const WM_USER: u32 = 0x0400;
/// Tray callback message routed to the owning window.
pub const CALLBACK_MESSAGE: u32 = WM_USER + 24;

// Balloon event codes delivered in the low word of the callback lparam.
#[allow(dead_code)]
pub const NIN_BALLOONSHOW: u32 = WM_USER + 2;
pub const NIN_BALLOONHIDE: u32 = WM_USER + 3;
pub const NIN_BALLOONTIMEOUT: u32 = WM_USER + 4;
pub const NIN_BALLOONUSERCLICK: u32 = WM_USER + 5;

// Fixed capacities of the tray record's string buffers, in UTF-16 elements
// including the terminator. Header sizes; the documented tip size of 64 is
// stale.
pub const TIP_CAPACITY: usize = 128;
pub const INFO_CAPACITY: usize = 256;
pub const INFO_TITLE_CAPACITY: usize = 64;

/// Bound copy into one of the record's fixed buffers: keep at most
/// `capacity - 1` UTF-16 units so the terminator always fits.
pub fn truncate_to_capacity(text: &str, capacity: usize) -> String {
    let mut out = String::with_capacity(text.len().min(capacity));
    let mut units = 0usize;
    for ch in text.chars() {
        units += ch.len_utf16();
        if units > capacity - 1 {
            break;
        }
        out.push(ch);
    }
    out
}

/// Balloon severity, controlling the glyph shown next to the title.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// The tray entry's own icon.
    User,
}

impl Severity {
    /// The info-flags value the shell expects for this severity.
    pub fn info_flags(self) -> u32 {
        match self {
            Severity::Info => 0x0000_0001,
            Severity::Warning => 0x0000_0002,
            Severity::Error => 0x0000_0003,
            Severity::User => 0x0000_0004,
        }
    }
}

/// Display attributes supplied when a tray entry is added.
#[derive(Clone, Debug)]
pub struct TrayAttributes {
    pub glyph: IconHandle,
    pub tip: String,
    pub callback_message: u32,
    /// Optional GUID identity tag; when set, the shell identifies the entry
    /// by GUID and all later operations must carry the same tag.
    pub guid: Option<Guid>,
}

/// Transient balloon payload, consumed by the shell when posted.
#[derive(Clone, Debug)]
pub struct BalloonPayload {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// Timeout/version overlay: the OS decides which interpretation is
    /// active from the operation it accompanies, so both live in one field.
    pub timeout_or_version: u32,
}

/// One retrieved queue message, carried losslessly between retrieval and
/// dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueuedMessage {
    pub window: WindowHandle,
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
    pub time: u32,
    pub point: (i32, i32),
}

/// Outcome of one blocking retrieval call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retrieved {
    /// An ordinary message to dispatch.
    Message(QueuedMessage),
    /// The queue signalled quit; the payload is the process exit code.
    Quit(i32),
}

/// The window procedure seam: invoked synchronously for every message
/// addressed to the owning window. Returns 0 when the message was handled
/// locally, otherwise the default procedure's result.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, window: WindowHandle, message: u32, wparam: usize, lparam: isize) -> isize;
}

/// Injected native call surface. All fallible operations surface the
/// OS-reported last-error text in their typed failure; none are retried.
pub trait NativeApi: Send + Sync {
    fn module_handle(&self) -> Result<ModuleHandle>;

    fn register_class(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
        module: ModuleHandle,
    ) -> Result<ClassAtom>;

    fn unregister_class(&self, name: &str, module: ModuleHandle) -> Result<()>;

    fn create_window(
        &self,
        class_name: &str,
        title: &str,
        module: ModuleHandle,
    ) -> Result<WindowHandle>;

    /// Destroy a window. The destroy notification is delivered to the bound
    /// handler synchronously, before this call returns.
    fn destroy_window(&self, window: WindowHandle) -> Result<()>;

    fn load_icon_file(&self, path: &Path) -> Result<IconHandle>;

    fn load_stock_info_icon(&self) -> Result<IconHandle>;

    fn destroy_icon(&self, icon: IconHandle);

    fn notify_icon_add(&self, window: WindowHandle, id: u32, attrs: &TrayAttributes) -> Result<()>;

    /// Modify-style update carrying only the balloon-info flag.
    fn notify_icon_balloon(
        &self,
        window: WindowHandle,
        id: u32,
        payload: &BalloonPayload,
        guid: Option<Guid>,
    ) -> Result<()>;

    /// Minimal removal request: size, window, id (plus the GUID tag when the
    /// entry was added with one).
    fn notify_icon_delete(&self, window: WindowHandle, id: u32, guid: Option<Guid>) -> Result<()>;

    /// Block until the next message addressed to `window` or a quit signal.
    fn next_message(&self, window: WindowHandle) -> Result<Retrieved>;

    /// Synchronously dispatch a retrieved message to the bound handler.
    fn dispatch_message(&self, message: &QueuedMessage);

    fn default_procedure(
        &self,
        window: WindowHandle,
        message: u32,
        wparam: usize,
        lparam: isize,
    ) -> isize;

    /// Request loop termination with the given process exit code.
    fn post_quit(&self, exit_code: i32);

    /// Post a close request to the window's queue (safe from other threads).
    fn post_close(&self, window: WindowHandle);
}
