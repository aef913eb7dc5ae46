//! Win32 implementation of the native capability surface.
//!
//! Every call site follows the same shape: make the call, and on the
//! boolean/zero failure signal fetch the last-error code immediately (the
//! side channel is overwritten by the next call), format it, and fold both
//! into the typed failure for that operation. Calls the `windows` crate
//! already surfaces as `Result` carry their formatted OS error the same way.
//!
//! The window procedure is a static trampoline: the handler bound at
//! class-registration time is stored once and every message the OS delivers
//! is forwarded to it on the registering thread.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{info, warn};
use widestring::U16CString;
use windows::Win32::Foundation::{
    GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, POINT, WPARAM,
};
use windows::Win32::System::Diagnostics::Debug::{
    FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS, FormatMessageW,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    NIF_GUID, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFY_ICON_INFOTIP_FLAGS, NOTIFYICONDATAW, Shell_NotifyIconW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CW_USEDEFAULT, CreateWindowExW, DefWindowProcW, DestroyIcon, DestroyWindow, DispatchMessageW,
    GetMessageW, HICON, IDI_INFORMATION, IDOK, IMAGE_ICON, LR_DEFAULTSIZE, LR_LOADFROMFILE,
    LoadIconW, LoadImageW, MB_ICONINFORMATION, MB_OK, MSG, MessageBoxW, PostMessageW,
    PostQuitMessage, RegisterClassW, UnregisterClassW, WINDOW_EX_STYLE, WINDOW_STYLE, WNDCLASSW,
    WS_OVERLAPPED, WS_SYSMENU,
};
use windows::core::{GUID, PCWSTR, PWSTR, w};

use crate::error::{NotifyError, Result};
use crate::guid::Guid;
use crate::native::{
    BalloonPayload, ClassAtom, IconHandle, MessageHandler, ModuleHandle, NativeApi, QueuedMessage,
    Retrieved, TrayAttributes, WM_CLOSE, WindowHandle,
};

// The OS dispatches into the static trampoline; the handler bound at
// class-registration time lives for the rest of the process.
static HANDLER: OnceCell<Arc<dyn MessageHandler>> = OnceCell::new();

/// Stateless capability object over the ambient Win32 API.
pub struct Win32Api;

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut core::ffi::c_void)
}

fn hicon(icon: IconHandle) -> HICON {
    HICON(icon.0 as *mut core::ffi::c_void)
}

fn hinstance(module: ModuleHandle) -> HINSTANCE {
    HINSTANCE(module.0 as *mut core::ffi::c_void)
}

fn os_guid(guid: Guid) -> GUID {
    GUID::from_values(guid.data1, guid.data2, guid.data3, guid.data4)
}

/// Format an OS error code into readable text. `MessageFormatFailed` when
/// the formatting call itself is rejected.
fn format_system_message(code: u32) -> Result<String> {
    let mut buffer = [0u16; 512];
    let length = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            None,
            code,
            0,
            PWSTR(buffer.as_mut_ptr()),
            buffer.len() as u32,
            None,
        )
    };
    if length == 0 {
        return Err(NotifyError::MessageFormatFailed { code });
    }
    let text = String::from_utf16_lossy(&buffer[..length as usize]);
    Ok(format!("{} (error {code:#010X})", text.trim_end()))
}

/// Fetch and format the last error, wrapping it into the caller's failure
/// kind. Must be called immediately after the failing native call.
fn last_error(wrap: fn(String) -> NotifyError) -> NotifyError {
    let code = unsafe { GetLastError() }.0;
    match format_system_message(code) {
        Ok(text) => wrap(text),
        Err(format_failure) => format_failure,
    }
}

/// NUL-terminated truncating copy into one of the record's fixed buffers.
fn copy_wide(dst: &mut [u16], src: &str) {
    let wide = U16CString::from_str_truncate(src);
    for (slot, &unit) in dst.iter_mut().zip(wide.as_slice_with_nul()) {
        *slot = unit;
    }
    dst[dst.len() - 1] = 0;
}

unsafe extern "system" fn notify_wndproc(
    window: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match HANDLER.get() {
        Some(handler) => LRESULT(handler.handle(
            WindowHandle(window.0 as isize),
            message,
            wparam.0,
            lparam.0,
        )),
        None => unsafe { DefWindowProcW(window, message, wparam, lparam) },
    }
}

impl NativeApi for Win32Api {
    fn module_handle(&self) -> Result<ModuleHandle> {
        let module = unsafe { GetModuleHandleW(None) }
            .map_err(|e| NotifyError::ModuleLookupFailed(e.to_string()))?;
        Ok(ModuleHandle(module.0 as isize))
    }

    fn register_class(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
        module: ModuleHandle,
    ) -> Result<ClassAtom> {
        if HANDLER.set(handler).is_err() {
            return Err(NotifyError::ClassRegistrationFailed(
                "a message handler is already bound in this process".into(),
            ));
        }
        let name_w = U16CString::from_str(name)
            .map_err(|e| NotifyError::ClassRegistrationFailed(format!("invalid class name: {e}")))?;
        let class = WNDCLASSW {
            lpfnWndProc: Some(notify_wndproc),
            hInstance: hinstance(module),
            lpszClassName: PCWSTR(name_w.as_ptr()),
            ..Default::default()
        };
        let atom = unsafe { RegisterClassW(&class) };
        if atom == 0 {
            return Err(last_error(NotifyError::ClassRegistrationFailed));
        }
        Ok(ClassAtom(atom))
    }

    fn unregister_class(&self, name: &str, module: ModuleHandle) -> Result<()> {
        let name_w = U16CString::from_str(name).map_err(|e| {
            NotifyError::ClassUnregistrationFailed(format!("invalid class name: {e}"))
        })?;
        unsafe { UnregisterClassW(PCWSTR(name_w.as_ptr()), Some(hinstance(module))) }
            .map_err(|e| NotifyError::ClassUnregistrationFailed(e.to_string()))
    }

    fn create_window(
        &self,
        class_name: &str,
        title: &str,
        module: ModuleHandle,
    ) -> Result<WindowHandle> {
        let class_w = U16CString::from_str(class_name)
            .map_err(|e| NotifyError::WindowCreationFailed(format!("invalid class name: {e}")))?;
        let title_w = U16CString::from_str(title)
            .map_err(|e| NotifyError::WindowCreationFailed(format!("invalid title: {e}")))?;
        // The window is never shown; it exists to own the tray entry and
        // receive its messages.
        let window = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(0),
                PCWSTR(class_w.as_ptr()),
                PCWSTR(title_w.as_ptr()),
                WINDOW_STYLE(WS_OVERLAPPED.0 | WS_SYSMENU.0),
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                Some(hinstance(module)),
                None,
            )
        }
        .map_err(|e| NotifyError::WindowCreationFailed(e.to_string()))?;
        Ok(WindowHandle(window.0 as isize))
    }

    fn destroy_window(&self, window: WindowHandle) -> Result<()> {
        unsafe { DestroyWindow(hwnd(window)) }
            .map_err(|e| NotifyError::WindowDestructionFailed(e.to_string()))
    }

    fn load_icon_file(&self, path: &Path) -> Result<IconHandle> {
        let path_w = U16CString::from_os_str(path.as_os_str())
            .map_err(|e| NotifyError::IconLoadFailed(format!("invalid icon path: {e}")))?;
        let handle = unsafe {
            LoadImageW(
                None,
                PCWSTR(path_w.as_ptr()),
                IMAGE_ICON,
                0,
                0,
                LR_LOADFROMFILE | LR_DEFAULTSIZE,
            )
        }
        .map_err(|e| NotifyError::IconLoadFailed(e.to_string()))?;
        Ok(IconHandle(handle.0 as isize))
    }

    fn load_stock_info_icon(&self) -> Result<IconHandle> {
        let icon = unsafe { LoadIconW(None, IDI_INFORMATION) }
            .map_err(|e| NotifyError::IconLoadFailed(e.to_string()))?;
        Ok(IconHandle(icon.0 as isize))
    }

    fn destroy_icon(&self, icon: IconHandle) {
        unsafe {
            let _ = DestroyIcon(hicon(icon));
        }
    }

    fn notify_icon_add(&self, window: WindowHandle, id: u32, attrs: &TrayAttributes) -> Result<()> {
        let mut data: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        data.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        data.hWnd = hwnd(window);
        data.uID = id;
        data.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
        data.uCallbackMessage = attrs.callback_message;
        data.hIcon = hicon(attrs.glyph);
        copy_wide(&mut data.szTip, &attrs.tip);
        if let Some(guid) = attrs.guid {
            data.uFlags = data.uFlags | NIF_GUID;
            data.guidItem = os_guid(guid);
        }
        let ok = unsafe { Shell_NotifyIconW(NIM_ADD, &data) };
        if !ok.as_bool() {
            return Err(last_error(NotifyError::IconAddFailed));
        }
        Ok(())
    }

    fn notify_icon_balloon(
        &self,
        window: WindowHandle,
        id: u32,
        payload: &BalloonPayload,
        guid: Option<Guid>,
    ) -> Result<()> {
        let mut data: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        data.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        data.hWnd = hwnd(window);
        data.uID = id;
        data.uFlags = NIF_INFO;
        copy_wide(&mut data.szInfo, &payload.message);
        copy_wide(&mut data.szInfoTitle, &payload.title);
        data.dwInfoFlags = NOTIFY_ICON_INFOTIP_FLAGS(payload.severity.info_flags());
        // Timeout/version overlay; the shell picks the interpretation.
        data.Anonymous.uTimeout = payload.timeout_or_version;
        if let Some(guid) = guid {
            data.uFlags = data.uFlags | NIF_GUID;
            data.guidItem = os_guid(guid);
        }
        let ok = unsafe { Shell_NotifyIconW(NIM_MODIFY, &data) };
        if !ok.as_bool() {
            return Err(last_error(NotifyError::BalloonPostFailed));
        }
        Ok(())
    }

    fn notify_icon_delete(&self, window: WindowHandle, id: u32, guid: Option<Guid>) -> Result<()> {
        let mut data: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        data.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        data.hWnd = hwnd(window);
        data.uID = id;
        if let Some(guid) = guid {
            data.uFlags = NIF_GUID;
            data.guidItem = os_guid(guid);
        }
        let ok = unsafe { Shell_NotifyIconW(NIM_DELETE, &data) };
        if !ok.as_bool() {
            return Err(last_error(NotifyError::IconRemoveFailed));
        }
        Ok(())
    }

    fn next_message(&self, window: WindowHandle) -> Result<Retrieved> {
        let mut msg = MSG::default();
        let result = unsafe { GetMessageW(&mut msg, Some(hwnd(window)), 0, 0) };
        match result.0 {
            -1 => Err(last_error(NotifyError::MessageRetrievalFailed)),
            0 => Ok(Retrieved::Quit(msg.wParam.0 as i32)),
            _ => Ok(Retrieved::Message(QueuedMessage {
                window: WindowHandle(msg.hwnd.0 as isize),
                message: msg.message,
                wparam: msg.wParam.0,
                lparam: msg.lParam.0,
                time: msg.time,
                point: (msg.pt.x, msg.pt.y),
            })),
        }
    }

    fn dispatch_message(&self, message: &QueuedMessage) {
        let msg = MSG {
            hwnd: hwnd(message.window),
            message: message.message,
            wParam: WPARAM(message.wparam),
            lParam: LPARAM(message.lparam),
            time: message.time,
            pt: POINT {
                x: message.point.0,
                y: message.point.1,
            },
        };
        unsafe {
            DispatchMessageW(&msg);
        }
    }

    fn default_procedure(
        &self,
        window: WindowHandle,
        message: u32,
        wparam: usize,
        lparam: isize,
    ) -> isize {
        unsafe { DefWindowProcW(hwnd(window), message, WPARAM(wparam), LPARAM(lparam)).0 }
    }

    fn post_quit(&self, exit_code: i32) {
        unsafe { PostQuitMessage(exit_code) }
    }

    fn post_close(&self, window: WindowHandle) {
        if let Err(e) =
            unsafe { PostMessageW(Some(hwnd(window)), WM_CLOSE, WPARAM(0), LPARAM(0)) }
        {
            warn!(%e, "close request not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{INFO_CAPACITY, INFO_TITLE_CAPACITY, TIP_CAPACITY};

    #[test]
    fn record_buffers_match_the_wire_contract() {
        let data: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        assert_eq!(data.szTip.len(), TIP_CAPACITY);
        assert_eq!(data.szInfo.len(), INFO_CAPACITY);
        assert_eq!(data.szInfoTitle.len(), INFO_TITLE_CAPACITY);
    }

    #[test]
    fn guid_record_converts_bit_for_bit() {
        let guid: Guid = "9B96F0A9-51AD-4031-9306-DEAA0272603F".parse().unwrap();
        let os = os_guid(guid);
        assert_eq!(os.data1, 0x9B96_F0A9);
        assert_eq!(os.data2, 0x51AD);
        assert_eq!(os.data3, 0x4031);
        assert_eq!(os.data4, [0x93, 0x06, 0xDE, 0xAA, 0x02, 0x72, 0x60, 0x3F]);
    }

    #[test]
    fn copy_wide_truncates_and_always_terminates() {
        let mut buffer = [0xFFFFu16; 8];
        copy_wide(&mut buffer, "this is longer than eight units");
        assert_eq!(buffer[7], 0);

        let mut exact = [0xFFFFu16; 8];
        copy_wide(&mut exact, "short");
        let expected: Vec<u16> = "short".encode_utf16().chain([0]).collect();
        assert_eq!(&exact[..6], expected.as_slice());
    }
}

/// Native-linkage smoke test: a bare MessageBox round trip.
pub fn hello() {
    let result = unsafe {
        MessageBoxW(
            None,
            w!("Hello World!"),
            w!("Greetings"),
            MB_OK | MB_ICONINFORMATION,
        )
    };
    if result == IDOK {
        info!("message box acknowledged");
    } else {
        warn!(result = result.0, "OK button was not clicked");
    }
}
