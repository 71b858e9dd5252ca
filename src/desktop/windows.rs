//! Windows desktop backend.
//!
//! Mouse and keyboard input go through `SendInput`, screenshots through a GDI
//! `BitBlt` of the screen device context, and window placement through
//! `EnumWindows` + `MoveWindow`.

use crate::desktop::types::{chord_label, Desktop, DesktopError, Key, Point, Region};
use image::RgbaImage;
use std::ffi::c_void;
use std::mem::size_of;
use std::path::Path;
use std::process::Command;
use tracing::debug;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HGDIOBJ,
    SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT,
    MOUSE_EVENT_FLAGS, VIRTUAL_KEY, VK_CONTROL, VK_DELETE, VK_F4, VK_MENU, VK_RETURN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetSystemMetrics, GetWindowTextW, IsWindowVisible, MessageBeep, MoveWindow,
    SetCursorPos, SetForegroundWindow, MB_OK, SM_CXSCREEN, SM_CYSCREEN,
};

/// Desktop backend for the interactive Windows session.
#[derive(Debug, Default)]
pub struct WindowsDesktop;

impl WindowsDesktop {
    pub fn new() -> Self {
        Self
    }

    fn screen_region() -> Region {
        let (width, height) =
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        Region::new(0, 0, width.max(0) as u32, height.max(0) as u32)
    }

    fn send(inputs: &[INPUT]) -> Result<(), DesktopError> {
        let sent = unsafe { SendInput(inputs, size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(DesktopError::InputRejected(format!(
                "SendInput accepted {sent} of {} events",
                inputs.len()
            )));
        }
        Ok(())
    }

    fn move_pointer(at: Point) -> Result<(), DesktopError> {
        unsafe { SetCursorPos(at.x, at.y) }
            .map_err(|e| DesktopError::InputRejected(format!("SetCursorPos: {e}")))
    }

    fn left_button() -> [INPUT; 2] {
        [mouse_input(MOUSEEVENTF_LEFTDOWN), mouse_input(MOUSEEVENTF_LEFTUP)]
    }
}

impl Desktop for WindowsDesktop {
    fn launch(&mut self, executable: &Path) -> Result<(), DesktopError> {
        debug!(path = %executable.display(), "launching");
        Command::new(executable)
            .spawn()
            .map(|_| ())
            .map_err(|e| DesktopError::LaunchFailed(format!("{}: {e}", executable.display())))
    }

    fn place_window(&mut self, title: &str, geometry: Region) -> Result<(), DesktopError> {
        let hwnd = find_window(title).ok_or_else(|| DesktopError::WindowNotFound(title.into()))?;
        unsafe {
            MoveWindow(
                hwnd,
                geometry.left,
                geometry.top,
                geometry.width as i32,
                geometry.height as i32,
                true,
            )
            .map_err(|e| DesktopError::InputRejected(format!("MoveWindow: {e}")))?;
            let _ = SetForegroundWindow(hwnd);
        }
        debug!(%geometry, title, "window placed");
        Ok(())
    }

    fn capture(&mut self, region: Option<Region>) -> Result<RgbaImage, DesktopError> {
        let region = region.unwrap_or_else(Self::screen_region);
        if region.is_empty() {
            return Err(DesktopError::CaptureFailed(format!(
                "empty capture region {region}"
            )));
        }
        capture_screen(region)
    }

    fn click(&mut self, at: Point) -> Result<(), DesktopError> {
        debug!(%at, "click");
        Self::move_pointer(at)?;
        Self::send(&Self::left_button())
    }

    fn double_click(&mut self, at: Point) -> Result<(), DesktopError> {
        debug!(%at, "double click");
        Self::move_pointer(at)?;
        let [down, up] = Self::left_button();
        Self::send(&[down, up, down, up])
    }

    fn press(&mut self, key: Key) -> Result<(), DesktopError> {
        debug!(%key, "press");
        let vk = virtual_key(key);
        Self::send(&[key_input(vk, false), key_input(vk, true)])
    }

    fn hotkey(&mut self, keys: &[Key]) -> Result<(), DesktopError> {
        debug!(chord = %chord_label(keys), "hotkey");
        let mut inputs: Vec<INPUT> = keys
            .iter()
            .map(|k| key_input(virtual_key(*k), false))
            .collect();
        inputs.extend(keys.iter().rev().map(|k| key_input(virtual_key(*k), true)));
        Self::send(&inputs)
    }

    fn type_char(&mut self, ch: char) -> Result<(), DesktopError> {
        let mut units = [0u16; 2];
        let mut inputs = Vec::with_capacity(4);
        for unit in ch.encode_utf16(&mut units).iter() {
            inputs.push(unicode_input(*unit, false));
            inputs.push(unicode_input(*unit, true));
        }
        Self::send(&inputs)
    }

    fn beep(&mut self) {
        let _ = unsafe { MessageBeep(MB_OK) };
    }
}

fn virtual_key(key: Key) -> VIRTUAL_KEY {
    match key {
        Key::Enter => VK_RETURN,
        Key::Delete => VK_DELETE,
        Key::F4 => VK_F4,
        Key::Control => VK_CONTROL,
        Key::Shift => VK_SHIFT,
        Key::Alt => VK_MENU,
        // Virtual key codes for A-Z and 0-9 equal their uppercase ASCII values.
        Key::Char(c) => VIRTUAL_KEY(c.to_ascii_uppercase() as u16),
    }
}

fn key_input(vk: VIRTUAL_KEY, key_up: bool) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: if key_up {
                    KEYEVENTF_KEYUP
                } else {
                    KEYBD_EVENT_FLAGS(0)
                },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn unicode_input(unit: u16, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_UNICODE | KEYEVENTF_KEYUP
    } else {
        KEYEVENTF_UNICODE
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: unit,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// State shared with the `EnumWindows` callback.
struct WindowSearch {
    needle: String,
    found: Option<HWND>,
}

unsafe extern "system" fn enum_window_proc(hwnd: HWND, l_param: LPARAM) -> BOOL {
    let search = &mut *(l_param.0 as *mut WindowSearch);
    if !IsWindowVisible(hwnd).as_bool() {
        return BOOL(1);
    }

    let mut buffer = [0u16; 512];
    let len = GetWindowTextW(hwnd, &mut buffer);
    if len > 0 {
        let title = String::from_utf16_lossy(&buffer[..len as usize]);
        if title.contains(&search.needle) {
            search.found = Some(hwnd);
            // Stop enumerating
            return BOOL(0);
        }
    }
    BOOL(1)
}

/// Find the first visible top-level window whose title contains `title`.
fn find_window(title: &str) -> Option<HWND> {
    let mut search = WindowSearch {
        needle: title.to_string(),
        found: None,
    };
    unsafe {
        // Returns an error when the callback stops early; the result is in `search`.
        let _ = EnumWindows(
            Some(enum_window_proc),
            LPARAM(&mut search as *mut WindowSearch as isize),
        );
    }
    search.found
}

/// Copy a screen rectangle into an RGBA buffer.
fn capture_screen(region: Region) -> Result<RgbaImage, DesktopError> {
    let width = region.width as i32;
    let height = region.height as i32;

    unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            return Err(DesktopError::CaptureFailed("GetDC returned null".into()));
        }
        let memory_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        let previous = SelectObject(memory_dc, HGDIOBJ(bitmap.0));

        let blit = BitBlt(
            memory_dc,
            0,
            0,
            width,
            height,
            screen_dc,
            region.left,
            region.top,
            SRCCOPY,
        );

        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // Negative height requests a top-down DIB.
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut pixels = vec![0u8; (width * height * 4) as usize];
        let lines = if blit.is_ok() {
            GetDIBits(
                memory_dc,
                bitmap,
                0,
                height as u32,
                Some(pixels.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        SelectObject(memory_dc, previous);
        let _ = DeleteObject(HGDIOBJ(bitmap.0));
        let _ = DeleteDC(memory_dc);
        ReleaseDC(HWND::default(), screen_dc);

        if let Err(e) = blit {
            return Err(DesktopError::CaptureFailed(format!("BitBlt: {e}")));
        }
        if lines != height {
            return Err(DesktopError::CaptureFailed(format!(
                "GetDIBits copied {lines} of {height} lines"
            )));
        }

        // GDI hands back BGRA with an undefined alpha byte.
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
            px[3] = 255;
        }

        RgbaImage::from_raw(region.width, region.height, pixels)
            .ok_or_else(|| DesktopError::CaptureFailed("pixel buffer size mismatch".into()))
    }
}

/// Check whether input injection is possible in this session.
///
/// Fails when there is no interactive desktop, e.g. in a service session.
pub fn check_support() -> bool {
    let screen = WindowsDesktop::screen_region();
    !screen.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_key_letters() {
        assert_eq!(virtual_key(Key::Char('a')), VIRTUAL_KEY(b'A' as u16));
        assert_eq!(virtual_key(Key::Char('W')), VIRTUAL_KEY(b'W' as u16));
        assert_eq!(virtual_key(Key::Alt), VK_MENU);
    }

    #[test]
    fn test_unicode_input_flags() {
        let down = unicode_input('é' as u16, false);
        let up = unicode_input('é' as u16, true);
        unsafe {
            assert_eq!(down.Anonymous.ki.dwFlags, KEYEVENTF_UNICODE);
            assert_eq!(up.Anonymous.ki.dwFlags, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP);
            assert_eq!(down.Anonymous.ki.wScan, 'é' as u16);
        }
    }
}
