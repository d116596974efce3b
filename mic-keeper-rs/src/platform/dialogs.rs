//! Modal message boxes.

use windows::core::PCWSTR;
use windows::Win32::UI::WindowsAndMessaging::{
    MessageBoxW, MB_ICONERROR, MB_ICONINFORMATION, MB_OK, MESSAGEBOX_STYLE,
};

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn message_box(title: &str, text: &str, style: MESSAGEBOX_STYLE) {
    let text_wide = to_wide(text);
    let title_wide = to_wide(title);
    unsafe {
        MessageBoxW(
            None,
            PCWSTR(text_wide.as_ptr()),
            PCWSTR(title_wide.as_ptr()),
            MB_OK | style,
        );
    }
}

/// Show an informational message box and wait for it to close.
pub fn show_info(title: &str, text: &str) {
    message_box(title, text, MB_ICONINFORMATION);
}

/// Show an error message box and wait for it to close.
pub fn show_error(title: &str, text: &str) {
    message_box(title, text, MB_ICONERROR);
}
