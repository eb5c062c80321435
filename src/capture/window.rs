//! Foreground window checks for the target game process.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{CloseHandle, HWND};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

use super::ForegroundOracle;

/// Foreground oracle matching the executable name of the foreground window's process.
pub struct ForegroundProcess {
    /// Lowercase executable name, e.g. "wow.exe"
    process_name: String,
}

impl ForegroundProcess {
    pub fn new(process_name: &str) -> Self {
        Self {
            process_name: process_name.to_lowercase(),
        }
    }
}

impl ForegroundOracle for ForegroundProcess {
    fn is_target_foreground(&self) -> bool {
        match foreground_process_name() {
            Ok(name) => name.to_lowercase() == self.process_name,
            Err(_) => false,
        }
    }
}

/// Returns the executable file name of the process owning the foreground window.
pub fn foreground_process_name() -> Result<String> {
    let hwnd: HWND = unsafe { GetForegroundWindow() };
    if hwnd.is_invalid() {
        return Err(anyhow!("No foreground window"));
    }

    let mut process_id: u32 = 0;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut process_id)) };
    if process_id == 0 {
        return Err(anyhow!("Foreground window has no owning process"));
    }

    let process_handle =
        unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id)? };

    let mut name_buf: Vec<u16> = vec![0; 1024];
    let mut len = name_buf.len() as u32;
    let result = unsafe {
        QueryFullProcessImageNameW(
            process_handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(name_buf.as_mut_ptr()),
            &mut len,
        )
    };
    let _ = unsafe { CloseHandle(process_handle) };

    if result.is_err() || len == 0 {
        return Err(anyhow!("Failed to query image name for process {}", process_id));
    }

    let full_path = OsString::from_wide(&name_buf[..len as usize])
        .to_string_lossy()
        .to_string();
    // Extract just the filename from the full path
    Ok(full_path
        .rsplit('\\')
        .next()
        .unwrap_or(&full_path)
        .to_string())
}
