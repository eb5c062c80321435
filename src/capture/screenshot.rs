//! Region capture using GDI `BitBlt` from the screen device context.

use anyhow::{anyhow, Result};
use std::ffi::c_void;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};

use super::{bgr_from_bgra, BgrImage, Region, ScreenGrabber};

/// Grabs screen pixels through the desktop device context.
pub struct GdiScreenGrabber;

impl ScreenGrabber for GdiScreenGrabber {
    fn grab(&mut self, region: &Region) -> Result<BgrImage> {
        let width = region.width as i32;
        let height = region.height as i32;
        let mut pixels = vec![0u8; region.width as usize * region.height as usize * 4];

        unsafe {
            let hdc_screen = GetDC(HWND::default());
            if hdc_screen.is_invalid() {
                return Err(anyhow!("GetDC failed for the screen"));
            }
            let hdc_mem = CreateCompatibleDC(hdc_screen);
            let bitmap = CreateCompatibleBitmap(hdc_screen, width, height);
            let previous = SelectObject(hdc_mem, bitmap);

            let blit = BitBlt(
                hdc_mem,
                0,
                0,
                width,
                height,
                hdc_screen,
                region.left,
                region.top,
                SRCCOPY,
            );

            // Negative height requests top-down rows
            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let lines = GetDIBits(
                hdc_mem,
                bitmap,
                0,
                region.height,
                Some(pixels.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            );

            SelectObject(hdc_mem, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(hdc_mem);
            ReleaseDC(HWND::default(), hdc_screen);

            blit?;
            if lines == 0 {
                return Err(anyhow!("GetDIBits returned no rows"));
            }
        }

        bgr_from_bgra(region.width, region.height, &pixels, region.width as usize * 4)
    }
}
