//! Live screen capture.
//!
//! On Windows the primary screen is copied with GDI `BitBlt` and converted
//! from BGRA to RGBA. Other platforms have no live source; use an image file
//! via `capture_source` in the config instead.

use image::DynamicImage;

use super::ScreenCapture;
use crate::config::ScreenRect;

#[derive(Clone, Copy, Debug, Default)]
pub struct ScreenSource;

impl ScreenCapture for ScreenSource {
    fn capture_region(&self, rect: ScreenRect) -> Option<DynamicImage> {
        if rect.validate().is_err() {
            return None;
        }
        grab(rect)
    }

    fn capture_full_screen(&self) -> Option<DynamicImage> {
        let (width, height) = screen_size()?;
        grab(ScreenRect::new(0, 0, width, height))
    }
}

#[cfg(windows)]
fn screen_size() -> Option<(u32, u32)> {
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    (w > 0 && h > 0).then_some((w as u32, h as u32))
}

#[cfg(windows)]
fn grab(rect: ScreenRect) -> Option<DynamicImage> {
    match gdi::capture(rect) {
        Ok(img) => Some(DynamicImage::ImageRgba8(img)),
        Err(e) => {
            crate::log(&format!("Screen capture failed: {}", e));
            None
        }
    }
}

#[cfg(not(windows))]
fn screen_size() -> Option<(u32, u32)> {
    None
}

#[cfg(not(windows))]
fn grab(_rect: ScreenRect) -> Option<DynamicImage> {
    crate::log("Live screen capture is only available on Windows; set capture_source in the config");
    None
}

/// Signed GDI dimensions and the BGRA buffer length for `rect`.
#[cfg(any(windows, test))]
fn bitmap_layout(rect: ScreenRect) -> anyhow::Result<(i32, i32, usize)> {
    let too_large = || anyhow::anyhow!("Capture area {}x{} is too large", rect.width, rect.height);
    let width = i32::try_from(rect.width).map_err(|_| too_large())?;
    let height = i32::try_from(rect.height).map_err(|_| too_large())?;
    let len = (rect.width as usize)
        .checked_mul(rect.height as usize)
        .and_then(|n| n.checked_mul(4))
        .filter(|&n| n <= isize::MAX as usize)
        .ok_or_else(too_large)?;
    Ok((width, height, len))
}

#[cfg(windows)]
mod gdi {
    use anyhow::{Result, anyhow};
    use image::{ImageBuffer, Rgba, RgbaImage};

    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap, CreateCompatibleDC,
        DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, ReleaseDC, SRCCOPY, SelectObject,
    };

    use super::bitmap_layout;
    use crate::config::ScreenRect;

    /// Copies `rect` of the desktop into an RGBA image.
    pub fn capture(rect: ScreenRect) -> Result<RgbaImage> {
        let (width, height, len) = bitmap_layout(rect)?;

        unsafe {
            let screen_dc = GetDC(HWND::default());
            if screen_dc.is_invalid() {
                return Err(anyhow!("GetDC failed"));
            }
            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let previous = SelectObject(mem_dc, bitmap);

            let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, rect.x, rect.y, SRCCOPY);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height: top-down rows
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut bgra = vec![0u8; len];
            let lines = if blit.is_ok() {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    rect.height,
                    Some(bgra.as_mut_ptr().cast()),
                    &mut info,
                    DIB_RGB_COLORS,
                )
            } else {
                0
            };

            SelectObject(mem_dc, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(HWND::default(), screen_dc);

            blit?;
            if lines == 0 {
                return Err(anyhow!("GetDIBits copied no rows"));
            }

            // BGRA -> RGBA, opaque
            for px in bgra.chunks_exact_mut(4) {
                px.swap(0, 2);
                px[3] = 255;
            }
            ImageBuffer::<Rgba<u8>, _>::from_raw(rect.width, rect.height, bgra)
                .ok_or_else(|| anyhow!("Captured buffer has the wrong size"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_layout() {
        assert_eq!(
            bitmap_layout(ScreenRect::new(0, 0, 1920, 1080)).unwrap(),
            (1920, 1080, 1920 * 1080 * 4)
        );
    }

    #[test]
    fn test_oversized_area_rejected() {
        // 40000 * 40000 * 4 overflows u32
        assert!(bitmap_layout(ScreenRect::new(0, 0, 40_000, 40_000)).is_ok());
        assert!(bitmap_layout(ScreenRect::new(0, 0, u32::MAX, 1)).is_err());
        assert!(bitmap_layout(ScreenRect::new(0, 0, 1, i32::MAX as u32 + 1)).is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_no_live_source_off_windows() {
        assert!(ScreenSource.capture_full_screen().is_none());
        assert!(ScreenSource.capture_region(ScreenRect::new(0, 0, 10, 10)).is_none());
    }
}
