// Window surface setup through ash-window

use anyhow::{Context, Result};
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::c_char;

/// Instance extensions needed to present to a window on this display
pub fn required_instance_extensions(display: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    let extensions = ash_window::enumerate_required_extensions(display)
        .with_context(|| format!("Unsupported display handle: {:?}", display))?;
    Ok(extensions.to_vec())
}

/// Create a `VkSurfaceKHR` for the window.
///
/// # Safety
/// The handles must refer to a live window that outlives the returned surface.
pub unsafe fn create_surface(
    entry: &Entry,
    instance: &ash::Instance,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> Result<vk::SurfaceKHR> {
    ash_window::create_surface(entry, instance, display, window, None)
        .context("Failed to create window surface")
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, WebDisplayHandle, XlibDisplayHandle};
    use std::ffi::CStr;
    use std::ptr::NonNull;

    fn names(exts: &[*const c_char]) -> Vec<String> {
        exts.iter()
            .map(|&p| unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn xlib_needs_xlib_surface() {
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let exts = names(&required_instance_extensions(display).unwrap());
        assert_eq!(exts, vec!["VK_KHR_surface", "VK_KHR_xlib_surface"]);
    }

    #[test]
    fn wayland_needs_wayland_surface() {
        let mut dummy = 0u8;
        let ptr = NonNull::from(&mut dummy).cast();
        let display = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(ptr));
        let exts = names(&required_instance_extensions(display).unwrap());
        assert_eq!(exts, vec!["VK_KHR_surface", "VK_KHR_wayland_surface"]);
    }

    #[test]
    fn web_display_is_an_error() {
        let display = RawDisplayHandle::Web(WebDisplayHandle::new());
        assert!(required_instance_extensions(display).is_err());
    }
}
