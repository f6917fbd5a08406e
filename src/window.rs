//! Window manipulation at the OS boundary.
//!
//! The simulator opens a launcher window first and the actual range
//! display later; the sequence minimizes the one and foregrounds the
//! other. All of it is cosmetic, so every operation here reports
//! success as a plain bool and the caller logs and moves on.
//!
//! Core logic only ever sees the `WindowOps` trait; the Win32 calls are
//! confined to the `cfg(windows)` implementation so the crate builds
//! and tests everywhere.

#[cfg(not(windows))]
use tracing::debug;

/// Raw top-level window handle. Zero means "no window yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Window queries and commands the sequence needs.
pub trait WindowOps {
    /// Main window of the process: its first visible unowned top-level
    /// window in Z order, `NULL` when none exists yet.
    fn main_window(&mut self, pid: u32) -> WindowHandle;

    /// Request minimize. Returns false when the OS refused.
    fn minimize(&mut self, window: WindowHandle) -> bool;

    /// Request foreground focus. Returns false when the OS refused.
    fn focus(&mut self, window: WindowHandle) -> bool;
}

/// The real windowing subsystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemWindows;

impl SystemWindows {
    pub fn new() -> Self {
        SystemWindows
    }
}

#[cfg(windows)]
impl WindowOps for SystemWindows {
    fn main_window(&mut self, pid: u32) -> WindowHandle {
        find_main_window(pid)
    }

    fn minimize(&mut self, window: WindowHandle) -> bool {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging::{ShowWindow, SW_MINIMIZE};

        unsafe { ShowWindow(HWND(window.0), SW_MINIMIZE).as_bool() }
    }

    fn focus(&mut self, window: WindowHandle) -> bool {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging::SetForegroundWindow;

        unsafe { SetForegroundWindow(HWND(window.0)).as_bool() }
    }
}

#[cfg(not(windows))]
impl WindowOps for SystemWindows {
    fn main_window(&mut self, _pid: u32) -> WindowHandle {
        WindowHandle::NULL
    }

    fn minimize(&mut self, _window: WindowHandle) -> bool {
        debug!("window minimize is a no-op on this platform");
        false
    }

    fn focus(&mut self, _window: WindowHandle) -> bool {
        debug!("window focus is a no-op on this platform");
        false
    }
}

/// Walk top-level windows looking for the first visible unowned one
/// belonging to `pid` (the same rule .NET's MainWindowHandle applies).
#[cfg(windows)]
fn find_main_window(pid: u32) -> WindowHandle {
    use windows::Win32::Foundation::{BOOL, FALSE, HWND, LPARAM, TRUE};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindow, GetWindowThreadProcessId, IsWindowVisible, GW_OWNER,
    };

    struct Search {
        pid: u32,
        found: HWND,
    }

    unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam.0 as *mut Search);

        let mut window_pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut window_pid));
        if window_pid != search.pid {
            return TRUE;
        }
        if !IsWindowVisible(hwnd).as_bool() {
            return TRUE;
        }
        if GetWindow(hwnd, GW_OWNER) != HWND::default() {
            return TRUE;
        }

        search.found = hwnd;
        FALSE
    }

    let mut search = Search {
        pid,
        found: HWND::default(),
    };
    unsafe {
        // EnumWindows reports an error when the callback stops the walk
        // early, so its result says nothing about whether we found one.
        let _ = EnumWindows(Some(enum_proc), LPARAM(&mut search as *mut Search as isize));
    }
    WindowHandle(search.found.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(WindowHandle::NULL.is_null());
        assert!(WindowHandle(0).is_null());
        assert!(!WindowHandle(0x2f04a2).is_null());
        assert_eq!(WindowHandle::default(), WindowHandle::NULL);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_stub_ops_never_succeed() {
        let mut ops = SystemWindows::new();
        assert_eq!(ops.main_window(1234), WindowHandle::NULL);
        assert!(!ops.minimize(WindowHandle(42)));
        assert!(!ops.focus(WindowHandle(42)));
    }
}
