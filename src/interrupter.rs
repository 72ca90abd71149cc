use std::os::unix::thread::JoinHandleExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// This module facilitates testing: it knocks a thread out of a blocking
// syscall with SIGUSR1 so the EINTR branches run.

static DELIVERED: AtomicUsize = AtomicUsize::new(0);
static INSTALL: Once = Once::new();

extern "C" fn note_signal(_: libc::c_int) {
    DELIVERED.fetch_add(1, Ordering::SeqCst);
}

/// Installs a SIGUSR1 handler without `SA_RESTART`, so an interrupted
/// syscall fails with `EINTR` instead of resuming.
fn install_handler() {
    INSTALL.call_once(|| unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = note_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        assert_eq!(
            libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()),
            0
        );
    });
}

/// Signals the thread behind `handle` every few milliseconds until it
/// finishes. Returns how many signals the process handled meanwhile.
pub fn interrupt_until_finished<T>(handle: &JoinHandle<T>) -> usize {
    install_handler();
    let before = DELIVERED.load(Ordering::SeqCst);

    while !handle.is_finished() {
        unsafe { libc::pthread_kill(handle.as_pthread_t() as libc::pthread_t, libc::SIGUSR1) };
        thread::sleep(Duration::from_millis(20));
    }

    DELIVERED.load(Ordering::SeqCst) - before
}
