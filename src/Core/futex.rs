use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Sleep while `*atomic == expected`, at most `timeout` when one is given.
///
/// Spurious returns are allowed; callers re-check their condition.
#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::Relaxed) != expected {
        return;
    }

    let timespec = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    });
    let timespec_ptr = match &timespec {
        Some(ts) => ts as *const libc::timespec,
        None => ptr::null(),
    };

    // EAGAIN / ETIMEDOUT / EINTR all just mean "go look again".
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            timespec_ptr,
            ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wake up to `count` waiters parked on `atomic`.
#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32, count: u32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            count.min(i32::MAX as u32) as i32,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_atomic: &AtomicU32, _expected: u32, timeout: Option<Duration>) {
    // Fallback for non-Linux: short sleep so deadlines are still honoured
    match timeout {
        Some(t) => std::thread::sleep(t.min(Duration::from_micros(200))),
        None => std::thread::yield_now(),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32, _count: u32) {
    // No-op on non-Linux
}
