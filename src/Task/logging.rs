//! Log output prefixed with process uptime and the current task name,
//! as in `[S12.345 producer] message`.

use std::fmt::{self, Write as _};
use std::time::Instant;

use lazy_static::lazy_static;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

use super::current_task_name;

lazy_static! {
    static ref CLOCK_ORIGIN: Instant = Instant::now();
}

/// Seconds since the clock origin was first touched.
pub fn uptime_secs() -> f64 {
    CLOCK_ORIGIN.elapsed().as_secs_f64()
}

/// Milliseconds since the clock origin, wrapping like a 32-bit tick counter.
pub fn msec_clock() -> u32 {
    CLOCK_ORIGIN.elapsed().as_millis() as u32
}

/// `S<uptime> <task>` timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uptime;

impl FormatTime for Uptime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let task = current_task_name();
        write!(
            w,
            "[S{:.3} {}]",
            uptime_secs(),
            task.as_deref().unwrap_or("")
        )
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// level. Returns `false` if a subscriber was already installed.
pub fn init() -> bool {
    lazy_static::initialize(&CLOCK_ORIGIN);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(Uptime)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_moves_forward() {
        let a = uptime_secs();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(uptime_secs() > a);
    }

    #[test]
    fn msec_clock_tracks_uptime() {
        let before = msec_clock();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let after = msec_clock();
        assert!(after.wrapping_sub(before) >= 5);
        assert!((uptime_secs() * 1000.0) as u32 >= after);
    }
}
