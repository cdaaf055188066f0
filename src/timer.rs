//! Wall-clock timing of closures

use std::time::{Duration, Instant};
use tracing::info;

/// Run `f`, log how long it took under `label` and return its result
pub fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let (result, elapsed) = measure(f);
    info!("{} cost time: {:.3} s", label, elapsed.as_secs_f64());
    result
}

/// Run `f` and return its result together with the elapsed time
pub fn measure<T, F: FnOnce() -> T>(f: F) -> (T, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_returns_result() {
        let value = timed("sum", || (1..=10).sum::<u32>());
        assert_eq!(value, 55);
    }

    #[test]
    fn test_measure_reports_elapsed_time() {
        let ((), elapsed) = measure(|| std::thread::sleep(Duration::from_millis(20)));
        assert!(elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn test_timed_passes_errors_through() {
        let result: Result<(), String> = timed("failing", || Err("nope".to_string()));
        assert_eq!(result.unwrap_err(), "nope");
    }
}
