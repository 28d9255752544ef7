//! Cycle cadence arithmetic.

use std::time::Duration;

/// Sleep decision taken at the end of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadencePlan {
    /// Measured cycle duration
    pub elapsed: Duration,
    /// Time to wait before the next dispatch
    pub sleep: Duration,
    /// The cycle used up the whole period
    pub late: bool,
}

/// `sleep = period - elapsed`, or zero and late when `elapsed >= period`.
pub fn plan_sleep(period: Duration, elapsed: Duration) -> CadencePlan {
    match period.checked_sub(elapsed) {
        Some(rest) if !rest.is_zero() => CadencePlan {
            elapsed,
            sleep: rest,
            late: false,
        },
        _ => CadencePlan {
            elapsed,
            sleep: Duration::ZERO,
            late: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(1000);

    #[test]
    fn test_sleeps_remainder() {
        let plan = plan_sleep(PERIOD, Duration::from_millis(320));
        assert_eq!(plan.sleep, Duration::from_millis(680));
        assert!(!plan.late);
    }

    #[test]
    fn test_overrun_is_late() {
        let plan = plan_sleep(PERIOD, Duration::from_millis(1300));
        assert_eq!(plan.sleep, Duration::ZERO);
        assert!(plan.late);
    }

    #[test]
    fn test_exact_period_is_late() {
        let plan = plan_sleep(PERIOD, PERIOD);
        assert_eq!(plan.sleep, Duration::ZERO);
        assert!(plan.late);
    }

    #[test]
    fn test_sub_millisecond_precision() {
        let plan = plan_sleep(PERIOD, Duration::from_micros(999_999));
        assert_eq!(plan.sleep, Duration::from_micros(1));
        assert!(!plan.late);
    }
}
