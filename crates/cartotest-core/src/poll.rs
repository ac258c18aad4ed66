//! 带时限的轮询：整套装置中唯一的挂起点。
//!
//! # 教案式说明
//! - **意图 (Why)**：所有“等待异步完成”的断言都归结为同一个原语：反复读取访问器，直到等于期望值或时限耗尽；
//!   等待期间必须持续处理事件循环，否则被等待的完成回调永远不会送达。
//! - **逻辑 (How)**：先读一次；未满足则空闲 `min(间隔, 剩余时限)`，处理到期任务，再读；如此往复。
//! - **契约 (What)**：
//!   - 成功返回 [`Waited`]，记录耗时与读取次数；
//!   - 超时返回最后一次观察到的值，调用方据此报告“期望 vs 实际”；
//!   - 超时不影响被测对象本身，它之后仍可能完成，且不会触发任何已结束的观察。
//! - **权衡 (Trade-offs)**：时限为零时只读取一次、不处理任何事件，用于断言“此刻已经成立”；
//!   间隔低于 [`MIN_POLL_INTERVAL`] 时按下限空闲，虚拟时钟下时间因此总能推进到截止点。
use std::fmt::Debug;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::HarnessError;
use crate::event_loop::EventLoop;

/// 单次空闲的下限。
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 一次轮询的时限与间隔。
///
/// `interval` 为零时按 [`MIN_POLL_INTERVAL`] 处理。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSpec {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSpec {
    /// 以指定时限与间隔构造。
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// 替换时限，保留间隔。
    pub const fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout,
            interval: self.interval,
        }
    }
}

/// 成功等待的统计。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Waited {
    pub elapsed: Duration,
    pub checks: u32,
}

/// 超时时携带的最后观察值。
#[derive(Clone, Debug, PartialEq)]
pub struct PollTimeout<T> {
    pub last_observed: T,
    pub waited: Duration,
    pub checks: u32,
}

/// 轮询 `accessor` 直到 `predicate` 成立或时限耗尽。
pub fn poll_until<T, A, P>(
    event_loop: &EventLoop,
    mut accessor: A,
    mut predicate: P,
    spec: PollSpec,
) -> Result<(T, Waited), PollTimeout<T>>
where
    A: FnMut() -> T,
    P: FnMut(&T) -> bool,
{
    let start = event_loop.now();
    let deadline = start + spec.timeout;
    let mut checks = 1;
    let mut observed = accessor();

    loop {
        if predicate(&observed) {
            let elapsed = event_loop.now().saturating_duration_since(start);
            trace!(?elapsed, checks, "poll satisfied");
            return Ok((observed, Waited { elapsed, checks }));
        }

        let now = event_loop.now();
        if now >= deadline {
            return Err(PollTimeout {
                last_observed: observed,
                waited: now.saturating_duration_since(start),
                checks,
            });
        }

        event_loop.idle(idle_step(spec.interval, deadline - now));
        event_loop.process_events();
        observed = accessor();
        checks += 1;
    }
}

/// 轮询直到访问器返回值等于 `expected`，超时映射为 [`HarnessError::Timeout`]。
pub fn try_until<T, A>(
    event_loop: &EventLoop,
    accessor: A,
    expected: &T,
    spec: PollSpec,
) -> Result<Waited, HarnessError>
where
    T: PartialEq + Debug,
    A: FnMut() -> T,
{
    match poll_until(event_loop, accessor, |value| value == expected, spec) {
        Ok((_, waited)) => Ok(waited),
        Err(timeout) => {
            debug!(
                expected = ?expected,
                last_observed = ?timeout.last_observed,
                waited = ?timeout.waited,
                checks = timeout.checks,
                "poll timed out"
            );
            Err(HarnessError::Timeout {
                expected: format!("{expected:?}"),
                last_observed: format!("{:?}", timeout.last_observed),
                waited: timeout.waited,
            })
        }
    }
}

/// 在 `duration` 内持续处理事件，不做任何断言。
///
/// 仅用于演示性停顿（例如留出肉眼观察渲染结果的时间），不应用来“等完成”。
pub fn pump_for(event_loop: &EventLoop, duration: Duration, interval: Duration) {
    let end = event_loop.now() + duration;
    loop {
        event_loop.process_events();
        let now = event_loop.now();
        if now >= end {
            break;
        }
        event_loop.idle(idle_step(interval, end - now));
    }
}

fn idle_step(interval: Duration, remaining: Duration) -> Duration {
    interval.max(MIN_POLL_INTERVAL).min(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    const SPEC: PollSpec = PollSpec::new(Duration::from_secs(5), Duration::from_millis(50));

    fn virtual_loop() -> (EventLoop, VirtualClock) {
        let clock = VirtualClock::new();
        (EventLoop::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn satisfied_immediately_without_pumping() {
        let (event_loop, _) = virtual_loop();
        let waited = try_until(&event_loop, || 1, &1, SPEC).expect("应立即满足");
        assert_eq!(waited.checks, 1);
        assert_eq!(waited.elapsed, Duration::ZERO);
    }

    #[test]
    fn pumps_loop_until_completion_is_delivered() {
        let (event_loop, _) = virtual_loop();
        let value = Arc::new(Mutex::new("loading"));
        let writer = Arc::clone(&value);
        event_loop
            .handle()
            .post_after(Duration::from_millis(1_200), move || *writer.lock() = "loaded");

        let waited =
            try_until(&event_loop, || *value.lock(), &"loaded", SPEC).expect("完成应在时限内送达");
        assert!(waited.elapsed >= Duration::from_millis(1_200));
        assert!(waited.elapsed < SPEC.timeout);
    }

    #[test]
    fn timeout_reports_last_observed_value() {
        let (event_loop, _) = virtual_loop();
        let err = try_until(&event_loop, || 3, &4, SPEC).expect_err("永不满足的条件必须超时");
        match err {
            HarnessError::Timeout {
                expected,
                last_observed,
                waited,
            } => {
                assert_eq!(expected, "4");
                assert_eq!(last_observed, "3");
                assert_eq!(waited, SPEC.timeout);
            }
            other => panic!("意外的错误类型: {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_checks_exactly_once() {
        let (event_loop, _) = virtual_loop();
        let mut reads = 0;
        let result = poll_until(
            &event_loop,
            || {
                reads += 1;
                reads
            },
            |_| false,
            SPEC.with_timeout(Duration::ZERO),
        );
        assert_eq!(result.map(|(v, _)| v), Err(PollTimeout {
            last_observed: 1,
            waited: Duration::ZERO,
            checks: 1,
        }));
    }

    #[test]
    fn pump_for_advances_virtual_time_and_runs_tasks() {
        let (event_loop, clock) = virtual_loop();
        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);
        event_loop
            .handle()
            .post_after(Duration::from_millis(300), move || *flag.lock() = true);

        pump_for(&event_loop, Duration::from_secs(3), Duration::from_millis(50));
        assert!(*fired.lock());
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn zero_interval_still_reaches_the_deadline() {
        let (event_loop, clock) = virtual_loop();
        let spec = PollSpec::new(Duration::from_secs(1), Duration::ZERO);
        let err = try_until(&event_loop, || 1, &2, spec).expect_err("永不满足的条件必须超时");
        assert!(matches!(
            err,
            HarnessError::Timeout { waited, .. } if waited == Duration::from_secs(1)
        ));
        assert_eq!(clock.elapsed(), Duration::from_secs(1));

        pump_for(&event_loop, Duration::from_secs(1), Duration::ZERO);
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    #[traced_test]
    fn timeout_is_logged_with_both_values() {
        let (event_loop, _) = virtual_loop();
        let _ = try_until(&event_loop, || "Loading", &"Loaded", SPEC);
        assert!(logs_contain("poll timed out"));
        assert!(logs_contain("last_observed=\"Loading\""));
    }
}
