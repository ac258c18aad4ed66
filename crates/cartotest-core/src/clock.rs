//! 时钟抽象：为事件循环与轮询工具提供“当前时间”与“让出执行权”两项能力。
//!
//! # 教案式说明
//! - **意图 (Why)**：异步加载可能耗时数十秒，若测试直接依赖系统时钟，CI 中的超时用例将变得缓慢且难以复现；
//!   通过注入时钟，既可在真实环境下按墙钟等待，也可在测试中使用虚拟时间瞬间推进。
//! - **契约 (What)**：`now` 必须单调不减；`idle` 至多让出 `max` 的（真实或虚拟）时间，若期间有新任务投递则允许提前返回。
//! - **实现 (How)**：[`SystemClock`] 在 [`Parker`] 的条件变量上限时等待；[`VirtualClock`] 不阻塞线程，直接推进内部偏移量。
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

/// 事件循环的“停车位”：投递任务的一方通过 [`Parker::unpark`] 唤醒空闲中的循环。
///
/// # 教案式说明
/// - **意图 (Why)**：外部运行时可能在内部线程完成网络 I/O，再把完成回调投递回测试线程；
///   空闲中的循环需要被及时唤醒，而不是傻等到轮询间隔结束。
/// - **契约 (What)**：通知是“粘滞”的，先 `unpark` 后 `park_timeout` 会立即返回；每次返回都会消费掉通知位。
#[derive(Debug, Default)]
pub struct Parker {
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl Parker {
    /// 创建未被通知的停车位。
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记有新工作并唤醒等待者。
    pub fn unpark(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.condvar.notify_all();
    }

    /// 取走通知位，返回此前是否已被通知。
    pub fn take_notification(&self) -> bool {
        std::mem::take(&mut *self.notified.lock())
    }

    /// 至多等待 `max`，返回是否因通知而醒来。
    pub fn park_timeout(&self, max: Duration) -> bool {
        let mut notified = self.notified.lock();
        if !*notified && !max.is_zero() {
            let _ = self.condvar.wait_for(&mut notified, max);
        }
        std::mem::take(&mut *notified)
    }
}

/// 可注入的时钟。
///
/// # 接口约束（What）
/// - `now`：返回当前单调时间点；
/// - `idle`：让出执行权至多 `max`，系统时钟真实等待，虚拟时钟推进虚拟时间；
///   当 `parker` 已被通知时，实现应尽快返回，以便循环处理新投递的任务。
pub trait Clock: Send + Sync + 'static {
    /// 返回当前的单调时间点。
    fn now(&self) -> Instant;

    /// 在 `parker` 上空闲至多 `max`。
    fn idle(&self, parker: &Parker, max: Duration);
}

/// 基于墙钟的系统时钟。
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn idle(&self, parker: &Parker, max: Duration) {
        parker.park_timeout(max);
    }
}

/// 虚拟时钟：空闲即推进，不阻塞线程。
///
/// # 设计动机（Why）
/// - 以 30 秒为上限的加载断言在虚拟时间下可以瞬间完成，且唤醒序列完全确定；
/// - 外部也可调用 [`VirtualClock::advance`] 显式推进，用于构造“超时之后对象才完成”的场景。
///
/// # 契约说明（What）
/// - 克隆体共享同一时间线；
/// - `idle` 若发现已有通知则不推进时间，保证刚投递的任务先于时间推进被处理。
#[derive(Clone, Debug)]
pub struct VirtualClock {
    inner: Arc<Mutex<VirtualState>>,
}

#[derive(Debug)]
struct VirtualState {
    origin: Instant,
    elapsed: Duration,
}

impl VirtualClock {
    /// 以当前系统时间为基准创建虚拟时钟。
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    /// 以指定起点构造虚拟时钟。
    pub fn with_start(origin: Instant) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VirtualState {
                origin,
                elapsed: Duration::ZERO,
            })),
        }
    }

    /// 手动推进虚拟时间，偏移量单调增加。
    pub fn advance(&self, delta: Duration) {
        let mut state = self.inner.lock();
        state.elapsed = state.elapsed.saturating_add(delta);
    }

    /// 自起点以来累积的虚拟时间。
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().elapsed
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        let state = self.inner.lock();
        state.origin + state.elapsed
    }

    fn idle(&self, parker: &Parker, max: Duration) {
        if !parker.take_notification() {
            self.advance(max);
        }
    }
}

/// 配置层面的时钟选择。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    /// 墙钟等待，适用于接入真实运行时。
    #[default]
    System,
    /// 虚拟时间，适用于脚本化运行时与 CI。
    Virtual,
}

impl ClockKind {
    /// 构造对应的时钟实例。
    pub fn build(self) -> Arc<dyn Clock> {
        match self {
            Self::System => Arc::new(SystemClock),
            Self::Virtual => Arc::new(VirtualClock::new()),
        }
    }
}

impl fmt::Display for ClockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::Virtual => "virtual",
        })
    }
}

impl FromStr for ClockKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "virtual" => Ok(Self::Virtual),
            other => Err(format!("unknown clock kind `{other}` (expected `system` or `virtual`)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_advances_only_without_notification() {
        let clock = VirtualClock::new();
        let parker = Parker::new();
        let start = clock.now();

        parker.unpark();
        clock.idle(&parker, Duration::from_secs(5));
        assert_eq!(clock.now(), start, "已有通知时不得推进虚拟时间");

        clock.idle(&parker, Duration::from_secs(5));
        assert_eq!(clock.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn parker_notification_is_sticky_and_consumed() {
        let parker = Parker::new();
        parker.unpark();
        assert!(parker.park_timeout(Duration::from_secs(10)));
        assert!(!parker.take_notification());
    }

    #[test]
    fn clock_kind_parses_case_insensitively() {
        assert_eq!("Virtual".parse::<ClockKind>(), Ok(ClockKind::Virtual));
        assert_eq!(" system ".parse::<ClockKind>(), Ok(ClockKind::System));
        assert!("wall".parse::<ClockKind>().is_err());
    }
}
