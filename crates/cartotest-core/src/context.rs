//! 用例上下文：断言、预期失败、异步操作与观察请求的配对。
//!
//! # 教案式说明
//! - **意图 (Why)**：用例体需要一组与 QCOMPARE/QTRY_COMPARE/QEXPECT_FAIL 同义的断言原语，
//!   且“在异步操作完成之前就断言其结果”这种错误应当难以写出；
//! - **逻辑 (How)**：
//!   - 用例体返回 [`CaseResult`]，任何断言失败都以 `Err` 返回，配合 `?` 在首个失败处终止用例体；
//!   - [`TestContext::expect_fail`] 登记一次性的预期失败指令，由下一条断言消费；
//!   - [`TestContext::issue_load`] 返回 `#[must_use]` 的 [`Pending`]，只有经由某个观察请求才能重新拿到被测对象；
//! - **契约 (What)**：
//!   - 预期失败仍然失败 → `ExpectedFail`；预期失败意外通过 → `Fail`（回归反转守卫）；
//!   - 上下文析构时，经由它建立的所有连接一并退订，事件循环中尚未执行的回调一并丢弃。
use std::fmt::{self, Debug};
use std::time::Duration;

use tracing::{debug, warn};

use crate::capture::SignalCapture;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::event_loop::{EventLoop, LoopHandle};
use crate::poll::{self, PollSpec};
use crate::signal::{Connection, Signal};
use crate::status::LoadStatus;
use crate::subject::Loadable;

/// 用例体的返回类型。
pub type CaseResult = Result<(), CaseFailure>;

/// 用例体提前终止的原因。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseFailure {
    /// 值已就绪但不符合期望。
    Mismatch {
        label: String,
        actual: String,
        expected: String,
    },
    /// 期望状态未在时限内达成。
    Timeout {
        label: String,
        expected: String,
        last_observed: String,
        waited: Duration,
    },
    /// 已登记的预期失败如期发生（`Abort` 模式）。
    ExpectedFailure { reason: String, diagnostic: String },
    /// 已登记预期失败的断言意外通过。
    UnexpectedPass { label: String, reason: String },
    /// 用例主动跳过。
    Skipped { reason: String },
    /// 装置层面的错误，例如数据列取值失败。
    Error { message: String },
}

impl CaseFailure {
    /// 人类可读的诊断文本。
    pub fn diagnostic(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                label,
                actual,
                expected,
            } => write!(
                f,
                "compared values are not the same: `{label}`\n   Actual   : {actual}\n   Expected : {expected}"
            ),
            Self::Timeout {
                label,
                expected,
                last_observed,
                waited,
            } => write!(
                f,
                "`{label}` did not reach the expected value within {waited:?}\n   Last observed : {last_observed}\n   Expected      : {expected}"
            ),
            Self::ExpectedFailure { reason, diagnostic } => write!(f, "{reason}\n   {diagnostic}"),
            Self::UnexpectedPass { label, reason } => write!(
                f,
                "`{label}` passed unexpectedly; declared known issue no longer reproduces: {reason}"
            ),
            Self::Skipped { reason } => f.write_str(reason),
            Self::Error { message } => f.write_str(message),
        }
    }
}

impl From<HarnessError> for CaseFailure {
    fn from(err: HarnessError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

/// 预期失败命中后的处理方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpectFailMode {
    /// 记录已知问题并终止用例体。
    #[default]
    Abort,
    /// 记录已知问题后继续执行。
    Continue,
}

#[derive(Clone, Debug)]
struct ExpectFail {
    reason: String,
    mode: ExpectFailMode,
}

/// 以 `Continue` 模式命中的已知问题。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownIssue {
    pub reason: String,
    pub diagnostic: String,
}

/// 单个用例（或数据行）独占的执行上下文。
pub struct TestContext {
    name: String,
    config: HarnessConfig,
    event_loop: EventLoop,
    expect_fail: Option<ExpectFail>,
    known_issues: Vec<KnownIssue>,
    connections: Vec<Connection>,
}

impl TestContext {
    /// 按配置构造上下文，事件循环使用配置指定的时钟。
    pub fn new(name: impl Into<String>, config: HarnessConfig) -> Self {
        let clock = config.clock.build();
        Self::with_event_loop(name, config, EventLoop::new(clock))
    }

    /// 以外部提供的事件循环构造上下文。
    pub fn with_event_loop(
        name: impl Into<String>,
        config: HarnessConfig,
        event_loop: EventLoop,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            event_loop,
            expect_fail: None,
            known_issues: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// 用例名（数据驱动时为 `<test>:<row>`）。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前配置。
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// 当前事件循环。
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// 事件循环句柄，交给被测对象用于投递完成回调。
    pub fn handle(&self) -> LoopHandle {
        self.event_loop.handle()
    }

    /// 以 `Continue` 模式命中过的已知问题。
    pub fn known_issues(&self) -> &[KnownIssue] {
        &self.known_issues
    }

    /// 为下一条断言登记预期失败。
    pub fn expect_fail(&mut self, reason: impl Into<String>, mode: ExpectFailMode) {
        let reason = reason.into();
        if let Some(previous) = self.expect_fail.replace(ExpectFail {
            reason: reason.clone(),
            mode,
        }) {
            warn!(case = %self.name, previous = %previous.reason, "expected-failure directive replaced before use");
        }
        debug!(case = %self.name, %reason, ?mode, "expected failure declared");
    }

    /// 立即比较两个值。
    pub fn compare<T>(&mut self, label: &str, actual: T, expected: T) -> CaseResult
    where
        T: PartialEq + Debug,
    {
        let failure = (actual != expected).then(|| CaseFailure::Mismatch {
            label: label.to_owned(),
            actual: format!("{actual:?}"),
            expected: format!("{expected:?}"),
        });
        self.resolve(label, failure)
    }

    /// 断言条件成立。
    pub fn verify(&mut self, label: &str, condition: bool) -> CaseResult {
        let failure = (!condition).then(|| CaseFailure::Mismatch {
            label: label.to_owned(),
            actual: "false".to_owned(),
            expected: "true".to_owned(),
        });
        self.resolve(label, failure)
    }

    /// 以默认时限轮询比较。
    pub fn try_compare<T, A>(&mut self, label: &str, accessor: A, expected: T) -> CaseResult
    where
        T: PartialEq + Debug,
        A: FnMut() -> T,
    {
        let spec = self.config.poll_spec();
        self.try_compare_with(label, accessor, expected, spec)
    }

    /// 以指定时限轮询比较。
    pub fn try_compare_within<T, A>(
        &mut self,
        label: &str,
        accessor: A,
        expected: T,
        timeout: Duration,
    ) -> CaseResult
    where
        T: PartialEq + Debug,
        A: FnMut() -> T,
    {
        let spec = self.config.poll_spec().with_timeout(timeout);
        self.try_compare_with(label, accessor, expected, spec)
    }

    fn try_compare_with<T, A>(
        &mut self,
        label: &str,
        accessor: A,
        expected: T,
        spec: PollSpec,
    ) -> CaseResult
    where
        T: PartialEq + Debug,
        A: FnMut() -> T,
    {
        match poll::try_until(&self.event_loop, accessor, &expected, spec) {
            Ok(waited) => {
                debug!(case = %self.name, label, elapsed = ?waited.elapsed, checks = waited.checks, "try-compare satisfied");
                self.resolve(label, None)
            }
            Err(HarnessError::Timeout {
                expected,
                last_observed,
                waited,
            }) => {
                let failure = CaseFailure::Timeout {
                    label: label.to_owned(),
                    expected,
                    last_observed,
                    waited,
                };
                self.resolve(label, Some(failure))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// 调用 `load()` 并返回必须被观察的 [`Pending`]。
    pub fn issue_load<'s, S>(&mut self, subject: &'s S) -> Pending<'_, 's, S>
    where
        S: Loadable + ?Sized,
    {
        debug!(case = %self.name, "load issued");
        subject.load();
        Pending {
            ctx: self,
            subject,
            timeout: None,
            observed: false,
        }
    }

    /// 在 `signal` 上挂接捕获器，所有权归调用方。
    pub fn capture<T>(&self, signal: &Signal<T>, initial: T) -> SignalCapture<T>
    where
        T: Clone + Send + 'static,
    {
        SignalCapture::attach(signal, initial)
    }

    /// 连接一个槽位，连接由上下文持有直至用例结束。
    pub fn connect<T, F>(&mut self, signal: &Signal<T>, slot: F)
    where
        T: 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.connections.push(signal.connect(slot));
    }

    /// 在 `duration` 内持续处理事件（qWait）。
    pub fn wait(&self, duration: Duration) {
        poll::pump_for(&self.event_loop, duration, self.config.poll_interval());
    }

    /// 演示性停顿，时长取自配置。
    pub fn inspection_pause(&self) {
        let pause = self.config.inspection_pause();
        if !pause.is_zero() {
            self.wait(pause);
        }
    }

    /// 跳过当前用例。
    pub fn skip(&self, reason: impl Into<String>) -> CaseResult {
        Err(CaseFailure::Skipped {
            reason: reason.into(),
        })
    }

    fn resolve(&mut self, label: &str, failure: Option<CaseFailure>) -> CaseResult {
        match (self.expect_fail.take(), failure) {
            (None, None) => Ok(()),
            (None, Some(failure)) => Err(failure),
            (Some(directive), None) => Err(CaseFailure::UnexpectedPass {
                label: label.to_owned(),
                reason: directive.reason,
            }),
            (Some(directive), Some(failure)) => {
                let diagnostic = failure.diagnostic();
                debug!(case = %self.name, label, reason = %directive.reason, "expected failure reproduced");
                match directive.mode {
                    ExpectFailMode::Abort => Err(CaseFailure::ExpectedFailure {
                        reason: directive.reason,
                        diagnostic,
                    }),
                    ExpectFailMode::Continue => {
                        self.known_issues.push(KnownIssue {
                            reason: directive.reason,
                            diagnostic,
                        });
                        Ok(())
                    }
                }
            }
        }
    }

    pub(crate) fn take_known_issues(&mut self) -> Vec<KnownIssue> {
        std::mem::take(&mut self.known_issues)
    }

    pub(crate) fn unused_expect_fail(&mut self) -> Option<String> {
        self.expect_fail.take().map(|directive| directive.reason)
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("name", &self.name)
            .field("event_loop", &self.event_loop)
            .field("connections", &self.connections.len())
            .finish()
    }
}

/// 已发出但尚未观察完成的加载。
///
/// # 教案式说明
/// - **意图 (Why)**：把“每次异步调用都必须配对一次终止观察”变成类型层面的约束：
///   在观察完成之前，上下文处于可变借用中，无法继续断言；
/// - **契约 (What)**：`until_*` 系列方法消费令牌并返回被测对象引用；未经观察即丢弃令牌会记录告警。
#[must_use = "an issued load must be observed before asserting on the subject"]
pub struct Pending<'c, 's, S: Loadable + ?Sized> {
    ctx: &'c mut TestContext,
    subject: &'s S,
    timeout: Option<Duration>,
    observed: bool,
}

impl<'s, S: Loadable + ?Sized> Pending<'_, 's, S> {
    /// 覆盖本次观察的时限。
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 轮询对象的实时 `load_status` 直到等于 `expected`。
    pub fn until_status(mut self, expected: LoadStatus) -> Result<&'s S, CaseFailure> {
        self.observed = true;
        let subject = self.subject;
        let spec = self.spec();
        self.ctx
            .try_compare_with("load_status", || subject.load_status(), expected, spec)?;
        Ok(subject)
    }

    /// 轮询预先挂接的捕获器直到其最新值等于 `expected`。
    pub fn until_signal(
        mut self,
        capture: &SignalCapture<LoadStatus>,
        expected: LoadStatus,
    ) -> Result<&'s S, CaseFailure> {
        self.observed = true;
        let subject = self.subject;
        let spec = self.spec();
        self.ctx.try_compare_with(
            "load_status_changed",
            || capture.latest(),
            expected,
            spec,
        )?;
        Ok(subject)
    }

    /// 轮询直到到达任一终态，返回该终态。
    ///
    /// 与其它断言一样消费预期失败声明；`Continue` 模式下超时返回最后观察到的状态。
    pub fn until_settled(mut self) -> Result<LoadStatus, CaseFailure> {
        self.observed = true;
        let subject = self.subject;
        let spec = self.spec();
        let (status, failure) = match poll::poll_until(
            self.ctx.event_loop(),
            || subject.load_status(),
            |status| status.is_terminal(),
            spec,
        ) {
            Ok((status, _)) => (status, None),
            Err(timeout) => {
                let failure = CaseFailure::Timeout {
                    label: "load_status".to_owned(),
                    expected: "Loaded | FailedToLoad".to_owned(),
                    last_observed: format!("{:?}", timeout.last_observed),
                    waited: timeout.waited,
                };
                (timeout.last_observed, Some(failure))
            }
        };
        self.ctx.resolve("load_status", failure)?;
        Ok(status)
    }

    fn spec(&self) -> PollSpec {
        let spec = self.ctx.config().poll_spec();
        match self.timeout {
            Some(timeout) => spec.with_timeout(timeout),
            None => spec,
        }
    }
}

impl<S: Loadable + ?Sized> Drop for Pending<'_, '_, S> {
    fn drop(&mut self) {
        if !self.observed {
            warn!(case = %self.ctx.name(), "issued load was dropped without observing its completion");
        }
    }
}
