//! cartotest 测试装置核心。
//!
//! # 教案式综述（Why / How / What）
//! - **为什么存在**：地图运行时的被测对象（地图、地图视图、图形覆盖层）都在后台完成加载、渲染与识别，
//!   结果只通过“状态属性 + 变更通知”对外可见。用例需要一组原语，在有界的时间内观察这些状态迁移，
//!   并把“期望 vs 实际”清晰地写进报告。
//! - **如何组成**：
//!   - `clock` + `event_loop`：单线程协作式事件循环，时钟可替换为虚拟时钟以获得确定性；
//!   - `signal` + `capture`：信号/槽注册表与捕获器；
//!   - `poll`：带时限的轮询，整套装置中唯一的挂起点；
//!   - `context`：断言、预期失败与“异步调用必须被观察”的 [`Pending`] 令牌；
//!   - `data` + `runner` + `report`：数据驱动表、顺序运行器与 QtTest 风格报告；
//!   - `config` + `observability` + `error`：配置、日志引导与错误域。
//! - **测试对象**：本 crate 不依赖任何具体运行时，被测对象只需实现 [`Loadable`] / [`Drawable`]。
//!
//! # 契约说明（What）
//! - 所有用例与数据行严格顺序执行；每个用例独占上下文与事件循环；
//! - 等待只会因“达成期望”或“时限耗尽”而结束，绝不无限期挂起。
//!
//! # 风险提示（Trade-offs）
//! - 系统时钟下的时限按真实时间计算，网络慢时可能需要调大 `default_timeout_ms`；
//! - 虚拟时钟只在循环空闲时推进，被测对象若在其他线程上真实耗时，应改用系统时钟。

pub mod capture;
pub mod clock;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod event_loop;
pub mod observability;
pub mod poll;
pub mod report;
pub mod runner;
pub mod signal;
pub mod status;
pub mod subject;
mod support;

pub use capture::SignalCapture;
pub use clock::{Clock, ClockKind, Parker, SystemClock, VirtualClock};
pub use config::HarnessConfig;
pub use context::{CaseFailure, CaseResult, ExpectFailMode, KnownIssue, Pending, TestContext};
pub use data::{DataRow, DataTable, FromValue, Value, ValueKind};
pub use error::HarnessError;
pub use event_loop::{EventLoop, LoopHandle};
pub use observability::init_tracing;
pub use poll::{
    MIN_POLL_INTERVAL, PollSpec, PollTimeout, Waited, poll_until, pump_for, try_until,
};
pub use report::{CaseReport, Outcome, OutcomeKind, SuiteReport, Summary};
pub use runner::{
    CaseFn, CaseKind, FixtureFn, HarnessCase, HarnessSuite, RowFn, run_case, run_suite,
};
pub use signal::{Connection, Signal};
pub use status::{DrawStatus, LoadStatus};
pub use subject::{Drawable, Loadable};
