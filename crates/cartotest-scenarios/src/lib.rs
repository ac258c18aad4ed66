//! cartotest 场景套件入口。
//!
//! # 教案式综述（Why / How / What）
//! - **为什么存在**：把地图运行时的三组典型测试（非界面的地图加载、带窗口的地图视图、声明式 UI 引导）
//!   表达为装置上的套件，既作为装置能力的示范，也作为回归门禁；
//! - **如何集成**：每个套件以 `#[cartotest_cases]` 声明用例模块，宏为每个用例生成独立的 `#[test]`，
//!   并断言其声明的结论；`run_*` 入口与 `cartotest` 可执行文件按名称运行整套用例并打印报告；
//! - **测试对象**：`runtime` 模块中的脚本化运行时，它只复刻真实运行时对外可观察的行为。
//!
//! # 契约说明（What）
//! - `map` 套件故意包含一个失败用例与一个预期失败用例，用于演示报告格式，它的报告不是“整洁”的；
//! - 其余套件预期全部通过。
//!
//! # 模块结构
//! - `runtime`：门户目录、地图、地图视图、图形与识别；
//! - `map`、`map_view`、`engine_setup`：三个套件的用例；
//! - 顶层提供 `run_*` 入口、套件清单与测试配置。

pub mod engine_setup;
pub mod map;
pub mod map_view;
pub mod runtime;

pub use cartotest_macros::cartotest_cases;

use cartotest_core::{HarnessConfig, HarnessError, SuiteReport, run_suite};

const ALL_SUITE_NAMES: [&str; 3] = ["map", "map_view", "engine_setup"];

/// 返回所有已注册的套件名称，顺序与 CLI 默认执行顺序一致。
pub fn all_suite_names() -> &'static [&'static str] {
    &ALL_SUITE_NAMES
}

/// 测试入口使用的配置：虚拟时钟，再叠加 `CARTOTEST_*` 环境变量。
pub fn test_config() -> Result<HarnessConfig, HarnessError> {
    HarnessConfig::for_tests()
}

/// 运行 `map` 套件。
pub fn run_map_suite(config: &HarnessConfig) -> SuiteReport {
    run_suite(map::suite(), config)
}

/// 运行 `map_view` 套件。
pub fn run_map_view_suite(config: &HarnessConfig) -> SuiteReport {
    run_suite(map_view::suite(), config)
}

/// 运行 `engine_setup` 套件。
pub fn run_engine_setup_suite(config: &HarnessConfig) -> SuiteReport {
    run_suite(engine_setup::suite(), config)
}

/// 按名称运行套件；未知名称返回 `None`。
pub fn run_suite_by_name(name: &str, config: &HarnessConfig) -> Option<SuiteReport> {
    match name {
        "map" => Some(run_map_suite(config)),
        "map_view" => Some(run_map_view_suite(config)),
        "engine_setup" => Some(run_engine_setup_suite(config)),
        _ => None,
    }
}
