//! `engine_setup` 套件：声明式 UI 组件引擎的引导钩子。
//!
//! # 教案式说明
//! - **意图 (Why)**：声明式 UI 的测试入口在引擎可用时回调一次引导对象，由它把地图运行时的组件导入路径
//!   注册给引擎；路径缺失会让所有声明式用例在加载阶段失败，因此单独成套验证；
//! - **逻辑 (How)**：[`ComponentEngine`] 维护有序的导入路径列表，新路径前置且去重；
//!   [`EngineSetup`] 从配置读取运行时导入路径，缺省时使用 [`DEFAULT_RUNTIME_IMPORT_PATH`]；
//! - **契约 (What)**：`engine_available` 可重复调用，结果与调用一次相同。
use std::path::{Path, PathBuf};

use cartotest_core::{CaseResult, HarnessConfig, HarnessError, HarnessSuite, TestContext};
use cartotest_macros::cartotest_cases;
use tracing::info;

/// 未配置时使用的运行时组件导入路径。
pub const DEFAULT_RUNTIME_IMPORT_PATH: &str = "/opt/arcgis/runtime_sdk/qt/qml";

/// 引擎自带的内置导入路径。
pub const BUILTIN_IMPORT_PATH: &str = "qrc:/qt-project.org/imports";

/// 组件引擎：只建模导入路径列表。
#[derive(Clone, Debug)]
pub struct ComponentEngine {
    import_paths: Vec<PathBuf>,
}

impl ComponentEngine {
    pub fn new() -> Self {
        Self {
            import_paths: vec![PathBuf::from(BUILTIN_IMPORT_PATH)],
        }
    }

    /// 前置一条导入路径；已存在时移动到最前。
    pub fn add_import_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.import_paths.retain(|existing| *existing != path);
        self.import_paths.insert(0, path);
    }

    /// 按查找优先级排列的导入路径。
    pub fn import_path_list(&self) -> &[PathBuf] {
        &self.import_paths
    }
}

impl Default for ComponentEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 引擎可用时的引导对象。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSetup {
    import_path: PathBuf,
}

impl EngineSetup {
    pub fn new(import_path: impl Into<PathBuf>) -> Self {
        Self {
            import_path: import_path.into(),
        }
    }

    /// 从配置读取导入路径；空路径视为配置错误。
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        match &config.runtime_import_path {
            Some(path) if path.as_os_str().is_empty() => {
                Err(HarnessError::config("runtime_import_path must not be empty"))
            }
            Some(path) => Ok(Self::new(path.clone())),
            None => Ok(Self::new(DEFAULT_RUNTIME_IMPORT_PATH)),
        }
    }

    pub fn import_path(&self) -> &Path {
        &self.import_path
    }

    /// 引擎可用回调：注册运行时导入路径。
    pub fn engine_available(&self, engine: &mut ComponentEngine) {
        engine.add_import_path(&self.import_path);
        info!(path = %self.import_path.display(), "runtime import path registered");
    }
}

/// 每个用例独享的引擎与引导对象。
pub struct EngineFixture {
    engine: ComponentEngine,
    setup: EngineSetup,
}

fn fixture(ctx: &TestContext) -> Result<EngineFixture, HarnessError> {
    Ok(EngineFixture {
        engine: ComponentEngine::new(),
        setup: EngineSetup::from_config(ctx.config())?,
    })
}

/// 返回 `engine_setup` 套件。
pub const fn suite() -> &'static HarnessSuite<EngineFixture> {
    &cases::SUITE
}

#[cartotest_cases(suite = "engine_setup", fixture = EngineFixture, fixture_fn = fixture)]
mod cases {
    use super::*;

    fn test_1_registers_runtime_import_path(
        ctx: &mut TestContext,
        fixture: &mut EngineFixture,
    ) -> CaseResult {
        fixture.setup.engine_available(&mut fixture.engine);
        ctx.compare(
            "import_path_list().first()",
            fixture.engine.import_path_list().first().map(PathBuf::as_path),
            Some(fixture.setup.import_path()),
        )
    }

    fn test_2_registration_is_idempotent(
        ctx: &mut TestContext,
        fixture: &mut EngineFixture,
    ) -> CaseResult {
        fixture.setup.engine_available(&mut fixture.engine);
        let once = fixture.engine.import_path_list().to_vec();
        fixture.setup.engine_available(&mut fixture.engine);
        ctx.compare(
            "import_path_list()",
            fixture.engine.import_path_list(),
            once.as_slice(),
        )
    }

    fn test_3_builtin_paths_are_kept(
        ctx: &mut TestContext,
        fixture: &mut EngineFixture,
    ) -> CaseResult {
        fixture.setup.engine_available(&mut fixture.engine);
        ctx.verify(
            "builtin import path still registered",
            fixture
                .engine
                .import_path_list()
                .iter()
                .any(|path| path == Path::new(BUILTIN_IMPORT_PATH)),
        )?;
        ctx.compare(
            "import_path_list().len()",
            fixture.engine.import_path_list().len(),
            2,
        )
    }
}
