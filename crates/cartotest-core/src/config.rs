//! 装置配置：默认时限、轮询间隔、时钟选择与运行时导入路径。
//!
//! # 教案式说明
//! - **意图 (Why)**：网络驱动的加载可能合法地耗时数十秒，默认时限必须可配置；CI 与本地调试又常需要不同的时钟；
//! - **逻辑 (How)**：以 TOML 描述配置（与仓库其他契约文件同构），再叠加 `CARTOTEST_*` 环境变量覆盖；
//! - **契约 (What)**：未出现的字段取默认值；未知字段视为错误，避免拼写错误被静默忽略；轮询间隔必须大于零。
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::ClockKind;
use crate::error::HarnessError;
use crate::poll::PollSpec;

/// 环境变量：默认时限（毫秒）。
pub const ENV_TIMEOUT_MS: &str = "CARTOTEST_TIMEOUT_MS";
/// 环境变量：轮询间隔（毫秒）。
pub const ENV_POLL_INTERVAL_MS: &str = "CARTOTEST_POLL_INTERVAL_MS";
/// 环境变量：时钟类型。
pub const ENV_CLOCK: &str = "CARTOTEST_CLOCK";
/// 环境变量：运行时组件导入路径。
pub const ENV_RUNTIME_IMPORT_PATH: &str = "CARTOTEST_RUNTIME_IMPORT_PATH";

/// 装置配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// 轮询断言的默认时限。
    pub default_timeout_ms: u64,
    /// 两次读取之间的最长空闲时间。
    pub poll_interval_ms: u64,
    /// 演示性停顿时长，仅用于肉眼观察，默认不停顿。
    pub inspection_pause_ms: u64,
    /// 事件循环使用的时钟。
    pub clock: ClockKind,
    /// 注册给组件引擎的运行时导入路径。
    pub runtime_import_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            poll_interval_ms: 50,
            inspection_pause_ms: 0,
            clock: ClockKind::System,
            runtime_import_path: None,
        }
    }
}

impl HarnessConfig {
    /// 解析 TOML 文本并校验。
    pub fn from_toml_str(raw: &str) -> Result<Self, HarnessError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取并解析配置文件。
    pub fn from_path(path: &Path) -> Result<Self, HarnessError> {
        let raw = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// 测试入口使用的配置：虚拟时钟，再叠加 `CARTOTEST_*` 环境变量。
    pub fn for_tests() -> Result<Self, HarnessError> {
        Self::default()
            .with_clock(ClockKind::Virtual)
            .with_env_overrides()
    }

    /// 叠加进程环境变量中的覆盖项。
    pub fn with_env_overrides(self) -> Result<Self, HarnessError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// 叠加由 `lookup` 提供的覆盖项，便于测试注入。
    pub fn with_overrides_from<L>(mut self, lookup: L) -> Result<Self, HarnessError>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.default_timeout_ms = parse_millis(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_millis(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CLOCK) {
            self.clock = raw
                .parse::<ClockKind>()
                .map_err(|detail: String| HarnessError::config(format!("{ENV_CLOCK}: {detail}")))?;
        }
        if let Some(raw) = lookup(ENV_RUNTIME_IMPORT_PATH) {
            if !raw.trim().is_empty() {
                self.runtime_import_path = Some(PathBuf::from(raw.trim()));
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// 校验取值范围。
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.poll_interval_ms == 0 {
            return Err(HarnessError::config("poll_interval_ms must be greater than zero"));
        }
        Ok(())
    }

    /// 默认时限。
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// 轮询间隔。
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 演示性停顿。
    pub fn inspection_pause(&self) -> Duration {
        Duration::from_millis(self.inspection_pause_ms)
    }

    /// 默认轮询参数。
    pub fn poll_spec(&self) -> PollSpec {
        PollSpec::new(self.default_timeout(), self.poll_interval())
    }

    /// 替换时钟类型的便捷构造。
    pub fn with_clock(mut self, clock: ClockKind) -> Self {
        self.clock = clock;
        self
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, HarnessError> {
    raw.trim().parse().map_err(|_| {
        HarnessError::config(format!(
            "{key} must be an integer millisecond value, got `{raw}`"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_allow_long_network_loads() {
        let config = HarnessConfig::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.clock, ClockKind::System);
    }

    #[test]
    fn toml_fields_are_optional_and_typed() {
        let config = HarnessConfig::from_toml_str(
            r#"
            default_timeout_ms = 45000
            clock = "virtual"
            runtime_import_path = "/opt/runtime/qml"
            "#,
        )
        .expect("合法配置应能解析");
        assert_eq!(config.default_timeout_ms, 45_000);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.clock, ClockKind::Virtual);
        assert_eq!(
            config.runtime_import_path.as_deref(),
            Some(Path::new("/opt/runtime/qml"))
        );
    }

    #[test]
    fn unknown_fields_and_zero_interval_are_rejected() {
        assert!(matches!(
            HarnessConfig::from_toml_str("timeout = 1"),
            Err(HarnessError::ConfigParse(_))
        ));
        assert!(matches!(
            HarnessConfig::from_toml_str("poll_interval_ms = 0"),
            Err(HarnessError::Config { .. })
        ));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_TIMEOUT_MS, "1200"),
            (ENV_CLOCK, "Virtual"),
            (ENV_RUNTIME_IMPORT_PATH, " /srv/imports "),
        ]);
        let config = HarnessConfig::default()
            .with_overrides_from(|key| env.get(key).map(|value| value.to_string()))
            .expect("覆盖项合法");
        assert_eq!(config.default_timeout_ms, 1_200);
        assert_eq!(config.clock, ClockKind::Virtual);
        assert_eq!(
            config.runtime_import_path,
            Some(PathBuf::from("/srv/imports"))
        );
    }

    #[test]
    fn malformed_env_override_is_a_config_error() {
        let err = HarnessConfig::default()
            .with_overrides_from(|key| (key == ENV_POLL_INTERVAL_MS).then(|| "soon".to_string()))
            .expect_err("非数字必须报错");
        assert!(err.to_string().contains(ENV_POLL_INTERVAL_MS));
    }
}
