//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义装置自身的错误语义：等待超时、数据表结构错误、配置错误与夹具构建失败；
//! - 断言失败不在此列，它们属于用例结果，由 [`crate::context::CaseFailure`] 承载。
//!
//! ## 设计要求（What）
//! - 所有变体派生 `thiserror::Error`，可以直接以 `?` 传播到用例体或 CLI；
//! - 诊断值统一以 `Debug` 文本保存，避免错误类型对被观察值的类型参数化。

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 装置错误域。
#[derive(Debug, Error)]
pub enum HarnessError {
    /// 期望状态未在时限内达成。
    ///
    /// - **契约 (What)**：`expected` 与 `last_observed` 为 `Debug` 文本；`waited` 为实际等待时长（按循环时钟计）。
    #[error("timed out after {waited:?}: expected `{expected}`, last observed `{last_observed}`")]
    Timeout {
        expected: String,
        last_observed: String,
        waited: Duration,
    },

    /// 数据驱动表结构不合法，在任何数据行执行前报告。
    #[error("data table schema error: {detail}")]
    Schema { detail: String },

    /// 配置取值不合法。
    #[error("invalid harness configuration: {detail}")]
    Config { detail: String },

    /// 配置文本无法解析。
    #[error("failed to parse harness configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 配置文件无法读取。
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 共享夹具构建失败。
    #[error("fixture setup failed: {detail}")]
    Fixture { detail: String },
}

impl HarnessError {
    /// 构造结构错误。
    pub fn schema(detail: impl Into<String>) -> Self {
        Self::Schema {
            detail: detail.into(),
        }
    }

    /// 构造配置错误。
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// 构造夹具错误。
    pub fn fixture(detail: impl Into<String>) -> Self {
        Self::Fixture {
            detail: detail.into(),
        }
    }
}
