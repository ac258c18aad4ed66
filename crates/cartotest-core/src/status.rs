//! 被测对象对外暴露的枚举状态。
use std::fmt;

use serde::{Deserialize, Serialize};

/// 可加载资源的生命周期状态。
///
/// # 契约 (What)
/// - `Loaded` 与 `FailedToLoad` 为终态；正确实现的运行时在调用 `load()` 后终将到达二者之一；
/// - `NotLoaded` 表示尚未请求加载，`Unknown` 仅用作观察者的初始占位值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadStatus {
    Loaded,
    Loading,
    FailedToLoad,
    NotLoaded,
    Unknown,
}

impl LoadStatus {
    /// 是否为终态。
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Loaded | Self::FailedToLoad)
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 一次渲染流程的状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawStatus {
    InProgress,
    Completed,
}

impl DrawStatus {
    /// 是否为终态。
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
