//! 脚本化的地图运行时。
//!
//! # 教案式说明
//! - **意图 (Why)**：场景套件面向的真实运行时闭源且依赖网络；这里只复刻它对外可观察的行为：
//!   异步加载、状态属性、变更通知、渲染状态与图形识别；
//! - **逻辑 (How)**：所有完成回调都经由 [`cartotest_core::LoopHandle`] 投递到测试线程的事件循环，
//!   回调只持有对象内部状态的弱引用；
//! - **契约 (What)**：
//!   - 状态变更通知在事件循环上发出，发出时实时属性已经是新值；
//!   - 对象先于回调销毁时，回调静默失效；
//!   - 除屏幕与地图坐标之间的线性变换外，不做任何渲染或几何计算。
use std::time::Duration;

use thiserror::Error;

pub mod catalog;
pub mod graphics;
pub mod map;
pub mod view;

pub use catalog::{PortalCatalog, PortalItem};
pub use graphics::{
    Color, Graphic, GraphicList, GraphicsOverlay, GraphicsOverlayList, IdentifyResult, Point,
    SimpleMarkerSymbol, SimpleMarkerSymbolStyle,
};
pub use map::{Basemap, Layer, LayerList, LayerType, Map};
pub use view::{DrawnFrame, Envelope, MapView, WrapAroundMode};

/// 底图加载的模拟延迟。
pub const BASEMAP_LATENCY: Duration = Duration::from_millis(400);
/// 单次渲染的模拟耗时。
pub const RENDER_LATENCY: Duration = Duration::from_millis(250);
/// 图形识别的模拟耗时。
pub const IDENTIFY_LATENCY: Duration = Duration::from_millis(120);

/// 运行时错误域，表现为对象的 `FailedToLoad` 原因。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// URL 不是门户可识别的地图地址。
    #[error("`{url}` is not a recognised portal item address")]
    UnrecognisedUrl { url: String },

    /// 门户中不存在该条目。
    #[error("portal item `{id}` does not exist")]
    UnknownItem { id: String },
}
