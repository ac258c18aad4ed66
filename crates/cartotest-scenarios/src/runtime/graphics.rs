//! 图形、符号与图形覆盖层。
//!
//! `Graphic` 与 `GraphicsOverlay` 都是共享句柄：克隆得到的是同一个对象，
//! 因此识别结果中的图形可以直接修改选中状态，并被测试侧的原句柄观察到。
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cartotest_core::{Connection, Signal};
use parking_lot::Mutex;

/// 地图坐标（Web Mercator）。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// RGBA 颜色。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Self = Self {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimpleMarkerSymbolStyle {
    Circle,
    Cross,
    Diamond,
    Square,
    Triangle,
    X,
}

/// 点符号，`size` 以像素计。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimpleMarkerSymbol {
    pub style: SimpleMarkerSymbolStyle,
    pub color: Color,
    pub size: f64,
}

impl SimpleMarkerSymbol {
    pub const fn new(style: SimpleMarkerSymbolStyle, color: Color, size: f64) -> Self {
        Self { style, color, size }
    }
}

struct GraphicInner {
    geometry: Point,
    symbol: SimpleMarkerSymbol,
    selected: AtomicBool,
    popup_enabled: AtomicBool,
}

/// 覆盖层上的一个点图形。
#[derive(Clone)]
pub struct Graphic {
    inner: Arc<GraphicInner>,
}

impl Graphic {
    pub fn new(geometry: Point, symbol: SimpleMarkerSymbol) -> Self {
        Self {
            inner: Arc::new(GraphicInner {
                geometry,
                symbol,
                selected: AtomicBool::new(false),
                popup_enabled: AtomicBool::new(false),
            }),
        }
    }

    pub fn geometry(&self) -> Point {
        self.inner.geometry
    }

    pub fn symbol(&self) -> SimpleMarkerSymbol {
        self.inner.symbol
    }

    pub fn is_selected(&self) -> bool {
        self.inner.selected.load(Ordering::Acquire)
    }

    pub fn set_selected(&self, selected: bool) {
        self.inner.selected.store(selected, Ordering::Release);
    }

    pub fn is_popup_enabled(&self) -> bool {
        self.inner.popup_enabled.load(Ordering::Acquire)
    }

    pub fn set_popup_enabled(&self, enabled: bool) {
        self.inner.popup_enabled.store(enabled, Ordering::Release);
    }

    /// 两个句柄是否指向同一图形。
    pub fn same_as(&self, other: &Graphic) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Graphic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graphic")
            .field("geometry", &self.inner.geometry)
            .field("selected", &self.is_selected())
            .finish()
    }
}

/// 覆盖层内的图形列表，追加时发出 `changed` 通知。
pub struct GraphicList {
    graphics: Mutex<Vec<Graphic>>,
    changed: Signal<()>,
}

impl GraphicList {
    fn new() -> Self {
        Self {
            graphics: Mutex::new(Vec::new()),
            changed: Signal::new(),
        }
    }

    pub fn append(&self, graphic: Graphic) {
        self.graphics.lock().push(graphic);
        self.changed.emit(&());
    }

    pub fn size(&self) -> usize {
        self.graphics.lock().len()
    }

    pub fn at(&self, index: usize) -> Option<Graphic> {
        self.graphics.lock().get(index).cloned()
    }

    pub fn snapshot(&self) -> Vec<Graphic> {
        self.graphics.lock().clone()
    }
}

struct OverlayInner {
    graphics: GraphicList,
}

/// 图形覆盖层。
#[derive(Clone)]
pub struct GraphicsOverlay {
    inner: Arc<OverlayInner>,
}

impl GraphicsOverlay {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(OverlayInner {
                graphics: GraphicList::new(),
            }),
        }
    }

    pub fn graphics(&self) -> &GraphicList {
        &self.inner.graphics
    }

    /// 订阅图形列表的变化，供视图安排重绘。
    pub(crate) fn on_changed<F>(&self, slot: F) -> Connection
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.inner.graphics.changed.connect(slot)
    }
}

impl Default for GraphicsOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GraphicsOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsOverlay")
            .field("graphics", &self.inner.graphics.size())
            .finish()
    }
}

/// 视图持有的覆盖层列表；追加覆盖层的回调由视图注入。
pub struct GraphicsOverlayList {
    overlays: Mutex<Vec<GraphicsOverlay>>,
    appended: Signal<GraphicsOverlay>,
}

impl GraphicsOverlayList {
    pub(crate) fn new() -> Self {
        Self {
            overlays: Mutex::new(Vec::new()),
            appended: Signal::new(),
        }
    }

    pub fn append(&self, overlay: GraphicsOverlay) {
        self.overlays.lock().push(overlay.clone());
        self.appended.emit(&overlay);
    }

    pub fn size(&self) -> usize {
        self.overlays.lock().len()
    }

    pub fn at(&self, index: usize) -> Option<GraphicsOverlay> {
        self.overlays.lock().get(index).cloned()
    }

    pub(crate) fn on_appended<F>(&self, slot: F) -> Connection
    where
        F: Fn(&GraphicsOverlay) + Send + Sync + 'static,
    {
        self.appended.connect(slot)
    }
}

/// 一次图形识别的结果。
#[derive(Clone, Debug, Default)]
pub struct IdentifyResult {
    pub graphics: Vec<Graphic>,
}
