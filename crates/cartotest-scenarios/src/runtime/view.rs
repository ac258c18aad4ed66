//! 地图视图：渲染状态、视点动画、屏幕坐标换算与图形识别。
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cartotest_core::{Connection, DrawStatus, Drawable, LoadStatus, Loadable, LoopHandle, Signal};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::graphics::{
    GraphicsOverlay, GraphicsOverlayList, IdentifyResult, Point, SimpleMarkerSymbolStyle,
};
use super::map::Map;
use super::{IDENTIFY_LATENCY, RENDER_LATENCY};

/// Web Mercator 世界范围的半宽（米）。
pub const WORLD_HALF_EXTENT: f64 = 20_037_508.342_789_244;

/// 跨越日期变更线时是否连续绘制。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapAroundMode {
    #[default]
    EnabledWhenSupported,
    Disabled,
}

/// 轴对齐的地图范围。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Envelope {
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// 整个世界。
    pub const fn world() -> Self {
        Self::new(
            -WORLD_HALF_EXTENT,
            -WORLD_HALF_EXTENT,
            WORLD_HALF_EXTENT,
            WORLD_HALF_EXTENT,
        )
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// 范围是否越过世界的东西边界。
    pub fn crosses_antimeridian(&self) -> bool {
        self.x_min < -WORLD_HALF_EXTENT || self.x_max > WORLD_HALF_EXTENT
    }
}

/// 最近一次完成的渲染结果。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawnFrame {
    pub extent: Envelope,
    pub wrap_around: WrapAroundMode,
    /// 边界外的区域绘制了连续的底图，而不是空白背景。
    pub shows_wrapped_content: bool,
    pub graphics: usize,
}

struct ViewInner {
    min_width: u32,
    min_height: u32,
    wrap_around: Mutex<WrapAroundMode>,
    map: Mutex<Option<Map>>,
    extent: Mutex<Envelope>,
    draw_status: Mutex<DrawStatus>,
    draw_changed: Signal<DrawStatus>,
    generation: AtomicU64,
    frame: Mutex<Option<DrawnFrame>>,
    overlays: GraphicsOverlayList,
    identify_completed: Signal<(Uuid, IdentifyResult)>,
    map_connection: Mutex<Option<Connection>>,
    overlay_connections: Mutex<Vec<Connection>>,
}

impl ViewInner {
    fn set_draw_status(&self, status: DrawStatus) {
        {
            let mut current = self.draw_status.lock();
            if *current == status {
                return;
            }
            *current = status;
        }
        debug!(%status, "draw status changed");
        self.draw_changed.emit(&status);
    }

    fn map_loaded(&self) -> bool {
        self.map
            .lock()
            .as_ref()
            .is_some_and(|map| map.load_status() == LoadStatus::Loaded)
    }

    /// 安排一次渲染；地图尚未加载时仅标记为进行中，由加载完成回调补发。
    fn schedule_render(self: &Arc<Self>, handle: &LoopHandle, delay: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.set_draw_status(DrawStatus::InProgress);
        if !self.map_loaded() {
            return;
        }
        let weak = Arc::downgrade(self);
        handle.post_after(delay + RENDER_LATENCY, move || {
            ViewInner::complete_render(&weak, generation)
        });
    }

    fn complete_render(weak: &Weak<ViewInner>, generation: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if inner.generation.load(Ordering::Acquire) != generation {
            return;
        }
        let extent = *inner.extent.lock();
        let wrap_around = *inner.wrap_around.lock();
        let graphics = (0..inner.overlays.size())
            .filter_map(|index| inner.overlays.at(index))
            .map(|overlay| overlay.graphics().size())
            .sum();
        let frame = DrawnFrame {
            extent,
            wrap_around,
            shows_wrapped_content: wrap_around == WrapAroundMode::EnabledWhenSupported
                && extent.crosses_antimeridian(),
            graphics,
        };
        *inner.frame.lock() = Some(frame);
        inner.set_draw_status(DrawStatus::Completed);
    }

    fn abandon_render(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.set_draw_status(DrawStatus::Completed);
    }

    fn to_screen(&self, point: Point) -> (f64, f64) {
        let extent = *self.extent.lock();
        let x = (point.x - extent.x_min) / extent.width() * f64::from(self.min_width);
        let y = (extent.y_max - point.y) / extent.height() * f64::from(self.min_height);
        (x, y)
    }
}

/// 窗口中央的地图视图。
///
/// # 契约 (What)
/// - 初始 `draw_status` 为 `Completed`（无内容可绘）；设置地图、视点或图形都会安排一次渲染，
///   渲染期间为 `InProgress`，完成后回到 `Completed`，每次变化都发出 `draw_status_changed`；
/// - 只有最近一次安排的渲染会生效，被后续请求覆盖的渲染静默作废；
/// - 识别请求立即返回任务 ID，结果经由 `identify_graphics_overlay_completed` 送达。
pub struct MapView {
    inner: Arc<ViewInner>,
    handle: LoopHandle,
}

impl MapView {
    /// 以窗口最小尺寸（像素）创建视图。
    pub fn new(handle: LoopHandle, min_width: u32, min_height: u32) -> Self {
        let inner = Arc::new(ViewInner {
            min_width: min_width.max(1),
            min_height: min_height.max(1),
            wrap_around: Mutex::new(WrapAroundMode::default()),
            map: Mutex::new(None),
            extent: Mutex::new(Envelope::world()),
            draw_status: Mutex::new(DrawStatus::Completed),
            draw_changed: Signal::new(),
            generation: AtomicU64::new(0),
            frame: Mutex::new(None),
            overlays: GraphicsOverlayList::new(),
            identify_completed: Signal::new(),
            map_connection: Mutex::new(None),
            overlay_connections: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&inner);
        let loop_handle = handle.clone();
        let appended = inner.overlays.on_appended(move |overlay: &GraphicsOverlay| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let redraw_weak = Arc::downgrade(&inner);
            let redraw_handle = loop_handle.clone();
            let changed = overlay.on_changed(move |_| {
                if let Some(inner) = redraw_weak.upgrade() {
                    inner.schedule_render(&redraw_handle, Duration::ZERO);
                }
            });
            inner.overlay_connections.lock().push(changed);
            inner.schedule_render(&loop_handle, Duration::ZERO);
        });
        inner.overlay_connections.lock().push(appended);

        Self { inner, handle }
    }

    /// 窗口按最小尺寸显示。
    pub fn width_in_pixels(&self) -> u32 {
        self.inner.min_width
    }

    pub fn height_in_pixels(&self) -> u32 {
        self.inner.min_height
    }

    pub fn wrap_around_mode(&self) -> WrapAroundMode {
        *self.inner.wrap_around.lock()
    }

    pub fn set_wrap_around_mode(&self, mode: WrapAroundMode) {
        *self.inner.wrap_around.lock() = mode;
    }

    /// 绑定地图并触发其加载；地图加载完成后自动渲染。
    pub fn set_map(&self, map: Map) {
        let weak = Arc::downgrade(&self.inner);
        let handle = self.handle.clone();
        let connection = map
            .load_status_changed()
            .connect(move |status: &LoadStatus| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match status {
                    LoadStatus::Loaded => inner.schedule_render(&handle, Duration::ZERO),
                    LoadStatus::FailedToLoad => inner.abandon_render(),
                    _ => {}
                }
            });
        *self.inner.map_connection.lock() = Some(connection);
        *self.inner.map.lock() = Some(map.clone());

        self.inner.schedule_render(&self.handle, Duration::ZERO);
        map.load();
    }

    pub fn map(&self) -> Option<Map> {
        self.inner.map.lock().clone()
    }

    /// 以 `duration_secs` 秒的动画移动到 `target`。
    pub fn set_viewpoint(&self, target: Envelope, duration_secs: f64) {
        let animation = Duration::try_from_secs_f64(duration_secs).unwrap_or(Duration::ZERO);
        *self.inner.extent.lock() = target;
        debug!(?target, ?animation, "viewpoint requested");
        self.inner.schedule_render(&self.handle, animation);
    }

    pub fn current_extent(&self) -> Envelope {
        *self.inner.extent.lock()
    }

    /// 最近一次完成的渲染。
    pub fn last_frame(&self) -> Option<DrawnFrame> {
        *self.inner.frame.lock()
    }

    /// 屏幕像素坐标换算为地图坐标。
    pub fn screen_to_location(&self, x: f64, y: f64) -> Point {
        let extent = self.current_extent();
        Point::new(
            extent.x_min + x / f64::from(self.inner.min_width) * extent.width(),
            extent.y_max - y / f64::from(self.inner.min_height) * extent.height(),
        )
    }

    /// 地图坐标换算为屏幕像素坐标。
    pub fn location_to_screen(&self, point: Point) -> (f64, f64) {
        self.inner.to_screen(point)
    }

    pub fn graphics_overlays(&self) -> &GraphicsOverlayList {
        &self.inner.overlays
    }

    /// 识别 `overlay` 中位于屏幕点 `(x, y)` 附近 `tolerance` 像素内的图形。
    pub fn identify_graphics_overlay(
        &self,
        overlay: &GraphicsOverlay,
        x: f64,
        y: f64,
        tolerance: f64,
        popups_only: bool,
    ) -> Uuid {
        let task_id = Uuid::new_v4();
        let overlay = overlay.clone();
        let weak = Arc::downgrade(&self.inner);
        self.handle.post_after(IDENTIFY_LATENCY, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let graphics = overlay
                .graphics()
                .snapshot()
                .into_iter()
                .filter(|graphic| !popups_only || graphic.is_popup_enabled())
                .filter(|graphic| {
                    let (gx, gy) = inner.to_screen(graphic.geometry());
                    let (dx, dy) = ((gx - x).abs(), (gy - y).abs());
                    let symbol = graphic.symbol();
                    let reach = symbol.size / 2.0 + tolerance;
                    match symbol.style {
                        SimpleMarkerSymbolStyle::Square => dx.max(dy) <= reach,
                        _ => dx.hypot(dy) <= reach,
                    }
                })
                .collect::<Vec<_>>();
            debug!(%task_id, hits = graphics.len(), "identify completed");
            inner
                .identify_completed
                .emit(&(task_id, IdentifyResult { graphics }));
        });
        task_id
    }

    pub fn identify_graphics_overlay_completed(&self) -> &Signal<(Uuid, IdentifyResult)> {
        &self.inner.identify_completed
    }
}

impl Drawable for MapView {
    fn draw_status(&self) -> DrawStatus {
        *self.inner.draw_status.lock()
    }

    fn draw_status_changed(&self) -> &Signal<DrawStatus> {
        &self.inner.draw_changed
    }
}

impl fmt::Debug for MapView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapView")
            .field("size", &(self.inner.min_width, self.inner.min_height))
            .field("draw_status", &self.draw_status())
            .field("extent", &self.current_extent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::graphics::{Color, Graphic, SimpleMarkerSymbol};
    use crate::runtime::map::Basemap;
    use cartotest_core::{EventLoop, SignalCapture, VirtualClock, pump_for};

    fn event_loop() -> EventLoop {
        EventLoop::new(Arc::new(VirtualClock::new()))
    }

    fn settle(event_loop: &EventLoop, secs: u64) {
        pump_for(event_loop, Duration::from_secs(secs), Duration::from_millis(50));
    }

    #[test]
    fn screen_and_map_coordinates_round_trip_at_the_center() {
        let event_loop = event_loop();
        let view = MapView::new(event_loop.handle(), 600, 800);
        let center = view.screen_to_location(300.0, 400.0);
        assert!(center.x.abs() < 1e-6 && center.y.abs() < 1e-6);
        let (x, y) = view.location_to_screen(center);
        assert!((x - 300.0).abs() < 1e-6 && (y - 400.0).abs() < 1e-6);
    }

    #[test]
    fn setting_a_map_loads_it_and_renders_once_loaded() {
        let event_loop = event_loop();
        let view = MapView::new(event_loop.handle(), 600, 800);
        let capture = SignalCapture::attach(view.draw_status_changed(), DrawStatus::Completed);
        let map = Map::with_basemap(event_loop.handle(), Basemap::streets());

        view.set_map(map.clone());
        assert_eq!(view.draw_status(), DrawStatus::InProgress);
        settle(&event_loop, 2);

        assert_eq!(map.load_status(), LoadStatus::Loaded);
        assert_eq!(view.draw_status(), DrawStatus::Completed);
        assert_eq!(capture.history(), vec![DrawStatus::InProgress, DrawStatus::Completed]);
        assert!(view.last_frame().is_some());
    }

    #[test]
    fn superseded_render_passes_are_dropped() {
        let event_loop = event_loop();
        let view = MapView::new(event_loop.handle(), 600, 800);
        view.set_map(Map::with_basemap(event_loop.handle(), Basemap::streets()));
        settle(&event_loop, 2);

        let edge = Envelope::new(-20_200_191.8, 4_284.2, -19_459_110.1, 983_824.6);
        view.set_viewpoint(Envelope::world(), 5.0);
        view.set_viewpoint(edge, 0.5);
        settle(&event_loop, 1);
        assert_eq!(view.draw_status(), DrawStatus::Completed);
        assert_eq!(view.last_frame().map(|frame| frame.extent), Some(edge));
        settle(&event_loop, 6);
        assert_eq!(view.last_frame().map(|frame| frame.extent), Some(edge));
    }

    #[test]
    fn identify_hits_graphics_within_symbol_reach() {
        let event_loop = event_loop();
        let view = MapView::new(event_loop.handle(), 600, 800);
        view.set_map(Map::with_basemap(event_loop.handle(), Basemap::national_geographic()));
        let overlay = GraphicsOverlay::new();
        view.graphics_overlays().append(overlay.clone());
        let symbol = SimpleMarkerSymbol::new(SimpleMarkerSymbolStyle::Square, Color::RED, 65.0);
        overlay
            .graphics()
            .append(Graphic::new(view.screen_to_location(300.0, 400.0), symbol));
        settle(&event_loop, 2);

        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let _connection = view
            .identify_graphics_overlay_completed()
            .connect(move |(id, result): &(Uuid, IdentifyResult)| {
                sink.lock().push((*id, result.graphics.len()))
            });

        let near = view.identify_graphics_overlay(&overlay, 330.0, 400.0, 5.0, false);
        let far = view.identify_graphics_overlay(&overlay, 400.0, 400.0, 5.0, false);
        let popups = view.identify_graphics_overlay(&overlay, 300.0, 400.0, 5.0, true);
        settle(&event_loop, 1);

        assert_eq!(*results.lock(), vec![(near, 1), (far, 0), (popups, 0)]);
    }

    #[test]
    fn popups_only_identify_returns_graphics_with_popups_enabled() {
        let event_loop = event_loop();
        let view = MapView::new(event_loop.handle(), 600, 800);
        view.set_map(Map::with_basemap(event_loop.handle(), Basemap::national_geographic()));
        let overlay = GraphicsOverlay::new();
        view.graphics_overlays().append(overlay.clone());
        let symbol = SimpleMarkerSymbol::new(SimpleMarkerSymbolStyle::Circle, Color::RED, 20.0);
        let plain = Graphic::new(view.screen_to_location(300.0, 400.0), symbol);
        let with_popup = Graphic::new(view.screen_to_location(300.0, 400.0), symbol);
        overlay.graphics().append(plain.clone());
        overlay.graphics().append(with_popup.clone());
        settle(&event_loop, 2);

        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let _connection = view
            .identify_graphics_overlay_completed()
            .connect(move |(_, result): &(Uuid, IdentifyResult)| {
                sink.lock().push(result.graphics.clone())
            });

        view.identify_graphics_overlay(&overlay, 300.0, 400.0, 5.0, true);
        settle(&event_loop, 1);
        with_popup.set_popup_enabled(true);
        view.identify_graphics_overlay(&overlay, 300.0, 400.0, 5.0, true);
        view.identify_graphics_overlay(&overlay, 300.0, 400.0, 5.0, false);
        settle(&event_loop, 1);

        let results = results.lock();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_empty());
        assert_eq!(results[1].len(), 1);
        assert!(results[1][0].same_as(&with_popup));
        assert!(!results[1][0].same_as(&plain));
        assert_eq!(results[2].len(), 2);
    }
}
