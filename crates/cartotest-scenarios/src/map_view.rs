//! `map_view` 套件：窗口中的地图视图，覆盖环绕显示、渲染完成等待与图形识别。
use cartotest_core::{
    CaseFailure, CaseResult, DrawStatus, Drawable, HarnessError, HarnessSuite, LoadStatus,
    Loadable, TestContext,
};
use cartotest_macros::cartotest_cases;
use uuid::Uuid;

use crate::runtime::{
    Basemap, Color, Envelope, Graphic, GraphicsOverlay, IdentifyResult, Map, MapView,
    SimpleMarkerSymbol, SimpleMarkerSymbolStyle, WrapAroundMode,
};

/// 窗口最小宽度（像素）。
pub const MIN_WIDTH: u32 = 600;
/// 窗口最小高度（像素）。
pub const MIN_HEIGHT: u32 = 800;

/// 紧贴日期变更线西侧的视点范围。
pub const WRAP_EDGE: Envelope = Envelope::new(
    -20_200_191.801_510_714,
    4_284.246_511_502_773_5,
    -19_459_110.135_313_917,
    983_824.641_750_892_51,
);
/// 视点动画时长（秒）。
pub const VIEWPOINT_ANIMATION_SECS: f64 = 2.5;
/// 识别容差（像素）。
pub const IDENTIFY_TOLERANCE: f64 = 5.0;
/// 待识别图形的符号大小（像素）。
pub const MARKER_SIZE: f64 = 65.0;

/// 窗口：持有中央的地图视图。
pub struct MapWindow {
    view: MapView,
}

impl MapWindow {
    fn new(ctx: &TestContext) -> Self {
        Self {
            view: MapView::new(ctx.handle(), MIN_WIDTH, MIN_HEIGHT),
        }
    }

    pub fn view(&self) -> &MapView {
        &self.view
    }
}

/// 夹具：窗口由 `init` 在每个用例开始前重新创建。
#[derive(Default)]
pub struct MapViewFixture {
    window: Option<MapWindow>,
}

impl MapViewFixture {
    fn view(&self) -> Result<&MapView, CaseFailure> {
        self.window
            .as_ref()
            .map(MapWindow::view)
            .ok_or_else(|| HarnessError::fixture("window was not created by init").into())
    }
}

fn fixture(_: &TestContext) -> Result<MapViewFixture, HarnessError> {
    Ok(MapViewFixture::default())
}

fn init(ctx: &mut TestContext, fixture: &mut MapViewFixture) -> CaseResult {
    fixture.window = Some(MapWindow::new(ctx));
    Ok(())
}

/// 返回 `map_view` 套件。
pub const fn suite() -> &'static HarnessSuite<MapViewFixture> {
    &cases::SUITE
}

/// 把视图移到日期变更线附近，等待渲染完成，并检查绘制结果是否符合环绕模式。
fn draw_at_wrap_edge(ctx: &mut TestContext, view: &MapView, mode: WrapAroundMode) -> CaseResult {
    view.set_wrap_around_mode(mode);

    let map = Map::with_basemap(ctx.handle(), Basemap::streets());
    view.set_map(map.clone());
    ctx.try_compare("map.load_status", || map.load_status(), LoadStatus::Loaded)?;

    view.set_viewpoint(WRAP_EDGE, VIEWPOINT_ANIMATION_SECS);
    ctx.try_compare("draw_status", || view.draw_status(), DrawStatus::Completed)?;

    ctx.compare(
        "frame shows wrapped content",
        view.last_frame().map(|frame| frame.shows_wrapped_content),
        Some(mode == WrapAroundMode::EnabledWhenSupported),
    )?;

    ctx.inspection_pause();
    Ok(())
}

#[cartotest_cases(
    suite = "map_view",
    fixture = MapViewFixture,
    fixture_fn = fixture,
    init = init
)]
mod cases {
    use super::*;

    fn test_1_wraparound(ctx: &mut TestContext, fixture: &mut MapViewFixture) -> CaseResult {
        let view = fixture.view()?;
        draw_at_wrap_edge(ctx, view, WrapAroundMode::EnabledWhenSupported)
    }

    fn test_2_no_wraparound(ctx: &mut TestContext, fixture: &mut MapViewFixture) -> CaseResult {
        let view = fixture.view()?;
        draw_at_wrap_edge(ctx, view, WrapAroundMode::Disabled)
    }

    /// 在屏幕中心放置图形，识别该点并在回调中选中命中的第一个图形。
    fn test_3_identify_graphic(
        ctx: &mut TestContext,
        fixture: &mut MapViewFixture,
    ) -> CaseResult {
        let view = fixture.view()?;

        let map = Map::with_basemap(ctx.handle(), Basemap::national_geographic());
        view.set_map(map.clone());
        ctx.try_compare("map.load_status", || map.load_status(), LoadStatus::Loaded)?;

        let screen_center_x = f64::from(view.width_in_pixels() / 2);
        let screen_center_y = f64::from(view.height_in_pixels() / 2);
        let location = view.screen_to_location(screen_center_x, screen_center_y);

        let symbol =
            SimpleMarkerSymbol::new(SimpleMarkerSymbolStyle::Square, Color::RED, MARKER_SIZE);
        let graphic = Graphic::new(location, symbol);
        let overlay = GraphicsOverlay::new();
        view.graphics_overlays().append(overlay.clone());
        overlay.graphics().append(graphic.clone());

        ctx.try_compare("draw_status", || view.draw_status(), DrawStatus::Completed)?;

        ctx.connect(
            view.identify_graphics_overlay_completed(),
            |(_, result): &(Uuid, IdentifyResult)| {
                if let Some(first) = result.graphics.first() {
                    first.set_selected(true);
                }
            },
        );

        // 未选中状态的停顿。
        ctx.inspection_pause();

        view.identify_graphics_overlay(
            &overlay,
            screen_center_x,
            screen_center_y,
            IDENTIFY_TOLERANCE,
            false,
        );
        ctx.try_compare("graphic.is_selected", || graphic.is_selected(), true)?;

        ctx.inspection_pause();
        Ok(())
    }
}
