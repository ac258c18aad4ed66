//! 地图、底图与图层。
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cartotest_core::{LoadStatus, Loadable, LoopHandle, Signal};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use super::catalog::PortalCatalog;
use super::{BASEMAP_LATENCY, RuntimeError};

/// 图层类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerType {
    OpenStreetMapLayer,
    ArcGisTiledLayer,
    ArcGisVectorTiledLayer,
    ArcGisMapImageLayer,
    FeatureLayer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    layer_type: LayerType,
    name: String,
}

impl Layer {
    pub fn new(layer_type: LayerType, name: impl Into<String>) -> Self {
        Self {
            layer_type,
            name: name.into(),
        }
    }

    pub fn open_street_map() -> Self {
        Self::new(LayerType::OpenStreetMapLayer, "OpenStreetMap")
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 地图的业务图层列表。
#[derive(Default)]
pub struct LayerList {
    layers: Mutex<Vec<Layer>>,
}

impl LayerList {
    pub fn append(&self, layer: Layer) {
        self.layers.lock().push(layer);
    }

    pub fn size(&self) -> usize {
        self.layers.lock().len()
    }

    pub fn at(&self, index: usize) -> Option<Layer> {
        self.layers.lock().get(index).cloned()
    }

    fn extend(&self, layers: impl IntoIterator<Item = Layer>) {
        self.layers.lock().extend(layers);
    }
}

/// 底图描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Basemap {
    name: &'static str,
    base_layers: Vec<Layer>,
}

impl Basemap {
    pub fn streets() -> Self {
        Self {
            name: "Streets",
            base_layers: vec![Layer::new(LayerType::ArcGisVectorTiledLayer, "World Street Map")],
        }
    }

    pub fn national_geographic() -> Self {
        Self {
            name: "National Geographic",
            base_layers: vec![Layer::new(LayerType::ArcGisTiledLayer, "NatGeo World Map")],
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base_layers(&self) -> &[Layer] {
        &self.base_layers
    }
}

#[derive(Clone, Debug)]
enum MapSource {
    Empty,
    Basemap,
    Portal {
        url: Url,
        catalog: Arc<PortalCatalog>,
    },
}

struct MapInner {
    source: MapSource,
    basemap: Option<Basemap>,
    status: Mutex<LoadStatus>,
    load_error: Mutex<Option<RuntimeError>>,
    load_requested: AtomicBool,
    layers: LayerList,
    changed: Signal<LoadStatus>,
}

impl MapInner {
    fn transition(weak: &Weak<MapInner>, status: LoadStatus) {
        if let Some(inner) = weak.upgrade() {
            *inner.status.lock() = status;
            debug!(%status, "map load status changed");
            inner.changed.emit(&status);
        }
    }

    fn complete(weak: &Weak<MapInner>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let outcome: Result<Vec<Layer>, RuntimeError> = match &inner.source {
            MapSource::Empty | MapSource::Basemap => Ok(Vec::new()),
            MapSource::Portal { url, catalog } => catalog.lookup(url).map(|item| {
                item.operational_layers
                    .iter()
                    .map(|layer_type| {
                        Layer::new(*layer_type, format!("{}::{layer_type:?}", item.title))
                    })
                    .collect()
            }),
        };
        let status = match outcome {
            Ok(layers) => {
                inner.layers.extend(layers);
                LoadStatus::Loaded
            }
            Err(err) => {
                *inner.load_error.lock() = Some(err);
                LoadStatus::FailedToLoad
            }
        };
        drop(inner);
        Self::transition(weak, status);
    }
}

/// 地图句柄；克隆得到同一张地图。
///
/// # 契约 (What)
/// - 构造后处于 `NotLoaded`；
/// - `load()` 幂等：首次调用先在循环上迁移到 `Loading`，再在模拟延迟后迁移到 `Loaded` 或 `FailedToLoad`，
///   之后的调用不产生任何效果；
/// - 每次迁移都发出 `load_status_changed`。
#[derive(Clone)]
pub struct Map {
    inner: Arc<MapInner>,
    handle: LoopHandle,
}

impl Map {
    /// 空地图。
    pub fn new(handle: LoopHandle) -> Self {
        Self::from_source(handle, MapSource::Empty, None)
    }

    /// 指向门户条目的地图。
    pub fn with_url(handle: LoopHandle, url: Url, catalog: Arc<PortalCatalog>) -> Self {
        Self::from_source(handle, MapSource::Portal { url, catalog }, None)
    }

    /// 仅含底图的地图。
    pub fn with_basemap(handle: LoopHandle, basemap: Basemap) -> Self {
        Self::from_source(handle, MapSource::Basemap, Some(basemap))
    }

    fn from_source(handle: LoopHandle, source: MapSource, basemap: Option<Basemap>) -> Self {
        Self {
            inner: Arc::new(MapInner {
                source,
                basemap,
                status: Mutex::new(LoadStatus::NotLoaded),
                load_error: Mutex::new(None),
                load_requested: AtomicBool::new(false),
                layers: LayerList::default(),
                changed: Signal::new(),
            }),
            handle,
        }
    }

    pub fn operational_layers(&self) -> &LayerList {
        &self.inner.layers
    }

    pub fn basemap(&self) -> Option<&Basemap> {
        self.inner.basemap.as_ref()
    }

    /// 加载失败的原因。
    pub fn load_error(&self) -> Option<RuntimeError> {
        self.inner.load_error.lock().clone()
    }

    fn latency(&self) -> Duration {
        match &self.inner.source {
            MapSource::Empty => Duration::ZERO,
            MapSource::Basemap => BASEMAP_LATENCY,
            MapSource::Portal { catalog, .. } => catalog.latency(),
        }
    }
}

impl Loadable for Map {
    fn load(&self) {
        if self.inner.load_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        self.handle
            .post(move || MapInner::transition(&weak, LoadStatus::Loading));
        let weak = Arc::downgrade(&self.inner);
        self.handle
            .post_after(self.latency(), move || MapInner::complete(&weak));
    }

    fn load_status(&self) -> LoadStatus {
        *self.inner.status.lock()
    }

    fn load_status_changed(&self) -> &Signal<LoadStatus> {
        &self.inner.changed
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("source", &self.inner.source)
            .field("status", &self.load_status())
            .field("layers", &self.inner.layers.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartotest_core::{EventLoop, SignalCapture, VirtualClock, pump_for};

    fn event_loop() -> EventLoop {
        EventLoop::new(Arc::new(VirtualClock::new()))
    }

    fn settle(event_loop: &EventLoop) {
        pump_for(event_loop, Duration::from_secs(5), Duration::from_millis(50));
    }

    #[test]
    fn portal_map_loads_item_layers_and_emits_each_transition() {
        let event_loop = event_loop();
        let url = Url::parse(
            "https://www.arcgis.com/home/item.html?id=56bb3556bc5542cfa217348b09c80efb",
        )
        .expect("测试 URL 合法");
        let map = Map::with_url(event_loop.handle(), url, Arc::new(PortalCatalog::arcgis_online()));
        let capture = SignalCapture::attach(map.load_status_changed(), LoadStatus::Unknown);

        map.load();
        map.load();
        assert_eq!(map.load_status(), LoadStatus::NotLoaded);
        settle(&event_loop);

        assert_eq!(map.load_status(), LoadStatus::Loaded);
        assert_eq!(capture.history(), vec![LoadStatus::Loading, LoadStatus::Loaded]);
        assert_eq!(map.operational_layers().size(), 2);
    }

    #[test]
    fn unknown_item_fails_to_load_with_reason() {
        let event_loop = event_loop();
        let url =
            Url::parse("https://www.arcgis.com/home/item.html?id=deadbeef").expect("测试 URL 合法");
        let map = Map::with_url(event_loop.handle(), url, Arc::new(PortalCatalog::arcgis_online()));
        map.load();
        settle(&event_loop);

        assert_eq!(map.load_status(), LoadStatus::FailedToLoad);
        assert_eq!(
            map.load_error(),
            Some(RuntimeError::UnknownItem {
                id: "deadbeef".to_owned()
            })
        );
    }

    #[test]
    fn dropped_map_ignores_pending_completion() {
        let event_loop = event_loop();
        let map = Map::with_basemap(event_loop.handle(), Basemap::streets());
        map.load();
        drop(map);
        settle(&event_loop);
        assert_eq!(event_loop.pending_tasks(), 0);
    }
}
