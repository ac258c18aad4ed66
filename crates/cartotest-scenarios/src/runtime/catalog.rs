//! 门户条目目录：把三种形式的地图地址解析为同一个条目。
use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use super::RuntimeError;
use super::map::LayerType;

/// 示例网络地图的条目 ID。
pub const SAMPLE_WEB_MAP_ID: &str = "56bb3556bc5542cfa217348b09c80efb";

/// 门户中的一个网络地图条目。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortalItem {
    pub id: String,
    pub title: String,
    /// 加载完成后填入地图的业务图层。
    pub operational_layers: Vec<LayerType>,
}

/// 条目目录与模拟的网络延迟。
///
/// # 契约 (What)
/// - 可识别的地址：`/home/webmap/viewer.html?webmap=<id>`、`/home/item.html?id=<id>`、
///   `/sharing/rest/content/items/<id>/data`；
/// - 同一条目经由任一地址加载都得到相同的图层集合。
#[derive(Clone, Debug)]
pub struct PortalCatalog {
    items: BTreeMap<String, PortalItem>,
    latency: Duration,
}

impl PortalCatalog {
    /// 创建空目录。
    pub fn new(latency: Duration) -> Self {
        Self {
            items: BTreeMap::new(),
            latency,
        }
    }

    /// 预置示例网络地图的目录。
    pub fn arcgis_online() -> Self {
        let mut catalog = Self::new(Duration::from_millis(1_500));
        catalog.insert(PortalItem {
            id: SAMPLE_WEB_MAP_ID.to_owned(),
            title: "World Population Change".to_owned(),
            operational_layers: vec![LayerType::ArcGisMapImageLayer, LayerType::FeatureLayer],
        });
        catalog
    }

    /// 登记或替换条目。
    pub fn insert(&mut self, item: PortalItem) {
        self.items.insert(item.id.clone(), item);
    }

    /// 模拟的网络往返耗时。
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// 从地址中提取条目 ID。
    pub fn item_id(url: &Url) -> Result<String, RuntimeError> {
        let unrecognised = || RuntimeError::UnrecognisedUrl {
            url: url.to_string(),
        };
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let query = |key: &str| {
            url.query_pairs()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.into_owned())
        };

        let id = match segments.as_slice() {
            ["home", "webmap", "viewer.html"] => query("webmap"),
            ["home", "item.html"] => query("id"),
            ["sharing", "rest", "content", "items", id, "data"] => Some((*id).to_owned()),
            _ => None,
        };
        id.filter(|id| !id.is_empty()).ok_or_else(unrecognised)
    }

    /// 解析地址并查找条目。
    pub fn lookup(&self, url: &Url) -> Result<&PortalItem, RuntimeError> {
        let id = Self::item_id(url)?;
        self.items
            .get(&id)
            .ok_or(RuntimeError::UnknownItem { id })
    }
}

impl Default for PortalCatalog {
    fn default() -> Self {
        Self::arcgis_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("测试 URL 合法")
    }

    #[test]
    fn three_address_forms_resolve_to_the_same_item() {
        let catalog = PortalCatalog::arcgis_online();
        for raw in [
            "https://www.arcgis.com/home/webmap/viewer.html?webmap=56bb3556bc5542cfa217348b09c80efb",
            "https://www.arcgis.com/home/item.html?id=56bb3556bc5542cfa217348b09c80efb",
            "https://www.arcgis.com/sharing/rest/content/items/56bb3556bc5542cfa217348b09c80efb/data",
        ] {
            let item = catalog.lookup(&url(raw)).expect("条目应存在");
            assert_eq!(item.id, SAMPLE_WEB_MAP_ID);
        }
    }

    #[test]
    fn unknown_and_unrecognised_addresses_are_errors() {
        let catalog = PortalCatalog::arcgis_online();
        assert_eq!(
            catalog.lookup(&url("https://www.arcgis.com/home/item.html?id=missing")),
            Err(RuntimeError::UnknownItem {
                id: "missing".to_owned()
            })
        );
        assert!(matches!(
            catalog.lookup(&url("https://www.arcgis.com/home/index.html")),
            Err(RuntimeError::UnrecognisedUrl { .. })
        ));
        assert!(matches!(
            catalog.lookup(&url("https://www.arcgis.com/home/item.html?id=")),
            Err(RuntimeError::UnrecognisedUrl { .. })
        ));
    }
}
