//! 脚本化运行时的性质验证
//!
//! - 同一条目的三种地址形式解析出相同的条目 ID；
//! - 导入路径列表在任意注册序列下保持无重复，且最后注册的路径排在最前。

use std::path::PathBuf;

use cartotest_scenarios::engine_setup::{BUILTIN_IMPORT_PATH, ComponentEngine};
use cartotest_scenarios::runtime::PortalCatalog;
use proptest::prelude::*;
use url::Url;

proptest! {
    #[test]
    fn all_url_forms_resolve_to_the_same_item(id in "[0-9a-f]{32}") {
        let forms = [
            format!("https://www.arcgis.com/home/webmap/viewer.html?webmap={id}"),
            format!("https://www.arcgis.com/home/item.html?id={id}"),
            format!("https://www.arcgis.com/sharing/rest/content/items/{id}/data"),
        ];
        for raw in forms {
            let url = Url::parse(&raw).expect("生成的地址合法");
            prop_assert_eq!(PortalCatalog::item_id(&url), Ok(id.clone()));
        }
    }

    #[test]
    fn import_paths_stay_unique_and_most_recent_first(
        picks in proptest::collection::vec(0usize..4, 1..16),
    ) {
        let mut engine = ComponentEngine::new();
        for pick in &picks {
            engine.add_import_path(format!("/runtime/{pick}"));
        }

        let paths = engine.import_path_list();
        let last = PathBuf::from(format!("/runtime/{}", picks[picks.len() - 1]));
        prop_assert_eq!(paths.first(), Some(&last));
        prop_assert_eq!(paths.last(), Some(&PathBuf::from(BUILTIN_IMPORT_PATH)));
        for (index, path) in paths.iter().enumerate() {
            prop_assert!(!paths[index + 1..].contains(path));
        }
    }
}
