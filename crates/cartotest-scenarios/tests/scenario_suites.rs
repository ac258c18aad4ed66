//! 整套运行：`map_view` 与 `engine_setup` 应当全部通过，套件清单与按名称运行保持一致。

use cartotest_core::OutcomeKind;
use cartotest_scenarios::{
    all_suite_names, run_engine_setup_suite, run_map_view_suite, run_suite_by_name, test_config,
};

#[test]
fn map_view_suite_is_clean() {
    let config = test_config().expect("CARTOTEST_* 环境变量应当合法");
    let report = run_map_view_suite(&config);
    report.assert_all(OutcomeKind::Pass);
    assert_eq!(report.cases.len(), 3);
}

#[test]
fn engine_setup_suite_is_clean() {
    let config = test_config().expect("CARTOTEST_* 环境变量应当合法");
    let report = run_engine_setup_suite(&config);
    report.assert_all(OutcomeKind::Pass);
    assert_eq!(report.cases.len(), 3);
}

#[test]
fn every_listed_suite_runs_by_name() {
    let config = test_config().expect("CARTOTEST_* 环境变量应当合法");
    for name in all_suite_names() {
        let report = run_suite_by_name(name, &config).expect("清单中的套件应可按名称运行");
        assert_eq!(report.suite, *name);
    }
    assert!(run_suite_by_name("missing", &config).is_none());
}
