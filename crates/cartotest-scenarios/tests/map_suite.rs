//! `map` 套件的逐条结论核对：通过、数据驱动、普通失败与预期失败。

use cartotest_core::{Outcome, SuiteReport};
use cartotest_scenarios::map::{EXPECTED_LAYER_COUNT, UNKNOWN_FAILURE_REASON};
use cartotest_scenarios::{run_map_suite, test_config};

fn report() -> SuiteReport {
    let config = test_config().expect("CARTOTEST_* 环境变量应当合法");
    run_map_suite(&config)
}

#[test]
fn passing_cases_pass() {
    let report = report();
    for name in [
        "test_1_simple_property",
        "test_2_async_method",
        "test_3_async_method2",
        "test_4_advanced_techniques",
        "test_5_advanced_techniques2",
        "test_6_data_driven_test:web map url",
        "test_6_data_driven_test:item url",
        "test_6_data_driven_test:data sharing url",
    ] {
        let case = report
            .case(name)
            .unwrap_or_else(|| panic!("missing report for {name}"));
        assert_eq!(case.outcome, Outcome::Pass, "{name}");
    }
}

#[test]
fn plain_failure_reports_both_values() {
    let report = report();
    let case = report.case("test_7_with_failure").expect("test_7 reported");
    let Outcome::Fail { diagnostic } = &case.outcome else {
        panic!("test_7 should fail, got {:?}", case.outcome);
    };
    assert!(diagnostic.contains("operational_layers.size"), "{diagnostic}");
    assert!(diagnostic.contains("Actual   : 2"), "{diagnostic}");
    assert!(
        diagnostic.contains(&format!("Expected : {EXPECTED_LAYER_COUNT}")),
        "{diagnostic}"
    );
}

#[test]
fn known_issue_is_an_expected_failure() {
    let report = report();
    let case = report
        .case("test_8_with_unknown_failure")
        .expect("test_8 reported");
    match &case.outcome {
        Outcome::ExpectedFail { reason, diagnostic } => {
            assert_eq!(reason, UNKNOWN_FAILURE_REASON);
            assert!(diagnostic.contains("Actual   : 2"), "{diagnostic}");
        }
        other => panic!("test_8 should be an expected failure, got {other:?}"),
    }
}

#[test]
fn summary_and_rendering() {
    let report = report();
    let summary = report.summary();
    assert_eq!(summary.passed, 8);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.expected_failures, 1);
    assert_eq!(summary.setup_errors, 0);
    assert!(!report.is_clean());

    let text = report.to_string();
    assert!(text.starts_with("********* Start testing of map *********"));
    assert!(text.contains("FAIL!  : map::test_7_with_failure()"));
    assert!(text.contains("XFAIL  : map::test_8_with_unknown_failure()"));

    let json = serde_json::to_value(&report).expect("报告可序列化");
    assert_eq!(json["suite"], "map");
    assert_eq!(json["cases"].as_array().map(Vec::len), Some(10));
}
