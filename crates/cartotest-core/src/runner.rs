//! 套件运行器：顺序执行用例与数据行，逐一产出独立报告。
//!
//! # 教案式说明
//! - **意图 (Why)**：把“用例 = 名称 + 函数指针”的元信息集中为 `'static` 常量，便于宏一次性生成测试入口，
//!   也便于 CLI 遍历；
//! - **逻辑 (How)**：
//!   1. 每个用例（或数据行）拥有新建的 [`TestContext`] 与夹具，前者带独立事件循环；
//!   2. 数据驱动用例先取表并校验，结构错误记为一条 `SetupError`，任何一行都不执行；
//!   3. 用例体在 `catch_unwind` 中执行，panic 降级为该用例的 `Fail`；
//!   4. 夹具先于上下文析构，被测对象消失时事件循环仍在，尚未执行的回调随后随循环一起丢弃；
//! - **契约 (What)**：用例严格顺序执行，绝不并行；任何一个用例或数据行失败都不影响其余用例执行。
use std::time::Instant;

use tracing::{info, info_span, warn};

use crate::config::HarnessConfig;
use crate::context::{CaseFailure, CaseResult, TestContext};
use crate::data::{DataRow, DataTable};
use crate::error::HarnessError;
use crate::report::{CaseReport, Outcome, SuiteReport};
use crate::support;

/// 普通用例体。
pub type CaseFn<F> = fn(&mut TestContext, &mut F) -> CaseResult;
/// 数据驱动用例体。
pub type RowFn<F> = fn(&mut TestContext, &mut F, &DataRow) -> CaseResult;
/// 夹具构造函数。
pub type FixtureFn<F> = fn(&TestContext) -> Result<F, HarnessError>;

/// 用例形态。
pub enum CaseKind<F: 'static> {
    /// 单次执行。
    Single(CaseFn<F>),
    /// 针对数据表的每一行执行一次。
    DataDriven {
        data: fn() -> DataTable,
        test: RowFn<F>,
    },
}

/// 单个用例的元信息。
pub struct HarnessCase<F: 'static> {
    /// 用例名，会与行名拼接为 `<test>:<row>`。
    pub name: &'static str,
    /// 用例形态。
    pub kind: CaseKind<F>,
}

/// 同一夹具类型下的一组用例。
///
/// # 契约 (What)
/// - `fixture` 在每个用例（每个数据行）开始前调用一次；失败时该用例记为 `SetupError`；
/// - `init` 紧随夹具构造执行，相当于 QtTest 的 `init()` 槽；它的失败按用例失败处理。
pub struct HarnessSuite<F: 'static> {
    pub name: &'static str,
    pub fixture: FixtureFn<F>,
    pub init: Option<CaseFn<F>>,
    pub cases: &'static [HarnessCase<F>],
}

enum Execution {
    Fixture(HarnessError),
    Body(CaseResult),
}

/// 顺序执行整个套件。
pub fn run_suite<F: 'static>(suite: &HarnessSuite<F>, config: &HarnessConfig) -> SuiteReport {
    let mut report = SuiteReport::new(suite.name);
    if suite.cases.is_empty() {
        report.push(setup_error(
            suite.name,
            "suite declares no cases".to_owned(),
            Instant::now(),
        ));
        return report;
    }

    for case in suite.cases {
        execute(suite, case, config, &mut report);
    }

    let summary = report.summary();
    info!(
        suite = suite.name,
        passed = summary.passed,
        failed = summary.failed,
        expected_failures = summary.expected_failures,
        skipped = summary.skipped,
        setup_errors = summary.setup_errors,
        "suite finished"
    );
    report
}

/// 只执行名为 `name` 的用例（数据驱动用例包含其全部数据行）。
///
/// 供逐用例生成的测试入口使用；名称不存在时报告一条 `SetupError`。
pub fn run_case<F: 'static>(
    suite: &HarnessSuite<F>,
    name: &str,
    config: &HarnessConfig,
) -> SuiteReport {
    let mut report = SuiteReport::new(suite.name);
    match suite.cases.iter().find(|case| case.name == name) {
        Some(case) => execute(suite, case, config, &mut report),
        None => report.push(setup_error(
            name,
            format!("suite `{}` declares no case named `{name}`", suite.name),
            Instant::now(),
        )),
    }
    report
}

fn execute<F: 'static>(
    suite: &HarnessSuite<F>,
    case: &HarnessCase<F>,
    config: &HarnessConfig,
    report: &mut SuiteReport,
) {
    match &case.kind {
        CaseKind::Single(test) => {
            let test = *test;
            report.push(run_body(suite, case.name, config, |ctx, fixture| {
                test(ctx, fixture)
            }));
        }
        CaseKind::DataDriven { data, test } => {
            let test = *test;
            let started = Instant::now();
            let table = match support::catch(suite.name, case.name, *data) {
                Ok(table) => table,
                Err(diagnostic) => {
                    report.push(setup_error(case.name, diagnostic, started));
                    return;
                }
            };
            if let Err(err) = table.validate() {
                warn!(suite = suite.name, case = case.name, error = %err, "data table rejected");
                report.push(setup_error(case.name, err.to_string(), started));
                return;
            }
            for row in table.rows() {
                let name = format!("{}:{}", case.name, row.name());
                report.push(run_body(suite, &name, config, |ctx, fixture| {
                    test(ctx, fixture, row)
                }));
            }
        }
    }
}

fn setup_error(name: &str, diagnostic: String, started: Instant) -> CaseReport {
    CaseReport {
        name: name.to_owned(),
        outcome: Outcome::SetupError { diagnostic },
        elapsed: started.elapsed(),
    }
}

fn run_body<F, B>(
    suite: &HarnessSuite<F>,
    name: &str,
    config: &HarnessConfig,
    body: B,
) -> CaseReport
where
    F: 'static,
    B: FnOnce(&mut TestContext, &mut F) -> CaseResult,
{
    let span = info_span!("case", suite = suite.name, case = name);
    let _entered = span.enter();
    let started = Instant::now();
    let mut ctx = TestContext::new(name, config.clone());

    let execution = support::catch(suite.name, name, || {
        let mut fixture = match (suite.fixture)(&ctx) {
            Ok(fixture) => fixture,
            Err(err) => return Execution::Fixture(err),
        };
        let result = match suite.init {
            Some(init) => {
                init(&mut ctx, &mut fixture).and_then(|()| body(&mut ctx, &mut fixture))
            }
            None => body(&mut ctx, &mut fixture),
        };
        drop(fixture);
        Execution::Body(result)
    });

    let outcome = match execution {
        Ok(Execution::Fixture(err)) => Outcome::SetupError {
            diagnostic: err.to_string(),
        },
        Ok(Execution::Body(result)) => conclude(&mut ctx, result),
        Err(diagnostic) => Outcome::Fail { diagnostic },
    };
    drop(ctx);

    let elapsed = started.elapsed();
    match &outcome {
        Outcome::Pass => info!(?elapsed, "PASS"),
        Outcome::ExpectedFail { reason, .. } => info!(?elapsed, %reason, "XFAIL"),
        Outcome::Skip { reason } => info!(?elapsed, %reason, "SKIP"),
        Outcome::Fail { diagnostic } | Outcome::SetupError { diagnostic } => {
            warn!(?elapsed, %diagnostic, "FAIL")
        }
    }
    CaseReport {
        name: name.to_owned(),
        outcome,
        elapsed,
    }
}

fn conclude(ctx: &mut TestContext, result: CaseResult) -> Outcome {
    if let Some(reason) = ctx.unused_expect_fail() {
        warn!(case = ctx.name(), %reason, "expected-failure directive was never consumed");
    }
    let known = ctx.take_known_issues();
    match result {
        Ok(()) if known.is_empty() => Outcome::Pass,
        Ok(()) => Outcome::ExpectedFail {
            reason: known
                .iter()
                .map(|issue| issue.reason.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            diagnostic: known
                .iter()
                .map(|issue| issue.diagnostic.as_str())
                .collect::<Vec<_>>()
                .join("\n   "),
        },
        Err(CaseFailure::ExpectedFailure { reason, diagnostic }) => {
            Outcome::ExpectedFail { reason, diagnostic }
        }
        Err(CaseFailure::Skipped { reason }) => Outcome::Skip { reason },
        Err(failure) => Outcome::Fail {
            diagnostic: failure.diagnostic(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockKind;
    use crate::context::ExpectFailMode;
    use crate::data::ValueKind;

    fn config() -> HarnessConfig {
        HarnessConfig::default().with_clock(ClockKind::Virtual)
    }

    fn unit_fixture(_: &TestContext) -> Result<(), HarnessError> {
        Ok(())
    }

    fn passes(ctx: &mut TestContext, _: &mut ()) -> CaseResult {
        ctx.compare("one", 1, 1)
    }

    fn fails(ctx: &mut TestContext, _: &mut ()) -> CaseResult {
        ctx.compare("layers", 2, 16)?;
        panic!("首个失败断言之后的代码不应执行");
    }

    fn known_issue(ctx: &mut TestContext, _: &mut ()) -> CaseResult {
        ctx.expect_fail("follow up with analyst", ExpectFailMode::Abort);
        ctx.compare("layers", 2, 16)?;
        panic!("Abort 模式命中后应终止用例体");
    }

    fn silently_resolved(ctx: &mut TestContext, _: &mut ()) -> CaseResult {
        ctx.expect_fail("should still fail", ExpectFailMode::Abort);
        ctx.compare("layers", 16, 16)
    }

    fn continues(ctx: &mut TestContext, _: &mut ()) -> CaseResult {
        ctx.expect_fail("cosmetic", ExpectFailMode::Continue);
        ctx.verify("flag", false)?;
        ctx.compare("after", 1, 1)
    }

    fn panics(_: &mut TestContext, _: &mut ()) -> CaseResult {
        panic!("boom")
    }

    fn skips(ctx: &mut TestContext, _: &mut ()) -> CaseResult {
        ctx.skip("no display available")
    }

    const fn single(name: &'static str, test: CaseFn<()>) -> HarnessCase<()> {
        HarnessCase {
            name,
            kind: CaseKind::Single(test),
        }
    }

    const CASES: &[HarnessCase<()>] = &[
        single("passes", passes),
        single("fails", fails),
        single("known_issue", known_issue),
        single("silently_resolved", silently_resolved),
        single("continues", continues),
        single("panics", panics),
        single("skips", skips),
    ];

    const SUITE: HarnessSuite<()> = HarnessSuite {
        name: "unit",
        fixture: unit_fixture,
        init: None,
        cases: CASES,
    };

    fn outcome(report: &SuiteReport, name: &str) -> Option<Outcome> {
        report.case(name).map(|case| case.outcome.clone())
    }

    #[test]
    fn each_case_gets_its_own_outcome() {
        let report = run_suite(&SUITE, &config());

        assert_eq!(outcome(&report, "passes"), Some(Outcome::Pass));
        assert!(matches!(
            outcome(&report, "fails"),
            Some(Outcome::Fail { diagnostic }) if diagnostic.contains("Expected : 16")
        ));
        assert!(matches!(
            outcome(&report, "known_issue"),
            Some(Outcome::ExpectedFail { reason, .. }) if reason == "follow up with analyst"
        ));
        assert!(matches!(
            outcome(&report, "silently_resolved"),
            Some(Outcome::Fail { diagnostic }) if diagnostic.contains("passed unexpectedly")
        ));
        assert!(matches!(
            outcome(&report, "continues"),
            Some(Outcome::ExpectedFail { reason, .. }) if reason == "cosmetic"
        ));
        assert!(matches!(
            outcome(&report, "panics"),
            Some(Outcome::Fail { diagnostic }) if diagnostic.contains("[cartotest::unit::panics]")
        ));
        assert!(matches!(
            outcome(&report, "skips"),
            Some(Outcome::Skip { .. })
        ));
        assert_eq!(report.summary().total(), CASES.len());
    }

    #[test]
    fn a_single_case_can_be_run_by_name() {
        let report = run_case(&SUITE, "known_issue", &config());
        assert_eq!(report.cases.len(), 1);
        assert!(matches!(
            outcome(&report, "known_issue"),
            Some(Outcome::ExpectedFail { .. })
        ));

        let missing = run_case(&SUITE, "renamed", &config());
        assert!(matches!(
            outcome(&missing, "renamed"),
            Some(Outcome::SetupError { diagnostic })
                if diagnostic.contains("no case named `renamed`")
        ));
    }

    fn rows() -> DataTable {
        let mut table = DataTable::new();
        table.add_column("value", ValueKind::Int);
        table.new_row("one").push(1_i64);
        table.new_row("two").push(2_i64);
        table.new_row("three").push(3_i64);
        table
    }

    fn broken_rows() -> DataTable {
        let mut table = DataTable::new();
        table.add_column("value", ValueKind::Int);
        table.new_row("text").push("not a number");
        table
    }

    fn odd_only(ctx: &mut TestContext, _: &mut (), row: &DataRow) -> CaseResult {
        let value: i64 = row.fetch("value")?;
        ctx.compare("odd", value % 2, 1)
    }

    fn never_runs(_: &mut TestContext, _: &mut (), _: &DataRow) -> CaseResult {
        panic!("结构错误时不应执行任何数据行")
    }

    const DATA_CASES: &[HarnessCase<()>] = &[
        HarnessCase {
            name: "odd_only",
            kind: CaseKind::DataDriven {
                data: rows,
                test: odd_only,
            },
        },
        HarnessCase {
            name: "broken",
            kind: CaseKind::DataDriven {
                data: broken_rows,
                test: never_runs,
            },
        },
    ];

    const DATA_SUITE: HarnessSuite<()> = HarnessSuite {
        name: "data",
        fixture: unit_fixture,
        init: None,
        cases: DATA_CASES,
    };

    #[test]
    fn rows_report_independently_and_schema_errors_preempt_rows() {
        let report = run_suite(&DATA_SUITE, &config());
        let names: Vec<&str> = report.cases.iter().map(|case| case.name.as_str()).collect();
        assert_eq!(
            names,
            ["odd_only:one", "odd_only:two", "odd_only:three", "broken"]
        );

        assert_eq!(outcome(&report, "odd_only:one"), Some(Outcome::Pass));
        assert!(matches!(
            outcome(&report, "odd_only:two"),
            Some(Outcome::Fail { .. })
        ));
        assert_eq!(outcome(&report, "odd_only:three"), Some(Outcome::Pass));
        assert!(matches!(
            outcome(&report, "broken"),
            Some(Outcome::SetupError { .. })
        ));

        let rows_only = run_case(&DATA_SUITE, "odd_only", &config());
        assert_eq!(rows_only.cases.len(), 3);
    }

    fn failing_fixture(_: &TestContext) -> Result<(), HarnessError> {
        Err(HarnessError::fixture("window could not be created"))
    }

    const FIXTURE_SUITE: HarnessSuite<()> = HarnessSuite {
        name: "fixture",
        fixture: failing_fixture,
        init: None,
        cases: &[single("passes", passes)],
    };

    #[test]
    fn fixture_errors_are_setup_errors() {
        let report = run_suite(&FIXTURE_SUITE, &config());
        assert!(matches!(
            &report.cases[0].outcome,
            Outcome::SetupError { diagnostic } if diagnostic.contains("window could not be created")
        ));
    }

    const EMPTY_SUITE: HarnessSuite<()> = HarnessSuite {
        name: "empty",
        fixture: unit_fixture,
        init: None,
        cases: &[],
    };

    #[test]
    fn empty_suite_is_a_setup_error() {
        let report = run_suite(&EMPTY_SUITE, &config());
        assert_eq!(report.summary().setup_errors, 1);
    }
}
