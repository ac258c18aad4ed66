//! 用例结果与套件汇总。
//!
//! # 教案式说明
//! - **意图 (Why)**：每个用例、每个数据行都要独立给出结论，并为所有非通过结果附带诊断值；
//! - **逻辑 (How)**：[`Outcome`] 区分通过、失败、预期失败、跳过与准备错误五类；[`SuiteReport`] 负责按执行顺序收集、
//!   计数与渲染（QtTest 风格的文本，或经由 `serde` 的 JSON）；
//! - **契约 (What)**：`is_clean` 仅在不存在 `Fail` 与 `SetupError` 时为真，预期失败与跳过不影响整洁度。
use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// 单个用例的结论。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail { diagnostic: String },
    ExpectedFail { reason: String, diagnostic: String },
    Skip { reason: String },
    SetupError { diagnostic: String },
}

/// 不带诊断信息的结论类别，用于声明用例的期望结论。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Pass,
    Fail,
    ExpectedFail,
    Skip,
    SetupError,
}

impl Outcome {
    /// 结论类别。
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Pass => OutcomeKind::Pass,
            Self::Fail { .. } => OutcomeKind::Fail,
            Self::ExpectedFail { .. } => OutcomeKind::ExpectedFail,
            Self::Skip { .. } => OutcomeKind::Skip,
            Self::SetupError { .. } => OutcomeKind::SetupError,
        }
    }

    /// QtTest 风格的结果标签。
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Pass => "PASS   ",
            Self::Fail { .. } => "FAIL!  ",
            Self::ExpectedFail { .. } => "XFAIL  ",
            Self::Skip { .. } => "SKIP   ",
            Self::SetupError { .. } => "SETUP! ",
        }
    }

    /// 是否计为失败。
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Fail { .. } | Self::SetupError { .. })
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::Pass => None,
            Self::Fail { diagnostic } | Self::SetupError { diagnostic } => Some(diagnostic.clone()),
            Self::ExpectedFail { reason, diagnostic } => Some(format!("{reason}\n   {diagnostic}")),
            Self::Skip { reason } => Some(reason.clone()),
        }
    }
}

/// 单个用例（或数据行）的报告。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub outcome: Outcome,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// 计数汇总。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub expected_failures: usize,
    pub skipped: usize,
    pub setup_errors: usize,
}

impl Summary {
    /// 报告总数。
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.expected_failures + self.skipped + self.setup_errors
    }

    /// 累加另一份汇总。
    pub fn merge(&mut self, other: Summary) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.expected_failures += other.expected_failures;
        self.skipped += other.skipped;
        self.setup_errors += other.setup_errors;
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Totals: {} passed, {} failed, {} expected failures, {} skipped, {} setup errors",
            self.passed, self.failed, self.expected_failures, self.skipped, self.setup_errors
        )
    }
}

/// 一个套件的全部报告。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// 创建空报告。
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            cases: Vec::new(),
        }
    }

    /// 追加一条用例报告。
    pub fn push(&mut self, report: CaseReport) {
        self.cases.push(report);
    }

    /// 按名称查找用例报告。
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|case| case.name == name)
    }

    /// 计数汇总。
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for case in &self.cases {
            match case.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail { .. } => summary.failed += 1,
                Outcome::ExpectedFail { .. } => summary.expected_failures += 1,
                Outcome::Skip { .. } => summary.skipped += 1,
                Outcome::SetupError { .. } => summary.setup_errors += 1,
            }
        }
        summary
    }

    /// 是否不存在失败与准备错误。
    pub fn is_clean(&self) -> bool {
        !self.cases.iter().any(|case| case.outcome.is_failure())
    }

    /// 所有失败用例。
    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|case| case.outcome.is_failure())
    }

    /// 存在失败时以“套件/用例”上下文 panic，供 `#[test]` 入口使用。
    pub fn assert_clean(&self) {
        if self.is_clean() {
            return;
        }
        let mut message = format!("[cartotest::{}] 存在未通过的用例：", self.suite);
        for case in self.failures() {
            message.push_str(&format!(
                "\n{}: {}::{}() {}",
                case.outcome.tag().trim_end(),
                self.suite,
                case.name,
                case.outcome.detail().unwrap_or_default()
            ));
        }
        panic!("{message}");
    }

    /// 断言报告非空且每条结论都属于 `expected` 类别，否则以“套件/用例”上下文 panic。
    pub fn assert_all(&self, expected: OutcomeKind) {
        if self.cases.is_empty() {
            panic!("[cartotest::{}] 报告为空，期望结论 {expected:?}", self.suite);
        }
        let mismatched: Vec<String> = self
            .cases
            .iter()
            .filter(|case| case.outcome.kind() != expected)
            .map(|case| {
                format!(
                    "\n{}: {}::{}() {}",
                    case.outcome.tag().trim_end(),
                    self.suite,
                    case.name,
                    case.outcome.detail().unwrap_or_default()
                )
            })
            .collect();
        if !mismatched.is_empty() {
            panic!(
                "[cartotest::{}] 期望结论 {expected:?}，实际：{}",
                self.suite,
                mismatched.concat()
            );
        }
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "********* Start testing of {} *********", self.suite)?;
        for case in &self.cases {
            write!(f, "{}: {}::{}()", case.outcome.tag(), self.suite, case.name)?;
            match case.outcome.detail() {
                Some(detail) => writeln!(f, " {detail}")?,
                None => writeln!(f)?,
            }
        }
        writeln!(f, "{}", self.summary())?;
        write!(f, "********* Finished testing of {} *********", self.suite)
    }
}
