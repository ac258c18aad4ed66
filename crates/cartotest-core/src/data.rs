//! 数据驱动：列模式 + 具名数据行。
//!
//! # 教案式说明
//! - **意图 (Why)**：同一个测试体需要针对多组输入（例如指向同一份地图的三种 URL）各跑一遍，
//!   每组输入独立汇报结果；
//! - **逻辑 (How)**：[`DataTable`] 先声明具名、带类型的列，再以 [`DataTable::new_row`] 逐行按列顺序压入取值；
//!   运行器在执行任何一行之前调用 [`DataTable::validate`]；
//! - **契约 (What)**：
//!   - 所有行共享同一列模式：缺列、多列、类型不符、列名重复、行名重复都属于准备阶段错误；
//!   - 行按声明顺序执行；
//!   - [`DataRow::fetch`] 按列名取出强类型值。
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::HarnessError;

/// 单元格取值。
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Url(Url),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// 列类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Url,
    Int,
    Float,
    Bool,
}

impl Value {
    /// 取值对应的列类型。
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Url(_) => ValueKind::Url,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Url => "url",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        })
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Url> for Value {
    fn from(value: Url) -> Self {
        Self::Url(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// 可从单元格中取出的强类型值。
pub trait FromValue: Sized {
    /// 对应的列类型。
    const KIND: ValueKind;

    /// 类型匹配时返回取值副本。
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $kind:ident) => {
        impl FromValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$kind(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(String, Text);
impl_from_value!(Url, Url);
impl_from_value!(i64, Int);
impl_from_value!(f64, Float);
impl_from_value!(bool, Bool);

/// 列声明。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Column {
    name: String,
    kind: ValueKind,
}

/// 一行具名输入。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataRow {
    name: String,
    values: Vec<(String, Value)>,
}

impl DataRow {
    /// 行名，用于拼出 `<test>:<row>`。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 按列名取出强类型值。
    pub fn fetch<T: FromValue>(&self, column: &str) -> Result<T, HarnessError> {
        let (_, value) = self
            .values
            .iter()
            .find(|(name, _)| name == column)
            .ok_or_else(|| {
                HarnessError::schema(format!("row `{}` has no column `{column}`", self.name))
            })?;
        T::from_value(value).ok_or_else(|| {
            HarnessError::schema(format!(
                "column `{column}` in row `{}` holds {} but {} was requested",
                self.name,
                value.kind(),
                T::KIND
            ))
        })
    }
}

/// 数据驱动表。
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DataTable {
    columns: Vec<Column>,
    rows: Vec<DataRow>,
}

impl DataTable {
    /// 创建空表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明一列。
    pub fn add_column(&mut self, name: impl Into<String>, kind: ValueKind) -> &mut Self {
        self.columns.push(Column {
            name: name.into(),
            kind,
        });
        self
    }

    /// 开始一行，随后按列顺序 [`RowBuilder::push`] 取值。
    pub fn new_row(&mut self, name: impl Into<String>) -> RowBuilder<'_> {
        self.rows.push(DataRow {
            name: name.into(),
            values: Vec::new(),
        });
        let index = self.rows.len() - 1;
        RowBuilder { table: self, index }
    }

    /// 全部数据行。
    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    /// 校验列模式，返回首个违例。
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.columns.is_empty() {
            return Err(HarnessError::schema("data table declares no columns"));
        }
        if self.rows.is_empty() {
            return Err(HarnessError::schema("data table declares no rows"));
        }

        let mut column_names = BTreeSet::new();
        for column in &self.columns {
            if !column_names.insert(column.name.as_str()) {
                return Err(HarnessError::schema(format!(
                    "column `{}` is declared more than once",
                    column.name
                )));
            }
        }

        let mut row_names = BTreeSet::new();
        for row in &self.rows {
            if !row_names.insert(row.name.as_str()) {
                return Err(HarnessError::schema(format!(
                    "row name `{}` is used more than once",
                    row.name
                )));
            }
            if let Some(column) = self.columns.get(row.values.len()) {
                return Err(HarnessError::schema(format!(
                    "row `{}` is missing column `{}`",
                    row.name, column.name
                )));
            }
            if row.values.len() > self.columns.len() {
                return Err(HarnessError::schema(format!(
                    "row `{}` supplies {} values for {} declared columns",
                    row.name,
                    row.values.len(),
                    self.columns.len()
                )));
            }
            for (column, (_, value)) in self.columns.iter().zip(&row.values) {
                if value.kind() != column.kind {
                    return Err(HarnessError::schema(format!(
                        "row `{}` column `{}` expects {} but holds {}",
                        row.name,
                        column.name,
                        column.kind,
                        value.kind()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// 逐列压入取值的行构造器。
pub struct RowBuilder<'t> {
    table: &'t mut DataTable,
    index: usize,
}

impl RowBuilder<'_> {
    /// 按列顺序压入下一个取值；超出列数的取值留给 [`DataTable::validate`] 报告。
    pub fn push(self, value: impl Into<Value>) -> Self {
        let position = self.table.rows[self.index].values.len();
        let name = self
            .table
            .columns
            .get(position)
            .map_or_else(|| format!("#{position}"), |column| column.name.clone());
        self.table.rows[self.index].values.push((name, value.into()));
        self
    }
}
