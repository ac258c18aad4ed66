//! # cartotest-macros
//!
//! 该 crate 提供 `cartotest_cases` 属性宏：把一个内联模块里的用例函数登记为套件，
//! 并为每个用例生成一个独立的 `#[test]` 入口。
//!
//! ```ignore
//! #[cartotest_cases(suite = "map", fixture = MapFixture, fixture_fn = fixture)]
//! mod cases {
//!     use super::*;
//!
//!     fn test_1_simple_property(ctx: &mut TestContext, f: &mut MapFixture) -> CaseResult { .. }
//!
//!     #[data(test_6_rows)]
//!     fn test_6_data_driven(ctx: &mut TestContext, f: &mut MapFixture, row: &DataRow) -> CaseResult { .. }
//!
//!     #[outcome(expected_fail)]
//!     fn test_8_known_issue(ctx: &mut TestContext, f: &mut MapFixture) -> CaseResult { .. }
//! }
//! ```
//!
//! 模块内每个函数都是一个用例，按声明顺序注册；辅助函数与取数函数放在父模块中。
//! 宏在模块内追加 `CASES`、`SUITE` 两个常量，以及 `#[cfg(test)]` 下逐用例的测试函数，
//! 测试函数以 `HarnessConfig::for_tests()` 运行该用例（含全部数据行），再断言每条结论都符合 `#[outcome]` 声明。

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::spanned::Spanned;
use syn::{
    Attribute, Ident, Item, ItemFn, ItemMod, LitStr, Path, Result as SynResult, Token, Type,
    parse_macro_input,
};

/// 教案级说明：
/// - **意图（Why）**：用例表、套件常量与 `#[test]` 包装若手写三份，新增用例时极易漏掉其中之一；
///   失败也应精确到用例，而不是整套一起报红；
/// - **逻辑（How）**：解析属性参数（见 [`SuiteArgs`]），逐个读取模块内函数的 `#[data]` / `#[outcome]` 标记（见 [`CaseSpec`]），
///   剥离标记后追加生成项；任何标记或签名错误都转为指向原位置的编译期诊断；
/// - **契约（What）**：生成代码通过 `::cartotest_core` 路径引用装置，调用方 crate 必须依赖 `cartotest-core`；
///   模块必须是内联模块。
#[proc_macro_attribute]
pub fn cartotest_cases(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as SuiteArgs);
    let module = parse_macro_input!(item as ItemMod);

    match expand(args, module) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// `suite = "name", fixture = Type, fixture_fn = path[, init = path]`
struct SuiteArgs {
    suite: LitStr,
    fixture: Type,
    fixture_fn: Path,
    init: Option<Path>,
}

impl Parse for SuiteArgs {
    fn parse(input: ParseStream<'_>) -> SynResult<Self> {
        let mut suite = None;
        let mut fixture = None;
        let mut fixture_fn = None;
        let mut init = None;

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let duplicate = || syn::Error::new(key.span(), format!("`{key}` 重复声明"));
            match key.to_string().as_str() {
                "suite" if suite.is_some() => return Err(duplicate()),
                "suite" => suite = Some(input.parse::<LitStr>()?),
                "fixture" if fixture.is_some() => return Err(duplicate()),
                "fixture" => fixture = Some(input.parse::<Type>()?),
                "fixture_fn" if fixture_fn.is_some() => return Err(duplicate()),
                "fixture_fn" => fixture_fn = Some(input.parse::<Path>()?),
                "init" if init.is_some() => return Err(duplicate()),
                "init" => init = Some(input.parse::<Path>()?),
                _ => {
                    return Err(syn::Error::new(
                        key.span(),
                        "cartotest_cases 仅支持 suite / fixture / fixture_fn / init 参数",
                    ));
                }
            }
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        let missing = |name: &str| {
            syn::Error::new(Span::call_site(), format!("cartotest_cases 缺少 `{name} = ...` 参数"))
        };
        let suite = suite.ok_or_else(|| missing("suite"))?;
        if suite.value().is_empty() {
            return Err(syn::Error::new(suite.span(), "套件名不能为空"));
        }
        Ok(Self {
            suite,
            fixture: fixture.ok_or_else(|| missing("fixture"))?,
            fixture_fn: fixture_fn.ok_or_else(|| missing("fixture_fn"))?,
            init,
        })
    }
}

/// 从一个用例函数读出的登记信息。
struct CaseSpec {
    ident: Ident,
    data: Option<Path>,
    outcome: Ident,
}

const OUTCOMES: [(&str, &str); 5] = [
    ("pass", "Pass"),
    ("fail", "Fail"),
    ("expected_fail", "ExpectedFail"),
    ("skip", "Skip"),
    ("setup_error", "SetupError"),
];

impl CaseSpec {
    /// 读取并剥离 `#[data]` / `#[outcome]`，校验参数个数与用例形态一致。
    fn take_from(function: &mut ItemFn) -> SynResult<Self> {
        let mut data = None;
        let mut outcome = None;
        let mut kept: Vec<Attribute> = Vec::new();

        for attr in function.attrs.drain(..) {
            if attr.path().is_ident("data") {
                if data.is_some() {
                    return Err(syn::Error::new(attr.span(), "`#[data]` 重复声明"));
                }
                data = Some(attr.parse_args::<Path>()?);
            } else if attr.path().is_ident("outcome") {
                if outcome.is_some() {
                    return Err(syn::Error::new(attr.span(), "`#[outcome]` 重复声明"));
                }
                outcome = Some(outcome_variant(&attr.parse_args::<Ident>()?)?);
            } else {
                kept.push(attr);
            }
        }
        function.attrs = kept;

        let arity = function.sig.inputs.len();
        let expected = if data.is_some() { 3 } else { 2 };
        if arity != expected {
            let shape = if data.is_some() {
                "数据驱动用例的签名应为 (ctx, fixture, row)"
            } else {
                "用例的签名应为 (ctx, fixture)；数据驱动用例需标注 #[data(取数函数)]"
            };
            return Err(syn::Error::new(function.sig.inputs.span(), shape));
        }

        Ok(Self {
            ident: function.sig.ident.clone(),
            data,
            outcome: outcome.unwrap_or_else(|| Ident::new("Pass", Span::call_site())),
        })
    }

    fn table_entry(&self) -> TokenStream2 {
        let ident = &self.ident;
        let name = ident.to_string();
        let kind = match &self.data {
            Some(data) => quote! {
                ::cartotest_core::CaseKind::DataDriven { data: #data, test: #ident }
            },
            None => quote! { ::cartotest_core::CaseKind::Single(#ident) },
        };
        quote! {
            ::cartotest_core::HarnessCase { name: #name, kind: #kind }
        }
    }

    fn test_fn(&self) -> TokenStream2 {
        let ident = &self.ident;
        let name = ident.to_string();
        let outcome = &self.outcome;
        quote! {
            #[test]
            fn #ident() {
                let config = ::cartotest_core::HarnessConfig::for_tests()
                    .expect("CARTOTEST_* 环境变量应当合法");
                ::cartotest_core::run_case(&super::SUITE, #name, &config)
                    .assert_all(::cartotest_core::OutcomeKind::#outcome);
            }
        }
    }
}

fn outcome_variant(value: &Ident) -> SynResult<Ident> {
    let raw = value.to_string();
    OUTCOMES
        .iter()
        .find(|(marker, _)| *marker == raw)
        .map(|(_, variant)| Ident::new(variant, value.span()))
        .ok_or_else(|| {
            let allowed: Vec<&str> = OUTCOMES.iter().map(|(marker, _)| *marker).collect();
            syn::Error::new(
                value.span(),
                format!("未知结论 `{raw}`，可选：{}", allowed.join(" / ")),
            )
        })
}

fn expand(args: SuiteArgs, mut module: ItemMod) -> SynResult<TokenStream2> {
    let span = module.ident.span();
    let Some((_, items)) = module.content.as_mut() else {
        return Err(syn::Error::new(
            span,
            "cartotest_cases 需要内联模块：用例表由模块内的函数生成",
        ));
    };

    let mut cases = Vec::new();
    for item in items.iter_mut() {
        if let Item::Fn(function) = item {
            cases.push(CaseSpec::take_from(function)?);
        }
    }
    if cases.is_empty() {
        return Err(syn::Error::new(span, "模块内没有任何用例函数"));
    }

    let SuiteArgs {
        suite,
        fixture,
        fixture_fn,
        init,
    } = args;
    let init = match init {
        Some(path) => quote! { ::core::option::Option::Some(#path) },
        None => quote! { ::core::option::Option::None },
    };
    let entries = cases.iter().map(CaseSpec::table_entry);
    let tests = cases.iter().map(CaseSpec::test_fn);

    let generated: [Item; 3] = [
        syn::parse_quote! {
            /// 按声明顺序登记的用例。
            pub const CASES: &[::cartotest_core::HarnessCase<#fixture>] = &[#(#entries),*];
        },
        syn::parse_quote! {
            /// 由用例表组成的套件。
            pub const SUITE: ::cartotest_core::HarnessSuite<#fixture> =
                ::cartotest_core::HarnessSuite {
                    name: #suite,
                    fixture: #fixture_fn,
                    init: #init,
                    cases: CASES,
                };
        },
        syn::parse_quote! {
        },
    ];
    items.extend(generated);

    Ok(quote! { #module })
}
