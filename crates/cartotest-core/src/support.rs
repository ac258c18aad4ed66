use std::any::Any;
use std::fmt::Write;
use std::panic;

/// 把 panic 载荷格式化为带“套件/用例”上下文的诊断文本。
///
/// # 教案式说明
/// - **意图 (Why)**：运行器捕获用例体中的 panic 后，需要把它降级为单个用例的失败，并在报告中指明来源。
/// - **逻辑 (How)**：尝试将 payload 解析为 `&str` / `String`，其余类型以占位文本代替。
/// - **契约 (What)**：只读取载荷，不再次抛出；调用方负责把结果记录为 `Fail`。
pub fn panic_message(suite: &str, case: &str, payload: &(dyn Any + Send)) -> String {
    let mut message = String::new();
    let _ = write!(&mut message, "[cartotest::{suite}::{case}] panicked: ");

    if let Some(text) = payload.downcast_ref::<&str>() {
        let _ = write!(&mut message, "{text}");
    } else if let Some(text) = payload.downcast_ref::<String>() {
        let _ = write!(&mut message, "{text}");
    } else {
        let _ = write!(&mut message, "<non-string panic payload>");
    }
    message
}

/// 在捕获 panic 的前提下执行闭包。
pub fn catch<R>(suite: &str, case: &str, body: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(panic::AssertUnwindSafe(body))
        .map_err(|payload| panic_message(suite, case, payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_str_payloads_are_preserved() {
        let err =
            catch::<()>("map", "boom", || panic!("layer {} missing", 3)).expect_err("应捕获 panic");
        assert_eq!(err, "[cartotest::map::boom] panicked: layer 3 missing");

        let err = catch::<()>("map", "static", || panic!("static text")).expect_err("应捕获 panic");
        assert!(err.ends_with("static text"));
    }

    #[test]
    fn non_string_payloads_use_placeholder() {
        let err = catch::<()>("map", "odd", || std::panic::panic_any(42_u8))
            .expect_err("应捕获 panic");
        assert!(err.ends_with("<non-string panic payload>"));
    }
}
