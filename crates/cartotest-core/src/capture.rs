//! 信号捕获：把通知通道最近一次发射的值记录到测试自有的变量中。
//!
//! # 教案式说明
//! - **意图 (Why)**：对捕获值而不是对象的实时属性做轮询，可以证明“通知通道本身确实触发”，
//!   而不仅仅是“最终状态恰好正确”。
//! - **逻辑 (How)**：挂接时连接一个槽位，把值写入共享状态；[`SignalCapture`] 持有 [`Connection`]，
//!   因此无论测试以何种路径退出，捕获器析构即退订。
//! - **契约 (What)**：`latest` 在尚无发射时返回挂接时给出的初始值；`history` 按发射顺序保存全部值。
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::signal::{Connection, Signal};

struct CaptureState<T> {
    latest: T,
    history: Vec<T>,
}

/// 绑定在某个信号上的捕获器。
pub struct SignalCapture<T> {
    state: Arc<Mutex<CaptureState<T>>>,
    connection: Connection,
}

impl<T> SignalCapture<T>
where
    T: Clone + Send + 'static,
{
    /// 在 `signal` 上挂接捕获器，`initial` 为尚未发射时的占位值。
    pub fn attach(signal: &Signal<T>, initial: T) -> Self {
        let state = Arc::new(Mutex::new(CaptureState {
            latest: initial,
            history: Vec::new(),
        }));
        let sink = Arc::clone(&state);
        let connection = signal.connect(move |value: &T| {
            let mut state = sink.lock();
            state.latest = value.clone();
            state.history.push(value.clone());
        });
        Self { state, connection }
    }

    /// 最近一次发射的值。
    pub fn latest(&self) -> T {
        self.state.lock().latest.clone()
    }

    /// 已观察到的发射次数。
    pub fn emissions(&self) -> usize {
        self.state.lock().history.len()
    }

    /// 全部发射值的副本。
    pub fn history(&self) -> Vec<T> {
        self.state.lock().history.clone()
    }

    /// 是否仍处于连接状态。
    pub fn is_attached(&self) -> bool {
        self.connection.is_connected()
    }

    /// 提前退订，返回最终记录的值。
    pub fn detach(self) -> T {
        let Self { state, connection } = self;
        let _ = connection.disconnect();
        state.lock().latest.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for SignalCapture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SignalCapture")
            .field("latest", &state.latest)
            .field("emissions", &state.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_latest_and_history() {
        let signal = Signal::<u8>::new();
        let capture = SignalCapture::attach(&signal, 0);
        assert_eq!(capture.latest(), 0);

        signal.emit(&3);
        signal.emit(&5);
        assert_eq!(capture.latest(), 5);
        assert_eq!(capture.history(), vec![3, 5]);
        assert_eq!(capture.emissions(), 2);
    }

    #[test]
    fn dropping_capture_leaves_no_receiver() {
        let signal = Signal::<u8>::new();
        {
            let _capture = SignalCapture::attach(&signal, 0);
            assert_eq!(signal.receiver_count(), 1);
        }
        assert_eq!(signal.receiver_count(), 0);
    }

    #[test]
    fn detach_returns_final_value() {
        let signal = Signal::<u8>::new();
        let capture = SignalCapture::attach(&signal, 1);
        signal.emit(&9);
        assert_eq!(capture.detach(), 9);
        assert_eq!(signal.receiver_count(), 0);
    }
}
