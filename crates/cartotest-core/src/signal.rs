//! 变更通知：订阅/退订注册表。
//!
//! # 教案式说明
//! - **意图 (Why)**：被测对象在状态迁移时发出通知，测试需要在调用异步操作之前挂上观察者；
//!   观察者的生命周期必须与测试作用域绑定，测试结束（包括提前失败返回）后不能残留悬挂回调。
//! - **逻辑 (How)**：[`Signal`] 内部以 `id -> slot` 列表保存回调；[`Connection`] 以弱引用记住信号与槽位 id，
//!   在析构时退订。发射时先在锁内快照槽位列表，再在锁外逐个调用。
//! - **契约 (What)**：
//!   - 槽位可以在发射过程中连接或断开其他槽位，不会死锁；
//!   - 在一次发射开始后才断开的槽位，仍可能收到该次发射；
//!   - 信号先于连接销毁时，连接的析构是无操作。
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Slot<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct SignalInner<T> {
    slots: Mutex<Vec<(u64, Slot<T>)>>,
    next_id: AtomicU64,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
    fn contains(&self, id: u64) -> bool;
}

impl<T: 'static> Detach for SignalInner<T> {
    fn detach(&self, id: u64) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id);
        slots.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.slots.lock().iter().any(|(slot_id, _)| *slot_id == id)
    }
}

/// 类型化的变更通知通道。
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// 创建无订阅者的信号。
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                slots: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// 连接一个槽位，返回的 [`Connection`] 析构即退订。
    pub fn connect<F>(&self, slot: F) -> Connection
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.slots.lock().push((id, Arc::new(slot)));
        let inner: Arc<dyn Detach> = self.inner.clone();
        Connection {
            signal: Some(Arc::downgrade(&inner)),
            id,
        }
    }

    /// 向所有当前订阅者发射 `value`。
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Slot<T>> = self
            .inner
            .slots
            .lock()
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        for slot in snapshot {
            slot(value);
        }
    }

    /// 当前订阅者数量。
    pub fn receiver_count(&self) -> usize {
        self.inner.slots.lock().len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("receivers", &self.inner.slots.lock().len())
            .finish()
    }
}

/// 一次订阅的 RAII 凭证。
#[must_use = "dropping a Connection immediately disconnects the slot"]
pub struct Connection {
    signal: Option<Weak<dyn Detach>>,
    id: u64,
}

impl Connection {
    /// 显式断开，返回槽位此前是否仍处于连接状态。
    pub fn disconnect(mut self) -> bool {
        self.release()
    }

    /// 槽位是否仍挂在存活的信号上。
    pub fn is_connected(&self) -> bool {
        self.signal
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|signal| signal.contains(self.id))
    }

    fn release(&mut self) -> bool {
        match self.signal.take().and_then(|weak| weak.upgrade()) {
            Some(signal) => signal.detach(self.id),
            None => false,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dropping_connection_unsubscribes() {
        let signal = Signal::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let connection = signal.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(&1);
        assert!(connection.is_connected());
        drop(connection);
        signal.emit(&2);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(signal.receiver_count(), 0);
    }

    #[test]
    fn connection_outliving_signal_is_harmless() {
        let signal = Signal::<u32>::new();
        let connection = signal.connect(|_| {});
        drop(signal);
        assert!(!connection.is_connected());
        assert!(!connection.disconnect());
    }

    #[test]
    fn slot_may_disconnect_others_during_emit() {
        let signal = Arc::new(Signal::<u32>::new());
        let victim: Arc<Mutex<Option<Connection>>> = Arc::new(Mutex::new(None));

        let victim_slot = Arc::clone(&victim);
        let _killer = signal.connect(move |_| {
            victim_slot.lock().take();
        });
        *victim.lock() = Some(signal.connect(|_| {}));

        signal.emit(&7);
        assert_eq!(signal.receiver_count(), 1);
    }
}
