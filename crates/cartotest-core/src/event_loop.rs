//! 单线程协作式事件循环。
//!
//! # 教案式说明
//! - **意图 (Why)**：被测对象的异步完成（加载、渲染、识别）总是以回调形式排队到测试线程上执行，
//!   测试在等待时必须持续“泵”循环，否则它等待的完成事件永远不会被投递。
//! - **逻辑 (How)**：所有任务进入一个按 `(到期时间, 投递序号)` 排序的小顶堆；[`EventLoop::process_events`]
//!   一次性取出全部到期任务后再逐个执行，执行期间新投递的任务留待下一轮。
//! - **契约 (What)**：
//!   - [`LoopHandle`] 可跨线程克隆与投递，投递会唤醒空闲中的循环；
//!   - 循环被丢弃后，句柄投递静默失效，排队中的任务随循环一起析构而不会被执行；
//!   - 同一到期时间的任务严格按投递顺序执行。
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::{Clock, Parker};

/// 循环上执行的回调。
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Scheduled {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // `BinaryHeap` 是大顶堆，这里反转比较以取出最早到期的任务。
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct LoopQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

struct LoopShared {
    clock: Arc<dyn Clock>,
    parker: Parker,
    queue: Mutex<LoopQueue>,
}

impl LoopShared {
    fn schedule(&self, delay: Duration, task: Task) {
        let due = self.clock.now() + delay;
        {
            let mut queue = self.queue.lock();
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.heap.push(Scheduled { due, seq, task });
        }
        self.parker.unpark();
    }
}

/// 测试线程独占的事件循环。
pub struct EventLoop {
    shared: Arc<LoopShared>,
}

impl EventLoop {
    /// 基于给定时钟创建空循环。
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(LoopShared {
                clock,
                parker: Parker::new(),
                queue: Mutex::new(LoopQueue::default()),
            }),
        }
    }

    /// 返回可跨线程投递任务的句柄。
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// 循环使用的时钟。
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    /// 当前时间点。
    pub fn now(&self) -> Instant {
        self.shared.clock.now()
    }

    /// 排队中（含未到期）的任务数量。
    pub fn pending_tasks(&self) -> usize {
        self.shared.queue.lock().heap.len()
    }

    /// 执行所有已到期的任务，返回执行数量。
    ///
    /// # 契约 (What)
    /// - 先在锁内收集到期任务，再在锁外执行，任务内部可以安全地继续投递；
    /// - 本轮执行期间新投递的任务（即使已到期）留待下一次调用。
    pub fn process_events(&self) -> usize {
        let now = self.shared.clock.now();
        let ready: Vec<Task> = {
            let mut queue = self.shared.queue.lock();
            let mut ready = Vec::new();
            while queue.heap.peek().is_some_and(|top| top.due <= now) {
                if let Some(entry) = queue.heap.pop() {
                    ready.push(entry.task);
                }
            }
            ready
        };
        let count = ready.len();
        for task in ready {
            task();
        }
        count
    }

    /// 空闲至多 `max`，在新任务投递或下一个定时任务到期时提前返回。
    pub fn idle(&self, max: Duration) {
        let now = self.shared.clock.now();
        let next_due = self.shared.queue.lock().heap.peek().map(|top| top.due);
        let wait = match next_due {
            Some(due) => due.saturating_duration_since(now).min(max),
            None => max,
        };
        if wait.is_zero() {
            return;
        }
        self.shared.clock.idle(&self.shared.parker, wait);
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending_tasks", &self.pending_tasks())
            .finish()
    }
}

/// 事件循环的弱句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：被测对象需要把完成回调“编组”回测试线程，但不应延长循环的生命周期；
/// - **契约 (What)**：循环存活时投递成功并返回 `true`；循环已销毁时静默丢弃任务并返回 `false`。
#[derive(Clone)]
pub struct LoopHandle {
    shared: Weak<LoopShared>,
}

impl LoopHandle {
    /// 投递一个尽快执行的任务。
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_after(Duration::ZERO, task)
    }

    /// 投递一个在 `delay` 之后执行的任务。
    pub fn post_after<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.schedule(delay, Box::new(task));
                true
            }
            None => false,
        }
    }

    /// 循环是否仍然存活。
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
