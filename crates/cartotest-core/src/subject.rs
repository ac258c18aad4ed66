//! 被测对象的能力接口。
//!
//! # 教案式说明
//! - **意图 (Why)**：被测对象由外部运行时拥有，具体类型层级既不可控也不稳定；装置只依赖它们的可观察面：
//!   一个加载操作、一个可轮询的状态属性、一条变更通知通道；
//! - **逻辑 (How)**：每类外部对象由一个“薄适配器”实现下面的 trait，装置与场景代码只面向 trait 编程；
//! - **契约 (What)**：
//!   - `load()` 可重复调用，除发起加载外不提供任何同步完成信息；
//!   - 状态变更通知必须在宿主事件循环上发出，且发出时实时属性已经更新为新值。
use crate::signal::Signal;
use crate::status::{DrawStatus, LoadStatus};

/// 可异步加载的对象。
pub trait Loadable {
    /// 发起（或重复发起）异步加载。
    fn load(&self);

    /// 当前加载状态。
    fn load_status(&self) -> LoadStatus;

    /// 加载状态变更通知。
    fn load_status_changed(&self) -> &Signal<LoadStatus>;
}

/// 具有渲染流程的对象。
pub trait Drawable {
    /// 当前渲染状态。
    fn draw_status(&self) -> DrawStatus;

    /// 渲染状态变更通知。
    fn draw_status_changed(&self) -> &Signal<DrawStatus>;
}

impl<T: Loadable + ?Sized> Loadable for std::sync::Arc<T> {
    fn load(&self) {
        (**self).load();
    }

    fn load_status(&self) -> LoadStatus {
        (**self).load_status()
    }

    fn load_status_changed(&self) -> &Signal<LoadStatus> {
        (**self).load_status_changed()
    }
}

impl<T: Drawable + ?Sized> Drawable for std::sync::Arc<T> {
    fn draw_status(&self) -> DrawStatus {
        (**self).draw_status()
    }

    fn draw_status_changed(&self) -> &Signal<DrawStatus> {
        (**self).draw_status_changed()
    }
}
