// 渲染回调分发
//
// 同步直通路径和投递线程都经过这里把帧交给渲染回调。
// 分发锁同时保护回调槽位和投递线程的生命周期标记，保证回调调用彼此串行。

use common::{StreamId, VideoFrame};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// 渲染回调
///
/// 可能在生产者线程或投递线程上被调用，但不会被并发调用。
/// 实现应当快速返回，不能在回调中调用所属流的任何方法。
pub trait RenderCallback: Send + Sync {
    fn render_frame(&self, stream_id: StreamId, frame: &VideoFrame);
}

impl<F> RenderCallback for F
where
    F: Fn(StreamId, &VideoFrame) + Send + Sync,
{
    fn render_frame(&self, stream_id: StreamId, frame: &VideoFrame) {
        self(stream_id, frame)
    }
}

/// 回调槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackSlot {
    /// 外部覆盖回调，设置后优先使用
    External,
    /// 默认渲染回调
    Render,
}

impl CallbackSlot {
    /// 分发时按此顺序取第一个已设置的槽位
    pub const PRIORITY: [CallbackSlot; 2] = [CallbackSlot::External, CallbackSlot::Render];

    fn index(self) -> usize {
        match self {
            CallbackSlot::External => 0,
            CallbackSlot::Render => 1,
        }
    }
}

/// 按优先级排列的回调槽位
#[derive(Default)]
pub struct CallbackSlots {
    slots: [Option<Arc<dyn RenderCallback>>; 2],
}

impl CallbackSlots {
    /// 替换槽位，返回旧回调
    pub fn set(
        &mut self,
        slot: CallbackSlot,
        callback: Option<Arc<dyn RenderCallback>>,
    ) -> Option<Arc<dyn RenderCallback>> {
        std::mem::replace(&mut self.slots[slot.index()], callback)
    }

    pub fn is_set(&self, slot: CallbackSlot) -> bool {
        self.slots[slot.index()].is_some()
    }

    /// 第一个已设置的槽位
    pub fn resolve(&self) -> Option<(CallbackSlot, &Arc<dyn RenderCallback>)> {
        CallbackSlot::PRIORITY
            .iter()
            .find_map(|&slot| self.slots[slot.index()].as_ref().map(|cb| (slot, cb)))
    }
}

impl fmt::Debug for CallbackSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlots")
            .field("external", &self.is_set(CallbackSlot::External))
            .field("render", &self.is_set(CallbackSlot::Render))
            .finish()
    }
}

/// 投递线程生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// 投递线程运行中
    Running,
    /// 已请求停止，投递线程下次唤醒时退出
    StopRequested,
    /// 没有投递线程
    Stopped,
}

/// 分发锁保护的状态
#[derive(Debug)]
pub struct DispatchState {
    pub lifecycle: DeliveryState,
    pub callbacks: CallbackSlots,
    /// 已交给回调的帧数
    pub frames_delivered: u64,
}

impl DispatchState {
    /// 把帧交给当前生效的回调
    ///
    /// 空帧或没有设置回调时不做任何事，返回 false。
    pub fn deliver(&mut self, stream_id: StreamId, frame: &VideoFrame) -> bool {
        if frame.is_zero_size() {
            return false;
        }

        match self.callbacks.resolve() {
            Some((slot, callback)) => {
                trace!(
                    "Delivering frame {} on stream {} via {:?} callback",
                    frame.timestamp,
                    stream_id,
                    slot
                );
                callback.render_frame(stream_id, frame);
                self.frames_delivered += 1;
                true
            }
            None => false,
        }
    }
}

/// 回调分发器
#[derive(Debug)]
pub struct CallbackDispatch {
    state: Mutex<DispatchState>,
}

impl CallbackDispatch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DispatchState {
                lifecycle: DeliveryState::Stopped,
                callbacks: CallbackSlots::default(),
                frames_delivered: 0,
            }),
        }
    }

    /// 获取分发锁
    ///
    /// 锁顺序：流状态锁 → 分发锁 → 缓冲区锁。
    pub fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock()
    }

    pub fn set_callback(&self, slot: CallbackSlot, callback: Option<Arc<dyn RenderCallback>>) {
        self.lock().callbacks.set(slot, callback);
    }
}

impl Default for CallbackDispatch {
    fn default() -> Self {
        Self::new()
    }
}
