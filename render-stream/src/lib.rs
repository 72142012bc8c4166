// 渲染流 - 输入视频流平滑投递
//
// 本模块在视频帧的生产者（解码器/网络层）和消费者（渲染器）之间
// 插入可选的平滑缓冲区和专用投递线程，按释放时间把帧交给渲染回调，
// 用来抵消帧到达时间的抖动，同时限制内存和延迟。
//
// # 核心组件
//
// - `RateCalculator`: 固定窗口输入帧率统计
// - `FrameQueue`: 平滑缓冲队列接口，默认实现为 `RenderFrames`
// - `CallbackDispatch`: 按优先级解析并串行调用渲染回调
// - `DeliveryThread`: 定时/事件唤醒的投递线程
// - `IncomingVideoStream`: 对外的生命周期对象
//
// # 设计目标
//
// 1. **平滑**: 投递节奏由缓冲区释放时间决定，而不是到达时间
// 2. **安全停止**: `stop` 返回后不会再有回调被调用
// 3. **无死锁**: 流状态锁 → 分发锁 → 缓冲区锁，严格按序获取

pub mod callback;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod priority;
pub mod queue;
pub mod rate;
pub mod stream;

#[cfg(test)]
mod test_util;

// 重新导出核心类型
pub use callback::{CallbackDispatch, CallbackSlot, DeliveryState, RenderCallback};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DeliveryConfig, StreamConfig};
pub use error::{RenderStreamError, Result};
pub use event::{WaitResult, WakeEvent};
pub use priority::{set_current_thread_priority, ThreadPriority};
pub use queue::{FrameQueue, RenderFrames};
pub use rate::RateCalculator;
pub use stream::{IncomingVideoStream, StreamStats};

pub use common::{StreamId, VideoFrame};
