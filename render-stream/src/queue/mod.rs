// 渲染缓冲队列
//
// 投递线程只通过 `FrameQueue` 访问缓冲区：哪一帧该渲染、
// 下一帧还要等多久，都由队列自己的策略决定。

pub mod render_frames;

pub use render_frames::RenderFrames;

use crate::error::Result;
use common::VideoFrame;

/// 平滑缓冲队列
///
/// 所有方法都在流的缓冲区锁内调用，实现不需要自己加锁。
pub trait FrameQueue: Send {
    /// 加入一帧，返回加入后的队列长度
    fn add_frame(&mut self, frame: VideoFrame) -> Result<usize>;

    /// 取出当前应渲染的帧，没有到期的帧时返回空帧
    fn frame_to_render(&mut self) -> VideoFrame;

    /// 距离下一帧释放还需等待的毫秒数
    fn time_to_next_release(&self) -> u64;

    /// 设置目标渲染延迟
    fn set_render_delay(&mut self, delay_ms: u32) -> Result<()>;

    /// 丢弃所有缓冲帧
    fn release_all_frames(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
