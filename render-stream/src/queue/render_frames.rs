// 默认渲染缓冲区实现
//
// 按到达顺序缓存帧，帧的释放时间为 `render_time_ms - render_delay_ms`。

use super::FrameQueue;
use crate::clock::{Clock, SystemClock};
use crate::error::{RenderStreamError, Result};
use common::VideoFrame;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// 渲染时间早于当前时间超过该值的帧直接丢弃
pub const OLD_RENDER_TIMESTAMP_MS: i64 = 500;
/// 渲染时间晚于当前时间超过该值的帧直接丢弃
pub const FUTURE_RENDER_TIMESTAMP_MS: i64 = 10_000;
/// 队列为空时建议的等待时间
pub const EMPTY_QUEUE_WAIT_MS: u64 = 200;
pub const MIN_RENDER_DELAY_MS: u32 = 10;
pub const MAX_RENDER_DELAY_MS: u32 = 500;
pub const DEFAULT_RENDER_DELAY_MS: u32 = 10;

/// 渲染缓冲区
///
/// 取帧时会一次性弹出所有已到期的帧，只返回其中最新的一帧，
/// 较旧的到期帧视为已过时被丢弃。
pub struct RenderFrames {
    /// 缓存的帧（按到达顺序）
    incoming_frames: VecDeque<VideoFrame>,
    /// 目标渲染延迟
    render_delay_ms: u32,
    clock: Arc<dyn Clock>,
}

impl RenderFrames {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            incoming_frames: VecDeque::new(),
            render_delay_ms: DEFAULT_RENDER_DELAY_MS,
            clock,
        }
    }

    pub fn render_delay_ms(&self) -> u32 {
        self.render_delay_ms
    }

    /// 检查渲染延迟是否在允许范围内
    pub fn validate_render_delay(delay_ms: u32) -> Result<()> {
        if !(MIN_RENDER_DELAY_MS..=MAX_RENDER_DELAY_MS).contains(&delay_ms) {
            return Err(RenderStreamError::InvalidRenderDelay {
                delay_ms,
                min_ms: MIN_RENDER_DELAY_MS,
                max_ms: MAX_RENDER_DELAY_MS,
            });
        }
        Ok(())
    }

    fn release_time_ms(&self, frame: &VideoFrame) -> i64 {
        frame.render_time_ms.saturating_sub(self.render_delay_ms as i64)
    }
}

impl Default for RenderFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameQueue for RenderFrames {
    fn add_frame(&mut self, frame: VideoFrame) -> Result<usize> {
        let now_ms = self.clock.now_ms();

        if frame.render_time_ms > now_ms.saturating_add(FUTURE_RENDER_TIMESTAMP_MS) {
            warn!(
                "Dropping frame {}: render time {}ms is too far in the future (now {}ms)",
                frame.timestamp, frame.render_time_ms, now_ms
            );
            return Err(RenderStreamError::FrameRejected(format!(
                "render time {}ms is more than {}ms ahead",
                frame.render_time_ms, FUTURE_RENDER_TIMESTAMP_MS
            )));
        }

        if frame.render_time_ms.saturating_add(OLD_RENDER_TIMESTAMP_MS) < now_ms {
            warn!(
                "Dropping frame {}: render time {}ms is too old (now {}ms)",
                frame.timestamp, frame.render_time_ms, now_ms
            );
            return Err(RenderStreamError::FrameRejected(format!(
                "render time {}ms is older than {}ms",
                frame.render_time_ms, OLD_RENDER_TIMESTAMP_MS
            )));
        }

        self.incoming_frames.push_back(frame);
        Ok(self.incoming_frames.len())
    }

    fn frame_to_render(&mut self) -> VideoFrame {
        let now_ms = self.clock.now_ms();
        let mut render_frame = VideoFrame::empty();
        let mut superseded = 0usize;

        while let Some(front) = self.incoming_frames.front() {
            if self.release_time_ms(front) > now_ms {
                break;
            }
            if !render_frame.is_zero_size() {
                superseded += 1;
            }
            if let Some(frame) = self.incoming_frames.pop_front() {
                render_frame = frame;
            }
        }

        if superseded > 0 {
            debug!("Skipped {} late frames, rendering the newest due frame", superseded);
        }

        render_frame
    }

    fn time_to_next_release(&self) -> u64 {
        match self.incoming_frames.front() {
            None => EMPTY_QUEUE_WAIT_MS,
            Some(front) => {
                let time_to_release = self.release_time_ms(front).saturating_sub(self.clock.now_ms());
                time_to_release.max(0) as u64
            }
        }
    }

    fn set_render_delay(&mut self, delay_ms: u32) -> Result<()> {
        if let Err(e) = Self::validate_render_delay(delay_ms) {
            warn!("Rejecting render delay {}ms", delay_ms);
            return Err(e);
        }

        debug!("Render delay: {}ms -> {}ms", self.render_delay_ms, delay_ms);
        self.render_delay_ms = delay_ms;
        Ok(())
    }

    fn release_all_frames(&mut self) {
        self.incoming_frames.clear();
    }

    fn len(&self) -> usize {
        self.incoming_frames.len()
    }
}
