use crate::callback::RenderCallback;
use crate::error::Result;
use crate::queue::FrameQueue;
use bytes::Bytes;
use common::{StreamId, VideoFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

/// 每次唤醒释放队首一帧的先进先出队列
#[derive(Default)]
pub struct FifoQueue {
    frames: VecDeque<VideoFrame>,
    pub render_delay_ms: u32,
}

impl FrameQueue for FifoQueue {
    fn add_frame(&mut self, frame: VideoFrame) -> Result<usize> {
        self.frames.push_back(frame);
        Ok(self.frames.len())
    }

    fn frame_to_render(&mut self) -> VideoFrame {
        self.frames.pop_front().unwrap_or_default()
    }

    fn time_to_next_release(&self) -> u64 {
        if self.frames.is_empty() {
            u64::MAX
        } else {
            0
        }
    }

    fn set_render_delay(&mut self, delay_ms: u32) -> Result<()> {
        self.render_delay_ms = delay_ms;
        Ok(())
    }

    fn release_all_frames(&mut self) {
        self.frames.clear();
    }

    fn len(&self) -> usize {
        self.frames.len()
    }
}

/// 记录收到的帧
#[derive(Default)]
pub struct RecordingCallback {
    frames: Mutex<Vec<(StreamId, u32, thread::ThreadId)>>,
}

impl RecordingCallback {
    pub fn timestamps(&self) -> Vec<u32> {
        self.frames.lock().iter().map(|(_, ts, _)| *ts).collect()
    }

    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.frames.lock().iter().map(|(id, _, _)| *id).collect()
    }

    pub fn threads(&self) -> Vec<thread::ThreadId> {
        self.frames.lock().iter().map(|(_, _, t)| *t).collect()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl RenderCallback for RecordingCallback {
    fn render_frame(&self, stream_id: StreamId, frame: &VideoFrame) {
        self.frames
            .lock()
            .push((stream_id, frame.timestamp, thread::current().id()));
    }
}

pub fn test_frame(timestamp: u32, render_time_ms: i64) -> VideoFrame {
    VideoFrame::new(
        640,
        480,
        timestamp,
        render_time_ms,
        Bytes::from(vec![0u8; 64]),
    )
}

/// 轮询直到条件成立或超时
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
