// 模拟渲染器：记录每一帧的投递时刻

use crate::stats::IntervalSummary;
use common::{StreamId, VideoFrame};
use parking_lot::Mutex;
use render_stream::RenderCallback;
use std::time::Instant;
use tracing::trace;

#[derive(Debug, Default)]
struct RendererState {
    delivered_at: Vec<Instant>,
    last_timestamp: Option<u32>,
    /// 时间戳回退的帧数
    out_of_order: u64,
}

/// 记录投递间隔的渲染回调
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    state: Mutex<RendererState>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> usize {
        self.state.lock().delivered_at.len()
    }

    pub fn out_of_order(&self) -> u64 {
        self.state.lock().out_of_order
    }

    pub fn summary(&self) -> IntervalSummary {
        IntervalSummary::from_instants(&self.state.lock().delivered_at)
    }
}

impl RenderCallback for RecordingRenderer {
    fn render_frame(&self, stream_id: StreamId, frame: &VideoFrame) {
        let mut state = self.state.lock();
        if let Some(last) = state.last_timestamp {
            if frame.timestamp <= last {
                state.out_of_order += 1;
            }
        }
        state.last_timestamp = Some(frame.timestamp);
        state.delivered_at.push(Instant::now());

        trace!("Rendered frame {} on stream {}", frame.timestamp, stream_id);
    }
}
