// 模拟帧生产者
//
// 按标称帧率生成帧，每帧的到达时间叠加随机抖动。
// 渲染时间 = 标称采集时间 + 抖动上限 + 渲染延迟，平滑缓冲区据此吸收到达抖动。

use crate::stats::IntervalSummary;
use bytes::Bytes;
use common::{monotonic_ms, VideoFrame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use render_stream::IncomingVideoStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// 生产者参数
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub fps: u32,
    pub jitter_ms: u64,
    pub duration: Duration,
    pub render_delay_ms: u32,
    pub width: u32,
    pub height: u32,
}

impl ProducerSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.fps.max(1) as u64)
    }

    pub fn total_frames(&self) -> u64 {
        (self.duration.as_millis() as u64 * self.fps as u64) / 1000
    }

    /// 90kHz RTP时间戳
    pub fn rtp_timestamp(&self, index: u64) -> u32 {
        (index * 90_000 / self.fps.max(1) as u64) as u32
    }

    /// 帧的目标渲染时间
    pub fn render_time_ms(&self, capture_time_ms: i64) -> i64 {
        capture_time_ms + self.jitter_ms as i64 + self.render_delay_ms as i64
    }
}

/// 生产结果
#[derive(Debug, Clone)]
pub struct ProducerReport {
    pub frames_sent: u64,
    /// `submit` 返回错误的帧数（流未运行或投递线程失败）
    pub frames_refused: u64,
    pub arrivals: IntervalSummary,
}

/// 运行生产者直到达到设定时长
pub async fn run(stream: Arc<IncomingVideoStream>, settings: ProducerSettings) -> ProducerReport {
    let mut rng = StdRng::from_entropy();
    let interval = settings.frame_interval();
    let total_frames = settings.total_frames();
    let payload = Bytes::from(vec![0u8; 1024]);

    info!(
        "Producing {} frames at {} fps with up to {}ms jitter",
        total_frames, settings.fps, settings.jitter_ms
    );

    let start = Instant::now();
    let start_ms = monotonic_ms();
    let mut arrivals = Vec::with_capacity(total_frames as usize);
    let mut frames_refused = 0;

    for index in 0..total_frames {
        let nominal_offset = interval * index as u32;
        let jitter = if settings.jitter_ms > 0 {
            Duration::from_millis(rng.gen_range(0..=settings.jitter_ms))
        } else {
            Duration::ZERO
        };
        sleep_until(start + nominal_offset + jitter).await;

        let capture_time_ms = start_ms + nominal_offset.as_millis() as i64;
        let frame = VideoFrame::new(
            settings.width,
            settings.height,
            settings.rtp_timestamp(index),
            settings.render_time_ms(capture_time_ms),
            payload.clone(),
        );

        arrivals.push(std::time::Instant::now());
        if let Err(e) = stream.submit(frame) {
            debug!("Frame {} refused: {}", index, e);
            frames_refused += 1;
        }
    }

    ProducerReport {
        frames_sent: total_frames,
        frames_refused,
        arrivals: IntervalSummary::from_instants(&arrivals),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_stream::{RenderCallback, StreamId};

    fn settings(fps: u32, duration_ms: u64) -> ProducerSettings {
        ProducerSettings {
            fps,
            jitter_ms: 0,
            duration: Duration::from_millis(duration_ms),
            render_delay_ms: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn test_frame_schedule() {
        let settings = settings(25, 2_000);
        assert_eq!(settings.frame_interval(), Duration::from_millis(40));
        assert_eq!(settings.total_frames(), 50);
        assert_eq!(settings.rtp_timestamp(2), 7_200);

        let mut jittery = settings.clone();
        jittery.jitter_ms = 15;
        assert_eq!(jittery.render_time_ms(1_000), 1_025);
    }

    #[tokio::test]
    async fn test_run_submits_every_frame() {
        let stream = Arc::new(IncomingVideoStream::new(StreamId::new(1), true));
        let counter = Arc::new(parking_lot::Mutex::new(0u32));
        let seen = counter.clone();
        let callback: Arc<dyn RenderCallback> =
            Arc::new(move |_id: StreamId, _frame: &VideoFrame| *seen.lock() += 1);
        stream.set_render_callback(Some(callback));
        stream.start().unwrap();

        let report = run(stream.clone(), settings(100, 200)).await;
        assert_eq!(report.frames_sent, 20);
        assert_eq!(report.frames_refused, 0);
        assert_eq!(*counter.lock(), 20);
        stream.stop().unwrap();
    }

    #[tokio::test]
    async fn test_run_counts_frames_refused_when_stopped() {
        let stream = Arc::new(IncomingVideoStream::new(StreamId::new(1), true));
        let report = run(stream, settings(100, 50)).await;
        assert_eq!(report.frames_sent, 5);
        assert_eq!(report.frames_refused, 5);
    }
}
