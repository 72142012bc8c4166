// 渲染流 - IncomingVideoStream实现
//
// 生产者（解码器/网络层）通过 `submit` 送入帧，渲染回调在投递线程或调用线程上收到帧。
//
// # 锁顺序
//
// 流状态锁（外层）→ 分发锁（中层）→ 缓冲区锁（内层）。
// 任何路径都不会在持有内层锁时请求外层锁。

use crate::callback::{CallbackSlot, DeliveryState, RenderCallback};
use crate::clock::{Clock, SystemClock};
use crate::config::StreamConfig;
use crate::delivery::{spawn_os_thread, DeliveryThread, StreamShared, ThreadSpawner};
use crate::error::{RenderStreamError, Result};
use crate::queue::{FrameQueue, RenderFrames};
use crate::rate::RateCalculator;
use common::{StreamId, VideoFrame};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// 流状态锁保护的状态
struct StreamState {
    running: bool,
    rate: RateCalculator,
    /// 投递线程句柄，仅在运行且启用平滑时存在
    delivery_thread: Option<DeliveryThread>,
    frames_submitted: u64,
    frames_dropped: u64,
    frames_rejected: u64,
}

/// 流统计
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub stream_id: StreamId,
    pub running: bool,
    pub smoothing_enabled: bool,
    /// 输入帧率（帧/秒）
    pub incoming_rate: u32,
    /// 运行期间收到的帧数
    pub frames_submitted: u64,
    /// 未运行或投递线程失败时被丢弃的帧数
    pub frames_dropped: u64,
    /// 被缓冲区拒绝的帧数（过旧或过远的渲染时间）
    pub frames_rejected: u64,
    /// 已交给渲染回调的帧数
    pub frames_delivered: u64,
    /// 当前缓冲的帧数
    pub queued_frames: usize,
    /// 投递线程是否因回调 panic 退出
    pub delivery_failed: bool,
}

/// 输入视频流
///
/// 在帧的生产者和渲染者之间插入可选的平滑缓冲区和专用投递线程，
/// 按缓冲区给出的释放时间投递帧，以抵消到达时间的抖动。
///
/// # 特性
///
/// - **平滑投递**: 帧先进入缓冲区，由投递线程按释放时间交给渲染回调
/// - **直通投递**: 关闭平滑时在 `submit` 调用线程上同步投递
/// - **帧率统计**: 按固定窗口统计输入帧率
/// - **安全停止**: `stop` 返回后不会再有任何回调被调用
///
/// # 示例
///
/// ```rust,ignore
/// let stream = IncomingVideoStream::new(StreamId::new(1), false);
/// stream.set_render_callback(Some(Arc::new(|id: StreamId, frame: &VideoFrame| {
///     println!("render {} on stream {}", frame.timestamp, id);
/// })));
/// stream.start()?;
/// stream.submit(frame)?;
/// stream.stop()?;
/// ```
pub struct IncomingVideoStream {
    stream_id: StreamId,
    config: StreamConfig,
    /// 流状态锁（外层）
    state: Mutex<StreamState>,
    shared: Arc<StreamShared>,
    clock: Arc<dyn Clock>,
    spawner: ThreadSpawner,
}

impl IncomingVideoStream {
    /// 使用默认配置创建流
    ///
    /// # 参数
    ///
    /// - `stream_id`: 流ID
    /// - `disable_prerenderer_smoothing`: 为 true 时不创建缓冲区线程，帧在 `submit` 中同步投递
    pub fn new(stream_id: StreamId, disable_prerenderer_smoothing: bool) -> Self {
        let config = StreamConfig {
            disable_prerenderer_smoothing,
            ..StreamConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let queue = Box::new(RenderFrames::with_clock(clock.clone()));
        Self::build(stream_id, config, queue, clock)
    }

    /// 使用指定配置创建流
    pub fn with_config(stream_id: StreamId, config: StreamConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let queue = Box::new(RenderFrames::with_clock(clock.clone()));
        Self::with_parts(stream_id, config, queue, clock)
    }

    /// 使用自定义缓冲队列和时钟创建流
    ///
    /// 配置中的初始渲染延迟会先应用到队列上。
    pub fn with_parts(
        stream_id: StreamId,
        config: StreamConfig,
        mut queue: Box<dyn FrameQueue>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        queue.set_render_delay(config.render_delay_ms)?;
        Ok(Self::build(stream_id, config, queue, clock))
    }

    fn build(
        stream_id: StreamId,
        config: StreamConfig,
        queue: Box<dyn FrameQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        debug!(
            "Creating IncomingVideoStream {}: smoothing={}",
            stream_id, !config.disable_prerenderer_smoothing
        );

        let shared = Arc::new(StreamShared::new(stream_id, queue, config.delivery.max_wait()));
        Self {
            stream_id,
            state: Mutex::new(StreamState {
                running: false,
                rate: RateCalculator::new(config.rate_window_ms),
                delivery_thread: None,
                frames_submitted: 0,
                frames_dropped: 0,
                frames_rejected: 0,
            }),
            shared,
            clock,
            spawner: spawn_os_thread,
            config,
        }
    }

    /// 启动流
    ///
    /// 已运行时直接返回成功。启用平滑时创建投递线程并以启动延迟设置首次唤醒。
    /// 线程创建失败时流保持停止状态。
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.running {
            return Ok(());
        }

        if self.smoothing_enabled() {
            let mut dispatch = self.shared.dispatch.lock();
            debug_assert!(
                state.delivery_thread.is_none(),
                "delivery thread already exists for stream {}",
                self.stream_id
            );

            dispatch.lifecycle = DeliveryState::Running;
            self.shared.delivery_failed.store(false, Ordering::SeqCst);
            let thread = match DeliveryThread::spawn_with(
                self.shared.clone(),
                &self.config.delivery.thread_name,
                self.config.delivery.thread_priority,
                self.spawner,
            ) {
                Ok(thread) => thread,
                Err(e) => {
                    dispatch.lifecycle = DeliveryState::Stopped;
                    return Err(e);
                }
            };

            self.shared
                .event
                .start_timer(false, self.config.delivery.startup_delay());
            state.delivery_thread = Some(thread);
        }

        state.running = true;
        info!("IncomingVideoStream {} started", self.stream_id);
        Ok(())
    }

    /// 停止流
    ///
    /// 未运行时直接返回成功。先在分发锁内设置停止标记并唤醒投递线程，
    /// 再在分发锁外等待线程退出；返回后不会再有任何回调被调用。
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.running {
            return Ok(());
        }

        let thread = {
            let mut dispatch = self.shared.dispatch.lock();
            let thread = state.delivery_thread.take();
            if thread.is_some() {
                dispatch.lifecycle = DeliveryState::StopRequested;
                self.shared.event.stop_timer();
                // 不等定时器超时，立即唤醒线程
                self.shared.event.set();
            }
            thread
        };

        if let Some(thread) = thread {
            // 投递线程只会请求分发锁和缓冲区锁，这里仍持有流状态锁是安全的
            thread.join();
            self.shared.dispatch.lock().lifecycle = DeliveryState::Stopped;
        }

        state.running = false;
        info!("IncomingVideoStream {} stopped", self.stream_id);
        Ok(())
    }

    /// 丢弃所有缓冲帧
    pub fn reset(&self) -> Result<()> {
        let mut buffer = self.shared.buffer.lock();
        let dropped = buffer.len();
        buffer.release_all_frames();
        debug!("Stream {} reset, released {} frames", self.stream_id, dropped);
        Ok(())
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// 输入帧率（帧/秒）
    pub fn incoming_rate(&self) -> u32 {
        self.state.lock().rate.rate()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn smoothing_enabled(&self) -> bool {
        !self.config.disable_prerenderer_smoothing
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// 设置默认渲染回调，传 None 清除
    pub fn set_render_callback(&self, callback: Option<Arc<dyn RenderCallback>>) {
        self.shared.dispatch.set_callback(CallbackSlot::Render, callback);
    }

    /// 设置外部回调，设置后优先于默认渲染回调
    pub fn set_external_callback(&self, callback: Option<Arc<dyn RenderCallback>>) {
        self.shared.dispatch.set_callback(CallbackSlot::External, callback);
    }

    /// 设置缓冲区的目标渲染延迟
    ///
    /// 运行中返回 `ConfiguredWhileRunning`，需要先停止流。
    pub fn set_expected_render_delay(&self, delay_ms: u32) -> Result<()> {
        let state = self.state.lock();
        if state.running {
            return Err(RenderStreamError::ConfiguredWhileRunning(self.stream_id));
        }

        let mut buffer = self.shared.buffer.lock();
        buffer.set_render_delay(delay_ms)
    }

    /// 送入一帧
    ///
    /// 未运行时返回 `NotRunning` 并丢弃帧。启用平滑时帧进入缓冲区，
    /// 队列由空变为非空时唤醒投递线程；否则在当前线程同步投递。
    /// 投递线程失败后返回 `DeliveryFailed`，直到重新启动。
    pub fn submit(&self, frame: VideoFrame) -> Result<()> {
        let mut state = self.state.lock();
        if !state.running {
            state.frames_dropped += 1;
            return Err(RenderStreamError::NotRunning(self.stream_id));
        }
        if self.smoothing_enabled() && self.shared.has_failed() {
            state.frames_dropped += 1;
            return Err(RenderStreamError::DeliveryFailed(self.stream_id));
        }

        state.frames_submitted += 1;
        state.rate.update(self.clock.now_ms());

        if !self.smoothing_enabled() {
            self.shared.dispatch.lock().deliver(self.stream_id, &frame);
            return Ok(());
        }

        let mut buffer = self.shared.buffer.lock();
        match buffer.add_frame(frame) {
            Ok(1) => self.shared.event.set(),
            Ok(queued) => trace!("Stream {} buffered frame, queue={}", self.stream_id, queued),
            // 被拒绝的帧按直播语义丢弃
            Err(e) => {
                state.frames_rejected += 1;
                trace!("Stream {} frame not buffered: {}", self.stream_id, e);
            }
        }
        Ok(())
    }

    /// 流统计快照
    pub fn stats(&self) -> StreamStats {
        let state = self.state.lock();
        let frames_delivered = self.shared.dispatch.lock().frames_delivered;
        let queued_frames = self.shared.buffer.lock().len();

        StreamStats {
            stream_id: self.stream_id,
            running: state.running,
            smoothing_enabled: self.smoothing_enabled(),
            incoming_rate: state.rate.rate(),
            frames_submitted: state.frames_submitted,
            frames_dropped: state.frames_dropped,
            frames_rejected: state.frames_rejected,
            frames_delivered,
            queued_frames,
            delivery_failed: self.shared.has_failed(),
        }
    }
}

/// 作为上游组件的渲染回调使用：收到的帧直接送入本流
impl RenderCallback for IncomingVideoStream {
    fn render_frame(&self, _stream_id: StreamId, frame: &VideoFrame) {
        if let Err(e) = self.submit(frame.clone()) {
            trace!("Upstream frame dropped: {}", e);
        }
    }
}

impl Drop for IncomingVideoStream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_frame;
    use std::io;
    use std::thread::{self, JoinHandle};

    fn refuse_spawn(
        _builder: thread::Builder,
        _body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached"))
    }

    #[test]
    fn test_new_stream_is_stopped() {
        let stream = IncomingVideoStream::new(StreamId::new(5), false);
        assert_eq!(stream.stream_id(), StreamId::new(5));
        assert!(!stream.is_running());
        assert!(stream.smoothing_enabled());
        assert_eq!(stream.incoming_rate(), 0);
    }

    #[test]
    fn test_with_config_rejects_invalid_config() {
        let mut config = StreamConfig::default();
        config.render_delay_ms = 1;
        assert!(matches!(
            IncomingVideoStream::with_config(StreamId::new(1), config),
            Err(RenderStreamError::Config(_))
        ));
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let stream = IncomingVideoStream::new(StreamId::new(1), false);
        assert!(stream.stop().is_ok());
        assert!(stream.stop().is_ok());
        assert!(!stream.is_running());
    }

    #[test]
    fn test_start_without_smoothing_creates_no_thread() {
        let stream = IncomingVideoStream::new(StreamId::new(1), true);
        stream.start().unwrap();
        assert!(stream.is_running());
        assert!(stream.state.lock().delivery_thread.is_none());
        assert_eq!(stream.shared.dispatch.lock().lifecycle, DeliveryState::Stopped);
        stream.stop().unwrap();
    }

    #[test]
    fn test_start_twice_keeps_single_thread() {
        let stream = IncomingVideoStream::new(StreamId::new(1), false);
        stream.start().unwrap();
        stream.start().unwrap();
        assert!(stream.state.lock().delivery_thread.is_some());
        assert_eq!(stream.shared.dispatch.lock().lifecycle, DeliveryState::Running);

        stream.stop().unwrap();
        assert!(stream.state.lock().delivery_thread.is_none());
        assert_eq!(stream.shared.dispatch.lock().lifecycle, DeliveryState::Stopped);
    }

    #[test]
    fn test_failed_thread_creation_leaves_stream_stopped() {
        let mut stream = IncomingVideoStream::new(StreamId::new(1), false);
        stream.spawner = refuse_spawn;

        assert!(matches!(stream.start(), Err(RenderStreamError::ThreadCreation(_))));
        assert!(!stream.is_running());
        assert!(stream.state.lock().delivery_thread.is_none());
        assert_eq!(stream.shared.dispatch.lock().lifecycle, DeliveryState::Stopped);
        assert!(matches!(
            stream.submit(test_frame(1, common::monotonic_ms())),
            Err(RenderStreamError::NotRunning(_))
        ));

        // 线程可以创建后正常启动
        stream.spawner = spawn_os_thread;
        stream.start().unwrap();
        assert_eq!(stream.shared.dispatch.lock().lifecycle, DeliveryState::Running);
        stream.stop().unwrap();
    }

    #[test]
    fn test_restart_after_stop() {
        let stream = IncomingVideoStream::new(StreamId::new(1), false);
        for _ in 0..3 {
            stream.start().unwrap();
            assert!(stream.is_running());
            stream.stop().unwrap();
            assert!(!stream.is_running());
        }
    }

    #[test]
    fn test_drop_stops_running_stream() {
        let stream = IncomingVideoStream::new(StreamId::new(1), false);
        stream.start().unwrap();
        let shared = stream.shared.clone();
        drop(stream);
        assert_eq!(shared.dispatch.lock().lifecycle, DeliveryState::Stopped);
    }
}
