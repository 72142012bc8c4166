// 投递线程
//
// 状态机：等待 → 检查停止标记 → {退出 | 投递 → 等待}
//
// 线程在唤醒事件上阻塞（有最长等待上限），醒来后在分发锁内检查生命周期标记，
// 再在缓冲区锁内同时取出待渲染帧和下一帧的等待时间，重设定时器，最后释放缓冲区锁并分发帧。

use crate::callback::{CallbackDispatch, DeliveryState};
use crate::error::{RenderStreamError, Result};
use crate::event::WakeEvent;
use crate::priority::{set_current_thread_priority, ThreadPriority};
use crate::queue::FrameQueue;
use common::StreamId;
use parking_lot::Mutex;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 线程创建函数
pub(crate) type ThreadSpawner =
    fn(thread::Builder, Box<dyn FnOnce() + Send + 'static>) -> io::Result<JoinHandle<()>>;

pub(crate) fn spawn_os_thread(
    builder: thread::Builder,
    body: Box<dyn FnOnce() + Send + 'static>,
) -> io::Result<JoinHandle<()>> {
    builder.spawn(body)
}

/// 流对象与投递线程共享的状态
pub struct StreamShared {
    pub stream_id: StreamId,
    /// 分发锁（中层）
    pub dispatch: CallbackDispatch,
    /// 缓冲区锁（内层）
    pub buffer: Mutex<Box<dyn FrameQueue>>,
    pub event: WakeEvent,
    /// 单次等待上限
    pub max_wait: Duration,
    /// 投递线程因回调 panic 退出
    pub delivery_failed: AtomicBool,
}

impl StreamShared {
    pub fn new(stream_id: StreamId, queue: Box<dyn FrameQueue>, max_wait: Duration) -> Self {
        Self {
            stream_id,
            dispatch: CallbackDispatch::new(),
            buffer: Mutex::new(queue),
            event: WakeEvent::new(),
            max_wait,
            delivery_failed: AtomicBool::new(false),
        }
    }

    pub fn has_failed(&self) -> bool {
        self.delivery_failed.load(Ordering::SeqCst)
    }

    /// 标记投递线程失败并丢弃缓冲帧，之后不再接受新帧
    fn mark_failed(&self) {
        self.delivery_failed.store(true, Ordering::SeqCst);
        let dropped = {
            let mut buffer = self.buffer.lock();
            let dropped = buffer.len();
            buffer.release_all_frames();
            dropped
        };
        error!(
            "Delivery thread for stream {} panicked, released {} buffered frames",
            self.stream_id, dropped
        );
    }

    /// 执行一轮投递循环
    ///
    /// 返回 false 表示已请求停止，线程应当退出。
    pub fn process(&self) -> bool {
        // 超时也继续检查停止标记和队列
        let wake = self.event.wait(self.max_wait);

        let mut dispatch = self.dispatch.lock();
        if dispatch.lifecycle != DeliveryState::Running {
            debug!("Delivery loop for stream {} terminating", self.stream_id);
            return false;
        }

        let (frame_to_render, wait_time_ms) = {
            let mut buffer = self.buffer.lock();
            let frame = buffer.frame_to_render();
            let wait_time_ms = buffer.time_to_next_release();
            (frame, wait_time_ms)
        };

        let wait_time = Duration::from_millis(wait_time_ms).min(self.max_wait);
        self.event.start_timer(false, wait_time);

        trace!(
            "Stream {} woke ({:?}), next release in {:?}",
            self.stream_id,
            wake,
            wait_time
        );

        dispatch.deliver(self.stream_id, &frame_to_render);
        true
    }
}

/// 投递线程句柄
pub struct DeliveryThread {
    handle: JoinHandle<()>,
}

impl DeliveryThread {
    /// 创建并启动投递线程
    ///
    /// 调用方需要先把生命周期标记设为 `Running`。
    pub fn spawn(shared: Arc<StreamShared>, name: &str, priority: ThreadPriority) -> Result<Self> {
        Self::spawn_with(shared, name, priority, spawn_os_thread)
    }

    pub(crate) fn spawn_with(
        shared: Arc<StreamShared>,
        name: &str,
        priority: ThreadPriority,
        spawner: ThreadSpawner,
    ) -> Result<Self> {
        let builder = thread::Builder::new().name(name.to_string());
        let body = Box::new(move || {
            if let Err(e) = set_current_thread_priority(priority) {
                warn!(
                    "Stream {} delivery thread keeps default priority: {}",
                    shared.stream_id, e
                );
            }

            info!("Delivery thread started for stream {}", shared.stream_id);
            // 回调 panic 时分发锁随栈展开释放
            if panic::catch_unwind(AssertUnwindSafe(|| while shared.process() {})).is_err() {
                shared.mark_failed();
                return;
            }
            info!("Delivery thread stopped for stream {}", shared.stream_id);
        });

        let handle = spawner(builder, body)
            .map_err(|e| RenderStreamError::ThreadCreation(e.to_string()))?;

        Ok(Self { handle })
    }

    /// 等待线程退出
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("Delivery thread panicked before shutdown");
        }
    }
}
