// 时钟抽象
//
// 帧率统计和渲染缓冲区的释放时间都通过 `Clock` 读取当前时间，
// 便于在测试和仿真中注入可控时间。

use std::sync::atomic::{AtomicI64, Ordering};

/// 毫秒级单调时钟
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// 系统单调时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        common::monotonic_ms()
    }
}

/// 手动推进的时钟
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
