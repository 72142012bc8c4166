use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// 单调时钟毫秒数
///
/// 以进程内第一次调用为起点。生产者填写 `VideoFrame::render_time_ms`
/// 和渲染缓冲区判断释放时间使用同一个时间基准。
pub fn monotonic_ms() -> i64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as i64
}
