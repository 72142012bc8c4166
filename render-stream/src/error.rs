// 渲染流 - 错误类型定义
//
// 本模块定义了渲染流生命周期、帧缓冲和配置过程中可能出现的所有错误。
// 所有错误都以返回值形式传递，不做自动重试。

use common::StreamId;
use std::io;
use thiserror::Error;

/// 渲染流错误类型
#[derive(Debug, Clone, Error)]
pub enum RenderStreamError {
    // ========== 生命周期错误 ==========
    /// 流未运行，帧被丢弃
    #[error("Stream {0} is not running")]
    NotRunning(StreamId),

    /// 运行中不允许修改配置
    #[error("Stream {0} must be stopped before reconfiguring")]
    ConfiguredWhileRunning(StreamId),

    /// 投递线程因回调 panic 退出，需要停止后重新启动
    #[error("Delivery thread of stream {0} has failed")]
    DeliveryFailed(StreamId),

    /// 投递线程创建失败
    #[error("Failed to create delivery thread: {0}")]
    ThreadCreation(String),

    // ========== 缓冲区错误 ==========
    /// 渲染延迟超出范围
    #[error("Invalid render delay: {delay_ms}ms (must be between {min_ms}ms and {max_ms}ms)")]
    InvalidRenderDelay { delay_ms: u32, min_ms: u32, max_ms: u32 },

    /// 帧被缓冲区拒绝
    #[error("Frame rejected: {0}")]
    FrameRejected(String),

    // ========== 其他错误 ==========
    /// 无法提升线程优先级
    #[error("Thread priority unavailable: {0}")]
    PriorityUnavailable(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO错误
    #[error("IO error: {0}")]
    Io(String),
}

impl RenderStreamError {
    /// 是否属于直播场景下可以容忍的丢帧
    pub fn is_frame_drop(&self) -> bool {
        matches!(
            self,
            RenderStreamError::NotRunning(_)
                | RenderStreamError::DeliveryFailed(_)
                | RenderStreamError::FrameRejected(_)
        )
    }
}

/// 错误转换：从 std::io::Error
impl From<io::Error> for RenderStreamError {
    fn from(error: io::Error) -> Self {
        RenderStreamError::Io(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RenderStreamError>;
