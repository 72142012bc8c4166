use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 视频流标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u32);

impl StreamId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StreamId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// 视频帧
///
/// 解码后的帧数据在生产者、缓冲队列和渲染回调之间按值传递。
/// `data` 使用 `Bytes`，克隆只增加引用计数。
///
/// 宽或高为0的帧是"空帧"，表示当前没有可渲染的帧，永远不会交给渲染回调。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// RTP时间戳（90kHz）
    pub timestamp: u32,
    /// 期望渲染时间（毫秒，单调时钟）
    pub render_time_ms: i64,
    pub data: Bytes,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, timestamp: u32, render_time_ms: i64, data: Bytes) -> Self {
        Self {
            width,
            height,
            timestamp,
            render_time_ms,
            data,
        }
    }

    /// 创建空帧
    pub fn empty() -> Self {
        Self::default()
    }

    /// 是否为空帧
    pub fn is_zero_size(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn with_render_time(mut self, render_time_ms: i64) -> Self {
        self.render_time_ms = render_time_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame_is_zero_size() {
        assert!(VideoFrame::empty().is_zero_size());
        assert!(VideoFrame::new(0, 720, 1, 0, Bytes::new()).is_zero_size());
        assert!(VideoFrame::new(1280, 0, 1, 0, Bytes::new()).is_zero_size());
    }

    #[test]
    fn test_frame_with_dimensions_is_not_zero_size() {
        let frame = VideoFrame::new(1280, 720, 3000, 40, Bytes::from_static(&[1, 2, 3]));
        assert!(!frame.is_zero_size());
        assert_eq!(frame.size(), 3);

        let moved = frame.with_render_time(120);
        assert_eq!(moved.render_time_ms, 120);
        assert_eq!(moved.timestamp, 3000);
    }

    #[test]
    fn test_stream_id_serializes_transparently() {
        let id = StreamId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        assert_eq!(id.to_string(), "7");
        assert_eq!(StreamId::from(7), id);
    }
}
