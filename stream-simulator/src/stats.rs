// 间隔统计

use serde::Serialize;
use std::time::Instant;

/// 相邻事件间隔的汇总
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IntervalSummary {
    /// 事件数
    pub events: usize,
    pub mean_ms: f64,
    /// 间隔标准差，即抖动
    pub jitter_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl IntervalSummary {
    pub fn from_instants(instants: &[Instant]) -> Self {
        let intervals: Vec<f64> = instants
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]).as_secs_f64() * 1000.0)
            .collect();

        let mut summary = Self::from_intervals(&intervals);
        summary.events = instants.len();
        summary
    }

    pub fn from_intervals(intervals: &[f64]) -> Self {
        if intervals.is_empty() {
            return Self::default();
        }

        let count = intervals.len() as f64;
        let mean_ms = intervals.iter().sum::<f64>() / count;
        let variance = intervals
            .iter()
            .map(|interval| (interval - mean_ms).powi(2))
            .sum::<f64>()
            / count;

        Self {
            events: intervals.len() + 1,
            mean_ms,
            jitter_ms: variance.sqrt(),
            min_ms: intervals.iter().cloned().fold(f64::INFINITY, f64::min),
            max_ms: intervals.iter().cloned().fold(0.0, f64::max),
        }
    }
}
