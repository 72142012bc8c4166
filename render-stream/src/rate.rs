// 输入帧率统计
//
// 按固定窗口统计帧数，窗口结束时计算一次帧率。

use tracing::trace;

/// 默认统计窗口（毫秒）
pub const DEFAULT_RATE_WINDOW_MS: u64 = 1000;

/// 窗口帧率计算器
///
/// 每收到一帧计数加一；距离窗口起点超过统计周期时计算
/// `1000 * 帧数 / 实际经过毫秒`（整数截断），然后清零计数并以当前时间作为新窗口起点。
/// 窗口中途读取到的始终是上一次计算的结果。
///
/// 截断是有意保留的：低帧数窗口会得到0。
#[derive(Debug, Clone)]
pub struct RateCalculator {
    /// 统计周期（毫秒）
    window_ms: i64,
    /// 当前窗口内的帧数
    frames_since_last_calculation: u64,
    /// 当前窗口起点
    last_calculation_time_ms: i64,
    /// 上一次计算出的帧率
    incoming_rate: u32,
}

impl RateCalculator {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: window_ms.max(1) as i64,
            frames_since_last_calculation: 0,
            last_calculation_time_ms: 0,
            incoming_rate: 0,
        }
    }

    /// 记录一帧，返回当前帧率
    pub fn update(&mut self, now_ms: i64) -> u32 {
        self.frames_since_last_calculation += 1;

        if now_ms >= self.last_calculation_time_ms + self.window_ms {
            let elapsed_ms = (now_ms - self.last_calculation_time_ms) as u64;
            self.incoming_rate = (1000 * self.frames_since_last_calculation / elapsed_ms) as u32;

            trace!(
                "Rate window closed: frames={}, elapsed={}ms, rate={}fps",
                self.frames_since_last_calculation,
                elapsed_ms,
                self.incoming_rate
            );

            self.frames_since_last_calculation = 0;
            self.last_calculation_time_ms = now_ms;
        }

        self.incoming_rate
    }

    pub fn rate(&self) -> u32 {
        self.incoming_rate
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms as u64
    }
}

impl Default for RateCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// 以固定间隔喂帧，返回每次窗口结束后的帧率
    fn feed(calc: &mut RateCalculator, start_ms: i64, interval_ms: i64, frames: usize) -> Vec<u32> {
        let mut rates = Vec::new();
        let mut last = calc.rate();
        let mut window_start = calc.last_calculation_time_ms;
        for i in 0..frames {
            let now = start_ms + i as i64 * interval_ms;
            let rate = calc.update(now);
            if calc.last_calculation_time_ms != window_start {
                rates.push(rate);
                window_start = calc.last_calculation_time_ms;
            } else {
                assert_eq!(rate, last, "rate changed mid-window at {}ms", now);
            }
            last = rate;
        }
        rates
    }

    #[test]
    fn test_initial_rate_is_zero() {
        let calc = RateCalculator::default();
        assert_eq!(calc.rate(), 0);
        assert_eq!(calc.window_ms(), 1000);
    }

    #[test]
    fn test_rate_converges_at_30fps() {
        let mut calc = RateCalculator::default();
        // 起点晚于一个窗口，第一帧即关闭初始窗口
        let rates = feed(&mut calc, 10_000, 33, 200);
        assert!(rates.len() >= 5);
        for rate in &rates[1..] {
            assert_eq!(*rate, 1000 / 33);
        }
    }

    #[test]
    fn test_first_window_uses_zero_origin() {
        let mut calc = RateCalculator::default();
        // 起点为0时第一帧不足一个窗口，第一次计算包含起点帧
        calc.update(0);
        for i in 1..=31 {
            calc.update(i * 33);
        }
        // 31 * 33 = 1023ms 时关闭窗口，共32帧
        assert_eq!(calc.rate(), 32_000 / 1023);
    }

    #[test]
    fn test_rate_held_between_windows() {
        let mut calc = RateCalculator::new(1000);
        calc.update(5_000);
        for i in 1..=10 {
            calc.update(5_000 + i * 100);
        }
        assert_eq!(calc.rate(), 10);

        // 窗口中途不变
        calc.update(6_500);
        assert_eq!(calc.rate(), 10);
    }

    #[test]
    fn test_low_frame_count_truncates_to_zero() {
        let mut calc = RateCalculator::new(1000);
        calc.update(10_000);
        // 一个窗口只有一帧且经过了2秒
        assert_eq!(calc.update(12_000), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_steady_cadence_yields_truncated_rate(interval in 1i64..500) {
            let mut calc = RateCalculator::new(1000);
            let frames = (4000 / interval) as usize + 10;
            let rates = feed(&mut calc, 100_000, interval, frames);
            prop_assert!(rates.len() >= 2);
            for rate in &rates[1..] {
                prop_assert_eq!(*rate as i64, 1000 / interval);
            }
        }
    }
}
