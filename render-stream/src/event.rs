// 唤醒事件与定时器
//
// 投递线程只在这里阻塞。三种唤醒来源：定时器到期、
// 队列由空变非空时的显式通知、停止流时的显式通知。

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// 等待结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// 被 `set()` 或定时器唤醒
    Signaled,
    /// 等待超时
    TimedOut,
}

#[derive(Debug)]
struct Timer {
    deadline: Instant,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
struct EventState {
    signaled: bool,
    timer: Option<Timer>,
}

impl EventState {
    fn timer_due(&self, now: Instant) -> bool {
        matches!(&self.timer, Some(timer) if timer.deadline <= now)
    }

    fn fire_timer(&mut self, now: Instant) {
        let period = self.timer.as_ref().and_then(|timer| timer.period);
        match period {
            Some(period) => {
                if let Some(timer) = self.timer.as_mut() {
                    timer.deadline = now + period;
                }
            }
            None => self.timer = None,
        }
    }
}

/// 可定时的自动复位事件
///
/// 每次唤醒只消费一次信号；定时器到期等同于一次 `set()`。
#[derive(Debug, Default)]
pub struct WakeEvent {
    state: Mutex<EventState>,
    cond: Condvar,
}

impl WakeEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// 阻塞直到被唤醒或超过 `timeout`
    pub fn wait(&self, timeout: Duration) -> WaitResult {
        let wait_deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if state.signaled {
                state.signaled = false;
                return WaitResult::Signaled;
            }

            let now = Instant::now();
            if state.timer_due(now) {
                state.fire_timer(now);
                return WaitResult::Signaled;
            }

            if now >= wait_deadline {
                return WaitResult::TimedOut;
            }

            let deadline = match &state.timer {
                Some(timer) => timer.deadline.min(wait_deadline),
                None => wait_deadline,
            };
            self.cond.wait_until(&mut state, deadline);
        }
    }

    /// 唤醒等待者；没有等待者时信号保留到下一次 `wait`
    pub fn set(&self) {
        let mut state = self.state.lock();
        state.signaled = true;
        self.cond.notify_all();
    }

    /// 启动（或重新启动）定时器
    pub fn start_timer(&self, periodic: bool, time: Duration) {
        let mut state = self.state.lock();
        state.timer = Some(Timer {
            deadline: Instant::now() + time,
            period: periodic.then_some(time),
        });
        self.cond.notify_all();
    }

    pub fn stop_timer(&self) {
        self.state.lock().timer = None;
    }

    #[cfg(test)]
    pub(crate) fn is_signaled(&self) -> bool {
        self.state.lock().signaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_times_out_without_signal() {
        let event = WakeEvent::new();
        let start = Instant::now();
        assert_eq!(event.wait(Duration::from_millis(20)), WaitResult::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_set_before_wait_is_kept() {
        let event = WakeEvent::new();
        event.set();
        assert!(event.is_signaled());
        assert_eq!(event.wait(Duration::from_secs(5)), WaitResult::Signaled);
        // 信号已被消费
        assert!(!event.is_signaled());
        assert_eq!(event.wait(Duration::from_millis(5)), WaitResult::TimedOut);
    }

    #[test]
    fn test_set_wakes_blocked_waiter() {
        let event = Arc::new(WakeEvent::new());
        let waiter = {
            let event = event.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let result = event.wait(Duration::from_secs(10));
                (result, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        event.set();

        let (result, elapsed) = waiter.join().unwrap();
        assert_eq!(result, WaitResult::Signaled);
        assert!(elapsed < Duration::from_secs(5), "waited {:?}", elapsed);
    }

    #[test]
    fn test_one_shot_timer_fires_once() {
        let event = WakeEvent::new();
        event.start_timer(false, Duration::from_millis(10));

        let start = Instant::now();
        assert_eq!(event.wait(Duration::from_secs(5)), WaitResult::Signaled);
        assert!(start.elapsed() < Duration::from_secs(1));

        assert_eq!(event.wait(Duration::from_millis(30)), WaitResult::TimedOut);
    }

    #[test]
    fn test_periodic_timer_rearms() {
        let event = WakeEvent::new();
        event.start_timer(true, Duration::from_millis(5));
        for _ in 0..3 {
            assert_eq!(event.wait(Duration::from_secs(5)), WaitResult::Signaled);
        }
        event.stop_timer();
        assert_eq!(event.wait(Duration::from_millis(20)), WaitResult::TimedOut);
    }

    #[test]
    fn test_restarting_timer_shortens_wait() {
        let event = Arc::new(WakeEvent::new());
        event.start_timer(false, Duration::from_secs(10));

        let waiter = {
            let event = event.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let result = event.wait(Duration::from_secs(20));
                (result, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        event.start_timer(false, Duration::from_millis(10));

        let (result, elapsed) = waiter.join().unwrap();
        assert_eq!(result, WaitResult::Signaled);
        assert!(elapsed < Duration::from_secs(5), "waited {:?}", elapsed);
    }
}
