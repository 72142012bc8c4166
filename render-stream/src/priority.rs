// 投递线程调度优先级
//
// 尽力而为：提升失败（例如没有实时调度权限）时返回错误，由调用方记录日志后继续运行。

use crate::error::{RenderStreamError, Result};
use serde::{Deserialize, Serialize};

/// 线程优先级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadPriority {
    /// 保持系统默认调度
    Normal,
    /// 实时调度，取中间优先级
    High,
    /// 实时调度，取最高优先级
    #[default]
    Realtime,
}

/// 设置当前线程的调度优先级
pub fn set_current_thread_priority(priority: ThreadPriority) -> Result<()> {
    if priority == ThreadPriority::Normal {
        return Ok(());
    }
    platform::set_realtime(priority)
}

#[cfg(unix)]
mod platform {
    use super::*;
    use std::io;

    pub(super) fn set_realtime(priority: ThreadPriority) -> Result<()> {
        let policy = libc::SCHED_RR;

        // SAFETY: 只查询调度参数范围，并修改调用线程自身的调度参数
        unsafe {
            let max = libc::sched_get_priority_max(policy);
            let min = libc::sched_get_priority_min(policy);
            if max < 0 || min < 0 {
                return Err(RenderStreamError::PriorityUnavailable(
                    io::Error::last_os_error().to_string(),
                ));
            }

            let mut param: libc::sched_param = std::mem::zeroed();
            param.sched_priority = match priority {
                ThreadPriority::Realtime => max,
                _ => (min + max) / 2,
            };

            let rc = libc::pthread_setschedparam(libc::pthread_self(), policy, &param);
            if rc != 0 {
                return Err(RenderStreamError::PriorityUnavailable(
                    io::Error::from_raw_os_error(rc).to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(not(unix))]
mod platform {
    use super::*;

    pub(super) fn set_realtime(priority: ThreadPriority) -> Result<()> {
        Err(RenderStreamError::PriorityUnavailable(format!(
            "{:?} scheduling is not supported on this platform",
            priority
        )))
    }
}
