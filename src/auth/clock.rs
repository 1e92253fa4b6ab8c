use chrono::Utc;

/// 毫秒级墙钟，锁定窗口按它惰性判断
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
