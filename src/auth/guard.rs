use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::types::{AttemptInfo, LoginAttempt};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_millis(180_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    pub max_attempts: u32,
    pub lockout_duration: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
        }
    }
}

/// 登录尝试守卫。
///
/// 按登录标识（邮箱）记录连续失败次数，达到上限后锁定一段时间。
/// 过期的锁不靠后台清理，而是在下一次读取时惰性删除。
/// 所有读写都经过同一把锁，同一标识的并发失败不会丢计数。
pub struct LoginAttemptGuard {
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    login_attempts: Mutex<HashMap<String, LoginAttempt>>,
}

impl LoginAttemptGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            "初始化登录守卫: 最多 {} 次, 锁定 {} 毫秒",
            config.max_attempts,
            config.lockout_duration.as_millis()
        );
        Self {
            config,
            clock,
            login_attempts: Mutex::new(HashMap::new()),
        }
    }

    fn attempts(&self) -> MutexGuard<'_, HashMap<String, LoginAttempt>> {
        self.login_attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lockout_millis(&self) -> i64 {
        i64::try_from(self.config.lockout_duration.as_millis()).unwrap_or(i64::MAX)
    }

    // 锁已到期则删除整条记录；返回锁是否仍然有效
    fn expire(attempts: &mut HashMap<String, LoginAttempt>, identity: &str, now: i64) -> bool {
        match attempts.get(identity).and_then(|a| a.lock_until) {
            Some(until) if until > now => true,
            Some(_) => {
                attempts.remove(identity);
                info!("{} 的登录锁定已到期，记录已清除", identity);
                false
            }
            None => false,
        }
    }

    /// 标识当前是否处于锁定期
    pub fn is_locked(&self, identity: &str) -> bool {
        let now = self.clock.now_millis();
        let mut attempts = self.attempts();
        let locked = Self::expire(&mut attempts, identity, now);
        if locked {
            warn!("{} 仍处于登录锁定期", identity);
        }
        locked
    }

    /// 距离解锁还剩多久，没有锁定时为 0
    pub fn remaining_lock_time(&self, identity: &str) -> Duration {
        let now = self.clock.now_millis();
        self.attempts()
            .get(identity)
            .and_then(|a| a.lock_until)
            .map(|until| Duration::from_millis(until.saturating_sub(now).max(0) as u64))
            .unwrap_or_default()
    }

    /// 记录一次失败的登录，每个失败请求只能调用一次
    pub fn record_failed_attempt(&self, identity: &str) -> AttemptInfo {
        let now = self.clock.now_millis();
        let max = self.config.max_attempts;
        let mut attempts = self.attempts();
        Self::expire(&mut attempts, identity, now);

        let attempt = attempts
            .entry(identity.to_string())
            .or_insert(LoginAttempt {
                count: 0,
                lock_until: None,
            });
        attempt.count += 1;

        let is_locked = attempt.count >= max;
        if is_locked {
            attempt.lock_until = Some(now.saturating_add(self.lockout_millis()));
            warn!(
                "{} 连续失败 {} 次，锁定 {} 秒",
                identity,
                attempt.count,
                self.config.lockout_duration.as_secs()
            );
        } else {
            warn!("{} 登录失败，当前失败次数: {}", identity, attempt.count);
        }

        AttemptInfo {
            attempts: attempt.count,
            remaining_attempts: max.saturating_sub(attempt.count),
            is_locked,
            lock_time: if is_locked {
                self.lockout_millis() as u64
            } else {
                0
            },
        }
    }

    /// 登录成功，无条件清空该标识的记录
    pub fn record_successful_attempt(&self, identity: &str) {
        if self.attempts().remove(identity).is_some() {
            info!("{} 的登录尝试次数已重置", identity);
        } else {
            debug!("{} 没有失败记录", identity);
        }
    }

    /// 诊断用的只读快照，过期判断与 is_locked 相同
    pub fn attempt_info(&self, identity: &str) -> AttemptInfo {
        let now = self.clock.now_millis();
        let max = self.config.max_attempts;
        let mut attempts = self.attempts();
        let is_locked = Self::expire(&mut attempts, identity, now);

        match attempts.get(identity) {
            None => AttemptInfo {
                attempts: 0,
                remaining_attempts: max,
                is_locked: false,
                lock_time: 0,
            },
            Some(attempt) => AttemptInfo {
                attempts: attempt.count,
                remaining_attempts: max.saturating_sub(attempt.count),
                is_locked,
                lock_time: match attempt.lock_until {
                    Some(until) if is_locked => until.saturating_sub(now) as u64,
                    _ => 0,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use std::thread;

    const EMAIL: &str = "a@x.com";

    fn guard() -> (LoginAttemptGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let guard = LoginAttemptGuard::with_clock(GuardConfig::default(), clock.clone());
        (guard, clock)
    }

    #[test]
    fn fresh_identity_is_unlocked() {
        let (guard, _) = guard();
        assert!(!guard.is_locked(EMAIL));
        assert_eq!(guard.remaining_lock_time(EMAIL), Duration::ZERO);
        assert_eq!(
            guard.attempt_info(EMAIL),
            AttemptInfo {
                attempts: 0,
                remaining_attempts: 3,
                is_locked: false,
                lock_time: 0,
            }
        );
    }

    #[test]
    fn failures_count_down_then_lock() {
        let (guard, _) = guard();

        let first = guard.record_failed_attempt(EMAIL);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.remaining_attempts, 2);
        assert!(!first.is_locked);
        assert_eq!(first.lock_time, 0);

        guard.record_failed_attempt(EMAIL);
        assert!(!guard.is_locked(EMAIL));

        let third = guard.record_failed_attempt(EMAIL);
        assert_eq!(third.attempts, 3);
        assert_eq!(third.remaining_attempts, 0);
        assert!(third.is_locked);
        assert_eq!(third.lock_time, 180_000);

        assert!(guard.is_locked(EMAIL));
        let remaining = guard.remaining_lock_time(EMAIL);
        assert!(remaining > Duration::ZERO);
        assert!(remaining <= DEFAULT_LOCKOUT_DURATION);
    }

    #[test]
    fn counting_state_survives_lock_checks() {
        let (guard, _) = guard();
        guard.record_failed_attempt(EMAIL);
        assert!(!guard.is_locked(EMAIL));
        guard.record_failed_attempt(EMAIL);
        assert!(!guard.is_locked(EMAIL));

        assert_eq!(guard.attempt_info(EMAIL).attempts, 2);
    }

    #[test]
    fn success_resets_even_while_locked() {
        let (guard, _) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(EMAIL);
        }
        assert!(guard.is_locked(EMAIL));

        guard.record_successful_attempt(EMAIL);

        let info = guard.attempt_info(EMAIL);
        assert_eq!(info.attempts, 0);
        assert!(!info.is_locked);
        assert!(!guard.is_locked(EMAIL));
    }

    #[test]
    fn two_failures_then_success_clears_state() {
        let (guard, _) = guard();
        guard.record_failed_attempt(EMAIL);
        guard.record_failed_attempt(EMAIL);
        guard.record_successful_attempt(EMAIL);

        let info = guard.attempt_info(EMAIL);
        assert_eq!(info.attempts, 0);
        assert_eq!(info.remaining_attempts, 3);
        assert!(!info.is_locked);
    }

    #[test]
    fn lock_expires_lazily() {
        let (guard, clock) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(EMAIL);
        }

        clock.advance(Duration::from_millis(179_999));
        assert!(guard.is_locked(EMAIL));
        assert_eq!(guard.remaining_lock_time(EMAIL), Duration::from_millis(1));

        clock.advance(Duration::from_millis(1));
        assert!(!guard.is_locked(EMAIL));
        assert_eq!(guard.attempt_info(EMAIL).attempts, 0);
    }

    #[test]
    fn attempt_info_expires_without_prior_lock_check() {
        let (guard, clock) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(EMAIL);
        }
        let locked = guard.attempt_info(EMAIL);
        assert!(locked.is_locked);
        assert_eq!(locked.lock_time, 180_000);

        clock.advance(DEFAULT_LOCKOUT_DURATION);
        let info = guard.attempt_info(EMAIL);
        assert_eq!(info.attempts, 0);
        assert!(!info.is_locked);
    }

    #[test]
    fn failure_after_expiry_starts_a_new_count() {
        let (guard, clock) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(EMAIL);
        }
        clock.advance(DEFAULT_LOCKOUT_DURATION);

        let info = guard.record_failed_attempt(EMAIL);
        assert_eq!(info.attempts, 1);
        assert!(!info.is_locked);
    }

    #[test]
    fn failure_while_locked_extends_the_lock() {
        let (guard, clock) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(EMAIL);
        }

        clock.advance(Duration::from_secs(100));
        assert_eq!(
            guard.remaining_lock_time(EMAIL),
            DEFAULT_LOCKOUT_DURATION - Duration::from_secs(100)
        );

        let info = guard.record_failed_attempt(EMAIL);
        assert_eq!(info.attempts, 4);
        assert!(info.is_locked);
        assert_eq!(guard.remaining_lock_time(EMAIL), DEFAULT_LOCKOUT_DURATION);

        clock.advance(Duration::from_secs(100));
        assert!(guard.is_locked(EMAIL));
    }

    #[test]
    fn huge_lockout_saturates_instead_of_wrapping() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let config = GuardConfig {
            max_attempts: 1,
            lockout_duration: Duration::from_millis(u64::MAX),
        };
        let guard = LoginAttemptGuard::with_clock(config, clock);

        let info = guard.record_failed_attempt(EMAIL);
        assert!(info.is_locked);
        assert_eq!(info.lock_time, i64::MAX as u64);
        assert!(guard.is_locked(EMAIL));
    }

    #[test]
    fn identities_are_independent() {
        let (guard, _) = guard();
        for _ in 0..3 {
            guard.record_failed_attempt(EMAIL);
        }
        assert!(guard.is_locked(EMAIL));
        assert!(!guard.is_locked("b@x.com"));
        assert_eq!(guard.attempt_info("b@x.com").attempts, 0);
    }

    #[test]
    fn concurrent_failures_are_not_lost() {
        let clock = Arc::new(ManualClock::new(0));
        let config = GuardConfig {
            max_attempts: 1_000,
            ..GuardConfig::default()
        };
        let guard = LoginAttemptGuard::with_clock(config, clock);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        guard.record_failed_attempt(EMAIL);
                    }
                });
            }
        });

        assert_eq!(guard.attempt_info(EMAIL).attempts, 400);
    }

    #[test]
    fn parallel_failures_reach_the_lock() {
        let (guard, _) = guard();

        thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| guard.record_failed_attempt(EMAIL));
            }
        });

        assert!(guard.is_locked(EMAIL));
    }
}
