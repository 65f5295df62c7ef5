/**
 * Bounded polling
 *
 * A RetryPolicy says how often to poll and when to give up. Each loop
 * run draws from a fresh RetryBudget.
 */

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy{
    /// Sleep between polls
    pub poll_interval: Duration,
    /// Wall-clock limit for the whole loop
    pub timeout: Option<Duration>,
    /// Limit on detector requests in the loop
    pub max_attempts: Option<u32>,
}

impl RetryPolicy{
    pub fn new(poll_interval: Duration) -> Self{
        RetryPolicy{ poll_interval, timeout: None, max_attempts: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self{
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self{
        self.max_attempts = Some(attempts);
        self
    }

    /// Neither bound set: the loop may poll forever.
    pub fn is_unbounded(&self) -> bool{
        self.timeout.is_none() && self.max_attempts.is_none()
    }

    pub fn start(&self) -> RetryBudget{
        RetryBudget{ policy: *self, started: Instant::now(), attempts: 0 }
    }
}

impl Default for RetryPolicy{
    fn default() -> Self{
        RetryPolicy::new(Duration::from_millis(100))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetExhausted{
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct RetryBudget{
    policy: RetryPolicy,
    started: Instant,
    attempts: u32,
}

impl RetryBudget{
    /// Claim one more attempt, or report why none are left.
    pub fn try_attempt(&mut self) -> Result<(), BudgetExhausted>{
        let elapsed = self.started.elapsed();
        let out_of_attempts = self.policy.max_attempts.map_or(false, |max| self.attempts >= max);
        let out_of_time = self.policy.timeout.map_or(false, |limit| elapsed >= limit);
        if out_of_attempts || out_of_time{
            return Err(BudgetExhausted{ attempts: self.attempts, elapsed });
        }
        self.attempts += 1;
        Ok(())
    }

    pub fn attempts(&self) -> u32{
        self.attempts
    }

    pub fn elapsed(&self) -> Duration{
        self.started.elapsed()
    }

    pub fn pause(&self){
        if !self.policy.poll_interval.is_zero(){
            std::thread::sleep(self.policy.poll_interval);
        }
    }
}
