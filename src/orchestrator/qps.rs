//! QPS 限速器 - 编排层
//!
//! 约束"新发起的 dispatch 调用"的速率，与并发上限相互独立：
//! 还在退避或写盘的流水线不占用新请求的速率配额。
//!
//! 实现为固定间隔的令牌闸门：每次 acquire 预订下一个可用时隙，
//! 锁只在计算时隙时短暂持有，等待本身发生在锁外，所以排队中的
//! 流水线不会互相阻塞，也能在任意时刻被外层取消信号中止。

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// QPS 限速器
pub struct QpsLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl QpsLimiter {
    /// 创建限速器，`qps` 必须为正
    pub fn new(qps: f64) -> Self {
        let qps = if qps > 0.0 { qps } else { 1.0 };
        Self {
            interval: Duration::from_secs_f64(1.0 / qps),
            next_slot: Mutex::new(None),
        }
    }

    /// 等到下一个可用时隙
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        sleep_until(slot).await;
    }
}
