//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了传递给加载器的取消/截止时间上下文。
//!
//! 组本身不会因为上下文被取消而提前释放等待者，上下文只会原样转发给加载器，
//! 由加载器自行决定如何响应取消或超时。

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 加载上下文
///
/// 携带一个取消令牌和一个可选的截止时间，克隆开销很小
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// 创建一个永不超时、尚未取消的根上下文
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// 基于已有的取消令牌创建上下文
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// 派生一个子上下文
    ///
    /// 父上下文取消时子上下文随之取消，反之不成立
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// 派生一个带有截止时间的子上下文
    ///
    /// 如果父上下文的截止时间更早，则保留父上下文的截止时间
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// 派生一个在 `timeout` 之后到期的子上下文
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// 取消该上下文及其所有子上下文
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 截止时间
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 距离截止时间的剩余时长，没有截止时间时返回 `None`
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// 截止时间是否已经过去
    pub fn is_expired(&self) -> bool {
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// 等待取消
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// 等待取消或截止时间到达，以先发生者为准
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// 底层取消令牌
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
