//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了按键合并的批量加载。
//!
//! - `entry`: 单个键的在途记录和完成信号
//! - `registry`: 在途记录的注册表
//! - `dispatch`: 对未命中的键调用加载器并分发结果
//! - `group`: 对外的批量请求入口

mod dispatch;
mod entry;
mod group;
mod registry;

pub use group::Group;
