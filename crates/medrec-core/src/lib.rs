//! # MedRec Core
//!
//! 影像记录客户端的核心模块，提供基础数据结构、错误定义和记录归一化。

pub mod error;
pub mod models;
pub mod normalize;

pub use error::{MedrecError, Result};
pub use models::*;
