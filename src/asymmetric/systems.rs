//! 非对称算法系统集合
//!
//! 目前只包含传统算法（RSA）。
pub mod traditional;
