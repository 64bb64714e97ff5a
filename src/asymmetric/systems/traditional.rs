//! # Traditional Cryptographic Algorithm Module
//!
//! This module contains implementations of traditional cryptographic algorithms such as RSA.
//! Each one conforms to the `AsymmetricCryptographicSystem` trait.
//!
//! ---
//!
//! # 传统加密算法模块
//!
//! 本模块包含RSA等传统加密算法的实现，每个实现都符合 `AsymmetricCryptographicSystem` 特征。

pub mod rsa;

pub use rsa::RsaCryptoSystem;
