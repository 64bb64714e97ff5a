use crate::common::algorithm::Algorithm;
use crate::common::utils::ZeroizingVec;
use crate::symmetric::errors::SymmetricError;
use rand_core::{OsRng, TryRngCore};

/// 对称加密系统的公共特征
///
/// 实现是无状态的：所有函数都只对传入的密钥材料进行变换，不缓存、不记录、不持久化密钥。
pub trait SymmetricCryptographicSystem: Send + Sync + 'static {
    /// 该系统对应的算法标识。
    const ALGORITHM: Algorithm;

    /// 密钥的期望长度（以字节为单位）。
    const KEY_SIZE: usize;

    /// 生成一个新的密钥。
    fn generate_key() -> Result<ZeroizingVec, SymmetricError> {
        let mut key_bytes = vec![0u8; Self::KEY_SIZE];
        OsRng.try_fill_bytes(&mut key_bytes)?;
        Ok(ZeroizingVec(key_bytes))
    }

    /// 使用密钥加密数据。每次调用使用新的随机 nonce，输出为 `nonce | tag | ciphertext`。
    fn encrypt(
        key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, SymmetricError>;

    /// 使用密钥解密数据。被篡改或截断的输入返回错误，而不是错误的明文。
    fn decrypt(
        key: &[u8],
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, SymmetricError>;
}
