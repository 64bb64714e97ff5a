//! 定义了非对称加密系统的核心 Trait。
use crate::asymmetric::errors::AsymmetricError;
use crate::common::algorithm::Algorithm;
use crate::common::config::CryptoConfig;
use crate::common::utils::ZeroizingVec;

/// `AsymmetricCryptographicSystem` 定义了非对称加密算法必须实现的核心功能。
///
/// 公钥以 DER (SPKI) 字节传递，私钥以 DER (PKCS#8) 字节传递并由 [`ZeroizingVec`] 持有。
/// 与对称系统一样，实现是无状态的纯函数。
pub trait AsymmetricCryptographicSystem: Send + Sync + 'static {
    /// 该系统对应的算法标识。
    const ALGORITHM: Algorithm;

    /// 生成密钥对，返回 `(公钥, 私钥)`。
    fn generate_keypair(
        config: &CryptoConfig,
    ) -> Result<(Vec<u8>, ZeroizingVec), AsymmetricError>;

    /// 使用公钥加密数据。
    fn encrypt(
        public_key: &[u8],
        plaintext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AsymmetricError>;

    /// 使用私钥解密数据。
    fn decrypt(
        private_key: &[u8],
        ciphertext: &[u8],
        additional_data: Option<&[u8]>,
    ) -> Result<Vec<u8>, AsymmetricError>;

    /// 使用私钥签名。
    fn sign(private_key: &[u8], message: &[u8]) -> Result<Vec<u8>, AsymmetricError>;

    /// 使用公钥验证签名。签名不匹配返回 `Ok(false)`；只有公钥本身无效才返回错误。
    fn verify(
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, AsymmetricError>;

    /// 将公钥导出为 PEM 格式
    fn export_public_key(public_key: &[u8]) -> Result<String, AsymmetricError>;
}
