//! # Zvan 暗号処理
//!
//! 提出の認証、host_tokenの導出、証明ファイルへの署名で使用する
//! 暗号プリミティブをまとめる。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | host_token導出 | HMAC-SHA256 |
//! | ダイジェスト | Keccak-256 |
//! | 署名 | secp256k1 ECDSA（リカバラブル、65バイト `r ∥ s ∥ v`） |
//! | 提出者認証 | EIP-191 personal message 署名からのアドレス復元 |

pub mod canonical;
pub mod signature;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sha3::{Digest, Keccak256};

pub use canonical::{canonical_json, proof_digest};
pub use k256::ecdsa::{SigningKey, VerifyingKey};
pub use signature::{
    address_of, recover_digest_signer, recover_personal_signer, sign_digest,
    signing_key_from_hex, Address, RecoverableSignature,
};

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Hexデコードエラー
    #[error("Hexデコードに失敗しました: {0}")]
    HexDecode(String),
    /// 署名の形式が不正
    #[error("署名の形式が不正です: {0}")]
    InvalidSignature(String),
    /// 署名からの公開鍵復元に失敗
    #[error("署名から公開鍵を復元できませんでした")]
    RecoveryFailed,
    /// 秘密鍵の形式が不正
    #[error("秘密鍵の形式が不正です")]
    InvalidPrivateKey,
    /// 署名処理の失敗
    #[error("署名に失敗しました: {0}")]
    Signing(String),
    /// HMAC鍵が不正
    #[error("HMAC鍵が不正です: {0}")]
    InvalidHmacKey(String),
    /// 正規化JSONのエンコード失敗
    #[error("正規化JSONのエンコードに失敗しました: {0}")]
    Canonicalize(String),
}

type HmacSha256 = Hmac<Sha256>;

/// Keccak-256ハッシュ計算。
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA256計算。
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidHmacKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// EIP-191 (version 0x45) の personal message ハッシュ。
///
/// `keccak256("\x19Ethereum Signed Message:\n" ∥ len(message) ∥ message)`
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// `0x` プレフィックスを許容するHexデコード。
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(trimmed).map_err(|e| CryptoError::HexDecode(e.to_string()))
}

/// host_token導出用のサーバー秘密鍵。
///
/// `host_token = hex(HMAC-SHA256(secret, lower(address) ∥ "|" ∥ nonce))`
///
/// アドレスは小文字化してから連結する。署名者の照合が大文字小文字を
/// 区別しないため、表記揺れで別トークンが生まれないようにする。
#[derive(Clone)]
pub struct HostTokenKey {
    mac: HmacSha256,
}

impl HostTokenKey {
    /// サーバー秘密鍵からHostTokenKeyを構築する。空の秘密鍵は拒否する。
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidHmacKey("秘密鍵が空です".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CryptoError::InvalidHmacKey(e.to_string()))?;
        Ok(Self { mac })
    }

    /// (address, nonce) からhost_tokenを導出する。副作用なし・決定的。
    pub fn derive(&self, address: &str, nonce: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(address.to_ascii_lowercase().as_bytes());
        mac.update(b"|");
        mac.update(nonce.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for HostTokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HostTokenKey(..)")
    }
}
