//! # secp256k1 リカバラブル署名
//!
//! 提出者の認証（EIP-191署名からのアドレス復元）と、
//! 証明ダイジェストへの生署名（プレフィックスなし）を扱う。

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::{decode_hex, keccak256, personal_message_hash, CryptoError};

/// リカバラブル署名のバイト長（`r ∥ s ∥ v`）
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;

/// 20バイトのアカウントアドレス。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// 主張されたアドレス文字列と大文字小文字を区別せずに比較する。
    pub fn matches(&self, claimed: &str) -> bool {
        claimed.eq_ignore_ascii_case(&self.to_string())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// 公開鍵からアドレスを導出する。
///
/// 非圧縮公開鍵（タグバイト除く64バイト）のKeccak-256の末尾20バイト。
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Address(addr)
}

/// `r ∥ s ∥ v` 形式のリカバラブル署名。
///
/// `v` は 0/1 と 27/28 の両方を受け付ける。high-s署名は構築時に
/// low-sへ正規化し、リカバリIDのパリティを反転させる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    signature: Signature,
    recovery_id: RecoveryId,
}

impl RecoverableSignature {
    fn normalized(signature: Signature, recovery_id: RecoveryId) -> Self {
        match signature.normalize_s() {
            Some(low_s) => Self {
                signature: low_s,
                recovery_id: RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
            },
            None => Self {
                signature,
                recovery_id,
            },
        }
    }

    /// 65バイトの署名をパースする。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != RECOVERABLE_SIGNATURE_LEN {
            return Err(CryptoError::InvalidSignature(format!(
                "署名は{RECOVERABLE_SIGNATURE_LEN}バイトである必要があります: {} bytes",
                bytes.len()
            )));
        }

        let signature = Signature::from_slice(&bytes[..64])
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

        let v = match bytes[64] {
            v @ (27 | 28) => v - 27,
            v @ (0 | 1) => v,
            other => {
                return Err(CryptoError::InvalidSignature(format!(
                    "リカバリID (v) が不正です: {other}"
                )))
            }
        };
        let recovery_id = RecoveryId::from_byte(v)
            .ok_or_else(|| CryptoError::InvalidSignature(format!("リカバリID (v) が不正です: {v}")))?;

        Ok(Self::normalized(signature, recovery_id))
    }

    /// `0x` 付き（または無し）のHex文字列からパースする。
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_hex(s)?)
    }

    /// `r ∥ s ∥ v`（`v = 27 + recovery_id`）にエンコードする。
    pub fn to_bytes(&self) -> [u8; RECOVERABLE_SIGNATURE_LEN] {
        let mut out = [0u8; RECOVERABLE_SIGNATURE_LEN];
        out[..64].copy_from_slice(&self.signature.to_bytes());
        out[64] = 27 + self.recovery_id.to_byte();
        out
    }

    /// `0x` 付きHexにエンコードする。
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// 32バイトのプリハッシュから署名者の公開鍵を復元する。
    pub fn recover(&self, prehash: &[u8; 32]) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::recover_from_prehash(prehash, &self.signature, self.recovery_id)
            .map_err(|_| CryptoError::RecoveryFailed)
    }
}

/// EIP-191 personal message署名から署名者アドレスを復元する。
pub fn recover_personal_signer(message: &[u8], signature_hex: &str) -> Result<Address, CryptoError> {
    let signature = RecoverableSignature::from_hex(signature_hex)?;
    let key = signature.recover(&personal_message_hash(message))?;
    Ok(address_of(&key))
}

/// 生ダイジェスト署名から署名者アドレスを復元する。
pub fn recover_digest_signer(digest: &[u8; 32], signature_hex: &str) -> Result<Address, CryptoError> {
    let signature = RecoverableSignature::from_hex(signature_hex)?;
    let key = signature.recover(digest)?;
    Ok(address_of(&key))
}

/// 32バイトのダイジェストそのものに署名する（メッセージプレフィックスなし）。
pub fn sign_digest(
    signing_key: &SigningKey,
    digest: &[u8; 32],
) -> Result<RecoverableSignature, CryptoError> {
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(RecoverableSignature::normalized(signature, recovery_id))
}

/// Hex文字列（32バイト）から署名鍵を構築する。
pub fn signing_key_from_hex(s: &str) -> Result<SigningKey, CryptoError> {
    let bytes = decode_hex(s.trim()).map_err(|_| CryptoError::InvalidPrivateKey)?;
    if bytes.len() != 32 {
        return Err(CryptoError::InvalidPrivateKey);
    }
    SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    fn test_key(byte: u8) -> SigningKey {
        SigningKey::from_slice(&[byte; 32]).unwrap()
    }

    /// 秘密鍵1（生成元G）の既知アドレス
    #[test]
    fn test_address_of_generator() {
        let key = signing_key_from_hex(KEY_ONE).unwrap();
        assert_eq!(
            address_of(key.verifying_key()).to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_sign_digest_recovers_signer() {
        let key = test_key(0x11);
        let digest = keccak256(b"proof artifact");

        let signature = sign_digest(&key, &digest).unwrap();
        let hex_sig = signature.to_hex();
        assert_eq!(hex_sig.len(), 2 + 130);

        let recovered = recover_digest_signer(&digest, &hex_sig).unwrap();
        assert_eq!(recovered, address_of(key.verifying_key()));
    }

    #[test]
    fn test_v_is_ethereum_style() {
        let key = test_key(0x22);
        let bytes = sign_digest(&key, &keccak256(b"x")).unwrap().to_bytes();
        assert!(bytes[64] == 27 || bytes[64] == 28);
    }

    #[test]
    fn test_recover_personal_signer() {
        let key = test_key(0x33);
        let message = b"zvan submission n1";
        let signature = sign_digest(&key, &personal_message_hash(message)).unwrap();

        let recovered = recover_personal_signer(message, &signature.to_hex()).unwrap();
        assert_eq!(recovered, address_of(key.verifying_key()));

        // 別メッセージでは別アドレスが復元される
        let other = recover_personal_signer(b"tampered", &signature.to_hex()).unwrap();
        assert_ne!(other, address_of(key.verifying_key()));
    }

    #[test]
    fn test_personal_signature_is_not_raw_digest_signature() {
        let key = test_key(0x34);
        let message = b"hello";
        let raw = sign_digest(&key, &keccak256(message)).unwrap();
        let recovered = recover_personal_signer(message, &raw.to_hex()).unwrap();
        assert_ne!(recovered, address_of(key.verifying_key()));
    }

    #[test]
    fn test_accepts_zero_one_recovery_byte() {
        let key = test_key(0x44);
        let digest = keccak256(b"v-normalization");
        let mut bytes = sign_digest(&key, &digest).unwrap().to_bytes();
        bytes[64] -= 27;

        let parsed = RecoverableSignature::from_bytes(&bytes).unwrap();
        assert_eq!(address_of(&parsed.recover(&digest).unwrap()), address_of(key.verifying_key()));
    }

    #[test]
    fn test_high_s_signature_is_normalized() {
        let key = test_key(0x55);
        let digest = keccak256(b"malleable");
        let bytes = sign_digest(&key, &digest).unwrap().to_bytes();

        // s -> n - s, vのパリティ反転で同一署名の high-s 版を作る
        let low = Signature::from_slice(&bytes[..64]).unwrap();
        let neg_s = -*low.s().as_ref();
        let high = Signature::from_scalars(low.r().to_bytes(), neg_s.to_bytes()).unwrap();
        let mut malleated = [0u8; 65];
        malleated[..64].copy_from_slice(&high.to_bytes());
        malleated[64] = if bytes[64] == 27 { 28 } else { 27 };

        let parsed = RecoverableSignature::from_bytes(&malleated).unwrap();
        assert_eq!(parsed.to_bytes(), bytes);
        assert_eq!(address_of(&parsed.recover(&digest).unwrap()), address_of(key.verifying_key()));
    }

    #[test]
    fn test_rejects_malformed_signatures() {
        assert!(matches!(
            RecoverableSignature::from_hex("0x1234"),
            Err(CryptoError::InvalidSignature(_))
        ));
        assert!(matches!(
            RecoverableSignature::from_hex("not hex"),
            Err(CryptoError::HexDecode(_))
        ));

        let key = test_key(0x66);
        let mut bytes = sign_digest(&key, &keccak256(b"v")).unwrap().to_bytes();
        bytes[64] = 5;
        assert!(RecoverableSignature::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_address_matches_case_insensitive() {
        let key = signing_key_from_hex(KEY_ONE).unwrap();
        let address = address_of(key.verifying_key());
        assert!(address.matches("0x7E5F4552091A69125D5DFCB7B8C2659029395BDF"));
        assert!(address.matches("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(!address.matches("7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(!address.matches("0xABC"));
    }

    #[test]
    fn test_signing_key_from_hex_rejects_bad_input() {
        assert!(signing_key_from_hex("0x01").is_err());
        assert!(signing_key_from_hex("").is_err());
        // ゼロ鍵は無効なスカラー
        assert!(signing_key_from_hex(&"00".repeat(32)).is_err());
        assert!(signing_key_from_hex(&format!(" {KEY_ONE}\n")).is_ok());
    }
}
