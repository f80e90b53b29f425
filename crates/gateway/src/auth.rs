//! # 提出者認証
//!
//! `message`に対するEIP-191署名から署名者アドレスを復元し、
//! 主張された`address`と大文字小文字を区別せずに照合する。

use crate::error::GatewayError;

/// 提出者を認証する。
///
/// 署名のパース失敗・復元失敗・アドレス不一致はいずれも
/// `InvalidSignature`として扱い、呼び出し側に区別を見せない。
pub(crate) fn authenticate_submitter(
    address: &str,
    message: &str,
    signature: &str,
) -> Result<(), GatewayError> {
    let recovered = zvan_crypto::recover_personal_signer(message.as_bytes(), signature)
        .map_err(|e| {
            tracing::debug!(error = %e, "署名から署名者を復元できません");
            GatewayError::InvalidSignature
        })?;

    if !recovered.matches(address) {
        tracing::debug!(
            claimed = %address,
            recovered = %recovered,
            "署名者と主張アドレスが一致しません"
        );
        return Err(GatewayError::InvalidSignature);
    }

    Ok(())
}
