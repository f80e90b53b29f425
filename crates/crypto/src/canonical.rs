//! # 正規化JSON
//!
//! 証明ファイルのダイジェストはバイト列が安定した正規形に対して計算する。
//!
//! 正規化規則:
//! - オブジェクトのキーはUTF-8バイト順で昇順に並べる
//! - 区切り文字の前後に空白を入れない
//! - 配列は要素順を保持する
//! - 文字列・数値はserde_jsonの出力表現をそのまま用いる

use serde_json::Value;

use crate::{keccak256, CryptoError};

/// JSON値を正規形にエンコードする。
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// 証明ファイルのダイジェスト。`keccak256(canonical_json(value))`
pub fn proof_digest(value: &Value) -> Result<[u8; 32], CryptoError> {
    Ok(keccak256(&canonical_json(value)?))
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CryptoError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(key, out)?;
                out.push(b':');
                write_canonical(item, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out)?,
    }
    Ok(())
}

fn write_scalar<T: serde::Serialize + ?Sized>(value: &T, out: &mut Vec<u8>) -> Result<(), CryptoError> {
    serde_json::to_writer(&mut *out, value).map_err(|e| CryptoError::Canonicalize(e.to_string()))
}
