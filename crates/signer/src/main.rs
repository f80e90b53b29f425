//! # Zvan 証明署名ツール
//!
//! 完成した証明ファイル（JSON）を正規化してKeccak-256ダイジェストを取り、
//! そのダイジェストに直接secp256k1で署名する。
//! 結果の署名済みアテステーションをファイルと標準出力に書き出す。
//!
//! 署名鍵が未設定の場合は何も読まずに異常終了する。

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use zvan_crypto::SigningKey;
use zvan_types::SignedAttestation;

#[derive(Parser)]
#[command(name = "zvan-signer", about = "Zvan offline proof signer")]
struct Cli {
    /// 署名対象の証明ファイル
    #[arg(long, env = "PROOF_PATH", default_value = "../proofs/proof.json")]
    proof: PathBuf,

    /// アテステーションの出力先
    #[arg(long, env = "OUT_META", default_value = "../proofs/signed_proof_meta.json")]
    out: PathBuf,

    /// 署名用秘密鍵（32バイトHex）
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

/// 署名鍵を検証してから証明ファイルに署名し、アテステーションを書き出す。
fn run(cli: Cli) -> Result<()> {
    let private_key = cli
        .private_key
        .filter(|k| !k.trim().is_empty())
        .context("PRIVATE_KEYが設定されていません")?;
    let signing_key = zvan_crypto::signing_key_from_hex(&private_key)?;

    let attestation = sign_proof(&cli.proof, &signing_key)?;
    let pretty = serde_json::to_string_pretty(&attestation)
        .context("アテステーションのシリアライズに失敗")?;
    write_attestation(&cli.out, &pretty)?;

    tracing::info!(
        out = %cli.out.display(),
        signer = %attestation.signer,
        "署名済みアテステーションを書き出しました"
    );
    println!("{pretty}");
    Ok(())
}

/// 証明ファイルを読み込み、正規化ダイジェストに署名する。
fn sign_proof(proof_path: &Path, signing_key: &SigningKey) -> Result<SignedAttestation> {
    let bytes = std::fs::read(proof_path)
        .with_context(|| format!("証明ファイルの読み込みに失敗: {}", proof_path.display()))?;
    let raw_proof: serde_json::Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("証明ファイルのJSONパースに失敗: {}", proof_path.display()))?;

    let digest = zvan_crypto::proof_digest(&raw_proof)?;
    let signature = zvan_crypto::sign_digest(signing_key, &digest)?;
    let signer = zvan_crypto::address_of(signing_key.verifying_key());

    tracing::debug!(digest = %hex::encode(digest), "証明ファイルのダイジェストを計算");

    Ok(SignedAttestation {
        proof_path: proof_path.display().to_string(),
        digest: format!("0x{}", hex::encode(digest)),
        signature: signature.to_hex(),
        signer: signer.to_string(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default(),
        raw_proof,
    })
}

fn write_attestation(out: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("出力ディレクトリの作成に失敗: {}", parent.display()))?;
    }
    std::fs::write(out, contents)
        .with_context(|| format!("アテステーションの書き込みに失敗: {}", out.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[0x42; 32]).unwrap()
    }

    fn write_proof(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_signature_recovers_to_signer() {
        let dir = tempfile::tempdir().unwrap();
        let proof = write_proof(dir.path(), "proof.json", r#"{"journal":[1,2,3],"seal":"ab"}"#);

        let attestation = sign_proof(&proof, &test_key()).unwrap();

        let digest: [u8; 32] = hex::decode(&attestation.digest[2..])
            .unwrap()
            .try_into()
            .unwrap();
        let recovered = zvan_crypto::recover_digest_signer(&digest, &attestation.signature).unwrap();
        assert_eq!(recovered.to_string(), attestation.signer);
        assert_eq!(attestation.raw_proof["seal"], "ab");
        assert_eq!(attestation.proof_path, proof.display().to_string());
        assert!(attestation.timestamp > 0);
    }

    #[test]
    fn test_digest_ignores_key_order_and_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_proof(dir.path(), "a.json", r#"{"seal":"ab","journal":{"y":2,"x":1}}"#);
        let b = write_proof(
            dir.path(),
            "b.json",
            "{\n  \"journal\": { \"x\": 1, \"y\": 2 },\n  \"seal\": \"ab\"\n}",
        );

        let first = sign_proof(&a, &test_key()).unwrap();
        let second = sign_proof(&b, &test_key()).unwrap();
        assert_eq!(first.digest, second.digest);
    }

    #[test]
    fn test_digest_is_keccak_of_canonical_json() {
        let dir = tempfile::tempdir().unwrap();
        let proof = write_proof(dir.path(), "proof.json", r#"{"b":1,"a":[2,1]}"#);

        let attestation = sign_proof(&proof, &test_key()).unwrap();
        let expected = zvan_crypto::keccak256(br#"{"a":[2,1],"b":1}"#);
        assert_eq!(attestation.digest, format!("0x{}", hex::encode(expected)));
    }

    #[test]
    fn test_missing_or_invalid_proof_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sign_proof(&dir.path().join("absent.json"), &test_key()).is_err());

        let broken = write_proof(dir.path(), "broken.json", "{not json");
        assert!(sign_proof(&broken, &test_key()).is_err());
    }

    #[test]
    fn test_write_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("proofs").join("signed_proof_meta.json");
        write_attestation(&out, "{}").unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "{}");
    }

    #[test]
    fn test_private_key_has_no_default() {
        let cli = Cli::try_parse_from(["zvan-signer", "--proof", "p.json"]).unwrap();
        // 環境変数PRIVATE_KEYが設定されていない限り鍵は存在しない
        if std::env::var_os("PRIVATE_KEY").is_none() {
            assert!(cli.private_key.is_none());
        }
        assert_eq!(cli.proof, PathBuf::from("p.json"));
    }

    fn cli(dir: &Path, private_key: Option<&str>) -> Cli {
        Cli {
            proof: write_proof(dir, "proof.json", r#"{"seal":"ab"}"#),
            out: dir.join("out").join("signed_proof_meta.json"),
            private_key: private_key.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_private_key_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        for key in [None, Some(""), Some("   ")] {
            let args = cli(dir.path(), key);
            let out = args.out.clone();
            let err = run(args).unwrap_err();
            assert!(err.to_string().contains("PRIVATE_KEY"));
            assert!(!out.exists());
        }
    }

    #[test]
    fn test_invalid_private_key_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let args = cli(dir.path(), Some("0x1234"));
        let out = args.out.clone();
        assert!(run(args).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn test_run_writes_attestation() {
        let dir = tempfile::tempdir().unwrap();
        let args = cli(dir.path(), Some("42".repeat(32).as_str()));
        let out = args.out.clone();
        run(args).unwrap();

        let written: SignedAttestation =
            serde_json::from_slice(&std::fs::read(out).unwrap()).unwrap();
        let expected = zvan_crypto::address_of(test_key().verifying_key());
        assert_eq!(written.signer, expected.to_string());
        assert_eq!(written.raw_proof["seal"], "ab");
    }
}
