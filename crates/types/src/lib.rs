//! # Zvan 共有型定義
//!
//! Gateway・Signer間で共有されるデータ構造をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - Hex（`0x`プレフィックス付き）: アドレス、ダイジェスト、署名
//! - Hex（プレフィックスなし）: host_token
//! - タイムスタンプ: UNIXエポックからのミリ秒

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// POST /submit
// ---------------------------------------------------------------------------

/// POST /submit リクエスト。
///
/// 全フィールドが必須だが、欠落を`missing fields`として報告するために
/// デシリアライズ段階では`Option`で受け取る。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// 提出者が主張するアドレス（`0x`付き20バイトHex）
    #[serde(default)]
    pub address: Option<String>,
    /// `message`に対するEIP-191署名（65バイトHex）
    #[serde(default)]
    pub signature: Option<String>,
    /// 署名対象の平文メッセージ
    #[serde(default)]
    pub message: Option<String>,
    /// 証明エンジンに渡す不透明なペイロード
    #[serde(default, rename = "patientData")]
    pub patient_data: Option<serde_json::Value>,
    /// 提出者が指定する一意性・リプレイ防止用の値
    #[serde(default)]
    pub nonce: Option<String>,
}

/// POST /submit 成功レスポンス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// 常に`true`
    pub ok: bool,
    /// 導出されたhost_token
    pub host_token: String,
    /// サーバーが選択したレシートの保存先
    pub receipt_path: String,
}

// ---------------------------------------------------------------------------
// マッピングレコード
// ---------------------------------------------------------------------------

/// host_tokenとレシートの対応を表す永続レコード。
/// 受理された提出ごとに1件存在する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// 主キー。`HMAC-SHA256(server_secret, address | nonce)`
    pub host_token: String,
    /// 提出者が主張したアドレス
    pub address: String,
    /// 提出者が指定したnonce
    pub nonce: String,
    /// コミット時刻（UNIXミリ秒）
    pub created_at: i64,
    /// サーバーが選択したレシートのパス。クライアント入力からは決して導出しない。
    pub receipt_path: String,
}

// ---------------------------------------------------------------------------
// 署名済みアテステーション
// ---------------------------------------------------------------------------

/// オフライン署名ツールが出力する署名済みアテステーション。
/// 作成後は不変。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedAttestation {
    /// 署名対象とした証明ファイルのパス
    pub proof_path: String,
    /// 正規化JSONのKeccak-256ダイジェスト（`0x`付きHex）
    pub digest: String,
    /// 生ダイジェストに対するリカバラブル署名（`0x`付き65バイトHex）
    pub signature: String,
    /// 署名鍵から導出したアドレス
    pub signer: String,
    /// 署名時刻（UNIXミリ秒）
    pub timestamp: i64,
    /// 証明ファイルの内容
    pub raw_proof: serde_json::Value,
}

// ---------------------------------------------------------------------------
// エラー・ヘルスチェック
// ---------------------------------------------------------------------------

/// エラーレスポンスのボディ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// エラー内容
    pub error: String,
    /// 証明エンジンの終了コード（エンジンが終了コードを返した場合のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

/// GET /health レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
