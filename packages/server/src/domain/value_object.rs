//! 値オブジェクト
//!
//! 生成時に検証を行い、不正な値を持つインスタンスが存在しないことを保証する。

use std::fmt;

use serde::Serialize;

use super::{RandomSource, ValidationError};

/// ルームコードに使う文字集合
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// ルームコードのデフォルト長
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 6;

/// プレイヤー ID の最大長
pub const MAX_PLAYER_ID_LENGTH: usize = 64;

/// プレイヤー名の最大長（trim 後）
pub const MAX_PLAYER_NAME_LENGTH: usize = 20;

/// ヒントの最大長（trim 後）
pub const MAX_PISTA_LENGTH: usize = 200;

/// ラウンド数設定の下限・上限
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 10;

/// ルームコード
///
/// `^[A-Z0-9]{N}$` に一致する固定長の文字列。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// 文字列をルームコードとして解釈する
    ///
    /// 前後の空白を除き、英小文字は大文字として扱う。
    pub fn parse(raw: &str, length: usize) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let well_formed = normalized.len() == length
            && normalized
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());

        if well_formed {
            Ok(Self(normalized))
        } else {
            Err(ValidationError::InvalidRoomCode(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ルームコードの生成器
#[derive(Debug, Clone, Copy)]
pub struct RoomCodeFactory {
    length: usize,
}

impl RoomCodeFactory {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// 文字集合から一様にランダムな文字を選んでコードを生成
    pub fn generate(&self, random: &dyn RandomSource) -> RoomCode {
        let code: String = (0..self.length)
            .map(|_| ROOM_CODE_ALPHABET[random.next_index(ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        RoomCode(code)
    }

    /// この生成器の長さでコードを解釈する
    pub fn parse(&self, raw: &str) -> Result<RoomCode, ValidationError> {
        RoomCode::parse(raw, self.length)
    }
}

impl Default for RoomCodeFactory {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CODE_LENGTH)
    }
}

/// プレイヤー ID
///
/// クライアントから与えられる識別子。認証は行わない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyPlayerId);
        }
        if trimmed.chars().count() > MAX_PLAYER_ID_LENGTH {
            return Err(ValidationError::PlayerIdTooLong {
                max: MAX_PLAYER_ID_LENGTH,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for PlayerId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// プレイヤー名（trim 済み、1〜20 文字）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyPlayerName);
        }
        if trimmed.chars().count() > MAX_PLAYER_NAME_LENGTH {
            return Err(ValidationError::PlayerNameTooLong {
                max: MAX_PLAYER_NAME_LENGTH,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for PlayerName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// ヒントの本文（trim 済み、1〜200 文字）
///
/// 秘密の単語を含まないかどうかはゲーム状態に依存するため、
/// `ensure_hides` で別途検証する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PistaText(String);

impl PistaText {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyPista);
        }
        if trimmed.chars().count() > MAX_PISTA_LENGTH {
            return Err(ValidationError::PistaTooLong {
                max: MAX_PISTA_LENGTH,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// 秘密の単語を 1 語として含むヒントを拒否する（大文字小文字は区別しない）
    ///
    /// 語の境界で比較するので、"sol" に対して "soldado" は通り、"el sol brilla" は拒否される。
    pub fn ensure_hides(&self, secret_word: &str) -> Result<(), ValidationError> {
        let secret = words_of(secret_word);
        if secret.is_empty() {
            return Ok(());
        }
        let clue = words_of(&self.0);
        if clue.windows(secret.len()).any(|window| window == secret.as_slice()) {
            return Err(ValidationError::PistaRevealsSecretWord);
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// 英数字以外で区切った小文字の語の列
fn words_of(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

impl TryFrom<String> for PistaText {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `millis` ミリ秒後のタイムスタンプ
    pub fn add_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

/// ルーム設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    /// 最大ラウンド数（`None` は無制限）
    pub rounds: Option<u32>,
}

impl RoomConfig {
    /// `rounds` は未指定か `1..=10` の整数
    pub fn new(rounds: Option<i64>) -> Result<Self, ValidationError> {
        match rounds {
            None => Ok(Self { rounds: None }),
            Some(value) if (i64::from(MIN_ROUNDS)..=i64::from(MAX_ROUNDS)).contains(&value) => {
                Ok(Self {
                    rounds: Some(value as u32),
                })
            }
            Some(value) => Err(ValidationError::RoundsOutOfRange {
                value,
                min: MIN_ROUNDS,
                max: MAX_ROUNDS,
            }),
        }
    }
}
