//! Identifiers.
//!
//! # JobId: ULID ベースのハンドル
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **調整なしで生成可能**: 乱数部 80 bit なので衝突を気にしなくてよい
//! - 外部には `job-<ULID>` という文字列で渡す（HTTP 層はこの文字列だけを持つ）
//!
//! Record-store keys (`PreferenceId`, `UserId`, `QuestionId`) are the integer
//! ids of the external store and are kept as thin newtypes so they can't be
//! mixed up with each other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

const JOB_PREFIX: &str = "job-";

/// Opaque handle of a submitted job.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Ulid);

impl JobId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{JOB_PREFIX}{}", self.0)
    }
}

/// Error returned when a string is not a valid `job-<ULID>` handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed job id: {0:?}")]
pub struct ParseJobIdError(pub String);

impl FromStr for JobId {
    type Err = ParseJobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(JOB_PREFIX)
            .ok_or_else(|| ParseJobIdError(s.to_string()))?;
        let ulid = Ulid::from_string(raw).map_err(|_| ParseJobIdError(s.to_string()))?;
        Ok(Self(ulid))
    }
}

// 文字列表現（job-<ULID>）でシリアライズする。API レスポンスと同じ形。
impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

record_id!(
    /// Primary key of a preference session in the record store.
    PreferenceId
);
record_id!(
    /// Primary key of a user in the record store.
    UserId
);
record_id!(
    /// Primary key of a stored question.
    QuestionId
);
