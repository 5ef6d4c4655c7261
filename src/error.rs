//! 에러 타입 정의

use thiserror::Error;

/// RDT 프로토콜 에러 타입
///
/// `MalformedPacket`, `ChecksumMismatch`, `SequenceMismatch`, `FinMismatch`는
/// 세션 내부에서 복구되며 `send_file` / `run` 호출자에게 전달되지 않는다.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("잘못된 패킷: {len} bytes (헤더 6 bytes 미만)")]
    MalformedPacket { len: usize },

    #[error("체크섬 불일치: expected {expected:08X}, got {got:08X}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("시퀀스 불일치: expected {expected}, got {got}")]
    SequenceMismatch { expected: u8, got: u8 },

    #[error("FIN 플래그 불일치: expected fin={expected}, got fin={got}")]
    FinMismatch { expected: bool, got: bool },

    #[error("유효하지 않은 확률 {name}={value} (0.0 ~ 1.0 범위 필요)")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("설정 에러: {0}")]
    InvalidConfig(String),

    #[error("재전송 한도 초과: seqnum={seqnum}, attempts={attempts}")]
    RetryLimitExceeded { seqnum: u8, attempts: u32 },

    #[error("세션 종료됨")]
    SessionClosed,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
