//! 프로토콜 설정

use std::time::Duration;

use crate::{Error, Result, DEFAULT_CHUNK_SIZE, DEFAULT_RECV_BUFFER_SIZE, DEFAULT_TIMEOUT_MS, HEADER_SIZE};

/// RDT 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크 크기 (바이트)
    pub chunk_size: usize,

    /// ACK 대기 타임아웃 (밀리초)
    pub timeout_ms: u64,

    /// 송신 경로 패킷 손실 확률 (0.0 ~ 1.0)
    pub loss_probability: f64,

    /// 송신 경로 비트 플립 확률 (0.0 ~ 1.0)
    /// 손실을 통과한 패킷에만 적용
    pub corruption_probability: f64,

    /// 패킷당 최대 재전송 횟수
    /// None이면 무제한
    pub max_retries: Option<u32>,

    /// 수신 버퍼 크기
    pub recv_buffer_size: usize,

    /// FIN 수락 후 FIN 재전송에 응답하는 대기 시간 (밀리초)
    /// 0이면 즉시 종료
    pub fin_linger_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS, // 1초
            loss_probability: 0.3,          // 30%
            corruption_probability: 0.0,
            max_retries: None, // 무제한
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            fin_linger_ms: 2000,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 재전송 타임아웃
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// FIN 대기 시간
    pub fn fin_linger(&self) -> Duration {
        Duration::from_millis(self.fin_linger_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        check_probability("loss_probability", self.loss_probability)?;
        check_probability("corruption_probability", self.corruption_probability)?;

        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size는 0보다 커야 함".into()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout_ms는 0보다 커야 함".into()));
        }
        if self.chunk_size + HEADER_SIZE > self.recv_buffer_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_size {} + 헤더 {} > recv_buffer_size {}",
                self.chunk_size, HEADER_SIZE, self.recv_buffer_size
            )));
        }

        Ok(())
    }

    /// 손실 없는 채널용 설정 (로컬 테스트)
    pub fn lossless() -> Self {
        Self {
            loss_probability: 0.0,
            timeout_ms: 200,
            fin_linger_ms: 500,
            ..Self::default()
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            chunk_size: 512, // 작은 청크
            timeout_ms: 500,
            loss_probability: 0.5,
            corruption_probability: 0.05,
            max_retries: None,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            fin_linger_ms: 5000,
        }
    }
}

/// 확률 값 범위 검증
pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidProbability { name, value })
    }
}
