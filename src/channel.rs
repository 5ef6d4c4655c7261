//! 손실 채널
//!
//! 전송 계층의 송신 경로만 가로채서 확률적으로 데이터그램을 드롭한다.
//! 선택적으로 살아남은 데이터그램의 비트 하나를 뒤집어 손상을 주입한다.
//! 수신 경로는 그대로 통과.

use std::net::SocketAddr;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::debug;

use crate::config::check_probability;
use crate::transport::Transport;
use crate::{Config, Result};

/// 채널 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// 그대로 전달된 데이터그램 수
    pub forwarded: u64,

    /// 드롭된 데이터그램 수
    pub dropped: u64,

    /// 비트 플립 후 전달된 데이터그램 수
    pub corrupted: u64,
}

/// 송신 결과
enum Fate {
    Forward,
    Drop,
    /// 뒤집을 비트 인덱스
    Corrupt(usize),
}

/// 송신 경로에 손실을 주입하는 전송 래퍼
pub struct UnreliableChannel<T> {
    inner: T,
    loss_probability: f64,
    corruption_probability: f64,
    rng: Mutex<StdRng>,
    stats: Mutex<ChannelStats>,
}

impl<T: Transport> UnreliableChannel<T> {
    /// 새 채널 생성 (OS 엔트로피로 시드)
    pub fn new(inner: T, loss_probability: f64) -> Result<Self> {
        Self::build(inner, loss_probability, StdRng::from_entropy())
    }

    /// 고정 시드 채널 생성 (재현 가능한 손실 패턴)
    pub fn with_seed(inner: T, loss_probability: f64, seed: u64) -> Result<Self> {
        Self::build(inner, loss_probability, StdRng::seed_from_u64(seed))
    }

    /// 설정에서 채널 생성
    pub fn from_config(inner: T, config: &Config) -> Result<Self> {
        Self::new(inner, config.loss_probability)?.with_corruption(config.corruption_probability)
    }

    fn build(inner: T, loss_probability: f64, rng: StdRng) -> Result<Self> {
        check_probability("loss_probability", loss_probability)?;

        Ok(Self {
            inner,
            loss_probability,
            corruption_probability: 0.0,
            rng: Mutex::new(rng),
            stats: Mutex::new(ChannelStats::default()),
        })
    }

    /// 비트 플립 확률 설정
    pub fn with_corruption(mut self, corruption_probability: f64) -> Result<Self> {
        check_probability("corruption_probability", corruption_probability)?;
        self.corruption_probability = corruption_probability;
        Ok(self)
    }

    pub fn loss_probability(&self) -> f64 {
        self.loss_probability
    }

    pub fn corruption_probability(&self) -> f64 {
        self.corruption_probability
    }

    /// 데이터그램 전송
    ///
    /// 드롭되어도 에러 없음. 전송 계층 I/O 에러만 반환.
    pub async fn send(&self, bytes: &[u8], dest: SocketAddr) -> Result<()> {
        match self.roll(bytes.len()) {
            Fate::Drop => {
                debug!("[Channel] Packet to {} lost ({} bytes)", dest, bytes.len());
                self.stats.lock().dropped += 1;
            }
            Fate::Corrupt(bit) => {
                let mut damaged = bytes.to_vec();
                damaged[bit / 8] ^= 1 << (bit % 8);
                self.inner.send_to(&damaged, dest).await?;

                debug!("[Channel] Packet to {} corrupted (bit {})", dest, bit);
                self.stats.lock().corrupted += 1;
            }
            Fate::Forward => {
                self.inner.send_to(bytes, dest).await?;
                self.stats.lock().forwarded += 1;
            }
        }

        Ok(())
    }

    /// 데이터그램 하나 수신 (무제한 대기)
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.inner.recv_from(buf).await?)
    }

    /// 타임아웃 내 데이터그램 수신
    ///
    /// 타임아웃이면 `Ok(None)`.
    pub async fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<(usize, SocketAddr)>> {
        self.recv_until(buf, Instant::now() + timeout).await
    }

    /// 마감 시각까지 데이터그램 수신
    ///
    /// 마감이 지나면 `Ok(None)`. 이미 지난 마감이면 즉시 반환.
    pub async fn recv_until(
        &self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> Result<Option<(usize, SocketAddr)>> {
        match tokio::time::timeout_at(deadline, self.inner.recv_from(buf)).await {
            Ok(result) => Ok(Some(result?)),
            Err(_) => Ok(None),
        }
    }

    /// 로컬 주소
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// 내부 전송 계층
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// 통계 반환
    pub fn stats(&self) -> ChannelStats {
        *self.stats.lock()
    }

    fn roll(&self, len: usize) -> Fate {
        let mut rng = self.rng.lock();

        if rng.gen_bool(self.loss_probability) {
            return Fate::Drop;
        }
        if len > 0 && rng.gen_bool(self.corruption_probability) {
            return Fate::Corrupt(rng.gen_range(0..len * 8));
        }
        Fate::Forward
    }
}
