//! 송신자 (클라이언트측)
//!
//! - 파일을 고정 크기 청크로 분할
//! - 패킷 하나씩 전송 후 ACK 대기 (stop-and-wait)
//! - 타임아웃/무효 ACK 시 동일 패킷 즉시 재전송
//! - 마지막에 빈 FIN 패킷으로 종료

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::channel::UnreliableChannel;
use crate::packet::{next_seq, Packet, SeqNum};
use crate::source::ChunkReader;
use crate::stats::SenderStats;
use crate::transport::Transport;
use crate::{Config, Error, Result, DEFAULT_RECV_BUFFER_SIZE};

/// 송신 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderState {
    /// 다음 패킷 전송 가능
    Ready(SeqNum),

    /// ACK 대기 중인 패킷 (seqnum은 `pending.seqnum()`)
    AwaitingAck { pending: Packet },

    /// FIN 확인 완료
    Done,
}

/// 송신자
pub struct Sender<T> {
    /// 손실 채널
    channel: UnreliableChannel<T>,

    /// 수신자 주소
    dest: SocketAddr,

    /// 재전송 타임아웃
    timeout: Duration,

    /// 패킷당 최대 재전송 횟수 (None = 무제한)
    max_retries: Option<u32>,

    /// ACK 수신 버퍼 크기
    recv_buffer_size: usize,

    /// 현재 시퀀스 번호
    seqnum: SeqNum,

    state: SenderState,

    stats: SenderStats,
}

impl<T: Transport> Sender<T> {
    /// 새 송신자 생성
    pub fn new(channel: UnreliableChannel<T>, dest: SocketAddr, timeout: Duration) -> Self {
        Self {
            channel,
            dest,
            timeout,
            max_retries: None,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            seqnum: 0,
            state: SenderState::Ready(0),
            stats: SenderStats::new(),
        }
    }

    /// 설정에서 송신자 생성
    pub fn from_config(
        channel: UnreliableChannel<T>,
        dest: SocketAddr,
        config: &Config,
    ) -> Result<Self> {
        config.validate()?;

        let mut sender = Self::new(channel, dest, config.timeout());
        sender.max_retries = config.max_retries;
        sender.recv_buffer_size = config.recv_buffer_size;
        Ok(sender)
    }

    /// 패킷당 재전송 한도 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// 데이터 청크 하나를 확인 전송
    pub async fn send_chunk(&mut self, data: Bytes) -> Result<()> {
        let packet = Packet::data_packet(self.seqnum, data);
        self.deliver(packet).await
    }

    /// FIN 전송 후 종료
    pub async fn send_fin(&mut self) -> Result<()> {
        debug!("[Sender] Sending FIN seq {}", self.seqnum);
        self.deliver(Packet::fin(self.seqnum)).await?;
        self.state = SenderState::Done;
        Ok(())
    }

    /// 바이트 소스 전체를 청크 단위로 전송 후 FIN
    pub async fn send_file<R: AsyncRead + Unpin>(
        &mut self,
        source: R,
        chunk_size: usize,
    ) -> Result<SenderStats> {
        let mut chunks = ChunkReader::new(source, chunk_size)?;

        info!("[Sender] Transfer to {} started (chunk_size={})", self.dest, chunk_size);

        while let Some(chunk) = chunks.next_chunk().await? {
            debug!(
                "[Sender] Sending chunk seq {}, size {} bytes",
                self.seqnum,
                chunk.len()
            );
            self.send_chunk(chunk).await?;
        }

        self.send_fin().await?;

        info!("[Sender] File transfer complete: {}", self.stats.summary());
        Ok(self.stats.clone())
    }

    /// 메모리 버퍼 전송
    pub async fn send_bytes(&mut self, data: &[u8], chunk_size: usize) -> Result<SenderStats> {
        self.send_file(data, chunk_size).await
    }

    /// 파일 경로에서 읽어 전송
    pub async fn send_path(
        &mut self,
        path: impl AsRef<Path>,
        chunk_size: usize,
    ) -> Result<SenderStats> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        self.send_file(file, chunk_size).await
    }

    /// 패킷 하나를 ACK 받을 때까지 반복 전송
    async fn deliver(&mut self, packet: Packet) -> Result<()> {
        if self.state == SenderState::Done {
            return Err(Error::SessionClosed);
        }

        let seqnum = packet.seqnum();
        let is_fin = packet.is_fin();
        let payload_len = packet.data().len() as u64;
        let bytes = packet.encode();

        self.state = SenderState::AwaitingAck { pending: packet };

        let mut buf = vec![0u8; self.recv_buffer_size];
        let mut attempts: u32 = 0;

        loop {
            self.channel.send(&bytes, self.dest).await?;
            if attempts > 0 {
                self.stats.retransmissions += 1;
            }
            attempts += 1;
            self.stats.transmissions += 1;

            match self.channel.recv_timeout(&mut buf, self.timeout).await? {
                None => {
                    self.stats.timeouts += 1;
                    warn!(
                        "[Sender] Timeout waiting for ACK seq {}, retransmitting",
                        seqnum
                    );
                }
                Some((len, from)) => match self.check_ack(&buf[..len]) {
                    Ok(()) => {
                        debug!("[Sender] ACK seq {} (fin={}) from {}", seqnum, is_fin, from);

                        if is_fin {
                            self.stats.fin_acked = true;
                        } else {
                            self.stats.data_packets += 1;
                            self.stats.total_bytes += payload_len;
                        }

                        self.seqnum = next_seq(seqnum);
                        self.state = SenderState::Ready(self.seqnum);
                        return Ok(());
                    }
                    Err(e) => {
                        self.stats.invalid_acks += 1;
                        warn!("[Sender] Received invalid ACK ({}), retransmitting", e);
                    }
                },
            }

            if let Some(max_retries) = self.max_retries {
                if attempts > max_retries {
                    return Err(Error::RetryLimitExceeded { seqnum, attempts });
                }
            }
        }
    }

    /// 수신한 데이터그램이 대기 중인 패킷의 ACK인지 검증
    fn check_ack(&self, raw: &[u8]) -> Result<()> {
        let ack = Packet::decode(raw)?;
        match &self.state {
            SenderState::AwaitingAck { pending } => ack.acknowledges(pending),
            _ => Err(Error::SessionClosed),
        }
    }

    /// 현재 시퀀스 번호
    pub fn seqnum(&self) -> SeqNum {
        self.seqnum
    }

    pub fn state(&self) -> &SenderState {
        &self.state
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn channel(&self) -> &UnreliableChannel<T> {
        &self.channel
    }

    /// 통계 반환
    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }
}
