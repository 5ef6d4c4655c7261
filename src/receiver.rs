//! 수신자 (서버측)
//!
//! - 기대한 seqnum의 패킷만 싱크로 전달 후 ACK
//! - 손상/중복/순서 어긋난 패킷은 직전 ACK 재전송
//! - 헤더보다 짧은 데이터그램은 응답 없이 무시
//! - FIN 수락 시 FIN-ACK 후 싱크 종료

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::UnreliableChannel;
use crate::packet::{next_seq, Packet, SeqNum};
use crate::stats::ReceiverStats;
use crate::transport::Transport;
use crate::{Config, Error, Result, DEFAULT_RECV_BUFFER_SIZE};

/// 수신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// 다음 패킷 대기 (기대 seqnum)
    AwaitingPacket(SeqNum),

    /// FIN 수락 또는 치명적 에러로 종료
    Closed,
}

/// 수신자
pub struct Receiver<T, W> {
    /// 손실 채널 (ACK 송신 경로)
    channel: UnreliableChannel<T>,

    /// 출력 싱크 (세션 동안 독점)
    sink: W,

    /// 기대 seqnum
    expected_seq: SeqNum,

    /// 마지막으로 보낸 ACK seqnum
    last_ack_seq: SeqNum,

    state: ReceiverState,

    /// FIN 수락 후 대기 시간
    fin_linger: Duration,

    recv_buffer_size: usize,

    stats: ReceiverStats,
}

impl<T: Transport> Receiver<T, File> {
    /// 출력 파일을 생성하고 수신자 생성
    pub async fn create(channel: UnreliableChannel<T>, path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref()).await?;
        Ok(Self::new(channel, file))
    }
}

impl<T: Transport, W: AsyncWrite + Unpin> Receiver<T, W> {
    /// 새 수신자 생성
    pub fn new(channel: UnreliableChannel<T>, sink: W) -> Self {
        let expected_seq = 0;
        Self {
            channel,
            sink,
            expected_seq,
            last_ack_seq: next_seq(expected_seq),
            state: ReceiverState::AwaitingPacket(expected_seq),
            fin_linger: Duration::ZERO,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            stats: ReceiverStats::new(),
        }
    }

    /// 설정에서 수신자 생성
    pub fn from_config(channel: UnreliableChannel<T>, sink: W, config: &Config) -> Result<Self> {
        config.validate()?;

        let mut receiver = Self::new(channel, sink);
        receiver.fin_linger = config.fin_linger();
        receiver.recv_buffer_size = config.recv_buffer_size;
        Ok(receiver)
    }

    /// FIN 수락 후 대기 시간 설정
    pub fn with_fin_linger(mut self, linger: Duration) -> Self {
        self.fin_linger = linger;
        self
    }

    /// FIN을 받을 때까지 수신
    ///
    /// 전송 계층 또는 싱크 I/O 에러만 반환. 에러 시에도 싱크는 종료된다.
    pub async fn run(&mut self) -> Result<ReceiverStats> {
        if self.state == ReceiverState::Closed {
            return Err(Error::SessionClosed);
        }

        let local_addr = self.channel.local_addr()?;
        info!("[Receiver] Waiting for data on {}", local_addr);

        let mut buf = vec![0u8; self.recv_buffer_size];

        if let Err(e) = self.receive_loop(&mut buf).await {
            warn!("[Receiver] 수신 중단: {}", e);
            self.abort().await;
            return Err(e);
        }

        info!("[Receiver] Transfer complete: {}", self.stats.summary());

        if let Err(e) = self.linger(&mut buf).await {
            warn!("[Receiver] FIN 대기 중 에러, 무시: {}", e);
        }
        Ok(self.stats.clone())
    }

    async fn receive_loop(&mut self, buf: &mut [u8]) -> Result<()> {
        loop {
            let (len, from) = self.channel.recv_from(buf).await?;
            if self.handle_datagram(&buf[..len], from).await? == ReceiverState::Closed {
                return Ok(());
            }
        }
    }

    /// 데이터그램 하나 처리
    pub async fn handle_datagram(&mut self, raw: &[u8], from: SocketAddr) -> Result<ReceiverState> {
        if self.state == ReceiverState::Closed {
            return Err(Error::SessionClosed);
        }

        let packet = match Packet::decode(raw) {
            Ok(packet) => packet,
            Err(e) => {
                // 응답 없음, 송신측 타임아웃에 맡김
                warn!("[Receiver] Received malformed packet from {}, ignoring: {}", from, e);
                self.stats.malformed += 1;
                return Ok(self.state);
            }
        };

        if let Err(e) = packet.verify() {
            self.stats.corrupted += 1;
            warn!("[Receiver] {}, resending ACK seq {}", e, self.last_ack_seq);
            self.send_ack(self.last_ack_seq, false, from).await?;
            return Ok(self.state);
        }

        if packet.seqnum() != self.expected_seq {
            self.stats.duplicates += 1;
            debug!(
                "[Receiver] Out-of-order seq {} (expected {}), resending ACK seq {}",
                packet.seqnum(),
                self.expected_seq,
                self.last_ack_seq
            );
            self.send_ack(self.last_ack_seq, false, from).await?;
            return Ok(self.state);
        }

        if packet.is_fin() {
            self.send_ack(self.expected_seq, true, from).await?;
            info!("[Receiver] Received FIN seq {}, closing connection", packet.seqnum());

            self.advance();
            self.stats.fin_received = true;
            self.close_sink().await?;
            return Ok(self.state);
        }

        self.sink.write_all(packet.data()).await?;
        self.send_ack(self.expected_seq, false, from).await?;

        self.stats.delivered_packets += 1;
        self.stats.total_bytes += packet.data().len() as u64;
        debug!(
            "[Receiver] Received seq {}, delivered {} bytes, sent ACK",
            packet.seqnum(),
            packet.data().len()
        );

        self.advance();
        Ok(self.state)
    }

    /// 기대 seqnum 전환
    fn advance(&mut self) {
        self.last_ack_seq = self.expected_seq;
        self.expected_seq = next_seq(self.expected_seq);
        self.state = ReceiverState::AwaitingPacket(self.expected_seq);
    }

    async fn send_ack(&mut self, seqnum: SeqNum, is_fin: bool, to: SocketAddr) -> Result<()> {
        let ack = Packet::ack(seqnum, is_fin);
        self.channel.send(&ack.encode(), to).await?;
        self.stats.acks_sent += 1;
        Ok(())
    }

    async fn close_sink(&mut self) -> Result<()> {
        self.state = ReceiverState::Closed;
        self.sink.shutdown().await?;
        Ok(())
    }

    /// 에러 종료 시 싱크 정리 (한 번만)
    async fn abort(&mut self) {
        if self.state == ReceiverState::Closed {
            return;
        }
        self.state = ReceiverState::Closed;
        if let Err(e) = self.sink.shutdown().await {
            warn!("[Receiver] 싱크 종료 실패: {}", e);
        }
    }

    /// FIN-ACK 유실 대비: 재전송된 FIN에 FIN-ACK로 응답
    ///
    /// 대기 마감은 재전송된 FIN을 받을 때만 연장된다.
    async fn linger(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.fin_linger.is_zero() {
            return Ok(());
        }

        let fin_seq = self.last_ack_seq;
        let mut deadline = Instant::now() + self.fin_linger;

        while let Some((len, from)) = self.channel.recv_until(buf, deadline).await? {
            match Packet::decode(&buf[..len]) {
                Ok(packet) if !packet.is_corrupted() && packet.is_fin() && packet.seqnum() == fin_seq => {
                    debug!("[Receiver] FIN 재전송 수신, FIN-ACK 재전송");
                    self.send_ack(fin_seq, true, from).await?;
                    deadline = Instant::now() + self.fin_linger;
                }
                _ => debug!("[Receiver] 종료 후 패킷 무시 ({} bytes)", len),
            }
        }

        Ok(())
    }

    /// 기대 seqnum
    pub fn expected_seq(&self) -> SeqNum {
        self.expected_seq
    }

    /// 마지막 ACK seqnum
    pub fn last_ack_seq(&self) -> SeqNum {
        self.last_ack_seq
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn channel(&self) -> &UnreliableChannel<T> {
        &self.channel
    }

    /// 통계 반환
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// 싱크 회수
    pub fn into_sink(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::UdpSocket;

    async fn setup() -> (Receiver<UdpSocket, Vec<u8>>, UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let channel = UnreliableChannel::new(socket, 0.0).unwrap();
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        (Receiver::new(channel, Vec::new()), peer, peer_addr)
    }

    async fn recv_ack(peer: &UdpSocket) -> Option<Packet> {
        let mut buf = [0u8; 64];
        match tokio::time::timeout(Duration::from_millis(200), peer.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(Packet::decode(&buf[..len]).unwrap()),
            _ => None,
        }
    }

    fn data(seq: SeqNum, payload: &'static [u8]) -> Vec<u8> {
        Packet::data_packet(seq, Bytes::from_static(payload)).encode()
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (receiver, _peer, _) = setup().await;
        assert_eq!(receiver.expected_seq(), 0);
        assert_eq!(receiver.last_ack_seq(), 1);
        assert_eq!(receiver.state(), ReceiverState::AwaitingPacket(0));
    }

    #[tokio::test]
    async fn test_in_order_delivery() {
        let (mut receiver, peer, peer_addr) = setup().await;

        receiver.handle_datagram(&data(0, b"ABCD"), peer_addr).await.unwrap();
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(0, false));

        receiver.handle_datagram(&data(1, b"EFG"), peer_addr).await.unwrap();
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(1, false));

        assert_eq!(receiver.expected_seq(), 0);
        assert_eq!(receiver.sink().as_slice(), b"ABCDEFG");
    }

    #[tokio::test]
    async fn test_duplicate_written_once() {
        let (mut receiver, peer, peer_addr) = setup().await;

        // ACK 유실 후 동일 패킷 재전송
        receiver.handle_datagram(&data(0, b"once"), peer_addr).await.unwrap();
        receiver.handle_datagram(&data(0, b"once"), peer_addr).await.unwrap();

        let first = recv_ack(&peer).await.unwrap();
        let second = recv_ack(&peer).await.unwrap();
        assert_eq!(first, Packet::ack(0, false));
        assert_eq!(second, first);

        assert_eq!(receiver.sink().as_slice(), b"once");
        assert_eq!(receiver.stats().duplicates, 1);
        assert_eq!(receiver.expected_seq(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_packet_resends_last_ack() {
        let (mut receiver, peer, peer_addr) = setup().await;

        let mut raw = data(0, b"payload");
        raw[8] ^= 0x40;

        receiver.handle_datagram(&raw, peer_addr).await.unwrap();
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(1, false));

        assert!(receiver.sink().is_empty());
        assert_eq!(receiver.stats().corrupted, 1);
        assert_eq!(receiver.expected_seq(), 0);
    }

    #[tokio::test]
    async fn test_malformed_packet_ignored_silently() {
        let (mut receiver, peer, peer_addr) = setup().await;

        let state = receiver.handle_datagram(&[0, 0, 0], peer_addr).await.unwrap();
        assert_eq!(state, ReceiverState::AwaitingPacket(0));
        assert!(recv_ack(&peer).await.is_none());
        assert_eq!(receiver.stats().malformed, 1);
        assert_eq!(receiver.stats().acks_sent, 0);
    }

    #[tokio::test]
    async fn test_fin_with_wrong_seq_ignored() {
        let (mut receiver, peer, peer_addr) = setup().await;

        let state = receiver
            .handle_datagram(&Packet::fin(1).encode(), peer_addr)
            .await
            .unwrap();

        assert_eq!(state, ReceiverState::AwaitingPacket(0));
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(1, false));
        assert!(!receiver.stats().fin_received);
    }

    #[tokio::test]
    async fn test_fin_closes_session() {
        let (mut receiver, peer, peer_addr) = setup().await;

        receiver.handle_datagram(&data(0, b"last"), peer_addr).await.unwrap();
        let state = receiver
            .handle_datagram(&Packet::fin(1).encode(), peer_addr)
            .await
            .unwrap();

        assert_eq!(state, ReceiverState::Closed);
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(0, false));
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(1, true));
        assert_eq!(receiver.expected_seq(), 0);
        assert_eq!(receiver.last_ack_seq(), 1);

        assert!(matches!(
            receiver.handle_datagram(&data(0, b"late"), peer_addr).await,
            Err(Error::SessionClosed)
        ));
        assert_eq!(receiver.into_sink(), b"last".to_vec());
    }

    #[tokio::test]
    async fn test_linger_answers_fin_retransmission() {
        let (receiver, peer, _) = setup().await;
        let receiver_addr = receiver.channel().local_addr().unwrap();
        let mut receiver = receiver.with_fin_linger(Duration::from_millis(300));

        let task = tokio::spawn(async move {
            let stats = receiver.run().await.unwrap();
            (stats, receiver.into_sink())
        });

        let fin = Packet::fin(0).encode();
        peer.send_to(&fin, receiver_addr).await.unwrap();
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(0, true));

        // FIN-ACK 유실 가정, FIN 재전송
        peer.send_to(&fin, receiver_addr).await.unwrap();
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(0, true));

        let (stats, sink) = task.await.unwrap();
        assert!(stats.fin_received);
        assert_eq!(stats.acks_sent, 2);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_linger_not_extended_by_stray_traffic() {
        let (receiver, peer, _) = setup().await;
        let receiver_addr = receiver.channel().local_addr().unwrap();
        let linger = Duration::from_millis(300);
        let mut receiver = receiver.with_fin_linger(linger);

        let task = tokio::spawn(async move { receiver.run().await.unwrap() });

        peer.send_to(&Packet::fin(0).encode(), receiver_addr).await.unwrap();
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(0, true));
        let accepted_at = Instant::now();

        // 형식 오류, 데이터, 다른 seqnum FIN을 linger 보다 오래 계속 전송
        let stray = [vec![0u8; 3], data(1, b"stray"), Packet::fin(1).encode()];
        let mut finished_at = None;
        for i in 0..20 {
            peer.send_to(&stray[i % stray.len()], receiver_addr).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            if task.is_finished() {
                finished_at = Some(Instant::now());
                break;
            }
        }

        let finished_at = finished_at.expect("linger가 잡음 트래픽으로 연장됨");
        assert!(finished_at - accepted_at < linger + Duration::from_millis(500));

        let stats = task.await.unwrap();
        assert!(stats.fin_received);
        assert_eq!(stats.acks_sent, 1);
    }

    /// 항상 쓰기에 실패하는 싱크
    #[derive(Default)]
    struct FailingSink {
        shutdowns: usize,
    }

    impl AsyncWrite for FailingSink {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            self.shutdowns += 1;
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_sink_failure_aborts_session() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let channel = UnreliableChannel::new(socket, 0.0).unwrap();
        let receiver_addr = channel.local_addr().unwrap();
        let mut receiver = Receiver::new(channel, FailingSink::default());

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.send_to(&data(0, b"lost"), receiver_addr).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), receiver.run())
            .await
            .unwrap();

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(receiver.state(), ReceiverState::Closed);
        assert_eq!(receiver.stats().acks_sent, 0);
        assert_eq!(receiver.stats().delivered_packets, 0);
        assert_eq!(receiver.sink().shutdowns, 1);
        assert!(recv_ack(&peer).await.is_none());

        assert!(matches!(receiver.run().await, Err(Error::SessionClosed)));
    }

    /// 지정한 횟수 이후 송신이 실패하는 전송 계층
    struct SendBudget {
        socket: UdpSocket,
        sends_left: std::sync::atomic::AtomicUsize,
    }

    impl Transport for SendBudget {
        fn send_to<'a>(
            &'a self,
            buf: &'a [u8],
            target: SocketAddr,
        ) -> crate::transport::IoFuture<'a, usize> {
            use std::sync::atomic::Ordering;

            let allowed = self
                .sends_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            Box::pin(async move {
                if !allowed {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, "socket closed"));
                }
                self.socket.send_to(buf, target).await
            })
        }

        fn recv_from<'a>(
            &'a self,
            buf: &'a mut [u8],
        ) -> crate::transport::IoFuture<'a, (usize, SocketAddr)> {
            Box::pin(self.socket.recv_from(buf))
        }

        fn local_addr(&self) -> std::io::Result<SocketAddr> {
            self.socket.local_addr()
        }
    }

    #[tokio::test]
    async fn test_linger_error_keeps_completed_transfer() {
        let transport = SendBudget {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            sends_left: std::sync::atomic::AtomicUsize::new(1),
        };
        let channel = UnreliableChannel::new(transport, 0.0).unwrap();
        let receiver_addr = channel.local_addr().unwrap();
        let mut receiver =
            Receiver::new(channel, Vec::new()).with_fin_linger(Duration::from_millis(300));

        let task = tokio::spawn(async move {
            let result = receiver.run().await;
            (result, receiver)
        });

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let fin = Packet::fin(0).encode();
        peer.send_to(&fin, receiver_addr).await.unwrap();
        assert_eq!(recv_ack(&peer).await.unwrap(), Packet::ack(0, true));

        // 재전송 FIN에 대한 FIN-ACK 송신 실패
        peer.send_to(&fin, receiver_addr).await.unwrap();

        let (result, receiver) = task.await.unwrap();
        let stats = result.unwrap();
        assert!(stats.fin_received);
        assert_eq!(stats.acks_sent, 1);
        assert_eq!(receiver.state(), ReceiverState::Closed);
    }
}
