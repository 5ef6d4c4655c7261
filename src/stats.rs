//! 전송 통계

use std::time::{Duration, Instant};

/// 송신측 통계
#[derive(Debug, Clone)]
pub struct SenderStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 확인된 데이터 패킷 수
    pub data_packets: u64,

    /// 확인된 페이로드 바이트
    pub total_bytes: u64,

    /// 총 송신 횟수 (재전송 포함)
    pub transmissions: u64,

    /// 재전송 횟수
    pub retransmissions: u64,

    /// ACK 대기 타임아웃 횟수
    pub timeouts: u64,

    /// 무효 ACK 수 (손상, 잘못된 seqnum/fin, 잘못된 형식)
    pub invalid_acks: u64,

    /// FIN 확인 여부
    pub fin_acked: bool,
}

impl SenderStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            data_packets: 0,
            total_bytes: 0,
            transmissions: 0,
            retransmissions: 0,
            timeouts: 0,
            invalid_acks: 0,
            fin_acked: false,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 유효 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 재전송 비율
    pub fn retransmission_rate(&self) -> f64 {
        if self.transmissions == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / self.transmissions as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Packets: {} | Bytes: {} | Sent: {} | Retransmits: {} ({:.1}%) | Timeouts: {} | Invalid ACKs: {}",
            self.elapsed().as_secs_f64(),
            self.data_packets,
            self.total_bytes,
            self.transmissions,
            self.retransmissions,
            self.retransmission_rate() * 100.0,
            self.timeouts,
            self.invalid_acks,
        )
    }
}

impl Default for SenderStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 수신측 통계
#[derive(Debug, Clone)]
pub struct ReceiverStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 싱크로 전달된 패킷 수
    pub delivered_packets: u64,

    /// 싱크로 전달된 바이트
    pub total_bytes: u64,

    /// 중복/순서 어긋난 패킷 수
    pub duplicates: u64,

    /// 체크섬 불일치 패킷 수
    pub corrupted: u64,

    /// 헤더보다 짧은 데이터그램 수
    pub malformed: u64,

    /// 전송한 ACK 수
    pub acks_sent: u64,

    /// FIN 수락 여부
    pub fin_received: bool,
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            delivered_packets: 0,
            total_bytes: 0,
            duplicates: 0,
            corrupted: 0,
            malformed: 0,
            acks_sent: 0,
            fin_received: false,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전달 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Delivered: {} | Bytes: {} | Throughput: {:.2} KB/s | Duplicates: {} | Corrupted: {} | Malformed: {} | ACKs: {}",
            self.elapsed().as_secs_f64(),
            self.delivered_packets,
            self.total_bytes,
            self.throughput() / 1_000.0,
            self.duplicates,
            self.corrupted,
            self.malformed,
            self.acks_sent,
        )
    }
}

impl Default for ReceiverStats {
    fn default() -> Self {
        Self::new()
    }
}
