//! # RDT (Reliable Data Transfer)
//!
//! 손실이 있는 UDP 위에서 동작하는 stop-and-wait (alternating-bit) 전송 프로토콜
//!
//! ## 핵심 특징
//! - **1비트 시퀀스 번호**: 0/1 교대, 항상 패킷 하나만 전송 중
//! - **CRC32 체크섬**: 헤더 필드 + 페이로드 무결성 검증
//! - **중복 제거**: 기대하지 않은 시퀀스 번호는 이전 ACK 재전송으로 응답
//! - **타임아웃 재전송**: 고정 타임아웃, 백오프 없음
//! - **FIN 핸드셰이크**: 빈 FIN 패킷으로 양방향 종료
//! - **손실 채널 시뮬레이션**: 송신 경로에서 확률적 드롭 (+ 선택적 비트 플립)

pub mod channel;
pub mod config;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod source;
pub mod stats;
pub mod transport;

pub use channel::{ChannelStats, UnreliableChannel};
pub use config::Config;
pub use error::{Error, Result};
pub use packet::{Packet, SeqNum};
pub use receiver::{Receiver, ReceiverState};
pub use sender::{Sender, SenderState};
pub use source::ChunkReader;
pub use stats::{ReceiverStats, SenderStats};
pub use transport::Transport;

/// 고정 헤더 크기 (seqnum 1B + fin 1B + checksum 4B)
pub const HEADER_SIZE: usize = 6;

/// 기본 청크 크기 (바이트)
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// 기본 수신 버퍼 크기 (바이트)
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;

/// 기본 재전송 타임아웃 (밀리초)
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
