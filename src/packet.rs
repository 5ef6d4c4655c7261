//! 패킷 (PDU) 정의 및 직렬화
//!
//! ```text
//! Offset 0    : seqnum   (1 byte, 0 또는 1)
//! Offset 1    : fin flag (1 byte, 0 또는 1)
//! Offset 2-5  : checksum (4 bytes, big-endian, CRC32)
//! Offset 6..  : payload  (0..chunk_size bytes)
//! ```
//!
//! 페이로드 길이 필드는 없음. 데이터그램 경계가 곧 패킷 경계.

use bytes::Bytes;

use crate::{Error, Result, HEADER_SIZE};

/// 시퀀스 번호 (alternating-bit, 0 또는 1)
pub type SeqNum = u8;

/// 다음 시퀀스 번호 (0 <-> 1)
pub fn next_seq(seq: SeqNum) -> SeqNum {
    seq ^ 1
}

/// 헤더 필드 + 페이로드에 대한 CRC32 계산
///
/// 송신측 스탬핑과 수신측 검증이 동일한 함수를 사용해야 함
pub fn compute_checksum(seqnum: SeqNum, is_fin: bool, data: &[u8]) -> u32 {
    checksum_raw(seqnum, is_fin as u8, data)
}

fn checksum_raw(seqnum: u8, fin: u8, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[seqnum, fin]);
    hasher.update(data);
    hasher.finalize()
}

/// 프로토콜 데이터 단위
///
/// 바이트에서 복원된 패킷은 수신한 체크섬을 그대로 보존한다.
/// 손상 여부는 [`Packet::is_corrupted`]로 확인.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    seqnum: SeqNum,

    /// 수신한 fin 바이트 원본 (정상 패킷은 0 또는 1)
    fin: u8,

    checksum: u32,

    data: Bytes,
}

impl Packet {
    /// 새 패킷 생성 (체크섬 계산)
    pub fn new(seqnum: SeqNum, data: Bytes, is_fin: bool) -> Self {
        let fin = is_fin as u8;
        Self {
            checksum: checksum_raw(seqnum, fin, &data),
            seqnum,
            fin,
            data,
        }
    }

    /// 데이터 패킷
    pub fn data_packet(seqnum: SeqNum, data: Bytes) -> Self {
        Self::new(seqnum, data, false)
    }

    /// 종료 패킷 (빈 페이로드)
    pub fn fin(seqnum: SeqNum) -> Self {
        Self::new(seqnum, Bytes::new(), true)
    }

    /// ACK 패킷 (빈 페이로드, seqnum/fin 에코)
    pub fn ack(seqnum: SeqNum, is_fin: bool) -> Self {
        Self::new(seqnum, Bytes::new(), is_fin)
    }

    pub fn seqnum(&self) -> SeqNum {
        self.seqnum
    }

    pub fn is_fin(&self) -> bool {
        self.fin != 0
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// 패킷을 바이트로 직렬화
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.data.len());
        buf.push(self.seqnum);
        buf.push(self.fin);
        buf.extend_from_slice(&self.checksum.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    /// 바이트에서 패킷 역직렬화
    ///
    /// 헤더보다 짧으면 `MalformedPacket`. 체크섬은 재계산하지 않음.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::MalformedPacket { len: bytes.len() });
        }

        let checksum = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);

        Ok(Self {
            seqnum: bytes[0],
            fin: bytes[1],
            checksum,
            data: Bytes::copy_from_slice(&bytes[HEADER_SIZE..]),
        })
    }

    /// 저장된 체크섬과 재계산한 체크섬이 다르면 true
    pub fn is_corrupted(&self) -> bool {
        checksum_raw(self.seqnum, self.fin, &self.data) != self.checksum
    }

    /// 체크섬 검증
    pub fn verify(&self) -> Result<()> {
        let got = checksum_raw(self.seqnum, self.fin, &self.data);
        if got != self.checksum {
            return Err(Error::ChecksumMismatch {
                expected: self.checksum,
                got,
            });
        }
        Ok(())
    }

    /// 기대한 ACK인지 확인 (손상 없음 + seqnum 일치 + fin 일치)
    pub fn acknowledges(&self, pending: &Packet) -> Result<()> {
        self.verify()?;
        if self.seqnum != pending.seqnum {
            return Err(Error::SequenceMismatch {
                expected: pending.seqnum,
                got: self.seqnum,
            });
        }
        if self.is_fin() != pending.is_fin() {
            return Err(Error::FinMismatch {
                expected: pending.is_fin(),
                got: self.is_fin(),
            });
        }
        Ok(())
    }
}
