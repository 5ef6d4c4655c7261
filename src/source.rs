//! 고정 크기 청크 분할기
//!
//! 바이트 소스를 `chunk_size` 단위 청크로 분할 (마지막 청크만 짧을 수 있음)

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Error, Result};

/// 비동기 바이트 소스에서 고정 크기 청크를 읽는 리더
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    finished: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size는 0보다 커야 함".into()));
        }

        Ok(Self {
            reader,
            chunk_size,
            finished: false,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 다음 청크
    ///
    /// 짧은 read가 와도 `chunk_size`를 채울 때까지 계속 읽는다. EOF면 `None`.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;

        while filled < self.chunk_size {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.finished = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }
}
