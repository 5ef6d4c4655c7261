//! 데이터그램 전송 계층
//!
//! 송신자/수신자는 손실 채널을 통해서만 소켓에 접근하며, 채널은
//! [`Transport`] 위에서 동작한다. 기본 구현은 `tokio::net::UdpSocket`.
//!
//! - 데이터그램 하나 = 패킷 하나 (메시지 경계 보존)
//! - 타임아웃은 전송 계층이 아니라 채널이 적용

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::UdpSocket;

/// 전송 계층 I/O future (채널 제네릭 경계를 단순하게 유지하기 위해 박싱)
pub type IoFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

fn boxed<'a, T, F>(fut: F) -> IoFuture<'a, T>
where
    F: Future<Output = io::Result<T>> + Send + 'a,
{
    Box::pin(fut)
}

/// 비동기 데이터그램 소켓
pub trait Transport: Send + Sync + 'static {
    /// 데이터그램 하나 송신, 보낸 바이트 수 반환
    fn send_to<'a>(&'a self, buf: &'a [u8], target: SocketAddr) -> IoFuture<'a, usize>;

    /// 데이터그램 하나 수신
    fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> IoFuture<'a, (usize, SocketAddr)>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Transport for UdpSocket {
    fn send_to<'a>(&'a self, buf: &'a [u8], target: SocketAddr) -> IoFuture<'a, usize> {
        boxed(UdpSocket::send_to(self, buf, target))
    }

    fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> IoFuture<'a, (usize, SocketAddr)> {
        boxed(UdpSocket::recv_from(self, buf))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }
}

/// 같은 소켓을 여러 채널이 공유할 때
impl<T: Transport> Transport for Arc<T> {
    fn send_to<'a>(&'a self, buf: &'a [u8], target: SocketAddr) -> IoFuture<'a, usize> {
        T::send_to(self, buf, target)
    }

    fn recv_from<'a>(&'a self, buf: &'a mut [u8]) -> IoFuture<'a, (usize, SocketAddr)> {
        T::recv_from(self, buf)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        T::local_addr(self)
    }
}
