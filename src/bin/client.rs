//! RDT 클라이언트 (송신자) - stop-and-wait 신뢰성 전송
//!
//! 사용법:
//!   cargo run --release --bin rdt-client -- [OPTIONS]
//!
//! 예시:
//!   # 기본 전송
//!   cargo run --release --bin rdt-client -- --port 9000 --file data.bin
//!
//!   # 원격 서버, 512B 청크, 0.5초 타임아웃
//!   cargo run --release --bin rdt-client -- -p 9000 -f data.bin --server-ip 192.168.1.100 --chunk-size 512 --timeout 0.5

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::{lookup_host, UdpSocket};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rdt::{Config, Sender, UnreliableChannel};

/// 클라이언트 설정
struct ClientConfig {
    port: Option<u16>,
    file_path: Option<PathBuf>,
    server_ip: String,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: None,
            file_path: None,
            server_ip: "localhost".to_string(),
            config: Config::default(),
        }
    }
}

fn print_help() {
    println!(
        r#"RDT Client - stop-and-wait 신뢰성 전송 송신자

사용법:
  cargo run --release --bin rdt-client -- [OPTIONS]

옵션:
  -p, --port <PORT>        서버 포트 (필수)
  -f, --file <PATH>        전송할 파일 (필수)
  --server-ip <HOST>       서버 주소 (기본: localhost)
  --chunk-size <BYTES>     청크 크기 (기본: 1024)
  --timeout <SECS>         ACK 대기 타임아웃, 초 단위 (기본: 1.0)
  --loss <P>               데이터 손실 확률 0.0 ~ 1.0 (기본: 0.3)
  --corrupt <P>            데이터 비트 플립 확률 0.0 ~ 1.0 (기본: 0.0)
  --max-retries <N>        패킷당 최대 재전송 횟수 (기본: 무제한)
  -h, --help               이 도움말 출력
"#
    );
}

fn parse_args() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--port" | "-p", Some(v)) => {
                config.port = Some(v.parse()?);
                i += 1;
            }
            ("--file" | "-f", Some(v)) => {
                config.file_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--server-ip", Some(v)) => {
                config.server_ip = v.clone();
                i += 1;
            }
            ("--chunk-size", Some(v)) => {
                config.config.chunk_size = v.parse()?;
                i += 1;
            }
            ("--timeout", Some(v)) => {
                let secs: f64 = v.parse()?;
                config.config.timeout_ms = (secs * 1000.0).round() as u64;
                i += 1;
            }
            ("--loss", Some(v)) => {
                config.config.loss_probability = v.parse()?;
                i += 1;
            }
            ("--corrupt", Some(v)) => {
                config.config.corruption_probability = v.parse()?;
                i += 1;
            }
            ("--max-retries", Some(v)) => {
                config.config.max_retries = Some(v.parse()?);
                i += 1;
            }
            ("--help" | "-h", _) => {
                print_help();
                std::process::exit(0);
            }
            (other, _) => return Err(format!("알 수 없는 옵션 또는 값 누락: {}", other).into()),
        }
        i += 1;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args()?;
    let (port, file_path) = match (client_config.port, client_config.file_path) {
        (Some(port), Some(file_path)) => (port, file_path),
        _ => {
            print_help();
            return Err("--port 와 --file 필요".into());
        }
    };
    let config = client_config.config;
    config.validate()?;

    let server_addr: SocketAddr = lookup_host((client_config.server_ip.as_str(), port))
        .await?
        .find(SocketAddr::is_ipv4)
        .ok_or("서버 주소를 찾을 수 없음")?;

    info!("RDT Client starting...");
    info!("Server address: {}", server_addr);

    // UDP 소켓 바인딩 (임시 포트)
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Bound to local address: {}", socket.local_addr()?);

    let channel = UnreliableChannel::from_config(socket, &config)?;
    let mut sender = Sender::from_config(channel, server_addr, &config)?;

    let stats = sender.send_path(&file_path, config.chunk_size).await?;

    info!("{}", stats.summary());

    let channel_stats = sender.channel().stats();
    info!(
        "Data channel: forwarded={}, dropped={}, corrupted={}",
        channel_stats.forwarded, channel_stats.dropped, channel_stats.corrupted
    );

    Ok(())
}
