//! RDT 서버 (수신자) - stop-and-wait 신뢰성 전송
//!
//! 사용법:
//!   cargo run --release --bin rdt-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 수신 (30% 손실)
//!   cargo run --release --bin rdt-server -- --port 9000 --outfile received.bin
//!
//!   # 손실 없는 수신
//!   cargo run --release --bin rdt-server -- -p 9000 -o received.bin --loss 0.0

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rdt::{Config, Receiver, UnreliableChannel};

/// 서버 설정
#[derive(Default)]
struct ServerConfig {
    port: Option<u16>,
    outfile: Option<PathBuf>,
    config: Config,
}

fn print_help() {
    println!(
        r#"RDT Server - stop-and-wait 신뢰성 전송 수신자

사용법:
  cargo run --release --bin rdt-server -- [OPTIONS]

옵션:
  -p, --port <PORT>       수신 포트 (필수)
  -o, --outfile <PATH>    수신 파일 저장 경로 (필수)
  --loss <P>              ACK 손실 확률 0.0 ~ 1.0 (기본: 0.3)
  --corrupt <P>           ACK 비트 플립 확률 0.0 ~ 1.0 (기본: 0.0)
  --linger-ms <MS>        FIN 수락 후 대기 시간 (기본: 2000)
  -h, --help              이 도움말 출력
"#
    );
}

fn parse_args() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--port" | "-p", Some(v)) => {
                config.port = Some(v.parse()?);
                i += 1;
            }
            ("--outfile" | "-o", Some(v)) => {
                config.outfile = Some(PathBuf::from(v));
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
            ("--linger-ms", Some(v)) => {
                config.config.fin_linger_ms = v.parse()?;
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

    let server_config = parse_args()?;
    let (port, outfile) = match (server_config.port, server_config.outfile) {
        (Some(port), Some(outfile)) => (port, outfile),
        _ => {
            print_help();
            return Err("--port 와 --outfile 필요".into());
        }
    };
    let config = server_config.config;
    config.validate()?;

    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = UdpSocket::bind(bind_addr).await?;
    info!("RDT Server started on {}", bind_addr);
    info!("Loss probability: {}", config.loss_probability);

    let channel = UnreliableChannel::from_config(socket, &config)?;
    let sink = tokio::fs::File::create(&outfile).await?;
    let mut receiver = Receiver::from_config(channel, sink, &config)?;

    let stats = receiver.run().await?;

    info!("File saved to {}", outfile.display());
    info!("{}", stats.summary());

    let channel_stats = receiver.channel().stats();
    info!(
        "ACK channel: forwarded={}, dropped={}, corrupted={}",
        channel_stats.forwarded, channel_stats.dropped, channel_stats.corrupted
    );

    Ok(())
}
