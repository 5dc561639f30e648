use crate::logger::Logger;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

pub async fn connect(server_addr: SocketAddr) -> Option<TcpStream> {
    TcpStream::connect(server_addr).await.ok()
}

/// Tries `attempts` times, sleeping `delay` between failures.
pub async fn connect_with_retry(
    server_addr: SocketAddr,
    attempts: usize,
    delay: Duration,
    logger: &Logger,
) -> Option<TcpStream> {
    for attempt in 1..=attempts {
        match TcpStream::connect(server_addr).await {
            Ok(stream) => {
                logger.info(format!("Connected to {server_addr}"));
                return Some(stream);
            }
            Err(e) => {
                logger.warn(format!(
                    "Failed to connect to {server_addr} (attempt {attempt}/{attempts}): {e}"
                ));
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    None
}
