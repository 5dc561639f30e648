use crate::logger::Logger;
use crate::messages::shared_messages::{ConnectionClosed, NetworkMessage, Shutdown};
use actix::dev::ToEnvelope;
use actix::prelude::*;
use colored::Color;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, ReadHalf};
use tokio::net::TcpStream;

/// Reads JSON lines from the peer and forwards each decoded
/// [`NetworkMessage`] to `destination`. Sends `ConnectionClosed` at EOF.
pub struct TCPReceiver<A, R = ReadHalf<TcpStream>>
where
    A: Actor + Handler<NetworkMessage>,
    R: AsyncRead + Unpin + 'static,
{
    remote_addr: SocketAddr,
    reader: Option<BufReader<R>>,
    destination: Addr<A>,
    logger: Logger,
}

impl<A, R> TCPReceiver<A, R>
where
    A: Actor + Handler<NetworkMessage>,
    R: AsyncRead + Unpin + 'static,
{
    pub fn new(reader: R, remote_addr: SocketAddr, destination: Addr<A>) -> Self {
        Self {
            remote_addr,
            reader: Some(BufReader::new(reader)),
            destination,
            logger: Logger::new(format!("TCP Receiver {remote_addr}"), Color::BrightBlack),
        }
    }
}

impl<A, R> Actor for TCPReceiver<A, R>
where
    A: Actor + Handler<NetworkMessage> + 'static,
    A::Context: ToEnvelope<A, NetworkMessage>,
    R: AsyncRead + Unpin + 'static,
{
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        let addr = self.destination.clone();
        let remote_addr = self.remote_addr;
        let logger = self.logger.clone();

        ctx.spawn(
            async move {
                let mut lines = reader.lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) if line.trim().is_empty() => continue,
                        Ok(Some(line)) => match serde_json::from_str::<NetworkMessage>(&line) {
                            Ok(msg) => addr.do_send(msg),
                            Err(e) => logger.warn(format!("Skipping undecodable line: {e}")),
                        },
                        Ok(None) => break,
                        Err(e) => {
                            logger.error(format!("Read error: {e}"));
                            break;
                        }
                    }
                }
                logger.debug("Connection closed");
                addr.do_send(NetworkMessage::ConnectionClosed(ConnectionClosed {
                    remote_addr,
                }));
            }
            .into_actor(self),
        );
    }
}

impl<A, R> Handler<Shutdown> for TCPReceiver<A, R>
where
    A: Actor + Handler<NetworkMessage> + 'static,
    A::Context: ToEnvelope<A, NetworkMessage>,
    R: AsyncRead + Unpin + 'static,
{
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, duplex};

    #[derive(Default)]
    struct Collector {
        received: Vec<NetworkMessage>,
    }

    impl Actor for Collector {
        type Context = Context<Self>;
    }

    impl Handler<NetworkMessage> for Collector {
        type Result = ();

        fn handle(&mut self, msg: NetworkMessage, _ctx: &mut Self::Context) {
            self.received.push(msg);
        }
    }

    #[derive(Message)]
    #[rtype(result = "Vec<NetworkMessage>")]
    struct Received;

    impl Handler<Received> for Collector {
        type Result = MessageResult<Received>;

        fn handle(&mut self, _msg: Received, _ctx: &mut Self::Context) -> Self::Result {
            MessageResult(self.received.clone())
        }
    }

    #[actix_rt::test]
    async fn forwards_decoded_lines_then_reports_close() {
        let collector = Collector::default().start();
        let (mut peer, local) = duplex(4096);
        let remote: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        TCPReceiver::new(local, remote, collector.clone()).start();

        peer.write_all(b"{\"type\":\"GetSession\",\"session_id\":\"cs_9\"}\n")
            .await
            .unwrap();
        peer.write_all(b"garbage\n\n").await.unwrap();
        drop(peer);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let received = collector.send(Received).await.unwrap();

        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], NetworkMessage::GetSession(_)));
        assert_eq!(
            received[1],
            NetworkMessage::ConnectionClosed(ConnectionClosed {
                remote_addr: remote
            })
        );
    }
}
