use crate::gateway_connection::GatewayConnection;
use crate::payment::PaymentGateway;
use actix::prelude::*;
use colored::Color;
use common::constants::TIMEOUT_SECONDS;
use common::logger::Logger;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Accepts backend connections and spawns a [`GatewayConnection`] for each one.
pub struct PaymentAcceptor {
    listener: Option<TcpListener>,
    payment_gateway_addr: Addr<PaymentGateway>,
    logger: Logger,
}

impl PaymentAcceptor {
    pub fn new(listener: TcpListener, payment_gateway_addr: Addr<PaymentGateway>) -> Self {
        Self {
            listener: Some(listener),
            payment_gateway_addr,
            logger: Logger::new("Payment Acceptor", Color::Green),
        }
    }
}

impl Actor for PaymentAcceptor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let acceptor = ctx.address();
        let logger = self.logger.clone();

        if let Ok(addr) = listener.local_addr() {
            logger.info(format!("Listening for backend connections on {addr}"));
        }

        ctx.spawn(
            async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, remote_addr)) => {
                            acceptor.do_send(HandleConnection {
                                stream,
                                remote_addr,
                            });
                        }
                        Err(e) => {
                            logger.error(format!("Failed to accept connection: {e}"));
                            tokio::time::sleep(Duration::from_secs(TIMEOUT_SECONDS)).await;
                        }
                    }
                }
            }
            .into_actor(self),
        );
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct HandleConnection {
    stream: TcpStream,
    remote_addr: SocketAddr,
}

impl Handler<HandleConnection> for PaymentAcceptor {
    type Result = ();

    fn handle(&mut self, msg: HandleConnection, _ctx: &mut Context<Self>) {
        self.logger
            .info(format!("New connection from {}", msg.remote_addr));
        GatewayConnection::spawn(
            msg.stream,
            msg.remote_addr,
            self.payment_gateway_addr.clone(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::messages::payment_messages::*;
    use common::messages::shared_messages::NetworkMessage;
    use ntest::timeout;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use uuid::Uuid;

    async fn read_message(
        lines: &mut tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    ) -> NetworkMessage {
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .expect("gateway did not answer in time")
            .unwrap()
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn serves_checkouts_over_tcp() {
        let gateway = PaymentGateway::new(
            1.0,
            Duration::from_millis(30),
            "http://gateway.test/checkout".to_string(),
        )
        .start();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        PaymentAcceptor::new(listener, gateway).start();

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let payment_id = Uuid::new_v4();
        let request = NetworkMessage::CreateCheckout(CreateCheckout {
            payment_id,
            booking_id: Uuid::new_v4(),
            amount: 12_000,
            currency: "USD".into(),
            description: "Plumbing Repair".into(),
            success_url: "http://localhost:3000/ok".into(),
            cancel_url: "http://localhost:3000/cancel".into(),
        });
        let mut line = serde_json::to_string(&request).unwrap();
        line.push('\n');
        write_half.write_all(line.as_bytes()).await.unwrap();

        let created = match read_message(&mut lines).await {
            NetworkMessage::CheckoutCreated(created) => created,
            other => panic!("unexpected reply {other:?}"),
        };
        assert_eq!(created.payment_id, payment_id);

        match read_message(&mut lines).await {
            NetworkMessage::SessionCompleted(done) => {
                assert!(done.paid);
                assert_eq!(done.session_id, created.session_id);
            }
            other => panic!("unexpected push {other:?}"),
        }

        let mut query = serde_json::to_string(&NetworkMessage::GetSession(GetSession {
            session_id: "cs_missing".into(),
        }))
        .unwrap();
        query.push('\n');
        write_half.write_all(query.as_bytes()).await.unwrap();

        match read_message(&mut lines).await {
            NetworkMessage::SessionStatus(status) => {
                assert_eq!(status.status, GatewaySessionStatus::Expired);
                assert!(status.payment_id.is_none());
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
