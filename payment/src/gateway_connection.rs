use crate::payment::{
    LookupSession, OpenSession, PaymentGateway, Subscribe, Unsubscribe, VoidSession,
};
use actix::prelude::*;
use colored::Color;
use common::logger::Logger;
use common::messages::payment_messages::{GatewaySessionStatus, SessionStatus};
use common::messages::shared_messages::NetworkMessage;
use common::network::communicator::Communicator;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// One backend connection. Decodes requests, asks the [`PaymentGateway`] and
/// writes the answer back on the same socket.
pub struct GatewayConnection {
    remote_addr: SocketAddr,
    communicator: Communicator<GatewayConnection>,
    gateway: Addr<PaymentGateway>,
    logger: Logger,
}

impl GatewayConnection {
    pub fn spawn(
        stream: TcpStream,
        remote_addr: SocketAddr,
        gateway: Addr<PaymentGateway>,
    ) -> Addr<Self> {
        GatewayConnection::create(|ctx| {
            let communicator = Communicator::new(stream, remote_addr, ctx.address());
            GatewayConnection {
                remote_addr,
                communicator,
                gateway,
                logger: Logger::new(format!("Gateway Conn {remote_addr}"), Color::Green),
            }
        })
    }

    fn reply_with<M, F>(&self, request: M, ctx: &mut Context<Self>, to_message: F)
    where
        M: Message + Send + 'static,
        M::Result: Send,
        PaymentGateway: Handler<M>,
        F: FnOnce(M::Result) -> NetworkMessage + 'static,
    {
        let fut = self
            .gateway
            .send(request)
            .into_actor(self)
            .map(move |res, act, _ctx| match res {
                Ok(result) => act.communicator.send(to_message(result)),
                Err(e) => act.logger.error(format!("Gateway unavailable: {e}")),
            });
        ctx.spawn(fut);
    }
}

impl Actor for GatewayConnection {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.logger.info("Connection established");
        self.gateway.do_send(Subscribe {
            remote_addr: self.remote_addr,
            recipient: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.gateway.do_send(Unsubscribe {
            remote_addr: self.remote_addr,
        });
        self.communicator.shutdown();
    }
}

impl Handler<NetworkMessage> for GatewayConnection {
    type Result = ();

    fn handle(&mut self, msg: NetworkMessage, ctx: &mut Self::Context) {
        match msg {
            NetworkMessage::CreateCheckout(request) => {
                self.logger.debug(format!(
                    "Checkout requested for payment {}",
                    request.payment_id
                ));
                self.reply_with(OpenSession(request), ctx, |result| match result {
                    Ok(created) => NetworkMessage::CheckoutCreated(created),
                    Err(failed) => NetworkMessage::CheckoutFailed(failed),
                });
            }
            NetworkMessage::GetSession(query) => {
                let session_id = query.session_id.clone();
                self.reply_with(LookupSession(query.session_id), ctx, move |found| {
                    NetworkMessage::SessionStatus(found.unwrap_or(SessionStatus {
                        session_id,
                        payment_id: None,
                        status: GatewaySessionStatus::Expired,
                        amount: 0,
                        currency: String::new(),
                        payment_intent_id: None,
                    }))
                });
            }
            NetworkMessage::ExpireSession(expire) => {
                self.gateway.do_send(VoidSession(expire.session_id));
            }
            NetworkMessage::SessionCompleted(done) => {
                self.communicator
                    .send(NetworkMessage::SessionCompleted(done));
            }
            NetworkMessage::ConnectionClosed(_) => {
                self.logger.info("Backend closed the connection");
                ctx.stop();
            }
            other => {
                self.logger
                    .warn(format!("Ignoring unexpected message: {other:?}"));
            }
        }
    }
}
