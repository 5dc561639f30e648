use crate::messages::internal_messages::{
    ExpireCheckout, IsGatewayConnected, QuerySession, SettlePayment, StartCheckout,
};
use crate::server_actors::storage::Storage;
use actix::prelude::*;
use colored::Color;
use common::constants::{GATEWAY_REPLY_TIMEOUT, TIMEOUT_SECONDS};
use common::logger::Logger;
use common::messages::payment_messages::{
    CheckoutCreated, ExpireSession, GetSession, SessionCompleted, SessionStatus,
};
use common::messages::shared_messages::NetworkMessage;
use common::network::communicator::Communicator;
use common::network::connections::connect_with_retry;
use futures_channel::oneshot;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpStream, lookup_host};
use uuid::Uuid;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("not connected to the payment gateway")]
    Unavailable,
    #[error("the payment gateway did not answer in time")]
    Timeout,
    #[error("{0}")]
    Rejected(String),
}

type Reply<T> = oneshot::Sender<Result<T, GatewayError>>;

/// Backend side of the payment gateway link.
///
/// Requests are written to the gateway socket and parked until the matching
/// reply comes back: checkouts are matched by payment id, lookups by session
/// id. Completion events pushed by the gateway are applied to [`Storage`].
///
/// # Responsibilities
/// - Connects to the gateway and reconnects after the link drops.
/// - Opens checkout sessions and looks up their status.
/// - Expires the session of a cancelled booking.
/// - Fails every parked request with `Unavailable` when the link is lost.
pub struct PaymentService {
    /// `host:port` of the gateway.
    gateway_addr: String,
    /// Connection attempts per round before backing off.
    connect_attempts: usize,
    /// How long a parked request waits for its reply.
    reply_timeout: Duration,
    /// Live link to the gateway, if any.
    communicator: Option<Communicator<PaymentService>>,
    /// A connection round is running.
    connecting: bool,
    /// Checkouts waiting for `CheckoutCreated`, by payment id.
    pending_checkouts: HashMap<Uuid, Reply<CheckoutCreated>>,
    /// Lookups waiting for `SessionStatus`, by session id.
    pending_lookups: HashMap<String, Vec<Reply<SessionStatus>>>,
    /// Where completed payments are settled.
    storage: Addr<Storage>,
    /// Logger for gateway events.
    logger: Logger,
}

impl PaymentService {
    /// Creates a `PaymentService`; it starts connecting once started.
    ///
    /// # Arguments
    /// * `gateway_addr` - Address of the payment gateway.
    /// * `connect_attempts` - Attempts per connection round, at least one.
    /// * `storage` - The `Storage` actor that receives payment outcomes.
    pub fn new(gateway_addr: String, connect_attempts: usize, storage: Addr<Storage>) -> Self {
        Self {
            gateway_addr,
            connect_attempts: connect_attempts.max(1),
            reply_timeout: GATEWAY_REPLY_TIMEOUT,
            communicator: None,
            connecting: false,
            pending_checkouts: HashMap::new(),
            pending_lookups: HashMap::new(),
            storage,
            logger: Logger::new("Payment Service", Color::Yellow),
        }
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    fn connect(&mut self, ctx: &mut Context<Self>) {
        if self.connecting || self.communicator.is_some() {
            return;
        }
        self.connecting = true;

        let gateway_addr = self.gateway_addr.clone();
        let attempts = self.connect_attempts;
        let logger = self.logger.clone();
        let fut = async move {
            let addr = resolve(&gateway_addr).await?;
            let stream =
                connect_with_retry(addr, attempts, Duration::from_secs(TIMEOUT_SECONDS), &logger)
                    .await?;
            Some((stream, addr))
        }
        .into_actor(self)
        .map(|connected: Option<(TcpStream, SocketAddr)>, act, ctx| {
            act.connecting = false;
            match connected {
                Some((stream, addr)) => {
                    act.communicator = Some(Communicator::new(stream, addr, ctx.address()));
                }
                None => {
                    act.logger.error(format!(
                        "Payment gateway at {} unreachable; retrying in {:?}",
                        act.gateway_addr, RECONNECT_DELAY
                    ));
                    ctx.run_later(RECONNECT_DELAY, |act, ctx| act.connect(ctx));
                }
            }
        });
        ctx.spawn(fut);
    }

    /// Drops the link, fails parked requests and schedules a reconnect.
    fn disconnected(&mut self, ctx: &mut Context<Self>) {
        if let Some(communicator) = self.communicator.take() {
            communicator.shutdown();
        }
        for (_, reply) in self.pending_checkouts.drain() {
            let _ = reply.send(Err(GatewayError::Unavailable));
        }
        for (_, replies) in self.pending_lookups.drain() {
            for reply in replies {
                let _ = reply.send(Err(GatewayError::Unavailable));
            }
        }
        ctx.run_later(RECONNECT_DELAY, |act, ctx| act.connect(ctx));
    }

    /// Forwards a gateway outcome to `Storage`.
    fn apply_completion(&mut self, done: SessionCompleted, ctx: &mut Context<Self>) {
        let fut = self
            .storage
            .send(SettlePayment {
                payment_id: done.payment_id,
                session_id: Some(done.session_id),
                paid: done.paid,
                payment_intent_id: done.payment_intent_id,
                payment_method: done.payment_method,
            })
            .into_actor(self)
            .map(|res, act, _ctx| match res {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => act.logger.warn(format!("Ignoring gateway completion: {e}")),
                Err(e) => act.logger.error(format!("Storage unavailable: {e}")),
            });
        ctx.spawn(fut);
    }
}

async fn resolve(addr: &str) -> Option<SocketAddr> {
    lookup_host(addr).await.ok()?.next()
}

/// Waits for a parked reply, giving up after `limit`.
async fn await_reply<T>(
    rx: oneshot::Receiver<Result<T, GatewayError>>,
    limit: Duration,
) -> Result<T, GatewayError> {
    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_canceled)) => Err(GatewayError::Unavailable),
        Err(_elapsed) => Err(GatewayError::Timeout),
    }
}

impl Actor for PaymentService {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.connect(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(communicator) = self.communicator.take() {
            communicator.shutdown();
        }
    }
}

impl Handler<StartCheckout> for PaymentService {
    type Result = ResponseActFuture<Self, Result<CheckoutCreated, GatewayError>>;

    fn handle(&mut self, msg: StartCheckout, ctx: &mut Self::Context) -> Self::Result {
        let Some(communicator) = &self.communicator else {
            self.connect(ctx);
            return Box::pin(actix::fut::ready(Err(GatewayError::Unavailable)));
        };

        let payment_id = msg.0.payment_id;
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.pending_checkouts.insert(payment_id, tx) {
            let _ = previous.send(Err(GatewayError::Rejected(
                "Superseded by a newer checkout".to_string(),
            )));
        }
        communicator.send(NetworkMessage::CreateCheckout(msg.0));

        Box::pin(
            await_reply(rx, self.reply_timeout)
                .into_actor(self)
                .map(move |result, act, _ctx| {
                    if result == Err(GatewayError::Timeout) {
                        act.pending_checkouts.remove(&payment_id);
                        act.logger
                            .warn(format!("Checkout for payment {payment_id} timed out"));
                    }
                    result
                }),
        )
    }
}

impl Handler<QuerySession> for PaymentService {
    type Result = ResponseActFuture<Self, Result<SessionStatus, GatewayError>>;

    fn handle(&mut self, msg: QuerySession, ctx: &mut Self::Context) -> Self::Result {
        let Some(communicator) = &self.communicator else {
            self.connect(ctx);
            return Box::pin(actix::fut::ready(Err(GatewayError::Unavailable)));
        };

        let (tx, rx) = oneshot::channel();
        let waiting = self.pending_lookups.entry(msg.session_id.clone()).or_default();
        waiting.push(tx);
        if waiting.len() == 1 {
            communicator.send(NetworkMessage::GetSession(GetSession {
                session_id: msg.session_id.clone(),
            }));
        }

        let session_id = msg.session_id;
        Box::pin(
            await_reply(rx, self.reply_timeout)
                .into_actor(self)
                .map(move |result, act, _ctx| {
                    if result == Err(GatewayError::Timeout) {
                        act.pending_lookups.remove(&session_id);
                    }
                    result
                }),
        )
    }
}

impl Handler<ExpireCheckout> for PaymentService {
    type Result = ();

    fn handle(&mut self, msg: ExpireCheckout, _ctx: &mut Self::Context) {
        match &self.communicator {
            Some(communicator) => {
                self.logger
                    .info(format!("Expiring checkout session {}", msg.session_id));
                communicator.send(NetworkMessage::ExpireSession(ExpireSession {
                    session_id: msg.session_id,
                }));
            }
            None => self.logger.warn(format!(
                "Cannot expire session {}: gateway not connected",
                msg.session_id
            )),
        }
    }
}

impl Handler<IsGatewayConnected> for PaymentService {
    type Result = bool;

    fn handle(&mut self, _msg: IsGatewayConnected, _ctx: &mut Self::Context) -> bool {
        self.communicator.is_some()
    }
}

impl Handler<NetworkMessage> for PaymentService {
    type Result = ();

    fn handle(&mut self, msg: NetworkMessage, ctx: &mut Self::Context) {
        match msg {
            NetworkMessage::CheckoutCreated(created) => {
                match self.pending_checkouts.remove(&created.payment_id) {
                    Some(reply) => {
                        let _ = reply.send(Ok(created));
                    }
                    None => self.logger.warn(format!(
                        "Checkout reply for unknown payment {}",
                        created.payment_id
                    )),
                }
            }
            NetworkMessage::CheckoutFailed(failed) => {
                self.logger.warn(format!(
                    "Gateway refused payment {}: {}",
                    failed.payment_id, failed.reason
                ));
                if let Some(reply) = self.pending_checkouts.remove(&failed.payment_id) {
                    let _ = reply.send(Err(GatewayError::Rejected(failed.reason)));
                }
            }
            NetworkMessage::SessionStatus(status) => {
                for reply in self
                    .pending_lookups
                    .remove(&status.session_id)
                    .unwrap_or_default()
                {
                    let _ = reply.send(Ok(status.clone()));
                }
            }
            NetworkMessage::SessionCompleted(done) => {
                self.logger.info(format!(
                    "Session {} completed (paid: {})",
                    done.session_id, done.paid
                ));
                self.apply_completion(done, ctx);
            }
            NetworkMessage::ConnectionClosed(closed) => {
                self.logger.warn(format!(
                    "Lost connection to the payment gateway at {}",
                    closed.remote_addr
                ));
                self.disconnected(ctx);
            }
            other => {
                self.logger
                    .warn(format!("Unexpected message from gateway: {other:?}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::internal_messages::{
        AttachSession, CreateBooking, CreateUser, GetPayment, PrepareCheckout,
    };
    use chrono::Utc;
    use common::constants::KEY_LEN;
    use common::crypto::PayloadCipher;
    use common::messages::payment_messages::{CreateCheckout, GatewaySessionStatus};
    use common::types::booking::{CreateBookingRequest, ServiceType};
    use common::types::payment::to_minor_units;
    use common::types::payment_status::PaymentStatus;
    use common::types::user::{RegisterRequest, UserRole};
    use ntest::timeout;
    use payment::payment::PaymentGateway;
    use payment::payment_acceptor::PaymentAcceptor;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn storage() -> Addr<Storage> {
        Storage::new(Arc::new(PayloadCipher::from_key([5u8; KEY_LEN]))).start()
    }

    async fn start_gateway(success_probability: f32, settle_millis: u64) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let gateway = PaymentGateway::new(
            success_probability,
            Duration::from_millis(settle_millis),
            "http://checkout.test".to_string(),
        )
        .start();
        PaymentAcceptor::new(listener, gateway).start();
        addr.to_string()
    }

    async fn wait_connected(service: &Addr<PaymentService>) {
        while !service.send(IsGatewayConnected).await.unwrap() {
            actix_rt::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn checkout(payment_id: Uuid, amount: u64, currency: &str) -> CreateCheckout {
        CreateCheckout {
            payment_id,
            booking_id: Uuid::new_v4(),
            amount,
            currency: currency.to_string(),
            description: "Plumbing booking".to_string(),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        }
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn unreachable_gateway_reports_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let service = PaymentService::new(addr, 1, storage()).start();
        let result = service
            .send(StartCheckout(checkout(Uuid::new_v4(), 1000, "USD")))
            .await
            .unwrap();
        assert_eq!(result, Err(GatewayError::Unavailable));
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn silent_gateway_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let held = actix_rt::spawn(async move { listener.accept().await });

        let service = PaymentService::new(addr, 1, storage())
            .with_reply_timeout(Duration::from_millis(100))
            .start();
        wait_connected(&service).await;

        let result = service
            .send(StartCheckout(checkout(Uuid::new_v4(), 1000, "USD")))
            .await
            .unwrap();
        assert_eq!(result, Err(GatewayError::Timeout));
        drop(held);
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn rejected_checkouts_carry_the_reason() {
        let addr = start_gateway(1.0, 5_000).await;
        let service = PaymentService::new(addr, 3, storage()).start();
        wait_connected(&service).await;

        let result = service
            .send(StartCheckout(checkout(Uuid::new_v4(), 1000, "XYZ")))
            .await
            .unwrap();
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
    }

    #[actix_rt::test]
    #[timeout(10000)]
    async fn open_sessions_can_be_queried() {
        let addr = start_gateway(1.0, 5_000).await;
        let service = PaymentService::new(addr, 3, storage()).start();
        wait_connected(&service).await;

        let created = service
            .send(StartCheckout(checkout(Uuid::new_v4(), 2500, "USD")))
            .await
            .unwrap()
            .unwrap();
        let status = service
            .send(QuerySession {
                session_id: created.session_id.clone(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, GatewaySessionStatus::Open);
        assert_eq!(status.amount, 2500);
    }

    #[actix_rt::test]
    #[timeout(15000)]
    async fn completed_sessions_mark_the_payment_paid() {
        let addr = start_gateway(1.0, 300).await;
        let storage = storage();
        let service = PaymentService::new(addr, 3, storage.clone()).start();
        wait_connected(&service).await;

        let customer = storage
            .send(CreateUser {
                request: RegisterRequest {
                    email: "ana@example.com".into(),
                    username: "ana".into(),
                    password: "unused".into(),
                    password_confirm: "unused".into(),
                    first_name: "Ana".into(),
                    last_name: "Lopez".into(),
                    role: UserRole::Customer,
                    city: None,
                    vaccinated: true,
                    consent: true,
                },
                password_hash: "hash".into(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap()
            .unwrap()
            .id;
        let booking = storage
            .send(CreateBooking {
                user_id: customer,
                request: CreateBookingRequest {
                    service_type: ServiceType::Cleaning,
                    budget: Some(150.0),
                    address: "1 Rundle Mall".into(),
                    phone: "0400 111 222".into(),
                    city: "Adelaide".into(),
                    state: Some("SA".into()),
                    country: Some("AU".into()),
                    start_time: Utc::now() + chrono::Duration::days(1),
                    duration_hours: Some(4),
                    notes: None,
                },
            })
            .await
            .unwrap()
            .unwrap();
        let draft = storage
            .send(PrepareCheckout {
                booking_id: booking.id,
                user_id: customer,
            })
            .await
            .unwrap()
            .unwrap();

        let mut request = checkout(draft.payment_id, to_minor_units(draft.amount), &draft.currency);
        request.booking_id = booking.id;
        let created = service.send(StartCheckout(request)).await.unwrap().unwrap();
        storage
            .send(AttachSession {
                payment_id: draft.payment_id,
                session_id: created.session_id,
            })
            .await
            .unwrap()
            .unwrap();

        loop {
            let payment = storage
                .send(GetPayment {
                    payment_id: draft.payment_id,
                    user_id: customer,
                })
                .await
                .unwrap()
                .unwrap();
            if payment.status == PaymentStatus::Paid {
                assert!(payment.payment_intent_id.is_some());
                break;
            }
            actix_rt::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
