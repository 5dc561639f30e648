use actix::prelude::*;
use colored::Color;
use common::constants::SUPPORTED_CURRENCIES;
use common::logger::Logger;
use common::messages::payment_messages::*;
use common::messages::shared_messages::NetworkMessage;
use common::utils::random_bool_by_given_probability;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// A checkout session opened on behalf of the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub amount: u64,
    pub currency: String,
    pub status: GatewaySessionStatus,
    pub payment_intent_id: Option<String>,
}

impl CheckoutSession {
    fn to_status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session_id.clone(),
            payment_id: Some(self.payment_id),
            status: self.status,
            amount: self.amount,
            currency: self.currency.clone(),
            payment_intent_id: self.payment_intent_id.clone(),
        }
    }
}

/// The `PaymentGateway` actor simulates a hosted card checkout.
///
/// Sessions settle on their own after `settle_delay`: the customer "pays" with
/// probability `success_probability` and every subscribed connection is told
/// the outcome with a `SessionCompleted` message.
pub struct PaymentGateway {
    sessions: HashMap<String, CheckoutSession>,
    timers: HashMap<String, SpawnHandle>,
    subscribers: HashMap<SocketAddr, Recipient<NetworkMessage>>,
    success_probability: f32,
    settle_delay: Duration,
    checkout_base_url: String,
    logger: Logger,
}

impl PaymentGateway {
    pub fn new(success_probability: f32, settle_delay: Duration, checkout_base_url: String) -> Self {
        Self {
            sessions: HashMap::new(),
            timers: HashMap::new(),
            subscribers: HashMap::new(),
            success_probability,
            settle_delay,
            checkout_base_url,
            logger: Logger::new("Payment Gateway", Color::Green),
        }
    }

    fn validate(request: &CreateCheckout) -> Result<(), String> {
        if request.amount == 0 {
            return Err("Amount must be greater than zero".to_string());
        }
        let currency = request.currency.to_uppercase();
        if !SUPPORTED_CURRENCIES.contains(&currency.as_str()) {
            return Err(format!("Unsupported currency '{}'", request.currency));
        }
        Ok(())
    }

    /// Voids any open session for the same payment so only the newest one settles.
    fn supersede_open_sessions(&mut self, payment_id: Uuid, ctx: &mut Context<Self>) {
        let stale: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.payment_id == payment_id && s.status == GatewaySessionStatus::Open)
            .map(|s| s.session_id.clone())
            .collect();
        for session_id in stale {
            self.expire(&session_id, ctx);
        }
    }

    fn expire(&mut self, session_id: &str, ctx: &mut Context<Self>) -> bool {
        if let Some(handle) = self.timers.remove(session_id) {
            ctx.cancel_future(handle);
        }
        match self.sessions.get_mut(session_id) {
            Some(session) if session.status == GatewaySessionStatus::Open => {
                session.status = GatewaySessionStatus::Expired;
                self.logger.info(format!("Session {session_id} expired"));
                true
            }
            _ => false,
        }
    }

    fn settle(&mut self, session_id: &str) {
        self.timers.remove(session_id);
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        if session.status != GatewaySessionStatus::Open {
            return;
        }

        let paid = random_bool_by_given_probability(self.success_probability);
        if paid {
            session.status = GatewaySessionStatus::Paid;
            session.payment_intent_id = Some(format!("pi_{}", Uuid::new_v4().simple()));
        } else {
            session.status = GatewaySessionStatus::Failed;
        }
        self.logger.info(format!(
            "Session {} for payment {} settled: {}",
            session.session_id, session.payment_id, session.status
        ));

        let completed = NetworkMessage::SessionCompleted(SessionCompleted {
            payment_id: session.payment_id,
            session_id: session.session_id.clone(),
            paid,
            payment_intent_id: session.payment_intent_id.clone(),
            payment_method: paid.then(|| "card".to_string()),
        });
        for subscriber in self.subscribers.values() {
            subscriber.do_send(completed.clone());
        }
    }
}

impl Actor for PaymentGateway {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        self.logger.info(format!(
            "Gateway ready (success probability {:.2}, settle delay {:?})",
            self.success_probability, self.settle_delay
        ));
    }
}

#[derive(Message)]
#[rtype(result = "Result<CheckoutCreated, CheckoutFailed>")]
pub struct OpenSession(pub CreateCheckout);

#[derive(Message)]
#[rtype(result = "Option<SessionStatus>")]
pub struct LookupSession(pub String);

#[derive(Message)]
#[rtype(result = "bool")]
pub struct VoidSession(pub String);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub remote_addr: SocketAddr,
    pub recipient: Recipient<NetworkMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub remote_addr: SocketAddr,
}

impl Handler<OpenSession> for PaymentGateway {
    type Result = Result<CheckoutCreated, CheckoutFailed>;

    fn handle(&mut self, msg: OpenSession, ctx: &mut Self::Context) -> Self::Result {
        let request = msg.0;
        if let Err(reason) = Self::validate(&request) {
            self.logger.warn(format!(
                "Rejected checkout for payment {}: {reason}",
                request.payment_id
            ));
            return Err(CheckoutFailed {
                payment_id: request.payment_id,
                reason,
            });
        }

        self.supersede_open_sessions(request.payment_id, ctx);

        let session_id = format!("cs_{}", Uuid::new_v4().simple());
        let checkout_url = format!(
            "{}/{}",
            self.checkout_base_url.trim_end_matches('/'),
            session_id
        );
        self.sessions.insert(
            session_id.clone(),
            CheckoutSession {
                session_id: session_id.clone(),
                payment_id: request.payment_id,
                booking_id: request.booking_id,
                amount: request.amount,
                currency: request.currency.to_uppercase(),
                status: GatewaySessionStatus::Open,
                payment_intent_id: None,
            },
        );

        let settle_id = session_id.clone();
        let handle = ctx.run_later(self.settle_delay, move |act, _ctx| {
            act.settle(&settle_id);
        });
        self.timers.insert(session_id.clone(), handle);

        self.logger.info(format!(
            "Opened session {session_id} for payment {} ({} {}): {}",
            request.payment_id, request.amount, request.currency, request.description
        ));
        Ok(CheckoutCreated {
            payment_id: request.payment_id,
            session_id,
            checkout_url,
        })
    }
}

impl Handler<LookupSession> for PaymentGateway {
    type Result = Option<SessionStatus>;

    fn handle(&mut self, msg: LookupSession, _ctx: &mut Self::Context) -> Self::Result {
        self.sessions.get(&msg.0).map(CheckoutSession::to_status)
    }
}

impl Handler<VoidSession> for PaymentGateway {
    type Result = bool;

    fn handle(&mut self, msg: VoidSession, ctx: &mut Self::Context) -> Self::Result {
        self.expire(&msg.0, ctx)
    }
}

impl Handler<Subscribe> for PaymentGateway {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) {
        self.logger
            .info(format!("Backend connected from {}", msg.remote_addr));
        self.subscribers.insert(msg.remote_addr, msg.recipient);
    }
}

impl Handler<Unsubscribe> for PaymentGateway {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Self::Context) {
        if self.subscribers.remove(&msg.remote_addr).is_some() {
            self.logger
                .info(format!("Backend {} disconnected", msg.remote_addr));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Listener {
        received: Vec<NetworkMessage>,
    }

    impl Actor for Listener {
        type Context = Context<Self>;
    }

    impl Handler<NetworkMessage> for Listener {
        type Result = ();

        fn handle(&mut self, msg: NetworkMessage, _ctx: &mut Self::Context) {
            self.received.push(msg);
        }
    }

    #[derive(Message)]
    #[rtype(result = "Vec<NetworkMessage>")]
    struct Received;

    impl Handler<Received> for Listener {
        type Result = MessageResult<Received>;

        fn handle(&mut self, _msg: Received, _ctx: &mut Self::Context) -> Self::Result {
            MessageResult(self.received.clone())
        }
    }

    fn checkout(amount: u64, currency: &str) -> CreateCheckout {
        CreateCheckout {
            payment_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            amount,
            currency: currency.to_string(),
            description: "House Cleaning".to_string(),
            success_url: "http://localhost:3000/payments/success".to_string(),
            cancel_url: "http://localhost:3000/payments/cancel".to_string(),
        }
    }

    fn gateway(probability: f32, settle_millis: u64) -> Addr<PaymentGateway> {
        PaymentGateway::new(
            probability,
            Duration::from_millis(settle_millis),
            "http://gateway.test/checkout/".to_string(),
        )
        .start()
    }

    async fn subscribe(gateway: &Addr<PaymentGateway>) -> Addr<Listener> {
        let listener = Listener::default().start();
        gateway
            .send(Subscribe {
                remote_addr: "127.0.0.1:40000".parse().unwrap(),
                recipient: listener.clone().recipient(),
            })
            .await
            .unwrap();
        listener
    }

    #[actix_rt::test]
    async fn opens_an_open_session_with_a_checkout_url() {
        let gateway = gateway(1.0, 10_000);
        let created = gateway
            .send(OpenSession(checkout(15_000, "usd")))
            .await
            .unwrap()
            .unwrap();

        assert!(created.session_id.starts_with("cs_"));
        assert_eq!(
            created.checkout_url,
            format!("http://gateway.test/checkout/{}", created.session_id)
        );

        let status = gateway
            .send(LookupSession(created.session_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, GatewaySessionStatus::Open);
        assert_eq!(status.currency, "USD");
    }

    #[actix_rt::test]
    async fn rejects_zero_amounts_and_unknown_currencies() {
        let gateway = gateway(1.0, 10_000);
        let zero = gateway.send(OpenSession(checkout(0, "USD"))).await.unwrap();
        assert!(zero.unwrap_err().reason.contains("greater than zero"));

        let yen = gateway.send(OpenSession(checkout(500, "JPY"))).await.unwrap();
        assert!(yen.unwrap_err().reason.contains("JPY"));
    }

    #[actix_rt::test]
    async fn successful_sessions_notify_subscribers() {
        let gateway = gateway(1.0, 20);
        let listener = subscribe(&gateway).await;
        let request = checkout(8_000, "USD");
        let payment_id = request.payment_id;
        let created = gateway.send(OpenSession(request)).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let received = listener.send(Received).await.unwrap();
        assert_eq!(received.len(), 1);
        match &received[0] {
            NetworkMessage::SessionCompleted(done) => {
                assert!(done.paid);
                assert_eq!(done.payment_id, payment_id);
                assert_eq!(done.session_id, created.session_id);
                assert!(done.payment_intent_id.as_deref().unwrap().starts_with("pi_"));
            }
            other => panic!("unexpected message {other:?}"),
        }
        let status = gateway
            .send(LookupSession(created.session_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, GatewaySessionStatus::Paid);
    }

    #[actix_rt::test]
    async fn declined_sessions_report_failure() {
        let gateway = gateway(0.0, 20);
        let listener = subscribe(&gateway).await;
        let created = gateway
            .send(OpenSession(checkout(8_000, "USD")))
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let received = listener.send(Received).await.unwrap();
        assert!(matches!(
            &received[..],
            [NetworkMessage::SessionCompleted(SessionCompleted { paid: false, .. })]
        ));
        let status = gateway
            .send(LookupSession(created.session_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, GatewaySessionStatus::Failed);
    }

    #[actix_rt::test]
    async fn voided_sessions_never_settle() {
        let gateway = gateway(1.0, 50);
        let listener = subscribe(&gateway).await;
        let created = gateway
            .send(OpenSession(checkout(8_000, "USD")))
            .await
            .unwrap()
            .unwrap();

        assert!(
            gateway
                .send(VoidSession(created.session_id.clone()))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(listener.send(Received).await.unwrap().is_empty());
        let status = gateway
            .send(LookupSession(created.session_id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, GatewaySessionStatus::Expired);
        assert!(!gateway.send(VoidSession(created.session_id)).await.unwrap());
    }

    #[actix_rt::test]
    async fn a_new_checkout_supersedes_the_open_one() {
        let gateway = gateway(1.0, 10_000);
        let first_request = checkout(8_000, "USD");
        let mut second_request = checkout(9_000, "USD");
        second_request.payment_id = first_request.payment_id;

        let first = gateway
            .send(OpenSession(first_request))
            .await
            .unwrap()
            .unwrap();
        gateway
            .send(OpenSession(second_request))
            .await
            .unwrap()
            .unwrap();

        let status = gateway
            .send(LookupSession(first.session_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.status, GatewaySessionStatus::Expired);
    }
}
