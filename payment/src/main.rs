use actix::prelude::*;
use colored::Color;
use common::logger::Logger;
use payment::payment::PaymentGateway;
use payment::payment_acceptor::PaymentAcceptor;
use payment::settings::GatewaySettings;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;

#[actix::main]
async fn main() -> std::io::Result<()> {
    let logger = Logger::new("Payment", Color::Green);
    let settings = GatewaySettings::load();

    let listener = TcpListener::bind(settings.bind_address()).await?;
    let payment_gateway = PaymentGateway::new(
        settings.success_probability,
        settings.settle_delay,
        settings.checkout_base_url.clone(),
    )
    .start();
    PaymentAcceptor::new(listener, payment_gateway).start();

    ctrl_c().await?;
    logger.info("Ctrl-C received, shutting down");
    System::current().stop();
    Ok(())
}
