use colored::Color;
use common::logger::Logger;
use server::config::Config;
use server::server_acceptor::acceptor::Acceptor;
use server::state::AppState;

#[actix::main]
async fn main() -> std::io::Result<()> {
    let logger = Logger::new("SafeHome", Color::Blue);
    let config = Config::load();
    logger.info(format!(
        "Starting API on {} (gateway at {})",
        config.bind_address(),
        config.gateway_addr
    ));

    let state = AppState::new(config);
    Acceptor::new(state).start().await?;

    logger.info("Bye");
    Ok(())
}
