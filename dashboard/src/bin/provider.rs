use common::types::user::UserRole;

#[actix::main]
async fn main() -> std::io::Result<()> {
    dashboard::dashboard::start(UserRole::Provider).await
}
