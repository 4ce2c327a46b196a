#[tokio::main]
async fn main() {
    ecosage::start_server().await;
}
