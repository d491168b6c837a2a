#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Code pipeline resource server");
    pipeline_server::run_server().await
}
