use aviatrix::AviatrixProvider;
use std::env;
use tfplug::grpc::ProviderServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries the go-plugin handshake, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let exe_dir = env::current_exe()?
        .parent()
        .ok_or("executable has no parent directory")?
        .to_path_buf();
    let cert_path = exe_dir.join("../../certs/localhost+2.pem");
    let key_path = exe_dir.join("../../certs/localhost+2-key.pem");

    let provider = AviatrixProvider::new();
    let mut server = ProviderServer::new(provider);
    // Plaintext unless a local certificate pair is present.
    if cert_path.is_file() && key_path.is_file() {
        server = server.with_tls(cert_path, key_path);
    }

    server.run().await?;

    Ok(())
}
