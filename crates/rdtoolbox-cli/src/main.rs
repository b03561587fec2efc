use std::process;

#[tokio::main]
async fn main() {
    let code = rdtoolbox_cli::run().await;
    process::exit(code);
}
