use queuehook::core::error_handling::log_error_with_context;

#[tokio::main]
async fn main() {
    if let Err(e) = queuehook::app::startup::startup().await {
        eprintln!("queuehook: {}", e);
        log_error_with_context(&e, "queuehook startup");
        std::process::exit(1);
    }
}
