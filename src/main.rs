#[tokio::main]
async fn main() {
    if let Err(e) = practice_booking::start_server().await {
        eprintln!("practice-booking failed: {e}");
        std::process::exit(1);
    }
}
