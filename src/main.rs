//! Gallery Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    gallery_backend::run().await;
}
