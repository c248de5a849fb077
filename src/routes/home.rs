// routes/home.rs
// GET / -> plain-text greeting.

pub async fn home() -> &'static str {
    "Welcome to the invoicedesk API!"
}
