#[ntex::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    field_guard::guard_entrypoint().await
}
