use field_guard_config::FieldGuardConfig;

fn main() {
    let schema = schemars::schema_for!(FieldGuardConfig);

    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            eprintln!("Failed to serialize the configuration schema: {}", err);
            std::process::exit(1);
        }
    }
}
