use stress_test::{stress_test_editing, stress_test_scaling};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    rt.block_on(async_main());
}

async fn async_main() {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            COLLABORATIVE EDITING STRESS TESTS               ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: a handful of editors
    let stats = stress_test_editing(4, 100, 200).await;
    stats.print();

    // Test 2: a busy room
    let stats = stress_test_editing(10, 300, 1000).await;
    stats.print();

    // Test 3: Scaling analysis
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║          SCALING ANALYSIS (editors per room)               ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    stress_test_scaling(12, 4).await;

    println!("\n✓ All stress tests completed");
}
