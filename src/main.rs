use std::sync::Arc;
use std::sync::atomic::Ordering;

use review_harvest::campaign::CampaignRunner;
use review_harvest::config::Settings;
use review_harvest::provider::{BrowserProvider, MessagingProvider};
use review_harvest::sentiment::SentimentClassifier;
use review_harvest::store::{CustomerStore, LibSqlStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = Settings::from_env();
    for issue in settings.validate() {
        eprintln!("   Warning: {issue}");
    }

    eprintln!("\n{}", "=".repeat(60));
    eprintln!("   Review Harvest — Campaign Runner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("{}\n", "=".repeat(60));

    // ── Store ───────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&settings.db_path);
    let store: Arc<dyn CustomerStore> =
        Arc::new(LibSqlStore::new_local(db_path).await.unwrap_or_else(|e| {
            eprintln!("Error: failed to open database at {}: {e}", settings.db_path);
            std::process::exit(1);
        }));
    eprintln!("   Database: {}", settings.db_path);

    // The campaign is global — pending customers of every user.
    let pending = store.get_pending_customers(None).await?;
    if pending.is_empty() {
        eprintln!("No pending customers. All done!");
        return Ok(());
    }
    eprintln!("   Found {} pending customers\n", pending.len());

    // ── Browser session ─────────────────────────────────────────────────
    eprintln!("Launching WhatsApp Web...");
    eprintln!("   Please scan the QR code with your phone.\n");

    let mut provider = BrowserProvider::new(settings.session.clone());
    if !provider.connect().await {
        eprintln!("Failed to launch browser");
        return Ok(());
    }

    eprintln!("{}", "=".repeat(60));
    eprintln!("SCAN THE QR CODE NOW");
    eprintln!("   Wait for chats to load, then press ENTER");
    eprintln!("{}", "=".repeat(60));
    eprint!("\n>>> Press ENTER when WhatsApp is ready... <<<\n");

    if wait_for_enter().await.is_err() {
        eprintln!("\nCancelled");
        provider.close().await;
        return Ok(());
    }

    if !provider.confirm_login(settings.session.login_timeout).await {
        eprintln!("WhatsApp didn't load. Try again.");
        provider.close().await;
        return Ok(());
    }

    eprintln!("\nWhatsApp ready! Starting campaign...\n");

    // ── Campaign ────────────────────────────────────────────────────────
    let classifier = SentimentClassifier::new(settings.llm.clone());
    let mut runner = CampaignRunner::new(
        provider,
        Arc::clone(&store),
        classifier,
        settings.session.clone(),
        settings.review.clone(),
    );

    // Ctrl-C stops after the in-flight customer completes its current step.
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received — finishing current customer, progress is saved.");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let summary = runner.run(pending).await;
    let mut provider = runner.into_provider();
    provider.close().await;

    // ── Summary ─────────────────────────────────────────────────────────
    eprintln!("\n{}", "=".repeat(60));
    if summary.halted_by_block {
        eprintln!("Campaign HALTED — chat surface block detected.");
        eprintln!("   Stop all messaging and review the account before retrying.");
    } else if summary.cancelled {
        eprintln!("Campaign cancelled. Progress saved.");
    } else {
        eprintln!("Campaign complete!");
    }

    let stats = store.get_stats(None).await?;
    eprintln!(
        "   Processed: {} | Done: {} | No reply: {} | Errors: {} | Positive: {}",
        summary.processed, summary.done, summary.no_reply, summary.errors, summary.positive
    );
    eprintln!(
        "   Database totals — total: {} | done: {} | pending: {} | positive: {}",
        stats.total, stats.done, stats.pending, stats.positive
    );
    eprintln!("{}\n", "=".repeat(60));

    Ok(())
}

/// Block until the operator presses ENTER on stdin.
async fn wait_for_enter() -> std::io::Result<()> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))?
}
