mod app;

use app::ReviewApp;
use sm5_review::config::Config;
use sm5_review::database::SqliteStore;
use sm5_review::models::{DifficultyMatrix, ItemVariant};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(SqliteStore::open(&config.database_path())?);

    if store.list_cards()?.is_empty() {
        store.add_card("cześć", "hello", ItemVariant::Sided)?;
        store.add_card("dziękuję", "thank you", ItemVariant::Sided)?;
        store.add_card("{{cloze Proszę}} means please", "", ItemVariant::Cloze)?;

        info!("Sample cards created");
    }

    let matrix_store = config.matrix_store(Arc::clone(&store));
    let matrix = DifficultyMatrix::load_or_empty(matrix_store.as_ref()).into_shared();

    info!("Loaded {} cards", store.list_cards()?.len());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([500.0, 700.0]),
        ..Default::default()
    };
    eframe::run_native(
        "SM-5 Review",
        options,
        Box::new(|_cc| Ok(Box::new(ReviewApp::new(store, matrix, matrix_store, config)))),
    )?;
    Ok(())
}
