//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire config, logging, storage and the category resource end to end.
//! - Print deterministic JSON views for quick local sanity checks.

use log::info;
use recordkit_core::resource::category::{category_schema, CategoryController};
use recordkit_core::{
    init_logging, open_db, open_db_in_memory, ActionContext, DocumentRepository, EngineConfig,
    Principal, RequestContext, SqliteDocumentStore,
};
use serde_json::json;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("recordkit error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::from_env()?;
    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("recordkit warning: logging disabled: {err}");
    }

    println!("recordkit_core ping={}", recordkit_core::ping());
    println!("recordkit_core version={}", recordkit_core::core_version());

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let repo = DocumentRepository::new(SqliteDocumentStore::try_new(&conn, category_schema())?);
    let controller = CategoryController::new(&repo);
    let principal = Principal::new("cli", "recordkit-cli");
    let request = |action: &str, path: &str| {
        RequestContext::new(principal.clone(), ActionContext::new(action, path))
    };

    let body = json!({
        "name": format!("Smoke {}", unique_suffix()),
        "products": [{"name": "Sample", "quantity": 1}],
    });
    let created = controller.add(&body, &request("POST", "/api/v1/category/add"))?;
    let category_id = created.id.to_string();
    info!("event=cli_smoke module=cli status=ok step=add");

    let product_id = created
        .products
        .first()
        .map(|product| product.id.to_string())
        .ok_or("created category has no products")?;
    controller.toggle_product(
        &category_id,
        &product_id,
        &request("PUT", "/api/v1/category/product/toggle-isactive"),
    )?;

    let page = controller.list(Some("1"), Some("10"), None)?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn unique_suffix() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().to_string())
        .unwrap_or_default()
}
