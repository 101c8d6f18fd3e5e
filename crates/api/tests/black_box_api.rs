use std::sync::Arc;

use campo_api::app::{self, services::AppServices};
use campo_core::FarmId;
use campo_infra::InMemoryFarmStore;
use campo_resolver::EntityResolver;
use campo_stock::{CategoryDefinition, Lot, Species, StockEntry};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(store: Arc<InMemoryFarmStore>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = AppServices::new(store, EntityResolver::default());
        let app = app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Farm {
    store: Arc<InMemoryFarmStore>,
    farm_id: FarmId,
    norte: Lot,
    sur: Lot,
    module_a: Lot,
    module_b: Lot,
}

/// Farm with two plain lots, one lot name shared by two modules, and three
/// age-banded novillo categories.
fn seeded_farm() -> Farm {
    let store = Arc::new(InMemoryFarmStore::new());
    let farm_id = FarmId::new();

    let norte = Lot::new(farm_id, "Norte");
    let sur = Lot::new(farm_id, "Sur");
    let module_a = Lot::new(farm_id, "Bajo").with_module("Modulo A");
    let module_b = Lot::new(farm_id, "Bajo").with_module("Modulo B");
    for lot in [&norte, &sur, &module_a, &module_b] {
        store.insert_lot(lot.clone()).unwrap();
    }

    for (singular, plural) in [
        ("Vaca", "Vacas"),
        ("Novillo 1–2 años", "Novillos 1–2 años"),
        ("Novillo 2–3 años", "Novillos 2–3 años"),
        ("Novillo +3 años", "Novillos +3 años"),
    ] {
        store.insert_category_definition(
            farm_id,
            CategoryDefinition::new(singular, plural, Species::Cattle),
        ).unwrap();
    }
    store.put_stock(farm_id, StockEntry::new(norte.id, "Vacas", 10)).unwrap();

    Farm {
        store,
        farm_id,
        norte,
        sur,
        module_a,
        module_b,
    }
}

async fn lot_stock(
    client: &reqwest::Client,
    srv: &TestServer,
    farm_id: FarmId,
    lot: &Lot,
) -> serde_json::Value {
    let res = client
        .get(format!(
            "{}/farms/{}/lots/{}/stock",
            srv.base_url, farm_id, lot.id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let farm = seeded_farm();
    let srv = TestServer::spawn(farm.store.clone()).await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn transfer_moves_stock_and_restarts_the_rest_counter() {
    let farm = seeded_farm();
    let srv = TestServer::spawn(farm.store.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/farms/{}/movements", srv.base_url, farm.farm_id))
        .json(&json!({
            "intent": "transfer",
            "slots": {"from_lot": "potrero norte", "to_lot": "sur", "category": "vacas", "quantity": "diez"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "applied");
    assert_eq!(
        body["receipt"]["destocked_lots"],
        json!([farm.norte.id.to_string()])
    );

    let norte = lot_stock(&client, &srv, farm.farm_id, &farm.norte).await;
    assert_eq!(norte["total_heads"], 0);
    assert_eq!(norte["rest_days"], 0);

    let sur = lot_stock(&client, &srv, farm.farm_id, &farm.sur).await;
    assert_eq!(sur["entries"], json!([{"lot_id": farm.sur.id.to_string(), "category": "Vacas", "quantity": 10}]));
}

#[tokio::test]
async fn partial_sale_keeps_the_lot_stocked() {
    let farm = seeded_farm();
    let srv = TestServer::spawn(farm.store.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/farms/{}/movements", srv.base_url, farm.farm_id))
        .json(&json!({
            "intent": "sale",
            "slots": {"lot": "Norte", "category": "vaca", "quantity": 4}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let norte = lot_stock(&client, &srv, farm.farm_id, &farm.norte).await;
    assert_eq!(norte["total_heads"], 6);
    assert!(norte.get("rest_days").is_none());
}

#[tokio::test]
async fn ambiguous_category_asks_for_clarification() {
    let farm = seeded_farm();
    let srv = TestServer::spawn(farm.store.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/farms/{}/resolve", srv.base_url, farm.farm_id))
        .json(&json!({
            "intent": "purchase",
            "slots": {"lot": "norte", "category": "novillos", "quantity": 3}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body.get("plan").is_none());

    let category = &body["slots"][1]["outcome"];
    assert_eq!(category["entity"], "category");
    assert_eq!(category["resolution"]["status"], "ambiguous");
    assert_eq!(
        category["resolution"]["candidates"]
            .as_array()
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn lot_names_shared_across_modules_need_the_module() {
    let farm = seeded_farm();
    let srv = TestServer::spawn(farm.store.clone()).await;
    let client = reqwest::Client::new();
    let url = format!("{}/farms/{}/movements", srv.base_url, farm.farm_id);

    let res = client
        .post(&url)
        .json(&json!({"intent": "birth", "slots": {"lot": "bajo", "category": "vacas", "quantity": 2}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "needs_clarification");
    assert_eq!(
        body["report"]["slots"][0]["outcome"]["resolution"]["status"],
        "ambiguous"
    );

    let res = client
        .post(&url)
        .json(&json!({
            "intent": "birth",
            "slots": {"lot": "bajo", "module": "modulo b", "category": "vacas", "quantity": 2}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let b = lot_stock(&client, &srv, farm.farm_id, &farm.module_b).await;
    assert_eq!(b["total_heads"], 2);
    let a = lot_stock(&client, &srv, farm.farm_id, &farm.module_a).await;
    assert_eq!(a["total_heads"], 0);
}

#[tokio::test]
async fn overselling_is_unprocessable() {
    let farm = seeded_farm();
    let srv = TestServer::spawn(farm.store.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/farms/{}/movements", srv.base_url, farm.farm_id))
        .json(&json!({"intent": "death", "slots": {"lot": "norte", "category": "vacas", "quantity": 11}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");

    let norte = lot_stock(&client, &srv, farm.farm_id, &farm.norte).await;
    assert_eq!(norte["total_heads"], 10);
}

#[tokio::test]
async fn invalid_payloads_and_unknown_lots_map_to_client_errors() {
    let farm = seeded_farm();
    let srv = TestServer::spawn(farm.store.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/farms/{}/movements", srv.base_url, farm.farm_id))
        .json(&json!({"intent": "sale", "slots": {"lot": "norte", "category": "vacas", "quantity": -3}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_intent");

    let res = client
        .get(format!(
            "{}/farms/{}/lots/{}/stock",
            srv.base_url,
            FarmId::new(),
            farm.norte.id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "lot_not_found");
}
