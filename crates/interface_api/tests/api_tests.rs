//! HTTP API tests against the router wired to the in-memory port

use std::str::FromStr;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use domain_billing::ports::mock::MockBillingPort;
use domain_billing::{BillingService, BillingSettings};
use interface_api::{config::ApiConfig, create_router};

const ACTOR: &str = "ops@ktl.example";

fn server() -> (TestServer, MockBillingPort) {
    let port = MockBillingPort::new();
    let service = BillingService::new(Arc::new(port.clone()), BillingSettings::default());
    let app = create_router(service, ApiConfig::default());
    (TestServer::new(app).unwrap(), port)
}

fn as_actor(request: TestRequest) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-actor-id"),
        HeaderValue::from_static(ACTOR),
    )
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {}", other),
    }
}

async fn create_customer(server: &TestServer, name: &str, email: Option<&str>) -> i64 {
    let response = as_actor(server.post("/api/v1/customers"))
        .json(&json!({
            "name": name,
            "email": email,
            "category": {"type": "bandwidth", "committed_mbps": "100", "nttn_provider": "Summit"}
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn create_bill(server: &TestServer, body: Value) -> Value {
    let response = as_actor(server.post("/api/v1/bills")).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

async fn iig_bill(server: &TestServer) -> i64 {
    let customer_id = create_customer(server, "Delta Networks", None).await;
    let bill = create_bill(
        server,
        json!({
            "customer_id": customer_id,
            "billing_date": "2025-06-01",
            "usage": {"iig": {"quantity": "10", "price": "100"}},
            "discount": "50"
        }),
    )
    .await;
    bill["id"].as_i64().unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_liveness_and_readiness() {
    let (server, _) = server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");

    let response = server.get("/health/ready").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["storage"]["adapter_id"], "mock-billing-port");
    assert_eq!(body["storage"]["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let (server, _) = server();
    let response = server.get("/health").await;
    assert!(response.headers().get("x-request-id").is_some());
}

// ============================================================================
// Customers
// ============================================================================

#[tokio::test]
async fn test_create_customer_records_actor() {
    let (server, _) = server();
    let response = as_actor(server.post("/api/v1/customers"))
        .json(&json!({
            "name": "Rahim Traders",
            "email": "ops@rahim.example",
            "category": {"type": "soho", "package_name": "Home 20"}
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    let id = body["id"].as_i64().unwrap();
    assert_eq!(body["customer_number"], format!("KTL-RAHIMTRA-{}", id));
    assert_eq!(body["created_by"], ACTOR);
    assert_eq!(body["category"]["type"], "soho");

    let response = server.get(&format!("/api/v1/customers/{}", id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["name"], "Rahim Traders");
}

#[tokio::test]
async fn test_customer_field_validation() {
    let (server, _) = server();
    let response = as_actor(server.post("/api/v1/customers"))
        .json(&json!({
            "name": "",
            "email": "not-an-email",
            "category": {"type": "soho", "package_name": "Home 20"}
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "validation_error");
    let details: Vec<String> = serde_json::from_value(body["details"].clone()).unwrap();
    assert!(details.iter().any(|d| d.starts_with("email:")));
    assert!(details.iter().any(|d| d.starts_with("name:")));
}

#[tokio::test]
async fn test_duplicate_customer_email_conflicts() {
    let (server, _) = server();
    create_customer(&server, "First", Some("noc@isp.example")).await;

    let response = as_actor(server.post("/api/v1/customers"))
        .json(&json!({
            "name": "Second",
            "email": "NOC@isp.example",
            "category": {"type": "bandwidth"}
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"], "conflict");
}

// ============================================================================
// Bills and periods
// ============================================================================

#[tokio::test]
async fn test_create_and_get_bill() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = server.get(&format!("/api/v1/bills/{}", bill_id)).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(decimal(&body["bill"]["total_bill"]), dec!(950));
    assert_eq!(decimal(&body["bill"]["total_due"]), dec!(950));
    assert_eq!(body["bill"]["created_by"], ACTOR);
    assert!(body["bill"]["bill_number"].as_str().unwrap().starts_with("KTL-BL-"));
    assert_eq!(body["periods"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_bill_is_not_found() {
    let (server, _) = server();
    let response = server.get("/api/v1/bills/4040").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "not_found");
}

#[tokio::test]
async fn test_bill_status_toggle() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.put(&format!("/api/v1/bills/{}/status", bill_id)))
        .json(&json!({"status": "inactive"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "inactive");

    let response = as_actor(server.put(&format!("/api/v1/bills/{}/status", bill_id)))
        .json(&json!({"status": "archived"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_update_bill_recomputes_total() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.put(&format!("/api/v1/bills/{}", bill_id)))
        .json(&json!({"discount": "100", "total_received": "300"}))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(decimal(&body["total_bill"]), dec!(900));
    assert_eq!(decimal(&body["total_due"]), dec!(600));
}

#[tokio::test]
async fn test_periods_then_finalize() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    for (start, end, qty) in [(1, 15, "10"), (16, 30, "20")] {
        let response = as_actor(server.post(&format!("/api/v1/bills/{}/periods", bill_id)))
            .json(&json!({
                "start_day": start,
                "end_day": end,
                "usage": {"iig": {"quantity": qty, "price": "100"}}
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    let response = as_actor(server.post(&format!("/api/v1/bills/{}/finalize", bill_id))).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["period_count"], 2);
    assert_eq!(body["summary"]["periods"].as_array().unwrap().len(), 2);

    let period_id = body["summary"]["periods"][0]["period_id"].as_i64().unwrap();
    let response = as_actor(server.delete(&format!("/api/v1/bills/{}/periods/{}", bill_id, period_id))).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["periods"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_inverted_period_rejected() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.post(&format!("/api/v1/bills/{}/periods", bill_id)))
        .json(&json!({"start_day": 20, "end_day": 10}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_finalize_without_periods_is_validation_error() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.post(&format!("/api/v1/bills/{}/finalize", bill_id))).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Daily amounts
// ============================================================================

#[tokio::test]
async fn test_calculate_and_list_daily_amounts() {
    let (server, _) = server();
    let customer_id = create_customer(&server, "Delta Networks", None).await;
    let bill = create_bill(
        &server,
        json!({
            "customer_id": customer_id,
            "active_date": "2025-06-01",
            "termination_date": "2025-06-03",
            "usage": {"iig": {"quantity": "10", "price": "30"}}
        }),
    )
    .await;
    let bill_id = bill["id"].as_i64().unwrap();

    let url = format!("/api/v1/bills/{}/daily-amounts/calculate", bill_id);
    let response = as_actor(server.post(&url)).json(&json!({})).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["created_count"], 3);
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);

    // Second run without recalculate skips existing rows
    let response = as_actor(server.post(&url)).json(&json!({"recalculate": false})).await;
    assert_eq!(response.json::<Value>()["created_count"], 0);

    let response = server.get(&format!("/api/v1/bills/{}/daily-amounts", bill_id)).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["days"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_save_manual_daily_amount() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.put(&format!("/api/v1/bills/{}/daily-amounts", bill_id)))
        .json(&json!({
            "date": "2025-06-10",
            "daily_amount": "42.50",
            "is_calculated": false
        }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(decimal(&body["daily_amount"]), dec!(42.50));
    assert_eq!(body["is_calculated"], false);
}

// ============================================================================
// Invoices and payments
// ============================================================================

#[tokio::test]
async fn test_bill_to_paid_invoice() {
    let (server, port) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.post(&format!("/api/v1/bills/{}/invoice", bill_id)))
        .json(&json!({"format": "ITS", "issue_date": "2025-06-05"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let invoice = response.json::<Value>();
    let invoice_id = invoice["id"].as_i64().unwrap();
    assert_eq!(invoice["invoice_number"], "KTL 6 2025/1");
    assert_eq!(decimal(&invoice["total_amount"]), dec!(950));
    assert_eq!(invoice["amount_in_words"], "Nine Hundred Fifty Taka Only");
    assert_eq!(invoice["items"].as_array().unwrap().len(), 1);

    let response = as_actor(server.post("/api/v1/payments"))
        .json(&json!({
            "entitlement_id": 1,
            "invoice_id": invoice_id,
            "payment_date": "2025-06-15",
            "payment_method": "bank_transfer",
            "details": [{"pay_amount": "500", "transaction_id": "TXN-1"}]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let receipt = response.json::<Value>();
    assert_eq!(receipt["reconciliation"]["status"], "partial");
    assert_eq!(decimal(&receipt["reconciliation"]["balance_due"]), dec!(450));
    let master_id = receipt["payment"]["id"].as_i64().unwrap();

    let response = as_actor(server.post(&format!("/api/v1/payments/{}/details", master_id)))
        .json(&json!({"pay_amount": "450"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["reconciliation"]["status"], "paid");

    let response = server.get(&format!("/api/v1/invoices/{}", invoice_id)).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "paid");
    assert_eq!(decimal(&body["balance_due"]), Decimal::ZERO);

    let response = server.get(&format!("/api/v1/payments/{}", master_id)).await;
    response.assert_status_ok();
    let record = response.json::<Value>();
    assert_eq!(record["payment"]["invoice_id"].as_i64(), Some(invoice_id));
    let details = record["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["transaction_id"], "TXN-1");
    assert_eq!(decimal(&details[1]["pay_amount"]), dec!(450));

    server.get("/api/v1/payments/999").await.assert_status(StatusCode::NOT_FOUND);

    let state = port.snapshot().await;
    assert_eq!(state.payment_details.len(), 2);
}

#[tokio::test]
async fn test_update_payment_detail_reconciles() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let invoice = as_actor(server.post(&format!("/api/v1/bills/{}/invoice", bill_id)))
        .json(&json!({"format": "ITS", "issue_date": "2025-06-05"}))
        .await
        .json::<Value>();

    let receipt = as_actor(server.post("/api/v1/payments"))
        .json(&json!({
            "entitlement_id": 1,
            "invoice_id": invoice["id"],
            "payment_date": "2025-06-15",
            "details": [{"pay_amount": "950"}]
        }))
        .await
        .json::<Value>();
    assert_eq!(receipt["reconciliation"]["status"], "paid");
    let detail_id = receipt["details"][0]["id"].as_i64().unwrap();

    let response = as_actor(server.put(&format!("/api/v1/payment-details/{}", detail_id)))
        .json(&json!({"pay_amount": "200"}))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(decimal(&body["reconciliation"]["total_paid"]), dec!(200));
    assert_eq!(decimal(&body["reconciliation"]["balance_due"]), dec!(750));
}

#[tokio::test]
async fn test_second_invoice_for_bill_conflicts() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;
    let url = format!("/api/v1/bills/{}/invoice", bill_id);

    as_actor(server.post(&url))
        .json(&json!({"format": "INT", "issue_date": "2025-06-05"}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = as_actor(server.post(&url))
        .json(&json!({"format": "INT", "issue_date": "2025-06-05"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server.get(&url).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["invoice_format"], "INT");
}

#[tokio::test]
async fn test_unknown_invoice_format_rejected() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.post(&format!("/api/v1/bills/{}/invoice", bill_id)))
        .json(&json!({"format": "PDF"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_bill_with_invoice_cannot_be_deleted() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    as_actor(server.post(&format!("/api/v1/bills/{}/invoice", bill_id)))
        .json(&json!({"format": "ITS"}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = as_actor(server.delete(&format!("/api/v1/bills/{}", bill_id))).await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_bill_without_invoice() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let response = as_actor(server.delete(&format!("/api/v1/bills/{}", bill_id))).await;
    response.assert_status(StatusCode::NO_CONTENT);

    server
        .get(&format!("/api/v1/bills/{}", bill_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invoice_actions() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let invoice = as_actor(server.post(&format!("/api/v1/bills/{}/invoice", bill_id)))
        .json(&json!({"format": "ITS", "issue_date": "2025-06-05"}))
        .await
        .json::<Value>();
    let id = invoice["id"].as_i64().unwrap();

    let response = as_actor(server.post(&format!("/api/v1/invoices/{}/issue", id))).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "issued");

    let response = as_actor(server.post(&format!("/api/v1/invoices/{}/pay", id))).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "paid");
    assert_eq!(decimal(&body["paid_amount"]), dec!(950));

    // Paid invoices stay paid
    let response = as_actor(server.post(&format!("/api/v1/invoices/{}/cancel", id))).await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_partial_pay_keeps_invoice_open() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let invoice = as_actor(server.post(&format!("/api/v1/bills/{}/invoice", bill_id)))
        .json(&json!({"format": "ITS", "issue_date": "2025-06-05"}))
        .await
        .json::<Value>();
    let id = invoice["id"].as_i64().unwrap();

    let response = as_actor(server.post(&format!("/api/v1/invoices/{}/pay", id)))
        .json(&json!({"amount": "100"}))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "issued");
    assert_eq!(decimal(&body["balance_due"]), dec!(850));
    assert!(body["paid_at"].is_null());
}

#[tokio::test]
async fn test_cancel_draft_invoice() {
    let (server, _) = server();
    let bill_id = iig_bill(&server).await;

    let invoice = as_actor(server.post(&format!("/api/v1/bills/{}/invoice", bill_id)))
        .json(&json!({"format": "ITS", "issue_date": "2025-06-05"}))
        .await
        .json::<Value>();
    let id = invoice["id"].as_i64().unwrap();

    let response = as_actor(server.post(&format!("/api/v1/invoices/{}/cancel", id))).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "cancelled");

    let response = as_actor(server.post(&format!("/api/v1/invoices/{}/pay", id)))
        .json(&json!({"amount": "100"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_payment_detail_amount_must_be_positive() {
    let (server, _) = server();
    let response = as_actor(server.post("/api/v1/payments"))
        .json(&json!({
            "entitlement_id": 1,
            "invoice_id": 1,
            "payment_date": "2025-06-15",
            "details": [{"pay_amount": "-5"}]
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let details: Vec<String> = serde_json::from_value(response.json::<Value>()["details"].clone()).unwrap();
    assert!(details[0].starts_with("details[0].pay_amount"));
}
