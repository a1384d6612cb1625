mod common;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{signed_header, TestApp};

/// Full billing cycle through the HTTP surface only: register, log in,
/// raise a payment and an invoice, mint a checkout link, then settle it
/// with a signed provider webhook.
#[tokio::test]
async fn invoice_settles_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/links"))
        .and(body_partial_json(json!({
            "data": {
                "attributes": {
                    "amount": 20000,
                    "reference_number": "INV-1"
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "link_e2e",
                "attributes": { "checkout_url": "https://pm.link/e2e" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::with_gateway(&server.uri());

    let (status, registered) = app
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "name": "Maria Santos",
                "email": "bursar@university.edu",
                "password": "correct horse battery"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = registered["id"].as_str().unwrap().to_string();

    let (status, login) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "email": "bursar@university.edu",
                "password": "correct horse battery"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["access_token"].as_str().unwrap().to_string();

    let (status, payment) = app
        .post(
            "/api/payments",
            &token,
            json!({
                "user_id": user_id,
                "amount": 200.0,
                "description": "Fall semester tuition"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "pending");
    let payment_id = payment["id"].as_str().unwrap().to_string();

    let (status, invoice) = app
        .post(
            "/api/invoices",
            &token,
            json!({
                "user_id": user_id,
                "invoice_number": "INV-1",
                "payment_id": payment_id,
                "items": [{ "description": "Tuition", "amount": 100.0, "quantity": 2 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invoice["total_amount"], 200.0);
    assert_eq!(invoice["status"], "draft");
    let invoice_id = invoice["id"].as_str().unwrap().to_string();

    let (status, link) = app
        .post(
            "/api/payments/payment-link",
            &token,
            json!({ "_id": invoice_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(link["link"], "https://pm.link/e2e");
    assert_eq!(link["_id"], invoice_id);
    assert_eq!(link["paymongoId"], "link_e2e");

    let (status, invoice) = app
        .get(&format!("/api/invoices/{}", invoice_id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["status"], "sent");
    assert_eq!(invoice["checkout_url"], "https://pm.link/e2e");
    assert_eq!(invoice["provider_reference_id"], "link_e2e");

    // The student pays; the provider notifies us.
    let event = json!({
        "type": "payment.paid",
        "data": {
            "id": "pay_e2e",
            "attributes": { "link_id": "link_e2e", "payment_method": "gcash" }
        }
    })
    .to_string();
    let (status, ack) = app.webhook(&event, Some(&signed_header(&event))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "received": true }));

    let (status, invoice) = app
        .get(&format!("/api/invoices/{}", invoice_id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["status"], "paid");

    let (status, payment) = app
        .get(&format!("/api/payments/{}", payment_id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "completed");
    assert_eq!(payment["payment_method"], "gcash");
    assert_eq!(payment["transaction_id"], "pay_e2e");
    assert!(payment["payment_date"].is_string());

    // Dashboard reflects the settled cycle.
    let (status, summary) = app.get("/api/reports/summary", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["invoices"][0]["status"], "paid");
    assert_eq!(summary["payments"][0]["status"], "completed");
    assert_eq!(summary["monthly_trend"][0]["total_amount"], 200.0);
}
