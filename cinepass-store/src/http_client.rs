use async_trait::async_trait;
use cinepass_core::notification::NotificationSink;
use cinepass_core::payment::{CreateOrderRequest, CreateOrderResponse, WalletPinVerifier};
use cinepass_core::repository::OrderRepository;
use cinepass_core::{GatewayError, Order};
use cinepass_shared::models::PaymentSucceededNotice;
use cinepass_shared::Masked;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct VerifyPinRequest<'a> {
    pin: &'a Masked<String>,
}

#[derive(Deserialize)]
struct VerifyPinResponse {
    valid: bool,
}

/// REST client for the order/payment backend.
///
/// Requests are sent once. `POST /orders` in particular is never retried
/// here: a retry could create a second payment, so the caller decides.
#[derive(Clone)]
pub struct HttpOrderGateway {
    client: Client,
    base_url: Url,
}

impl HttpOrderGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to initialize HTTP client: {}", e)))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid backend URL {}: {}", base_url, e)))?;

        Ok(Self { client, base_url })
    }

    /// Append path segments to the base URL, escaping each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport(format!("backend URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<reqwest::Response, GatewayError> {
        self.client.post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("backend request failed: {}", e)))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GatewayError::UnexpectedStatus { status: status.as_u16(), body: text });
        }
        serde_json::from_str::<T>(&text)
            .map_err(|e| GatewayError::Decode(format!("invalid backend JSON response: {}", e)))
    }
}

#[async_trait]
impl OrderRepository for HttpOrderGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<CreateOrderResponse, GatewayError> {
        let response = self.post_json(self.endpoint(&["orders"])?, request).await?;
        Self::read_json(response).await
    }

    async fn find_order_by_ref(&self, txn_ref: &str) -> Result<Option<Order>, GatewayError> {
        let url = self.endpoint(&["orders", "by-ref", txn_ref])?;
        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("backend request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(txn_ref, "Order not found yet");
            return Ok(None);
        }
        Self::read_json(response).await.map(Some)
    }
}

#[async_trait]
impl WalletPinVerifier for HttpOrderGateway {
    async fn verify_pin(&self, pin: &Masked<String>) -> Result<bool, GatewayError> {
        let url = self.endpoint(&["wallet", "verify-pin"])?;
        let response = self.post_json(url, &VerifyPinRequest { pin }).await?;

        // The backend answers a wrong PIN with 400/401 as often as with `valid: false`
        if matches!(response.status(), StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            warn!("Wallet PIN rejected");
            return Ok(false);
        }
        let body: VerifyPinResponse = Self::read_json(response).await?;
        Ok(body.valid)
    }
}

#[async_trait]
impl NotificationSink for HttpOrderGateway {
    async fn payment_succeeded(&self, notice: &PaymentSucceededNotice) -> Result<(), GatewayError> {
        let order_id = notice.order_id.to_string();
        let url = self.endpoint(&["orders", order_id.as_str(), "notify-success"])?;
        let response = self.post_json(url, notice).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::UnexpectedStatus { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinepass_core::GatewayType;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order_json(order_id: i64) -> serde_json::Value {
        json!({
            "orderId": order_id,
            "totalAmount": 210000,
            "paymentMethod": "MOMO",
            "status": "PAID",
            "createdAt": "2024-05-01T10:15:00"
        })
    }

    fn gateway(server: &MockServer) -> HttpOrderGateway {
        HttpOrderGateway::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    fn momo_request() -> CreateOrderRequest {
        CreateOrderRequest {
            amount: 210000,
            payment_method: GatewayType::Momo,
            voucher_code: None,
            showtime_id: Some(42),
            seat_ids: Some(vec![1, 2]),
            cinema_complex_id: None,
            food_combos: Vec::new(),
            wallet_pin: None,
        }
    }

    #[tokio::test]
    async fn test_create_order_parses_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "redirectUrl": "https://test-payment.momo.vn/pay/abc",
                "txnRef": "MOMO-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = gateway(&server).create_order(&momo_request()).await.unwrap();
        match response {
            CreateOrderResponse::Redirect(redirect) => {
                assert_eq!(redirect.txn_ref.as_deref(), Some("MOMO-1"));
            }
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_order_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orders"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let err = gateway(&server).create_order(&momo_request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnexpectedStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_lookup_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/by-ref/MISSING"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/orders/by-ref/MOMO-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_json(77)))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        assert!(gateway.find_order_by_ref("MISSING").await.unwrap().is_none());
        let order = gateway.find_order_by_ref("MOMO-1").await.unwrap().unwrap();
        assert_eq!(order.order_id, 77);
    }

    #[tokio::test]
    async fn test_verify_pin_sends_raw_pin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/wallet/verify-pin"))
            .and(body_json(json!({"pin": "123456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
            .mount(&server)
            .await;

        let valid = gateway(&server).verify_pin(&Masked("123456".to_string())).await.unwrap();
        assert!(valid);
    }

    #[tokio::test]
    async fn test_notify_success_posts_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/orders/77/notify-success"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notice = PaymentSucceededNotice {
            order_id: 77,
            source: "checkout-fallback".to_string(),
            timestamp: 1714558500000,
        };
        gateway(&server).payment_succeeded(&notice).await.unwrap();
    }
}
