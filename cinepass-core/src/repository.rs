use async_trait::async_trait;

use crate::order::Order;
use crate::payment::{CreateOrderRequest, CreateOrderResponse};
use crate::GatewayError;

/// Backend order endpoints used by checkout
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// `POST /orders`
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, GatewayError>;

    /// `GET /orders/by-ref/{txn_ref}`; `Ok(None)` while the order is not persisted.
    async fn find_order_by_ref(
        &self,
        txn_ref: &str,
    ) -> Result<Option<Order>, GatewayError>;
}
