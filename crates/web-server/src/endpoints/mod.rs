//! The operations exposed under `/api`.

pub mod persons;
pub mod sales_orders;

use crate::endpoint::{Endpoint, EndpointHandler, RouteInfo};
use crate::AppState;
use axum::Router;
use std::sync::Arc;

/// Collects the procedure-backed routes together with their entries in the endpoint map.
pub struct ApiRoutes {
    router: Router<Arc<AppState>>,
    catalog: Vec<RouteInfo>,
}

impl ApiRoutes {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            catalog: Vec::new(),
        }
    }

    pub fn mount<E: Endpoint>(mut self) -> Self {
        self.router = self
            .router
            .route(E::PATH, EndpointHandler::<E>::method_router());
        self.catalog.push(EndpointHandler::<E>::route_info());
        self
    }

    pub fn into_parts(self) -> (Router<Arc<AppState>>, Vec<RouteInfo>) {
        (self.router, self.catalog)
    }
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self::new()
    }
}

/// Every `/api` operation.
pub fn api() -> ApiRoutes {
    ApiRoutes::new()
        .mount::<persons::ListPersons>()
        .mount::<persons::GetPersonById>()
        .mount::<sales_orders::ListSalesOrders>()
        .mount::<sales_orders::ListOrdersByCustomer>()
        .mount::<sales_orders::GetOrderById>()
        .mount::<sales_orders::CreateSalesOrder>()
        .mount::<sales_orders::UpdateSalesOrder>()
        .mount::<sales_orders::DeleteSalesOrder>()
}
