use crate::endpoint::{Endpoint, Verb};
use crate::formatter::EndpointKind;
use crate::validator::{ParamSchema, ParamSpec};
use core_types::ParamType;
use rust_decimal::Decimal;

const RESOURCE: &str = "Sales order";

/// # GET /api/sales-orders
pub struct ListSalesOrders;

impl Endpoint for ListSalesOrders {
    const OPERATION: &'static str = "ListSalesOrders";
    const VERB: Verb = Verb::Get;
    const PATH: &'static str = "/api/sales-orders";
    const PROCEDURE: &'static str = "usp_sales_orders_get_all";
    const RESOURCE: &'static str = RESOURCE;
    const FAILURE: &'static str = "Error retrieving sales orders";
    const KIND: EndpointKind = EndpointKind::List;

    fn schema() -> ParamSchema {
        ParamSchema::new().paginated()
    }
}

/// # GET /api/sales-orders/by-customer/:customerId
pub struct ListOrdersByCustomer;

impl Endpoint for ListOrdersByCustomer {
    const OPERATION: &'static str = "ListOrdersByCustomer";
    const VERB: Verb = Verb::Get;
    const PATH: &'static str = "/api/sales-orders/by-customer/:customerId";
    const PROCEDURE: &'static str = "usp_sales_orders_get_by_customer";
    const RESOURCE: &'static str = RESOURCE;
    const FAILURE: &'static str = "Error retrieving the customer's sales orders";
    const KIND: EndpointKind = EndpointKind::List;

    fn schema() -> ParamSchema {
        ParamSchema::new()
            .param(ParamSpec::required("CustomerID", ParamType::Int).from_key("customerId"))
            .paginated()
    }
}

/// # GET /api/sales-orders/:id
pub struct GetOrderById;

impl Endpoint for GetOrderById {
    const OPERATION: &'static str = "GetOrderById";
    const VERB: Verb = Verb::Get;
    const PATH: &'static str = "/api/sales-orders/:id";
    const PROCEDURE: &'static str = "usp_sales_orders_get_by_id";
    const RESOURCE: &'static str = RESOURCE;
    const FAILURE: &'static str = "Error retrieving sales order";
    const KIND: EndpointKind = EndpointKind::Lookup;

    fn schema() -> ParamSchema {
        ParamSchema::new().param(ParamSpec::required("SalesOrderID", ParamType::Int).from_key("id"))
    }
}

/// # POST /api/sales-orders
///
/// `OrderDate` and `DueDate` left out are filled in by the procedure.
pub struct CreateSalesOrder;

impl Endpoint for CreateSalesOrder {
    const OPERATION: &'static str = "CreateSalesOrder";
    const VERB: Verb = Verb::Post;
    const PATH: &'static str = "/api/sales-orders";
    const PROCEDURE: &'static str = "usp_sales_orders_create";
    const RESOURCE: &'static str = RESOURCE;
    const FAILURE: &'static str = "Error creating sales order";
    const KIND: EndpointKind = EndpointKind::Create;

    fn schema() -> ParamSchema {
        ParamSchema::new()
            .param(ParamSpec::required("CustomerID", ParamType::Int))
            .param(ParamSpec::optional("OrderDate", ParamType::Date))
            .param(ParamSpec::optional("DueDate", ParamType::Date))
            .param(ParamSpec::required("ShipDate", ParamType::Date))
            .param(ParamSpec::required("SubTotal", ParamType::Decimal))
            .param(ParamSpec::optional("TaxAmt", ParamType::Decimal).with_default(Decimal::ZERO))
            .param(ParamSpec::optional("Freight", ParamType::Decimal).with_default(Decimal::ZERO))
            .param(ParamSpec::optional("OnlineOrderFlag", ParamType::Bool).with_default(false))
            .param(ParamSpec::optional("PurchaseOrderNumber", ParamType::String))
            .param(ParamSpec::optional("Comment", ParamType::String))
    }
}

/// # PUT /api/sales-orders/:id
///
/// Fields left out keep their stored value.
pub struct UpdateSalesOrder;

impl Endpoint for UpdateSalesOrder {
    const OPERATION: &'static str = "UpdateSalesOrder";
    const VERB: Verb = Verb::Put;
    const PATH: &'static str = "/api/sales-orders/:id";
    const PROCEDURE: &'static str = "usp_sales_orders_update";
    const RESOURCE: &'static str = RESOURCE;
    const FAILURE: &'static str = "Error updating sales order";
    const KIND: EndpointKind = EndpointKind::Update;

    fn schema() -> ParamSchema {
        ParamSchema::new()
            .param(ParamSpec::required("SalesOrderID", ParamType::Int).from_key("id"))
            .param(ParamSpec::optional("Status", ParamType::Int))
            .param(ParamSpec::optional("DueDate", ParamType::Date))
            .param(ParamSpec::optional("ShipDate", ParamType::Date))
            .param(ParamSpec::optional("SubTotal", ParamType::Decimal))
            .param(ParamSpec::optional("TaxAmt", ParamType::Decimal))
            .param(ParamSpec::optional("Freight", ParamType::Decimal))
            .param(ParamSpec::optional("Comment", ParamType::String))
    }
}

/// # DELETE /api/sales-orders/:id
pub struct DeleteSalesOrder;

impl Endpoint for DeleteSalesOrder {
    const OPERATION: &'static str = "DeleteSalesOrder";
    const VERB: Verb = Verb::Delete;
    const PATH: &'static str = "/api/sales-orders/:id";
    const PROCEDURE: &'static str = "usp_sales_orders_delete";
    const RESOURCE: &'static str = RESOURCE;
    const FAILURE: &'static str = "Error deleting sales order";
    const KIND: EndpointKind = EndpointKind::Delete;

    fn schema() -> ParamSchema {
        ParamSchema::new().param(ParamSpec::required("SalesOrderID", ParamType::Int).from_key("id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointHandler;
    use core_types::{ParamValue, Target};
    use serde_json::json;

    #[test]
    fn create_binds_every_declared_parameter_in_order() {
        let raw = [
            ("CustomerID", json!(29825)),
            ("ShipDate", json!("2024-01-08")),
            ("SubTotal", json!("100.50")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let call = EndpointHandler::<CreateSalesOrder>::validator()
            .validate(CreateSalesOrder::OPERATION, Target::procedure(CreateSalesOrder::PROCEDURE), &raw)
            .unwrap();

        let names: Vec<_> = call.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "CustomerID", "OrderDate", "DueDate", "ShipDate", "SubTotal", "TaxAmt", "Freight",
                "OnlineOrderFlag", "PurchaseOrderNumber", "Comment"
            ]
        );
        assert_eq!(call.get("OnlineOrderFlag"), Some(&ParamValue::Bool(false)));
        assert_eq!(call.get("OrderDate"), Some(&ParamValue::Null(ParamType::Date)));
    }
}
