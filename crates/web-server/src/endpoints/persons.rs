use crate::endpoint::{Endpoint, Verb};
use crate::formatter::EndpointKind;
use crate::validator::{ParamSchema, ParamSpec};
use core_types::ParamType;

/// # GET /api/persons
pub struct ListPersons;

impl Endpoint for ListPersons {
    const OPERATION: &'static str = "ListPersons";
    const VERB: Verb = Verb::Get;
    const PATH: &'static str = "/api/persons";
    const PROCEDURE: &'static str = "usp_persons_get_all";
    const RESOURCE: &'static str = "Person";
    const FAILURE: &'static str = "Error retrieving persons";
    const KIND: EndpointKind = EndpointKind::List;

    fn schema() -> ParamSchema {
        ParamSchema::new().paginated()
    }
}

/// # GET /api/persons/:id
pub struct GetPersonById;

impl Endpoint for GetPersonById {
    const OPERATION: &'static str = "GetPersonById";
    const VERB: Verb = Verb::Get;
    const PATH: &'static str = "/api/persons/:id";
    const PROCEDURE: &'static str = "usp_persons_get_by_id";
    const RESOURCE: &'static str = "Person";
    const FAILURE: &'static str = "Error retrieving person";
    const KIND: EndpointKind = EndpointKind::Lookup;

    fn schema() -> ParamSchema {
        ParamSchema::new().param(ParamSpec::required("BusinessEntityID", ParamType::Int).from_key("id"))
    }
}
