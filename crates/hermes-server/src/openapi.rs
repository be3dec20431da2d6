use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hermes API",
        version = "0.1.0",
        description = "Periodically refreshed snapshots of browser-extracted API responses."
    ),
    paths(
        crate::routes::get_data,
        crate::routes::get_status,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::SnapshotResponse,
        crate::dto::ResultResponse,
        crate::dto::RequestResponse,
        crate::dto::StatusResponse,
        crate::dto::RunRecordResponse,
        crate::dto::HealthResponse,
    )),
    tags(
        (name = "data", description = "Latest extraction snapshot"),
        (name = "system", description = "Health and refresh status"),
    )
)]
pub struct ApiDoc;
