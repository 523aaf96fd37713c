//! Route definitions for the inventory server

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .nest("/catalog", catalog_routes())
        .nest("/intakes", intake_routes())
        .nest("/devices", device_routes())
        .nest("/movements", movement_routes())
        .nest("/deliveries", delivery_routes())
        .nest("/packages", package_routes())
        .nest("/accounting", accounting_routes())
        .nest("/warehouse", warehouse_routes())
        .nest("/technicians", technician_routes())
        .nest("/scrap", scrap_routes())
}

/// Catalog routes (protected)
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/device-types",
            get(handlers::list_device_types).post(handlers::create_device_type),
        )
        .route("/device-types/slugs", get(handlers::list_registered_slugs))
        .route("/ports", get(handlers::list_ports).post(handlers::create_port))
        .route(
            "/intake-types",
            get(handlers::list_intake_types).post(handlers::create_intake_type),
        )
        .route(
            "/package-types",
            get(handlers::list_package_types).post(handlers::create_package_type),
        )
        .route(
            "/entries/:catalog",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Intake ledger routes (protected)
fn intake_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_intakes).post(handlers::create_intake))
        .route("/:intake_id", get(handlers::get_intake))
        .route("/:intake_id/details", post(handlers::record_intake))
        .route("/:intake_id/discounts", post(handlers::add_discount))
        .route("/:intake_id/spares", get(handlers::list_spares))
        .route("/details/:detail_id/devices", post(handlers::materialize_devices))
        .route("/details/:detail_id/spares", post(handlers::materialize_spares))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Device routes (protected)
fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_devices).patch(handlers::update_devices))
        .route("/package-candidates", get(handlers::list_package_candidates))
        .route("/faults/:fault_id/resolve", post(handlers::resolve_fault))
        .route("/:triage", get(handlers::get_device).delete(handlers::invalidate_device))
        .route("/:triage/history", get(handlers::device_history))
        .route(
            "/:triage/faults",
            get(handlers::list_faults).post(handlers::report_fault),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Movement request routes (protected)
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_open_requests).post(handlers::create_request))
        .route("/:request_id", get(handlers::get_request))
        .route("/:request_id/apply", post(handlers::apply_movement))
        .route("/:request_id/reject", post(handlers::reject_request))
        .route("/:request_id/changes", get(handlers::request_changes))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Delivery routes (protected)
fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_deliveries).post(handlers::create_delivery))
        .route("/:delivery_id", get(handlers::get_delivery))
        .route(
            "/:delivery_id/reviews",
            get(handlers::list_reviews).post(handlers::review_delivery),
        )
        .route("/:delivery_id/finalize", post(handlers::finalize_delivery))
        .route(
            "/:delivery_id/packages",
            get(handlers::list_packages).post(handlers::create_packages),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Package routes (protected)
fn package_routes() -> Router<AppState> {
    Router::new()
        .route("/:package_id", delete(handlers::remove_package))
        .route(
            "/:package_id/devices",
            get(handlers::list_assignments).post(handlers::assign_device),
        )
        .route("/:package_id/devices/:triage", delete(handlers::unassign_device))
        .route("/:package_id/approve", patch(handlers::approve_package))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Accounting routes (protected)
fn accounting_routes() -> Router<AppState> {
    Router::new()
        .route("/approve", post(handlers::accounting_approve))
        .route("/reject", post(handlers::accounting_reject))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Warehouse routes (protected)
fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route("/aisles", get(handlers::list_aisles).post(handlers::create_aisle))
        .route("/aisles/:aisle_id/levels", get(handlers::list_levels))
        .route("/aisles/:aisle_id/devices", get(handlers::devices_in_aisle))
        .route("/levels", post(handlers::create_level))
        .route("/levels/:level_id/sectors", get(handlers::list_sectors))
        .route("/sectors", post(handlers::create_sector))
        .route("/pallets", get(handlers::list_pallets).post(handlers::create_pallet))
        .route("/devices/:triage/pallet", post(handlers::place_device))
        .route("/spares/:spare_id/pallet", post(handlers::place_spare))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Technician assignment routes (protected)
fn technician_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:user_id/device-types",
            get(handlers::get_technician_assignment)
                .put(handlers::set_technician_assignment)
                .delete(handlers::remove_technician_assignment),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Scrap disposal routes (protected)
fn scrap_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/companies",
            get(handlers::list_scrap_companies).post(handlers::create_scrap_company),
        )
        .route(
            "/disposals",
            get(handlers::list_disposals).post(handlers::create_disposal),
        )
        .route("/disposals/:disposal_id", get(handlers::get_disposal))
        .route("/disposals/:disposal_id/details", post(handlers::add_scrap_detail))
        .route("/disposals/:disposal_id/devices", post(handlers::add_scrapped_device))
        .route("/disposals/:disposal_id/close", post(handlers::close_disposal))
        .route_layer(middleware::from_fn(auth_middleware))
}
