use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde_json::json;
use tracing::warn;

use crate::auth::AdminAuth;
use crate::commands::{availability, bookings, schedule_days, services, settings, weekly_schedule};
use crate::db::Database;
use crate::error::AppError;
use crate::fallback::mailto_link;
use crate::models::{
    AdminAction, AdminCreateBooking, AvailabilityQuery, CancelBooking, CreateBooking, DateQuery, RangeQuery,
    ScheduleDay, ScheduleQuery, ScheduleSettings, ServiceInput, WeekdaySchedule,
};
use crate::state::AppState;

type AppResult<T> = Result<T, AppError>;

/// Runs a store operation off the async runtime.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> AppResult<T>
where
    F: FnOnce(&Database) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(db.as_ref())).await?
}

pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/services", get(list_services))
        .route("/availability", get(get_availability))
        .route("/schedule", get(get_schedule))
        .route("/bookings", post(create_booking))
        .route("/bookings/:id/cancel", post(cancel_booking));

    let admin = Router::new()
        .route("/bookings", get(admin_bookings).post(admin_create_booking))
        .route("/bookings/:id", get(admin_booking))
        .route("/schedule", get(admin_schedule).post(admin_schedule_action))
        .route("/availability", get(admin_availability))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/schedule-days", get(list_schedule_days).put(upsert_schedule_day))
        .route("/schedule-days/:date", delete(delete_schedule_day))
        .route("/weekly-schedule", get(list_weekly_schedule).put(upsert_weekday))
        .route("/weekly-schedule/:day", delete(delete_weekday))
        .route("/services", get(admin_services).post(create_service))
        .route("/services/:id", put(update_service).delete(deactivate_service));

    Router::new()
        .nest("/api", public)
        .nest("/api/admin", admin)
        .with_state(state)
}

// ===== PUBLIC =====

async fn list_services(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let services = blocking(&state, |db| services::get_services(db, false)).await?;
    Ok(Json(services))
}

async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<impl IntoResponse> {
    let now = Local::now().naive_local();
    let availability = blocking(&state, move |db| availability::get_availability(db, query, Some(now))).await?;
    Ok(Json(availability))
}

async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<impl IntoResponse> {
    let now = Local::now().naive_local();
    let days = blocking(&state, move |db| availability::get_schedule(db, query, now.date(), Some(now))).await?;
    Ok(Json(json!({ "days": days })))
}

async fn create_booking(State(state): State<Arc<AppState>>, Json(request): Json<CreateBooking>) -> Response {
    let now = Local::now().naive_local();
    let submitted = request.clone();

    match blocking(&state, move |db| bookings::create_booking(db, request, now)).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) if e.is_internal() => {
            warn!("Booking could not be stored, offering e-mail fallback: {e}");
            let service_id = submitted.service_id;
            let service_name = blocking(&state, move |db| services::get_service(db, service_id))
                .await
                .ok()
                .map(|s| s.name);
            let body = json!({
                "success": false,
                "error": e.public_message(),
                "code": e.code(),
                "fallback_mailto": mailto_link(&state.config.booking_email, &submitted, service_name.as_deref()),
            });
            (e.status(), Json(body)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<CancelBooking>,
) -> AppResult<impl IntoResponse> {
    let booking = blocking(&state, move |db| bookings::cancel_booking(db, id, &request.client_phone)).await?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}

// ===== ADMIN =====

async fn admin_bookings(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> AppResult<impl IntoResponse> {
    let bookings = blocking(&state, move |db| bookings::get_bookings_for_date(db, query.date)).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

async fn admin_booking(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let booking = blocking(&state, move |db| bookings::get_booking(db, id)).await?;
    Ok(Json(booking))
}

async fn admin_create_booking(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AdminCreateBooking>,
) -> AppResult<impl IntoResponse> {
    let created = blocking(&state, move |db| bookings::admin_create_booking(db, request)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn admin_schedule_action(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(action): Json<AdminAction>,
) -> AppResult<impl IntoResponse> {
    let booking = blocking(&state, move |db| bookings::apply_admin_action(db, action)).await?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}

async fn admin_schedule(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<impl IntoResponse> {
    let today = Local::now().date_naive();
    let days = blocking(&state, move |db| availability::get_schedule(db, query, today, None)).await?;
    Ok(Json(json!({ "days": days })))
}

async fn admin_availability(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<impl IntoResponse> {
    let availability = blocking(&state, move |db| availability::get_availability(db, query, None)).await?;
    Ok(Json(availability))
}

async fn get_settings(_auth: AdminAuth, State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let settings = blocking(&state, settings::get_settings).await?;
    Ok(Json(json!({ "settings": settings })))
}

async fn update_settings(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ScheduleSettings>,
) -> AppResult<impl IntoResponse> {
    let settings = blocking(&state, move |db| settings::update_settings(db, update)).await?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}

async fn list_schedule_days(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(range): Query<RangeQuery>,
) -> AppResult<impl IntoResponse> {
    let days = blocking(&state, move |db| schedule_days::get_schedule_days(db, range.from, range.to)).await?;
    Ok(Json(json!({ "days": days })))
}

async fn upsert_schedule_day(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(day): Json<ScheduleDay>,
) -> AppResult<impl IntoResponse> {
    let day = blocking(&state, move |db| schedule_days::upsert_schedule_day(db, day)).await?;
    Ok(Json(day))
}

async fn delete_schedule_day(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(date): Path<NaiveDate>,
) -> AppResult<impl IntoResponse> {
    blocking(&state, move |db| schedule_days::delete_schedule_day(db, date)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_weekly_schedule(_auth: AdminAuth, State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let schedule = blocking(&state, weekly_schedule::get_weekly_schedule).await?;
    Ok(Json(json!({ "schedule": schedule })))
}

async fn upsert_weekday(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(weekday): Json<WeekdaySchedule>,
) -> AppResult<impl IntoResponse> {
    let weekday = blocking(&state, move |db| weekly_schedule::upsert_weekday(db, weekday)).await?;
    Ok(Json(weekday))
}

async fn delete_weekday(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(day): Path<u32>,
) -> AppResult<impl IntoResponse> {
    blocking(&state, move |db| weekly_schedule::delete_weekday(db, day)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_services(_auth: AdminAuth, State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let services = blocking(&state, |db| services::get_services(db, true)).await?;
    Ok(Json(services))
}

async fn create_service(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<ServiceInput>,
) -> AppResult<impl IntoResponse> {
    let service = blocking(&state, move |db| services::create_service(db, input)).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

async fn update_service(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<ServiceInput>,
) -> AppResult<impl IntoResponse> {
    let service = blocking(&state, move |db| services::update_service(db, id, input)).await?;
    Ok(Json(service))
}

async fn deactivate_service(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    blocking(&state, move |db| services::deactivate_service(db, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
