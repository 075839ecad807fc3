use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::alerting::{ThresholdConfig, ThresholdUpdate};
use crate::model::{
    ComposeAction, ComposeProject, ContainerSnapshot, ContainerStats, ImageSnapshot,
    LifecycleAction, MetricSample, PruneReport,
};
use crate::notify::ChannelResult;
use crate::service::{MonitorService, ServiceStatus};

mod models;

use models::{
    ApiError, ContainerListParams, ImageListParams, LifecycleParams, LogParams, LogsResponse,
    NotificationsResponse, RemoveImageParams,
};

type Service = State<Arc<MonitorService>>;
type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

async fn status(State(service): Service) -> Json<ServiceStatus> {
    Json(service.status().await)
}

async fn list_containers(
    State(service): Service,
    Query(params): Query<ContainerListParams>,
) -> ApiResult<Vec<ContainerSnapshot>> {
    let containers = if params.stats {
        service.list_containers_with_stats(params.all).await?
    } else {
        service.list_containers(params.all).await?
    };
    Ok(Json(containers))
}

async fn container_stats(
    State(service): Service,
    Path(id): Path<String>,
) -> ApiResult<ContainerStats> {
    Ok(Json(service.get_stats(&id).await?))
}

async fn container_history(
    State(service): Service,
    Path(id): Path<String>,
) -> ApiResult<Vec<MetricSample>> {
    Ok(Json(service.history(&id)?))
}

async fn container_logs(
    State(service): Service,
    Path(id): Path<String>,
    Query(params): Query<LogParams>,
) -> ApiResult<LogsResponse> {
    let logs = service.logs(&id, params.tail, params.timestamps).await?;
    Ok(Json(LogsResponse { logs }))
}

async fn container_lifecycle(
    State(service): Service,
    Path((id, action)): Path<(String, String)>,
    Query(params): Query<LifecycleParams>,
) -> Result<StatusCode, ApiError> {
    let action: LifecycleAction = action.parse().map_err(ApiError::bad_request)?;
    service.lifecycle(&id, action, params.t).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_images(
    State(service): Service,
    Query(params): Query<ImageListParams>,
) -> ApiResult<Vec<ImageSnapshot>> {
    Ok(Json(service.list_images(params.all).await?))
}

async fn remove_image(
    State(service): Service,
    Path(id): Path<String>,
    Query(params): Query<RemoveImageParams>,
) -> Result<StatusCode, ApiError> {
    service.remove_image(&id, params.force).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn prune_images(State(service): Service) -> ApiResult<PruneReport> {
    Ok(Json(service.prune_images().await?))
}

async fn list_compose(State(service): Service) -> ApiResult<Vec<ComposeProject>> {
    Ok(Json(service.list_compose().await?))
}

async fn compose_action(
    State(service): Service,
    Path((project, action)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let action: ComposeAction = action.parse().map_err(ApiError::bad_request)?;
    service.compose_action(&project, action).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_thresholds(State(service): Service) -> Json<ThresholdConfig> {
    Json(service.thresholds())
}

async fn update_thresholds(
    State(service): Service,
    Json(update): Json<ThresholdUpdate>,
) -> ApiResult<ThresholdConfig> {
    Ok(Json(service.update_thresholds(&update)?))
}

async fn list_notifications(State(service): Service) -> Json<NotificationsResponse> {
    Json(NotificationsResponse {
        notifications: service.notifications(),
        unread_count: service.unread_count(),
    })
}

async fn mark_read(State(service): Service, Path(id): Path<u64>) -> Result<StatusCode, ApiError> {
    service.mark_read(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(State(service): Service) -> StatusCode {
    service.mark_all_read();
    StatusCode::NO_CONTENT
}

async fn clear_notifications(State(service): Service) -> StatusCode {
    service.clear_notifications();
    StatusCode::NO_CONTENT
}

async fn test_channel(State(service): Service, Path(id): Path<String>) -> ApiResult<ChannelResult> {
    Ok(Json(service.test_channel(&id).await?))
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(service: Arc<MonitorService>) -> Self {
        let router = axum::Router::new()
            .route("/status", get(status))
            .route("/containers", get(list_containers))
            .route("/containers/{id}/stats", get(container_stats))
            .route("/containers/{id}/history", get(container_history))
            .route("/containers/{id}/logs", get(container_logs))
            .route("/containers/{id}/{action}", post(container_lifecycle))
            .route("/images", get(list_images))
            .route("/images/prune", post(prune_images))
            .route("/images/{id}", axum::routing::delete(remove_image))
            .route("/compose", get(list_compose))
            .route("/compose/{project}/{action}", post(compose_action))
            .route("/thresholds", get(get_thresholds).put(update_thresholds))
            .route(
                "/notifications",
                get(list_notifications).delete(clear_notifications),
            )
            .route("/notifications/read-all", post(mark_all_read))
            .route("/notifications/{id}/read", post(mark_read))
            .route("/channels/{id}/test", post(test_channel))
            .with_state(service);
        Self { router }
    }

    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        log::info!("API listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router.into_make_service()).await
    }
}
