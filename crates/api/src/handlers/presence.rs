//! Handlers for presence refresh and take-control.
//!
//! Refresh is polled by every viewer; take-control is an explicit user
//! action on lockable resources. Both push render-channel messages so that
//! affected clients re-render without waiting for their next poll. The
//! control check is a read-only gate for actions outside the edit form.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use viewguard_core::error::CoreError;
use viewguard_core::identifier::Identifier;
use viewguard_core::lock::LockOwnership;
use viewguard_core::message::PresenceMessage;
use viewguard_core::presence::Principal;
use viewguard_core::registry::RenderTrigger;
use viewguard_core::snapshot::{write_allowed, PresenceSnapshot};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Viewer;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// The resource a viewer is looking at.
#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    /// Resource type, e.g. `"post"`. Also decides lockability.
    pub resource_type: String,
    /// Primary key of the viewed record; absent on create screens.
    #[serde(default)]
    pub resource_key: Option<String>,
    /// Explicit identifier override.
    #[serde(default)]
    pub identifier: Option<String>,
}

impl PresenceRequest {
    pub fn identifier(&self) -> AppResult<Identifier> {
        Ok(Identifier::derive(
            self.identifier.as_deref(),
            &self.resource_type,
            self.resource_key.as_deref(),
        )?)
    }
}

/// Refresh result: the caller's snapshot plus polling hints.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    #[serde(flatten)]
    pub snapshot: PresenceSnapshot,
    /// Control changed for the caller during this refresh; re-render now.
    pub rerender: bool,
    /// How often the client should call refresh.
    pub poll_interval_secs: u64,
}

/// Read-only answer to "may this caller write right now?".
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub identifier: Identifier,
    pub lockable: bool,
    pub is_controller: bool,
    pub can_write: bool,
    /// The store could not be reached; writes are denied on lockable resources.
    pub degraded: bool,
}

// ---------------------------------------------------------------------------
// Render trigger
// ---------------------------------------------------------------------------

/// Records whether the registry raised a render signal for the caller.
#[derive(Default)]
struct RenderFlag(AtomicBool);

impl RenderFlag {
    fn raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl RenderTrigger for RenderFlag {
    fn control_changed(&self, _: &Identifier, _: &Principal, _: bool) {
        self.0.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/presence/refresh
///
/// Register the caller as present and return who else is viewing. A store
/// failure degrades to an empty, write-denied snapshot instead of an error.
pub async fn refresh(
    viewer: Viewer,
    State(state): State<AppState>,
    Json(input): Json<PresenceRequest>,
) -> AppResult<impl IntoResponse> {
    let identifier = input.identifier()?;
    let presence = &state.config.presence;
    let lockable = presence.is_lockable(&input.resource_type);
    let can_take_control = presence.may_take_control(viewer.role.as_deref());

    let flag = RenderFlag::default();
    let snapshot = match state
        .registry
        .refresh(&identifier, &viewer.principal, lockable, &flag)
        .await
    {
        Ok(set) => PresenceSnapshot::project(
            identifier.clone(),
            &set,
            &viewer.principal,
            lockable,
            can_take_control,
        ),
        Err(e) => {
            tracing::warn!(
                identifier = %identifier,
                error = %e,
                "Presence refresh failed, serving degraded snapshot"
            );
            PresenceSnapshot::degraded(identifier.clone(), lockable, can_take_control)
        }
    };

    let rerender = flag.raised();
    if rerender {
        let message = PresenceMessage::Rerender {
            identifier: identifier.to_string(),
            has_control: snapshot.is_controller,
        };
        state
            .ws_manager
            .send_to_viewer(&identifier, &viewer.principal, &message)
            .await;
    }

    Ok(Json(DataResponse {
        data: RefreshResponse {
            snapshot,
            rerender,
            poll_interval_secs: presence.poll_interval_secs,
        },
    }))
}

/// POST /api/v1/presence/take-control
///
/// Hand write control of a lockable resource to the caller. Returns 400 for
/// non-lockable resources and 403 without the take-control permission.
pub async fn take_control(
    viewer: Viewer,
    State(state): State<AppState>,
    Json(input): Json<PresenceRequest>,
) -> AppResult<impl IntoResponse> {
    let identifier = input.identifier()?;
    let presence = &state.config.presence;

    if !presence.is_lockable(&input.resource_type) {
        return Err(AppError::BadRequest(format!(
            "Resource type '{}' is not lockable",
            input.resource_type
        )));
    }
    if !presence.may_take_control(viewer.role.as_deref()) {
        return Err(AppError::Core(CoreError::Forbidden(
            "You are not allowed to take control of this resource".into(),
        )));
    }

    let outcome = state
        .arbiter
        .take_control(&identifier, &viewer.principal)
        .await
        .map_err(CoreError::from)?;

    let guard = &viewer.principal.guard;
    let current = LockOwnership::of(&outcome.set);
    if outcome.previous != current {
        let message = control_changed(&identifier, current);
        let notified = state
            .ws_manager
            .send_to_identifier(&identifier, guard, &message)
            .await;
        tracing::debug!(identifier = %identifier, notified, "Control change pushed");
    }

    let snapshot = PresenceSnapshot::project(
        identifier,
        &outcome.set,
        &viewer.principal,
        true,
        true,
    );
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/presence/control?resource_type=..&resource_key=..
///
/// Check whether the caller holds control without refreshing presence.
/// Fails closed: an absent set or an unreachable store denies writes on a
/// lockable resource.
pub async fn control(
    viewer: Viewer,
    State(state): State<AppState>,
    Query(params): Query<PresenceRequest>,
) -> AppResult<impl IntoResponse> {
    let identifier = params.identifier()?;
    let lockable = state.config.presence.is_lockable(&params.resource_type);

    let (is_controller, degraded) = if !lockable {
        (false, false)
    } else {
        match state.arbiter.has_control(&identifier, &viewer.principal).await {
            Ok(has_control) => (has_control, false),
            Err(e) => {
                tracing::warn!(
                    identifier = %identifier,
                    error = %e,
                    "Control check failed, denying write"
                );
                (false, true)
            }
        }
    };

    Ok(Json(DataResponse {
        data: ControlResponse {
            identifier,
            lockable,
            is_controller,
            can_write: write_allowed(lockable, (!degraded).then_some(is_controller)),
            degraded,
        },
    }))
}

fn control_changed(identifier: &Identifier, ownership: LockOwnership) -> PresenceMessage {
    match ownership {
        LockOwnership::OwnedBy { id, guard, name } => PresenceMessage::ControlChanged {
            identifier: identifier.to_string(),
            controller_id: id,
            controller_guard: Some(guard),
            controller_name: Some(name),
        },
        LockOwnership::Unowned => PresenceMessage::ControlChanged {
            identifier: identifier.to_string(),
            controller_id: None,
            controller_guard: None,
            controller_name: None,
        },
    }
}
