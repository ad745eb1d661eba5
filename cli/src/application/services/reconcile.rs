//! Application service — instance lifecycle reconciliation.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Each run polls a fresh snapshot per tick, asks the
//! [`Planner`](crate::domain::reconcile::Planner) what to do, and executes
//! at most one provider request per tick.

use tracing::{debug, warn};

use crate::application::ports::{CloudApi, ProgressReporter};
use crate::application::services::network::ensure_network;
use crate::application::services::polling::Polling;
use crate::domain::error::ReconcileError;
use crate::domain::instance::{DesiredState, Instance, LaunchSpec, Locator};
use crate::domain::reconcile::{Action, Outcome, Planner, Step};

/// What a reconciliation run acts on.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub region: &'a str,
    pub locator: &'a Locator,
    /// Launch parameters; required when converging toward `Up`.
    pub launch: Option<&'a LaunchSpec>,
}

/// Converge the located instance toward `desired`.
///
/// Provider errors on individual calls are logged and retried on the next
/// tick; only the conditions listed below end the run early.
///
/// # Errors
///
/// Returns [`ReconcileError::AmbiguousLocator`] when more than one instance
/// matches, [`ReconcileError::MissingLaunchSpec`] for `Up` without launch
/// parameters, [`ReconcileError::DryRunPassed`] when a dry-run create is
/// validated, network provisioning failures, any terminal planner failure,
/// and [`ReconcileError::TimedOut`] once the deadline passes.
pub async fn reconcile(
    cloud: &impl CloudApi,
    reporter: &impl ProgressReporter,
    target: Target<'_>,
    desired: DesiredState,
    polling: &Polling,
) -> Result<Outcome, ReconcileError> {
    if desired == DesiredState::Up && target.launch.is_none() {
        return Err(ReconcileError::MissingLaunchSpec);
    }
    let mut planner = Planner::new(desired, target.locator);
    let mut ticker = polling.ticker();
    loop {
        if !ticker.tick().await {
            return Err(ReconcileError::TimedOut {
                desired,
                after: polling.budget(),
            });
        }
        let snapshot = match cloud
            .list_instances(target.region, Some(target.locator))
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(region = target.region, error = %format!("{e:#}"), "listing instances failed");
                reporter.warn(&format!("error querying instances: {e:#}"));
                continue;
            }
        };
        let observed = select_instance(&snapshot, target.locator)?;
        match planner.observe(observed) {
            Step::Done(outcome) => {
                debug!(?outcome, "reconciliation finished");
                return Ok(outcome);
            }
            Step::Fail(e) => return Err(e),
            Step::Wait(reason) => reporter.waiting(&reason.to_string()),
            Step::Issue(action) => {
                let accepted = execute(cloud, reporter, target, &action, polling).await?;
                planner.record(&action, accepted);
            }
        }
    }
}

/// Bring the instance up: create, start and give it a public address as
/// needed.
///
/// # Errors
///
/// See [`reconcile`].
pub async fn up(
    cloud: &impl CloudApi,
    reporter: &impl ProgressReporter,
    target: Target<'_>,
    polling: &Polling,
) -> Result<(String, bool), ReconcileError> {
    match reconcile(cloud, reporter, target, DesiredState::Up, polling).await? {
        Outcome::Up { address, created } => Ok((address, created)),
        other => unreachable!("up run finished with {other:?}"),
    }
}

/// Stop the instance. Returns whether an instance was found.
///
/// # Errors
///
/// See [`reconcile`].
pub async fn down(
    cloud: &impl CloudApi,
    reporter: &impl ProgressReporter,
    target: Target<'_>,
    polling: &Polling,
) -> Result<bool, ReconcileError> {
    match reconcile(cloud, reporter, target, DesiredState::Down, polling).await? {
        Outcome::Down { found } => Ok(found),
        other => unreachable!("down run finished with {other:?}"),
    }
}

/// Stop, then delete the instance. Returns whether an instance was found.
///
/// # Errors
///
/// See [`reconcile`].
pub async fn delete(
    cloud: &impl CloudApi,
    reporter: &impl ProgressReporter,
    target: Target<'_>,
    polling: &Polling,
) -> Result<bool, ReconcileError> {
    if !down(cloud, reporter, target, polling).await? {
        return Ok(false);
    }
    match reconcile(cloud, reporter, target, DesiredState::Deleted, polling).await? {
        Outcome::Deleted { .. } => Ok(true),
        other => unreachable!("deleted run finished with {other:?}"),
    }
}

/// Reboot the instance once and wait for it to come back. Returns the public
/// address after the reboot, if any.
///
/// # Errors
///
/// See [`reconcile`].
pub async fn reboot(
    cloud: &impl CloudApi,
    reporter: &impl ProgressReporter,
    target: Target<'_>,
    polling: &Polling,
) -> Result<Option<String>, ReconcileError> {
    match reconcile(cloud, reporter, target, DesiredState::Rebooted, polling).await? {
        Outcome::Rebooted { address } => Ok(address),
        other => unreachable!("rebooted run finished with {other:?}"),
    }
}

/// The single instance `locator` points at, if any.
///
/// # Errors
///
/// Returns [`ReconcileError::AmbiguousLocator`] when several instances match.
pub fn select_instance<'a>(
    snapshot: &'a [Instance],
    locator: &Locator,
) -> Result<Option<&'a Instance>, ReconcileError> {
    let mut matching = snapshot.iter().filter(|i| locator.matches(i));
    let first = matching.next();
    let rest = matching.count();
    if rest > 0 {
        return Err(ReconcileError::AmbiguousLocator {
            locator: locator.to_string(),
            count: rest + 1,
        });
    }
    Ok(first)
}

/// Issue one provider request. `Ok(false)` means the provider rejected it
/// and the planner may retry on a later tick.
async fn execute(
    cloud: &impl CloudApi,
    reporter: &impl ProgressReporter,
    target: Target<'_>,
    action: &Action,
    polling: &Polling,
) -> Result<bool, ReconcileError> {
    let result = match action {
        Action::Create => {
            let launch = target.launch.ok_or(ReconcileError::MissingLaunchSpec)?;
            reporter.step(&format!("no instance matches {}, creating one", target.locator));
            let ids = ensure_network(cloud, reporter, target.region, &launch.zone, polling).await?;
            cloud
                .create_instance(target.region, &ids.subnet_id, launch)
                .await
                .map(|id| debug!(instance_id = %id, "instance creation accepted"))
        }
        Action::Start { id } => {
            reporter.step("instance is stopped, trying to start it up");
            cloud.start_instance(id).await
        }
        Action::Stop { id } => {
            reporter.step("instance is running, trying to stop it");
            cloud.stop_instance(id, false).await
        }
        Action::Reboot { id } => {
            reporter.step(&format!("rebooting instance {id}"));
            cloud.reboot_instance(id).await
        }
        Action::Delete { id } => {
            reporter.step(&format!("deleting instance {id}"));
            cloud.delete_instance(id).await
        }
        Action::AllocateAddress { id } => {
            reporter.step("public address is missing, requesting a new one");
            cloud
                .allocate_public_address(id)
                .await
                .map(|address| debug!(instance_id = %id, %address, "public address allocated"))
        }
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if matches!(
            e.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::DryRunPassed)
        ) => {
            Err(ReconcileError::DryRunPassed)
        }
        Err(e) => {
            warn!(%action, error = %format!("{e:#}"), "provider rejected request");
            reporter.warn(&format!("error trying to {action}: {e:#}"));
            Ok(false)
        }
    }
}
